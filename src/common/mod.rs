//! Common utilities and types shared across keyscope

pub mod config;
pub mod error;
pub mod utils;

pub use config::{Config, ProfileConfig, StoreConfig};
pub use error::{Error, Pass, Result};
pub use utils::{average, display_key, encode_userinfo, format_bytes};
