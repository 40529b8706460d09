//! # keyscope
//!
//! Key-space profiler for Redis-compatible stores:
//! - Adaptive sampling of keys into a compressed prefix trie
//! - Discovery of coarse (summary) and fine (detail) key prefixes
//! - A full second scan attributing every key to its prefixes
//! - Optional per-prefix size and value-type statistics
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  SCAN   ┌──────────┐  trie  ┌────────────┐
//! │  KeyStore    ├────────►│ Sampler  ├───────►│ discover() │
//! └──────┬───────┘         └──────────┘        └─────┬──────┘
//!        │ SCAN + TYPE/DUMP pipelines                │ prefix sets
//!        │                 ┌────────────┐            │
//!        └────────────────►│ Aggregator │◄───────────┘
//!                          └─────┬──────┘
//!                                ▼
//!                          ProfileReport (table / JSON)
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Profile the whole key-space of a local server
//! keyscope prefix
//!
//! # Restrict to a pattern and collect size/type statistics
//! keyscope -H 10.0.0.5 -p 6380 prefix --scan-pattern 'user:*' --stats
//!
//! # Read from a cluster replica and emit JSON
//! keyscope --read-only prefix --json
//! ```

pub mod common;
pub mod profile;
pub mod store;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use profile::{ProfileReport, Profiler};
pub use store::{KeyStore, MemoryStore, RedisStore};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
