//! Store value types and the per-prefix type bitset

use serde::{Serialize, Serializer};
use std::fmt;

/// Value type reported by the store's `TYPE` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    List,
    Set,
    ZSet,
    Hash,
    Stream,
    Unknown,
}

impl ValueType {
    pub const ALL: [ValueType; 7] = [
        ValueType::String,
        ValueType::List,
        ValueType::Set,
        ValueType::ZSet,
        ValueType::Hash,
        ValueType::Stream,
        ValueType::Unknown,
    ];

    /// Parse a `TYPE` reply. `none` and unrecognised names map to `Unknown`.
    pub fn parse(reply: &str) -> Self {
        match reply.trim().to_ascii_lowercase().as_str() {
            "string" => ValueType::String,
            "list" => ValueType::List,
            "set" => ValueType::Set,
            "zset" => ValueType::ZSet,
            "hash" => ValueType::Hash,
            "stream" => ValueType::Stream,
            _ => ValueType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::List => "list",
            ValueType::Set => "set",
            ValueType::ZSet => "zset",
            ValueType::Hash => "hash",
            ValueType::Stream => "stream",
            ValueType::Unknown => "unknown",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of value types observed under a prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeMask(u8);

impl TypeMask {
    pub fn insert(&mut self, ty: ValueType) {
        self.0 |= ty.bit();
    }

    pub fn contains(&self, ty: ValueType) -> bool {
        self.0 & ty.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueType> + '_ {
        ValueType::ALL.into_iter().filter(|ty| self.contains(*ty))
    }
}

impl fmt::Display for TypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        let names: Vec<&str> = self.iter().map(|ty| ty.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl Serialize for TypeMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|ty| ty.as_str()))
    }
}
