//! Redis-protocol store backed by a multiplexed async connection

use crate::common::{encode_userinfo, Error, Result, StoreConfig};
use crate::profile::ValueType;
use crate::store::{KeyStore, ScanPage};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Value;
use std::collections::HashMap;

/// Store client for Redis and protocol-compatible servers.
///
/// Cloning the multiplexed connection is cheap, so type and size lookups
/// each take their own handle and run concurrently over one socket.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    addr: String,
}

impl RedisStore {
    /// Connect using `config`, sending READONLY first if requested.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = redis::Client::open(connection_url(config).as_str())?;
        let mut conn = client
            .get_multiplexed_async_connection_with_timeouts(
                config.response_timeout(),
                config.connect_timeout(),
            )
            .await
            .map_err(|e| {
                Error::Transport(format!("connect to {}: {}", config.display_addr(), e))
            })?;

        if config.read_only {
            let reply: redis::RedisResult<()> = redis::cmd("READONLY").query_async(&mut conn).await;
            if let Err(e) = reply {
                tracing::warn!("READONLY rejected by {}: {}", config.display_addr(), e);
            }
        }

        tracing::info!("Connected to {}", config.display_addr());
        Ok(Self {
            conn,
            addr: config.display_addr(),
        })
    }
}

#[async_trait]
impl KeyStore for RedisStore {
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        let mut conn = self.conn.clone();
        let reply: Value = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Transport(format!("SCAN {} on {} failed: {}", cursor, self.addr, e)))?;
        parse_scan_reply(reply)
    }

    async fn types(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, ValueType>> {
        let replies = self.pipeline("TYPE", keys).await?;
        Ok(keys
            .iter()
            .zip(replies.iter())
            .filter_map(|(key, reply)| parse_type_reply(reply).map(|ty| (key.clone(), ty)))
            .collect())
    }

    async fn sizes(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, u64>> {
        let replies = self.pipeline("DUMP", keys).await?;
        Ok(keys
            .iter()
            .zip(replies.iter())
            .filter_map(|(key, reply)| parse_dump_reply(reply).map(|size| (key.clone(), size)))
            .collect())
    }
}

impl RedisStore {
    /// Send `command key` for every key in a single pipelined round trip.
    async fn pipeline(&self, command: &str, keys: &[Vec<u8>]) -> Result<Vec<Value>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd(command).arg(key.as_slice());
        }

        let mut conn = self.conn.clone();
        let replies: Vec<Value> = pipe.query_async(&mut conn).await.map_err(|e| {
            Error::Transport(format!(
                "{} pipeline of {} keys on {} failed: {}",
                command,
                keys.len(),
                self.addr,
                e
            ))
        })?;
        Ok(replies)
    }
}

/// Build a `redis://[user:pass@]host:port/db` URL with escaped credentials.
pub fn connection_url(config: &StoreConfig) -> String {
    let mut url = String::from("redis://");
    if let Some(ref user) = config.username {
        url.push_str(&encode_userinfo(user));
    }
    if let Some(ref pass) = config.password {
        url.push(':');
        url.push_str(&encode_userinfo(pass));
    }
    if config.username.is_some() || config.password.is_some() {
        url.push('@');
    }
    url.push_str(&format!("{}:{}/{}", config.host, config.port, config.db));
    url
}

/// Parse `[cursor, [key, ...]]`.
pub fn parse_scan_reply(reply: Value) -> Result<ScanPage> {
    let mut items = match reply {
        Value::Array(items) if items.len() == 2 => items,
        other => {
            return Err(Error::Transport(format!(
                "unexpected SCAN reply: {:?}",
                other
            )))
        }
    };

    let keys = match items.pop() {
        Some(Value::Array(keys)) => keys
            .into_iter()
            .filter_map(|key| match key {
                Value::BulkString(bytes) => Some(bytes),
                Value::SimpleString(s) => Some(s.into_bytes()),
                _ => None,
            })
            .collect(),
        other => {
            return Err(Error::Transport(format!(
                "unexpected SCAN key list: {:?}",
                other
            )))
        }
    };

    let cursor = match items.pop() {
        Some(Value::BulkString(bytes)) => std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse::<u64>().ok()),
        Some(Value::SimpleString(s)) => s.parse::<u64>().ok(),
        Some(Value::Int(n)) => u64::try_from(n).ok(),
        _ => None,
    }
    .ok_or_else(|| Error::Transport("unreadable SCAN cursor".into()))?;

    Ok(ScanPage { keys, cursor })
}

/// Parse one `TYPE` reply; `None` if the reply is not a type name.
pub fn parse_type_reply(reply: &Value) -> Option<ValueType> {
    match reply {
        Value::SimpleString(s) => Some(ValueType::parse(s)),
        Value::BulkString(bytes) => std::str::from_utf8(bytes).ok().map(ValueType::parse),
        _ => None,
    }
}

/// Parse one `DUMP` reply into the payload length; nil is a vanished key.
pub fn parse_dump_reply(reply: &Value) -> Option<u64> {
    match reply {
        Value::BulkString(bytes) => Some(bytes.len() as u64),
        Value::Nil => Some(0),
        _ => None,
    }
}
