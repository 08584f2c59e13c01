//! Redis-backed cache tier.
//!
//! Uses a multiplexed, auto-reconnecting connection shared by all requests.
//! Only `GET`, `SETEX` and `PING` are issued.

use super::PreviewCache;
use crate::{Error, PreviewResult};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::future::Future;
use std::time::Duration;

/// Distributed preview cache.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCache {
    /// Connect and verify the server answers `PING` within `connect_timeout`.
    pub async fn connect(url: &str, connect_timeout: Duration, op_timeout: Duration) -> Result<Self, Error> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| Error::Cache(format!("connect timed out after {}ms", connect_timeout.as_millis())))??;

        let cache = Self { conn, op_timeout };
        cache.ping().await?;
        Ok(cache)
    }

    /// Health probe used at startup and by the periodic health check.
    pub async fn ping(&self) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let pong: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        if pong.eq_ignore_ascii_case("PONG") { Ok(()) } else { Err(Error::Cache(format!("unexpected PING reply: {pong}"))) }
    }

    async fn bounded<T>(&self, op: impl Future<Output = redis::RedisResult<T>>) -> Result<T, Error> {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Cache(format!("operation timed out after {}ms", self.op_timeout.as_millis()))),
        }
    }
}

#[async_trait]
impl PreviewCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<PreviewResult>, Error> {
        let mut conn = self.conn.clone();
        let json: Option<String> = self.bounded(conn.get(key)).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &PreviewResult, ttl: Duration) -> Result<(), Error> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        self.bounded(conn.set_ex::<_, _, ()>(key, json, seconds)).await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
