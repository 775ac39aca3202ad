//! Redis storage for the catalog
//!
//! Data model:
//! - {prefix}:{provider}:records → List of JSON-encoded records, in insertion order
//!
//! A replacement runs `DEL` and the `RPUSH`es inside one `MULTI`/`EXEC`
//! transaction, so readers see the old list or the new one.

use async_trait::async_trait;
use catalog_common::{CatalogRecord, Error, Provider, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, info};

use super::CatalogStore;

/// Records pushed per `RPUSH` command
const PUSH_CHUNK: usize = 500;

fn storage_error(err: redis::RedisError) -> Error {
    Error::Storage(err.to_string())
}

/// Storage backend on Redis
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Create a new storage instance
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::Storage(format!("Failed to create Redis client: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Storage(format!("Failed to connect to Redis: {}", e)))?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn records_key(&self, provider: Provider) -> String {
        format!("{}:{}:records", self.prefix, provider)
    }

    async fn load<R: CatalogRecord>(&self) -> Result<Vec<R>> {
        let key = self.records_key(R::PROVIDER);
        let mut conn = self.conn.clone();

        let raw: Vec<String> = conn.lrange(&key, 0, -1).await.map_err(storage_error)?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl CatalogStore for RedisStore {
    async fn replace<R: CatalogRecord>(&self, records: Vec<R>) -> Result<usize> {
        let key = self.records_key(R::PROVIDER);

        let payload = records
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<String>, _>>()?;

        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore();
        for chunk in payload.chunks(PUSH_CHUNK) {
            pipe.rpush(&key, chunk).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await.map_err(storage_error)?;

        debug!("Replaced {} with {} records", key, payload.len());
        Ok(payload.len())
    }

    /// One `LRANGE` of the provider's list
    async fn snapshot<R: CatalogRecord>(&self) -> Result<Arc<Vec<R>>> {
        Ok(Arc::new(self.load::<R>().await?))
    }

    /// Health check - verify Redis connection
    async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Storage(format!("Redis health check failed: {}", e)))?;
        Ok(())
    }
}
