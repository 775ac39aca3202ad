//! In-process store
//!
//! Each provider's generation lives behind an `Arc`; replacing it swaps the
//! pointer under the write lock, so readers hold either the old or the new
//! generation for as long as they need it.

use async_trait::async_trait;
use catalog_common::{CatalogRecord, Error, Provider, Result};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::CatalogStore;

type Generation = Arc<dyn Any + Send + Sync>;

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    generations: RwLock<HashMap<Provider, Generation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn replace<R: CatalogRecord>(&self, records: Vec<R>) -> Result<usize> {
        let count = records.len();
        let generation: Generation = Arc::new(records);

        self.generations.write().await.insert(R::PROVIDER, generation);

        debug!("Replaced {} generation with {} records", R::PROVIDER, count);
        Ok(count)
    }

    async fn snapshot<R: CatalogRecord>(&self) -> Result<Arc<Vec<R>>> {
        let generation = self.generations.read().await.get(&R::PROVIDER).cloned();

        match generation {
            Some(generation) => generation.downcast::<Vec<R>>().map_err(|_| {
                Error::Storage(format!("{} generation has an unexpected type", R::PROVIDER))
            }),
            None => Ok(Arc::new(Vec::new())),
        }
    }
}
