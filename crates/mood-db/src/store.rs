use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use mood_types::documents::{Document, Fields, Query};
use mood_types::remote::DocumentStore;
use tracing::debug;

use crate::Database;

/// `DocumentStore` over a local SQLite file. Every call runs on the blocking
/// pool so the async runtime never waits on SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(Database::open(path)?)))
    }

    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
    }
}

impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.blocking(move |db| db.get_document(&collection, &id)).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let query = query.clone();
        let docs = self.blocking(move |db| db.query_documents(&query)).await?;
        debug!("query returned {} documents", docs.len());
        Ok(docs)
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<Document> {
        let collection = collection.to_string();
        self.blocking(move |db| db.insert_document(&collection, fields)).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.blocking(move |db| db.merge_document(&collection, &id, fields)).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let (c, i) = (collection.to_string(), id.to_string());
        let removed = self.blocking(move |db| db.delete_document(&c, &i)).await?;
        if !removed {
            debug!("delete of {}/{} matched no document", collection, id);
        }
        Ok(())
    }
}
