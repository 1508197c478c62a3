use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use mood_types::documents::{Document, Fields, Query, ServerClock, apply_fields};
use mood_types::remote::DocumentStore;
use serde_json::Map;
use uuid::Uuid;

/// In-process `DocumentStore`. Documents keep insertion order, which is the
/// store order queries fall back to for ties.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    clock: ServerClock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every document of `collection` in store order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.read().get(collection).cloned().unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Document>>> {
        self.collections.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Document>>> {
        self.collections.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .read()
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        Ok(query.evaluate(self.documents(&query.collection)))
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<Document> {
        let mut body = Map::new();
        apply_fields(&mut body, fields, self.clock.now());
        let doc = Document::new(Uuid::new_v4().to_string(), body);
        self.write()
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let now = self.clock.now();
        let mut collections = self.write();
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(doc) => apply_fields(&mut doc.fields, fields, now),
            None => {
                let mut body = Map::new();
                apply_fields(&mut body, fields, now);
                docs.push(Document::new(id, body));
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(docs) = self.write().get_mut(collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }
}
