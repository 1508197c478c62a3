/// Database row types — these map directly to SQLite rows.
/// Distinct from mood-types documents to keep the DB layer independent.
use anyhow::{Result, anyhow};
use mood_types::documents::Document;
use serde_json::Value;

pub struct DocumentRow {
    pub collection: String,
    pub id: String,
    pub body: String,
}

impl DocumentRow {
    pub fn into_document(self) -> Result<Document> {
        match serde_json::from_str::<Value>(&self.body)? {
            Value::Object(fields) => Ok(Document::new(self.id, fields)),
            other => Err(anyhow!(
                "Document {}/{} has a non-object body: {}",
                self.collection,
                self.id,
                other
            )),
        }
    }
}
