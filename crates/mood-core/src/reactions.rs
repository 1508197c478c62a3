//! Per-user reaction media, keyed by emoji.
//!
//! Each identity owns one document in the reactions collection whose fields
//! are emojis and whose values are lists of media URLs in upload order.

use mood_types::documents::{Document, FieldValue, Fields};
use mood_types::models::{Reaction, ReactionMap, UserId};
use mood_types::remote::DocumentStore;
use rand::seq::IndexedRandom;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::session::{REACTIONS, Session};

/// Decode a reaction document. Fields that are not lists of strings are
/// skipped, and emojis with no media are left out.
pub fn reactions_from_document(doc: &Document) -> ReactionMap {
    let mut map = ReactionMap::new();
    for (emoji, value) in &doc.fields {
        let Value::Array(items) = value else {
            warn!("Reactions {}: field {} is not a list", doc.id, emoji);
            continue;
        };
        let urls: Vec<String> = items
            .iter()
            .filter_map(|item| match item {
                Value::String(url) => Some(url.clone()),
                other => {
                    warn!("Reactions {}: skipping non-string entry {} under {}", doc.id, other, emoji);
                    None
                }
            })
            .collect();
        if !urls.is_empty() {
            map.insert(emoji.clone(), Reaction::new(emoji.clone(), urls));
        }
    }
    map
}

fn media_op(emoji: &str, op: FieldValue) -> Fields {
    let mut fields = Fields::new();
    fields.insert(emoji.to_string(), op);
    fields
}

impl<S: DocumentStore, O, M> Session<S, O, M> {
    /// The caller's reactions, straight from the store.
    pub async fn fetch_own(&self) -> Result<ReactionMap> {
        self.fetch_for(&self.identity).await
    }

    /// Reactions owned by `owner`. A user who never uploaded anything has an
    /// empty map.
    pub async fn fetch_for(&self, owner: &UserId) -> Result<ReactionMap> {
        let doc = self
            .timed("fetch reactions", self.store.get(REACTIONS, owner.as_str()))
            .await
            .map_err(SyncError::transport)?;

        Ok(match doc {
            Some(doc) => reactions_from_document(&doc),
            None => {
                debug!("{} has no reactions document", owner);
                ReactionMap::new()
            }
        })
    }

    /// Reload the caller's reaction cache.
    pub async fn refresh_reactions(&self) -> Result<()> {
        let ticket = self.state.issue();
        let reactions = self.fetch_own().await?;
        self.state.apply_reactions(ticket, reactions);
        Ok(())
    }

    /// Append `url` to the caller's media for `emoji`. The store drops
    /// duplicates.
    pub async fn append_media(&self, emoji: &str, url: &str) -> Result<()> {
        let fields = media_op(emoji, FieldValue::ArrayUnion(vec![Value::from(url)]));
        self.timed("append reaction", self.store.update(REACTIONS, self.identity.as_str(), fields))
            .await
            .map_err(SyncError::write)?;
        info!("Added {} reaction for {}", emoji, self.identity);

        self.refresh_after_write("append").await;
        Ok(())
    }

    /// Remove `url` from the caller's media for `emoji`. The stored object is
    /// left in place.
    pub async fn delete_media(&self, emoji: &str, url: &str) -> Result<()> {
        let fields = media_op(emoji, FieldValue::ArrayRemove(vec![Value::from(url)]));
        self.timed("remove reaction", self.store.update(REACTIONS, self.identity.as_str(), fields))
            .await
            .map_err(SyncError::write)?;
        info!("Removed {} reaction for {}", emoji, self.identity);

        self.refresh_after_write("remove").await;
        Ok(())
    }

    async fn refresh_after_write(&self, op: &str) {
        if let Err(e) = self.refresh_reactions().await {
            warn!("Reaction {} saved but refreshing the cache failed: {}", op, e);
        }
    }

    /// A random cached media URL for `emoji`, if any.
    pub fn sample(&self, emoji: &str) -> Option<String> {
        self.state
            .with_snapshot(|snap| snap.media(emoji).choose(&mut rand::rng()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_lists_and_skips_junk() {
        let fields = json!({
            "😊": ["a", "b"],
            "😂": [],
            "😴": "not-a-list",
            "😡": ["c", 7],
        });
        let Value::Object(fields) = fields else { unreachable!() };
        let map = reactions_from_document(&Document::new("uid", fields));

        assert_eq!(map.len(), 2);
        assert_eq!(map["😊"].media_urls, vec!["a", "b"]);
        assert_eq!(map["😡"].media_urls, vec!["c"]);
        assert!(!map.contains_key("😂"));
    }

    #[test]
    fn media_op_targets_the_emoji_field() {
        let fields = media_op("😊", FieldValue::ArrayUnion(vec![Value::from("u")]));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["😊"], FieldValue::ArrayUnion(vec![Value::from("u")]));
    }
}
