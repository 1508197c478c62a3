//! Shared fixtures: an in-memory store, local object storage and staging in a
//! throwaway directory, and helpers to seed profiles and reactions.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use mood_core::session::{REACTIONS, USERS};
use mood_core::{MemoryStore, Session, SyncConfig};
use mood_storage::{LocalObjectStorage, TempStaging};
use mood_types::documents::{FieldValue, Fields};
use mood_types::models::{UserId, UserProfile, Username};
use mood_types::remote::{DocumentStore, MediaStaging, ObjectStorage};
use serde_json::Value;

pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mood_core_test_{}_{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub objects: Arc<LocalObjectStorage>,
    pub staging: Arc<TempStaging>,
    pub dir: PathBuf,
}

impl Fixture {
    pub async fn new(tag: &str) -> Self {
        let dir = temp_dir(tag);
        let objects = LocalObjectStorage::new(dir.join("objects"), None).await.unwrap();
        let staging = TempStaging::new(dir.join("staging")).await.unwrap();
        Self {
            store: Arc::new(MemoryStore::new()),
            objects: Arc::new(objects),
            staging: Arc::new(staging),
            dir,
        }
    }

    pub fn session(&self, id: &str) -> Session<MemoryStore, LocalObjectStorage, TempStaging> {
        session_with(
            id,
            self.store.clone(),
            self.objects.clone(),
            self.staging.clone(),
            SyncConfig::default(),
        )
    }
}

pub fn session_with<S, O, M>(
    id: &str,
    store: Arc<S>,
    objects: Arc<O>,
    staging: Arc<M>,
    config: SyncConfig,
) -> Session<S, O, M>
where
    S: DocumentStore,
    O: ObjectStorage,
    M: MediaStaging,
{
    Session::new(UserId::new(id), store, objects, staging, config)
}

pub fn profile(id: &str, username: &str, partner_username: &str) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        username: Username::new(username),
        email: format!("{}@example.com", username.to_lowercase()),
        partner_username: Username::new(partner_username),
        partner_id: None,
    }
}

pub async fn seed_profile<S: DocumentStore>(store: &S, profile: &UserProfile) {
    store
        .update(USERS, profile.id.as_str(), profile.to_fields())
        .await
        .unwrap();
}

/// Pair `a` and `b` by username only.
pub async fn seed_pair<S: DocumentStore>(store: &S) {
    seed_profile(store, &profile("uid-a", "A", "B")).await;
    seed_profile(store, &profile("uid-b", "B", "A")).await;
}

pub async fn seed_reactions<S: DocumentStore>(store: &S, owner: &str, emoji: &str, urls: &[&str]) {
    let mut fields = Fields::new();
    fields.insert(
        emoji.to_string(),
        FieldValue::ArrayUnion(urls.iter().map(|u| Value::from(*u)).collect()),
    );
    store.update(REACTIONS, owner, fields).await.unwrap();
}
