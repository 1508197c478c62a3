//! Failure paths: rejected writes, stalled calls and broken staging.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use common::{Fixture, profile, seed_pair, seed_profile, seed_reactions, session_with};
use mood_core::config::DEFAULT_REACTION_URL;
use mood_core::session::MOODS;
use mood_core::{MemoryStore, SyncConfig, SyncError};
use mood_storage::LocalObjectStorage;
use mood_types::documents::{Document, Fields, Query};
use mood_types::models::{MoodDraft, PendingUpload, Username};
use mood_types::remote::{DocumentStore, ObjectHandle, ObjectPath, ObjectStorage};

/// Wraps a [`MemoryStore`] and can be told to reject writes or to stall
/// reads of one collection.
struct FlakyStore {
    inner: MemoryStore,
    reject_writes: AtomicBool,
    stall_collection: Option<&'static str>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            reject_writes: AtomicBool::new(false),
            stall_collection: None,
        }
    }

    fn stalling(collection: &'static str) -> Self {
        Self {
            stall_collection: Some(collection),
            ..Self::new()
        }
    }

    async fn maybe_stall(&self, collection: &str) {
        if self.stall_collection == Some(collection) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }

    fn check_write(&self) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            bail!("permission denied");
        }
        Ok(())
    }
}

impl DocumentStore for FlakyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.maybe_stall(collection).await;
        self.inner.get(collection, id).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.maybe_stall(&query.collection).await;
        self.inner.query(query).await
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<Document> {
        self.check_write()?;
        self.inner.add(collection, fields).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.check_write()?;
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.check_write()?;
        self.inner.delete(collection, id).await
    }
}

/// Counts calls before handing them to local storage.
struct CountingObjects {
    inner: LocalObjectStorage,
    puts: AtomicUsize,
    fail: bool,
}

impl ObjectStorage for CountingObjects {
    async fn put(&self, path: &ObjectPath, local: &Path) -> Result<ObjectHandle> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("bucket unavailable");
        }
        self.inner.put(path, local).await
    }

    async fn download_url(&self, handle: &ObjectHandle) -> Result<String> {
        self.inner.download_url(handle).await
    }
}

fn short_timeout() -> SyncConfig {
    SyncConfig {
        request_timeout: Duration::from_millis(100),
        ..SyncConfig::default()
    }
}

async fn counting(fx: &Fixture, fail: bool) -> Arc<CountingObjects> {
    let inner = LocalObjectStorage::new(fx.dir.join("counted"), None).await.unwrap();
    Arc::new(CountingObjects {
        inner,
        puts: AtomicUsize::new(0),
        fail,
    })
}

#[tokio::test]
async fn rejected_write_leaves_state_untouched() {
    let fx = Fixture::new("reject").await;
    let store = Arc::new(FlakyStore::new());
    seed_pair(store.as_ref()).await;
    let a = session_with("uid-a", store.clone(), fx.objects.clone(), fx.staging.clone(), SyncConfig::default());

    a.create_mood(MoodDraft::new("😊", "before")).await.unwrap();
    let before = a.snapshot();

    store.reject_writes.store(true, Ordering::SeqCst);
    let err = a.post_mood("😊", "after").await.unwrap_err();
    assert!(matches!(err, SyncError::Write(_)), "{:?}", err);

    let after = a.snapshot();
    assert_eq!(after.own_latest, before.own_latest);
    assert_eq!(store.inner.documents(MOODS).len(), 1);

    let err = a.delete_mood(&before.own_latest[0].id).await.unwrap_err();
    assert!(matches!(err, SyncError::Write(_)));
    assert!(a.snapshot().contains_mood(&before.own_latest[0].id));

    let err = a.append_media("😊", "u").await.unwrap_err();
    assert!(matches!(err, SyncError::Write(_)));
    assert!(a.snapshot().reactions.is_empty());
}

#[tokio::test]
async fn stalled_read_times_out_as_transport_error() {
    let fx = Fixture::new("stall").await;
    let store = Arc::new(FlakyStore::stalling(MOODS));
    seed_pair(store.as_ref()).await;
    let a = session_with("uid-a", store, fx.objects.clone(), fx.staging.clone(), short_timeout());

    let err = a.refresh_feed().await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)), "{:?}", err);
    let err = a.fetch_latest(&Username::new("A"), 3).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert!(a.snapshot().feed.is_empty());
}

#[tokio::test]
async fn stalled_partner_reactions_fall_back_to_placeholder() {
    let fx = Fixture::new("stall_reactions").await;
    let store = Arc::new(FlakyStore::stalling("reactions"));
    seed_pair(store.as_ref()).await;
    seed_reactions(store.as_ref(), "uid-b", "😊", &["urlX"]).await;
    let a = session_with("uid-a", store, fx.objects.clone(), fx.staging.clone(), short_timeout());

    let mood = a.post_mood("😊", "still posts").await.unwrap();
    assert_eq!(mood.reaction_media_url.as_deref(), Some(DEFAULT_REACTION_URL));
}

#[tokio::test]
async fn stalled_profile_fails_post() {
    let fx = Fixture::new("stall_profile").await;
    let store = Arc::new(FlakyStore::stalling("users"));
    let a = session_with("uid-a", store.clone(), fx.objects.clone(), fx.staging.clone(), short_timeout());

    let err = a.post_mood("😊", "hello").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)), "{:?}", err);
    assert!(store.inner.documents(MOODS).is_empty());
}

#[tokio::test]
async fn staging_failure_skips_object_storage() {
    let fx = Fixture::new("staging_fail").await;
    seed_pair(fx.store.as_ref()).await;
    let objects = counting(&fx, false).await;
    let a = session_with("uid-a", fx.store.clone(), objects.clone(), fx.staging.clone(), SyncConfig::default());

    let missing = fx.dir.join("no-such-file.png");
    let err = a.upload_reaction(PendingUpload::file("😊", missing)).await.unwrap_err();
    assert!(matches!(err, SyncError::Staging(_)), "{:?}", err);

    let err = a
        .upload_reaction(PendingUpload::bytes("😊", vec![], "jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Staging(_)), "{:?}", err);

    assert_eq!(objects.puts.load(Ordering::SeqCst), 0);
    assert!(a.fetch_own().await.unwrap().is_empty());
}

#[tokio::test]
async fn storage_failure_records_nothing_and_cleans_staging() {
    let fx = Fixture::new("storage_fail").await;
    seed_pair(fx.store.as_ref()).await;
    let objects = counting(&fx, true).await;
    let a = session_with("uid-a", fx.store.clone(), objects.clone(), fx.staging.clone(), SyncConfig::default());

    let err = a
        .upload_reaction(PendingUpload::bytes("😊", b"img".to_vec(), "png"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Upload(_)), "{:?}", err);
    assert_eq!(objects.puts.load(Ordering::SeqCst), 1);
    assert!(a.fetch_own().await.unwrap().is_empty());
    assert_eq!(std::fs::read_dir(fx.dir.join("staging")).unwrap().count(), 0);
}

#[tokio::test]
async fn upload_outside_palette_is_rejected_early() {
    let fx = Fixture::new("upload_palette").await;
    seed_pair(fx.store.as_ref()).await;
    let objects = counting(&fx, false).await;
    let a = session_with("uid-a", fx.store.clone(), objects.clone(), fx.staging.clone(), SyncConfig::default());

    let err = a
        .upload_reaction(PendingUpload::bytes("🦀", b"img".to_vec(), "png"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput(_)));
    assert_eq!(objects.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_profile_is_a_data_error() {
    let fx = Fixture::new("bad_profile").await;
    let mut fields = Fields::new();
    fields.insert("username".into(), mood_types::documents::FieldValue::set(42));
    fx.store.update("users", "uid-x", fields).await.unwrap();

    let err = fx.session("uid-x").load_profile().await.unwrap_err();
    assert!(matches!(err, SyncError::Data(_)), "{:?}", err);

    // A well-formed profile next to it still resolves.
    seed_profile(fx.store.as_ref(), &profile("uid-a", "A", "")).await;
    fx.session("uid-a").load_profile().await.unwrap();
}
