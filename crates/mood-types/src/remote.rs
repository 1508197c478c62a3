//! Seams to the remote services the sync layer talks to.
//!
//! Implementations report failures as `anyhow::Error`; the sync layer decides
//! which failure kind a given call maps to.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::documents::{Document, Fields, Query};
use crate::models::UserId;

/// Document-oriented remote store.
pub trait DocumentStore: Send + Sync + 'static {
    fn get(&self, collection: &str, id: &str)
    -> impl Future<Output = Result<Option<Document>>> + Send;

    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Document>>> + Send;

    /// Insert a document under a generated id. Returns it as stored, with
    /// server-side values resolved.
    fn add(&self, collection: &str, fields: Fields) -> impl Future<Output = Result<Document>> + Send;

    /// Merge `fields` into the document, creating it when absent.
    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Removing a document that does not exist is not an error.
    fn delete(&self, collection: &str, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Location of a reaction asset in object storage:
/// `reactions/<owner>/<emoji>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    pub owner: UserId,
    pub emoji: String,
    pub name: String,
}

impl ObjectPath {
    pub const ROOT: &'static str = "reactions";

    pub fn reaction(owner: UserId, emoji: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner,
            emoji: emoji.into(),
            name: name.into(),
        }
    }

    pub fn segments(&self) -> [&str; 4] {
        [Self::ROOT, self.owner.as_str(), self.emoji.as_str(), self.name.as_str()]
    }

    /// Every segment must be a single, non-traversing path component.
    pub fn is_safe(&self) -> bool {
        self.segments()
            .iter()
            .all(|s| !s.is_empty() && *s != "." && *s != ".." && !s.contains(['/', '\\', '\0']))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

/// What object storage hands back after a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub path: ObjectPath,
    /// Access token minted by the backend, when it uses one.
    pub token: Option<String>,
}

pub trait ObjectStorage: Send + Sync + 'static {
    fn put(&self, path: &ObjectPath, local: &Path)
    -> impl Future<Output = Result<ObjectHandle>> + Send;

    fn download_url(&self, handle: &ObjectHandle) -> impl Future<Output = Result<String>> + Send;
}

/// Private scratch area that turns picked media into addressable files.
pub trait MediaStaging: Send + Sync + 'static {
    fn write_temp(&self, bytes: &[u8], extension: &str)
    -> impl Future<Output = Result<PathBuf>> + Send;

    fn stage_file(&self, source: &Path) -> impl Future<Output = Result<PathBuf>> + Send;

    fn discard(&self, staged: &Path) -> impl Future<Output = Result<()>> + Send;
}
