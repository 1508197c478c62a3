//! Client-side sync and cache layer for paired mood posting.
//!
//! A [`Session`] belongs to one signed-in identity. It reads and writes the
//! remote document store, keeps the observed timelines and reaction cache in
//! a single [`SyncState`], and hands snapshots of that state to observers.

pub mod composer;
pub mod config;
pub mod error;
pub mod identity;
pub mod memory;
pub mod reactions;
pub mod session;
pub mod state;
pub mod timeline;
pub mod upload;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use memory::MemoryStore;
pub use session::Session;
pub use state::{Snapshot, SyncState, View};
