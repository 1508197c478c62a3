//! Media upload pipeline: stage the picked asset, store it under the caller's
//! reaction prefix, then record its download URL in the reaction cache.

use std::path::{Path, PathBuf};

use mood_types::models::{MediaPayload, PendingUpload};
use mood_types::remote::{DocumentStore, MediaStaging, ObjectPath, ObjectStorage};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::session::Session;

impl<S, O, M> Session<S, O, M>
where
    S: DocumentStore,
    O: ObjectStorage,
    M: MediaStaging,
{
    /// Upload one reaction asset for `upload.emoji` and return its download
    /// URL. The URL is only returned once it is recorded in the caller's
    /// reactions.
    pub async fn upload_reaction(&self, upload: PendingUpload) -> Result<String> {
        if !self.config.in_palette(&upload.emoji) {
            return Err(SyncError::InvalidInput(format!(
                "{} is not one of the mood emojis",
                upload.emoji
            )));
        }

        let name = format!("{}.{}", Uuid::new_v4(), upload.extension());
        let path = ObjectPath::reaction(self.identity.clone(), upload.emoji.clone(), name);
        if !path.is_safe() {
            return Err(SyncError::InvalidInput(format!("Unusable object path {}", path)));
        }

        let staged = self.stage(&upload.payload).await?;
        let stored = self.store_object(&path, &staged).await;
        if let Err(e) = self.staging.discard(&staged).await {
            warn!("Could not discard staged file {}: {:#}", staged.display(), e);
        }
        let url = stored?;
        info!("Uploaded {} for {}", path, self.identity);

        self.append_media(&upload.emoji, &url).await?;
        Ok(url)
    }

    async fn stage(&self, payload: &MediaPayload) -> Result<PathBuf> {
        let staged = match payload {
            MediaPayload::File(source) => self.staging.stage_file(source).await,
            MediaPayload::Bytes { data, extension } => {
                self.staging.write_temp(data, extension).await
            }
        };
        staged.map_err(SyncError::staging)
    }

    async fn store_object(&self, path: &ObjectPath, staged: &Path) -> Result<String> {
        let handle = self
            .timed("upload object", self.objects.put(path, staged))
            .await
            .map_err(SyncError::upload)?;
        self.timed("resolve download url", self.objects.download_url(&handle))
            .await
            .map_err(SyncError::upload)
    }
}
