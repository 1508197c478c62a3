use anyhow::{Context, Result, bail};
use mood_types::remote::MediaStaging;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Private scratch directory for media on its way to object storage.
///
/// Staged files get a random name so concurrent uploads never collide, and
/// only files inside the directory can be discarded through it.
pub struct TempStaging {
    dir: PathBuf,
}

impl TempStaging {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        let dir = fs::canonicalize(&dir).await?;
        debug!("Staging directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// A staging area under the system temp dir.
    pub async fn in_temp_dir() -> Result<Self> {
        Self::new(std::env::temp_dir().join("mood-staging")).await
    }

    fn fresh_path(&self, extension: &str) -> PathBuf {
        let name = Uuid::new_v4().to_string();
        let ext = extension.trim_start_matches('.');
        if ext.is_empty() {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{}.{}", name, ext))
        }
    }
}

impl MediaStaging for TempStaging {
    async fn write_temp(&self, bytes: &[u8], extension: &str) -> Result<PathBuf> {
        if bytes.is_empty() {
            bail!("Refusing to stage an empty payload");
        }
        let path = self.fresh_path(extension);
        let mut file = fs::File::create(&path)
            .await
            .with_context(|| format!("create {}", path.display()))?;
        file.write_all(bytes).await?;
        file.flush().await?;
        debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    async fn stage_file(&self, source: &Path) -> Result<PathBuf> {
        let meta = fs::metadata(source)
            .await
            .with_context(|| format!("read {}", source.display()))?;
        if !meta.is_file() {
            bail!("{} is not a regular file", source.display());
        }
        let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("");
        let path = self.fresh_path(extension);
        fs::copy(source, &path)
            .await
            .with_context(|| format!("copy {} into staging", source.display()))?;
        debug!("Staged {} at {}", source.display(), path.display());
        Ok(path)
    }

    async fn discard(&self, staged: &Path) -> Result<()> {
        if staged.parent() != Some(self.dir.as_path()) {
            bail!("{} is not a staged file", staged.display());
        }
        match fs::remove_file(staged).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Staged file {} already gone", staged.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
