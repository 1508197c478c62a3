use anyhow::{Context, Result, anyhow, bail};
use mood_types::remote::{ObjectHandle, ObjectPath, ObjectStorage};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;
use url::Url;

/// Directory-backed object storage.
///
/// Each object lives at `{root}/reactions/{owner}/{emoji}/{name}`. Download
/// URLs point at `public_base` when one is configured (e.g. a static file
/// server in front of `root`), otherwise at the file itself.
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base: Option<Url>,
}

impl LocalObjectStorage {
    pub async fn new(root: PathBuf, public_base: Option<Url>) -> Result<Self> {
        fs::create_dir_all(&root).await?;
        // file:// URLs need an absolute path
        let root = fs::canonicalize(&root).await?;
        info!("Object storage directory: {}", root.display());
        Ok(Self { root, public_base })
    }

    /// On-disk location of an object.
    pub fn object_path(&self, path: &ObjectPath) -> PathBuf {
        path.segments()
            .iter()
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    fn url_for(&self, path: &ObjectPath) -> Result<Url> {
        match &self.public_base {
            Some(base) => {
                let mut url = base.clone();
                url.path_segments_mut()
                    .map_err(|_| anyhow!("Public base URL {} cannot carry a path", base))?
                    .pop_if_empty()
                    .extend(path.segments());
                Ok(url)
            }
            None => Url::from_file_path(self.object_path(path))
                .map_err(|_| anyhow!("Object path for {} is not absolute", path)),
        }
    }
}

impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, path: &ObjectPath, local: &Path) -> Result<ObjectHandle> {
        if !path.is_safe() {
            bail!("Refusing to store object at unsafe path {}", path);
        }

        let target = self.object_path(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = fs::copy(local, &target)
            .await
            .with_context(|| format!("copy {} -> {}", local.display(), target.display()))?;

        info!("Stored object {} ({} bytes)", path, bytes);
        Ok(ObjectHandle {
            path: path.clone(),
            token: None,
        })
    }

    async fn download_url(&self, handle: &ObjectHandle) -> Result<String> {
        if fs::metadata(self.object_path(&handle.path)).await.is_err() {
            bail!("Object {} does not exist", handle.path);
        }
        Ok(self.url_for(&handle.path)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mood_types::models::UserId;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mood_storage_{}_{}", tag, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn put_then_file_url() {
        let root = temp_dir("root");
        let storage = LocalObjectStorage::new(root.clone(), None).await.unwrap();

        let src = temp_dir("src");
        fs::create_dir_all(&src).await.unwrap();
        let asset = src.join("pic.jpg");
        fs::write(&asset, b"jpeg bytes").await.unwrap();

        let path = ObjectPath::reaction(UserId::new("uid-a"), "😊", "one.jpg");
        let handle = storage.put(&path, &asset).await.unwrap();
        let url = storage.download_url(&handle).await.unwrap();

        assert!(url.starts_with("file://"));
        let stored = fs::read(storage.object_path(&path)).await.unwrap();
        assert_eq!(stored, b"jpeg bytes");
    }

    #[tokio::test]
    async fn public_base_url_encodes_segments() {
        let base = Url::parse("https://media.example.com/m/").unwrap();
        let storage = LocalObjectStorage::new(temp_dir("pub"), Some(base)).await.unwrap();

        let path = ObjectPath::reaction(UserId::new("uid-a"), "😊", "one.jpg");
        let url = storage.url_for(&path).unwrap();

        assert_eq!(
            url.as_str(),
            "https://media.example.com/m/reactions/uid-a/%F0%9F%98%8A/one.jpg"
        );
    }

    #[tokio::test]
    async fn unsafe_path_is_rejected() {
        let storage = LocalObjectStorage::new(temp_dir("unsafe"), None).await.unwrap();
        let path = ObjectPath::reaction(UserId::new(".."), "😊", "x.jpg");
        assert!(storage.put(&path, Path::new("/dev/null")).await.is_err());
    }

    #[tokio::test]
    async fn url_for_missing_object_fails() {
        let storage = LocalObjectStorage::new(temp_dir("missing"), None).await.unwrap();
        let handle = ObjectHandle {
            path: ObjectPath::reaction(UserId::new("uid-a"), "😊", "nope.jpg"),
            token: None,
        };
        assert!(storage.download_url(&handle).await.is_err());
    }
}
