// Media Upload Adapter: binary blob in, public URL out
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Bytes,
    /// Client-side name; only its extension is kept
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl MediaUpload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: None,
            content_type: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Extension from the file name, else guessed from the content type.
    fn extension(&self) -> Option<String> {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase());

        from_name.or_else(|| {
            let content_type = self.content_type.as_deref()?;
            mime_guess::get_mime_extensions_str(content_type)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        })
    }

    /// Content type as declared, else guessed from the file name.
    pub fn resolved_content_type(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            self.file_name
                .as_deref()
                .map(|name| mime_guess::from_path(name).first_or_octet_stream())
                .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM)
                .to_string()
        })
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store the blob and return a publicly reachable URL.
    async fn upload(&self, upload: MediaUpload) -> AppResult<Url>;
}

/// Files on local disk, served back under `public_base_url`.
pub struct LocalMediaStore {
    dir: PathBuf,
    public_base_url: Url,
}

impl LocalMediaStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: Url) -> Self {
        Self {
            dir: dir.into(),
            public_base_url,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, upload: MediaUpload) -> AppResult<Url> {
        if upload.bytes.is_empty() {
            return Err(AppError::Upload("file is empty".into()));
        }

        let name = match upload.extension() {
            Some(ext) => format!("{}.{}", uuid::Uuid::now_v7(), ext),
            None => uuid::Uuid::now_v7().to_string(),
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;
        tokio::fs::write(self.dir.join(&name), &upload.bytes)
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;

        let url = self
            .public_base_url
            .join(&name)
            .map_err(|e| AppError::Upload(e.to_string()))?;

        tracing::info!(file = %name, bytes = upload.bytes.len(), "Stored media");
        Ok(url)
    }
}

/// A stored file name is a single plain path segment.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
}

/// Type alias for Arc-wrapped media store (for AppState)
pub type DynMediaStore = Arc<dyn MediaStore>;

#[cfg(test)]
mod tests {
    use super::*;

    fn store(tmp: &tempfile::TempDir) -> LocalMediaStore {
        LocalMediaStore::new(
            tmp.path().join("media"),
            Url::parse("http://localhost:3000/media/").unwrap(),
        )
    }

    #[tokio::test]
    async fn upload_writes_file_and_returns_public_url() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);

        let url = store
            .upload(MediaUpload::new(&b"jpeg-bytes"[..]).with_file_name("Wallet.JPG"))
            .await
            .unwrap();

        assert!(url.as_str().starts_with("http://localhost:3000/media/"));
        assert!(url.as_str().ends_with(".jpg"));

        let name = url.path_segments().unwrap().last().unwrap().to_string();
        let stored = std::fs::read(store.dir().join(name)).unwrap();
        assert_eq!(stored, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn extension_falls_back_to_content_type() {
        let tmp = tempfile::tempdir().unwrap();
        let url = store(&tmp)
            .upload(MediaUpload::new(&b"ID3"[..]).with_content_type("audio/mpeg"))
            .await
            .unwrap();
        let ext = Path::new(url.path()).extension().unwrap().to_str().unwrap();
        assert!(!ext.is_empty());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let result = store(&tmp).upload(MediaUpload::new(Bytes::new())).await;
        assert!(matches!(result, Err(AppError::Upload(_))));
    }

    #[test]
    fn content_type_guessed_from_name() {
        let upload = MediaUpload::new(&b"x"[..]).with_file_name("photo.png");
        assert_eq!(upload.resolved_content_type(), "image/png");
        assert_eq!(
            MediaUpload::new(&b"x"[..]).resolved_content_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn traversal_names_are_unsafe() {
        assert!(is_safe_name("0190a.jpg"));
        assert!(!is_safe_name("../secret"));
        assert!(!is_safe_name("a/b.png"));
        assert!(!is_safe_name(""));
    }
}
