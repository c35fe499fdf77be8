//! Upload storage - directory layout and file lifecycle
//!
//! Layout under the uploads root:
//!
//! ```text
//! uploads/
//!   ProjectFiles/project-{id}/{uuid}.{ext}
//!   postMedia/images/{uuid}.{ext}
//!   postMedia/videos/{uuid}.{ext}
//! ```
//!
//! Paths stored in the database are relative to the root, with `/`
//! separators, and are served read-only under `/uploads/`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::config::UploadLimits;
use crate::models::MediaKind;

pub const PROJECT_FILES_DIR: &str = "ProjectFiles";
pub const POST_MEDIA_DIR: &str = "postMedia";

/// URL prefix the uploads root is served under
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("file of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("file is empty")]
    Empty,

    #[error("invalid stored path: {0}")]
    InvalidPath(String),
}

/// Where an upload lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    PostMedia(MediaKind),
    Project(Uuid),
}

/// A file written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the uploads root
    pub relative_path: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// Strip parameters and normalize case: `Image/PNG; q=1` -> `image/png`
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// File extension for an accepted content type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match essence(content_type).as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}

/// Media kind of a post attachment, if the content type is allowed on posts.
pub fn media_kind_for(content_type: &str) -> Option<MediaKind> {
    let essence = essence(content_type);
    extension_for(&essence)?;
    if essence.starts_with("image/") {
        Some(MediaKind::Image)
    } else if essence.starts_with("video/") {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Public URL of a stored file.
pub fn public_url(relative_path: &str) -> String {
    format!("{}/{}", PUBLIC_PREFIX, relative_path)
}

/// Filesystem-backed upload storage
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    limits: UploadLimits,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, limits: UploadLimits) -> Self {
        Self {
            root: root.into(),
            limits,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    fn project_relative_dir(project_id: Uuid) -> String {
        format!("{}/project-{}", PROJECT_FILES_DIR, project_id)
    }

    fn media_relative_dir(kind: MediaKind) -> String {
        let sub = match kind {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        };
        format!("{}/{}", POST_MEDIA_DIR, sub)
    }

    /// Directory holding a project's files
    pub fn project_dir(&self, project_id: Uuid) -> PathBuf {
        self.root.join(Self::project_relative_dir(project_id))
    }

    /// Directory holding post media of one kind
    pub fn post_media_dir(&self, kind: MediaKind) -> PathBuf {
        self.root.join(Self::media_relative_dir(kind))
    }

    /// Create the fixed directory layout. Idempotent.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(self.root.join(PROJECT_FILES_DIR)).await?;
        for kind in MediaKind::ALL {
            tokio::fs::create_dir_all(self.post_media_dir(*kind)).await?;
        }
        tracing::info!(root = %self.root.display(), "upload storage initialized");
        Ok(())
    }

    /// Size limit for a target.
    pub fn limit_for(&self, target: UploadTarget) -> u64 {
        match target {
            UploadTarget::PostMedia(MediaKind::Image) => self.limits.max_image_bytes,
            UploadTarget::PostMedia(MediaKind::Video) => self.limits.max_video_bytes,
            UploadTarget::Project(_) => self.limits.max_file_bytes,
        }
    }

    /// Validate and write an upload under a fresh name.
    ///
    /// The extension comes from the content type, never from the client's
    /// file name.
    pub async fn save(
        &self,
        target: UploadTarget,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let ext = extension_for(content_type)
            .ok_or_else(|| StorageError::UnsupportedType(content_type.to_owned()))?;

        let relative_dir = match target {
            UploadTarget::PostMedia(kind) => {
                if media_kind_for(content_type) != Some(kind) {
                    return Err(StorageError::UnsupportedType(content_type.to_owned()));
                }
                Self::media_relative_dir(kind)
            }
            UploadTarget::Project(id) => Self::project_relative_dir(id),
        };

        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }

        let size = bytes.len() as u64;
        let limit = self.limit_for(target);
        if size > limit {
            return Err(StorageError::TooLarge { size, limit });
        }

        let dir = self.root.join(&relative_dir);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        Ok(StoredFile {
            relative_path: format!("{}/{}", relative_dir, file_name),
            content_type: essence(content_type),
            size_bytes: size as i64,
        })
    }

    /// Resolve a stored relative path, refusing anything that leaves the root.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative_path);
        let clean = !relative_path.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !clean {
            return Err(StorageError::InvalidPath(relative_path.to_owned()));
        }

        Ok(self.root.join(path))
    }

    /// Remove a stored file. A missing file is not an error.
    pub async fn remove(&self, relative_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative_path)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a project's directory and everything in it.
    pub async fn remove_project_dir(&self, project_id: Uuid) -> Result<(), StorageError> {
        match tokio::fs::remove_dir_all(self.project_dir(project_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort cleanup after the owning rows are gone.
    ///
    /// Failures are logged, never returned.
    pub async fn discard(&self, relative_paths: &[String], project_ids: &[Uuid]) {
        for path in relative_paths {
            if let Err(e) = self.remove(path).await {
                tracing::warn!(path = %path, error = %e, "failed to remove uploaded file");
            }
        }
        for id in project_ids {
            if let Err(e) = self.remove_project_dir(*id).await {
                tracing::warn!(project_id = %id, error = %e, "failed to remove project directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> MediaStorage {
        MediaStorage::new(
            root,
            UploadLimits {
                max_image_bytes: 16,
                max_video_bytes: 32,
                max_file_bytes: 8,
            },
        )
    }

    #[test]
    fn paths_are_correct() {
        let storage = storage(Path::new("/srv/uploads"));
        let id = Uuid::nil();

        assert_eq!(
            storage.project_dir(id),
            PathBuf::from(format!("/srv/uploads/ProjectFiles/project-{}", id))
        );
        assert_eq!(
            storage.post_media_dir(MediaKind::Image),
            PathBuf::from("/srv/uploads/postMedia/images")
        );
        assert_eq!(
            storage.post_media_dir(MediaKind::Video),
            PathBuf::from("/srv/uploads/postMedia/videos")
        );
    }

    #[test]
    fn content_type_mapping() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("Image/PNG; charset=binary"), Some("png"));
        assert_eq!(extension_for("video/quicktime"), Some("mov"));
        assert_eq!(extension_for("application/x-msdownload"), None);

        assert_eq!(media_kind_for("image/webp"), Some(MediaKind::Image));
        assert_eq!(media_kind_for("video/mp4"), Some(MediaKind::Video));
        assert_eq!(media_kind_for("application/pdf"), None);
        assert_eq!(media_kind_for("image/tiff"), None);
    }

    #[test]
    fn resolve_rejects_escapes() {
        let storage = storage(Path::new("/srv/uploads"));
        assert!(storage.resolve("postMedia/images/a.png").is_ok());
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("postMedia/../../x").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
    }

    #[test]
    fn public_url_prefix() {
        assert_eq!(public_url("postMedia/images/a.png"), "/uploads/postMedia/images/a.png");
    }

    #[tokio::test]
    async fn init_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        storage.init().await.unwrap();
        storage.init().await.unwrap();

        assert!(dir.path().join("ProjectFiles").is_dir());
        assert!(dir.path().join("postMedia/images").is_dir());
        assert!(dir.path().join("postMedia/videos").is_dir());
    }

    #[tokio::test]
    async fn save_and_remove_post_media() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let stored = storage
            .save(UploadTarget::PostMedia(MediaKind::Image), "image/png", b"png-bytes")
            .await
            .unwrap();

        assert!(stored.relative_path.starts_with("postMedia/images/"));
        assert!(stored.relative_path.ends_with(".png"));
        assert_eq!(stored.size_bytes, 9);
        assert_eq!(stored.content_type, "image/png");

        let on_disk = dir.path().join(&stored.relative_path);
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"png-bytes");

        storage.remove(&stored.relative_path).await.unwrap();
        assert!(!on_disk.exists());

        // second removal is a no-op
        storage.remove(&stored.relative_path).await.unwrap();
    }

    #[tokio::test]
    async fn save_enforces_kind_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let err = storage
            .save(UploadTarget::PostMedia(MediaKind::Image), "video/mp4", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedType(_)));

        let err = storage
            .save(UploadTarget::PostMedia(MediaKind::Image), "image/png", &[0u8; 17])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { size: 17, limit: 16 }));

        let err = storage
            .save(UploadTarget::Project(Uuid::new_v4()), "application/pdf", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Empty));
    }

    #[tokio::test]
    async fn project_files_live_in_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let project_id = Uuid::new_v4();

        let stored = storage
            .save(UploadTarget::Project(project_id), "application/pdf", b"%PDF-1")
            .await
            .unwrap();
        assert!(stored
            .relative_path
            .starts_with(&format!("ProjectFiles/project-{}/", project_id)));
        assert!(storage.project_dir(project_id).is_dir());

        storage.discard(&[], &[project_id]).await;
        assert!(!storage.project_dir(project_id).exists());

        // removing a missing directory is fine
        storage.remove_project_dir(project_id).await.unwrap();
    }
}
