//! Local-disk storage for uploaded resource files.
//!
//! Files live flat in one directory and are referenced from resource rows
//! by a relative URL under `/uploads/`. A freshly written file is held by a
//! [`PendingFile`] until the row that references it is committed; dropping
//! an uncommitted guard removes the file again.

use bytes::Bytes;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::services::listing::extension_of;

pub const UPLOAD_URL_PREFIX: &str = "/uploads/";

pub const ALLOWED_MIME_TYPES: [&str; 20] = [
    "application/pdf",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "text/markdown",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/zip",
    "application/x-zip-compressed",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "video/mp4",
    "video/mpeg",
    "video/quicktime",
    "video/x-msvideo",
];

/// A file received in a multipart request, not yet on disk.
#[derive(Clone, Debug)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

pub struct FileStorage {
    root: PathBuf,
    max_size: usize,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create upload dir {:?}: {}", self.root, e))
    }

    /// Rejects disallowed MIME types and oversized files before anything
    /// touches the disk.
    pub fn check(&self, file: &IncomingFile) -> AppResult<()> {
        let mime = file.content_type.to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(AppError::bad_request(
                "Invalid file type. Allowed types: PDF, Images, Documents, Presentations, Code archives, Videos",
            ));
        }

        if file.bytes.is_empty() {
            return Err(AppError::bad_request("Uploaded file is empty"));
        }

        if file.bytes.len() > self.max_size {
            return Err(AppError::bad_request(format!(
                "File too large. Maximum size is {}MB",
                self.max_size / (1024 * 1024)
            )));
        }

        Ok(())
    }

    pub async fn save(&self, file: &IncomingFile) -> AppResult<PendingFile> {
        self.check(file)?;

        let stored = stored_name(&file.original_name);
        let pending = PendingFile {
            path: self.root.join(&stored),
            file_url: format!("{}{}", UPLOAD_URL_PREFIX, stored),
            file_name: display_name(&file.original_name),
            committed: false,
        };

        tokio::fs::write(&pending.path, &file.bytes)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write upload {:?}: {}", pending.path, e))?;

        tracing::debug!(path = ?pending.path, size = file.bytes.len(), "Stored upload");
        Ok(pending)
    }

    /// Deletes the file behind a stored URL. Failures are logged only.
    pub async fn remove_best_effort(&self, file_url: &str) {
        let Some(name) = stored_name_from_url(file_url) else {
            tracing::warn!(file_url, "Skipping removal of file outside the upload dir");
            return;
        };

        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => tracing::debug!(file_url, "Removed stored file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(file_url, error = %e, "Failed to remove stored file"),
        }
    }

    pub async fn remove_all_best_effort(&self, file_urls: &[String]) {
        for url in file_urls {
            self.remove_best_effort(url).await;
        }
    }

    /// Maps a client-supplied file name onto a path inside the upload dir.
    pub async fn resolve(&self, filename: &str) -> AppResult<PathBuf> {
        if !is_plain_file_name(filename) {
            return Err(AppError::bad_request("Invalid file path"));
        }

        let candidate = self.root.join(filename);
        let canonical = match tokio::fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::not_found("File not found"))
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to resolve {:?}: {}", candidate, e).into()),
        };

        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| anyhow::anyhow!("Upload dir unavailable: {}", e))?;

        if !canonical.starts_with(&root) {
            return Err(AppError::bad_request("Invalid file path"));
        }

        if !tokio::fs::metadata(&canonical)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Err(AppError::not_found("File not found"));
        }

        Ok(canonical)
    }
}

/// Guard over a written upload. Removes the file on drop unless
/// [`PendingFile::commit`] was called.
#[derive(Debug)]
pub struct PendingFile {
    path: PathBuf,
    file_url: String,
    file_name: String,
    committed: bool,
}

impl PendingFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_url(&self) -> &str {
        &self.file_url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = ?self.path, "Discarded uncommitted upload"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = ?self.path, error = %e, "Failed to discard upload"),
        }
    }
}

/// `<sanitized-stem>-<millis>-<random u64><.ext>`
pub fn stored_name(original: &str) -> String {
    let base = display_name(original);
    let path = Path::new(&base);

    let stem: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "file".to_string() } else { stem };

    let ext: String = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    let millis = Utc::now().timestamp_millis();
    let suffix: u64 = rand::random();

    if ext.is_empty() {
        format!("{}-{}-{}", stem, millis, suffix)
    } else {
        format!("{}-{}-{}.{}", stem, millis, suffix, ext)
    }
}

/// Content type for the inline preview endpoint.
pub fn preview_content_type(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Last path segment of a client-supplied name.
fn display_name(original: &str) -> String {
    original
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("file")
        .to_string()
}

fn stored_name_from_url(file_url: &str) -> Option<&str> {
    let name = file_url.strip_prefix(UPLOAD_URL_PREFIX)?;
    is_plain_file_name(name).then_some(name)
}

fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> IncomingFile {
        IncomingFile {
            original_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4 test"),
        }
    }

    #[test]
    fn test_stored_name_sanitizes_and_keeps_extension() {
        let name = stored_name("Lecture notes (week 1).pdf");
        assert!(name.starts_with("Lecture_notes__week_1_-"), "got {}", name);
        assert!(name.ends_with(".pdf"));
        assert_eq!(name.matches('-').count(), 2);
    }

    #[test]
    fn test_stored_name_drops_client_directories() {
        let name = stored_name("../../etc/passwd");
        assert!(name.starts_with("passwd-"));
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_stored_names_are_unique() {
        let a = stored_name("a.png");
        let b = stored_name("a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_plain_file_name_guard() {
        assert!(is_plain_file_name("notes-1-2.pdf"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../secret"));
        assert!(!is_plain_file_name("a/b.pdf"));
        assert!(!is_plain_file_name("a\\b.pdf"));
        assert!(!is_plain_file_name(""));
    }

    #[test]
    fn test_check_rejects_disallowed_mime_and_size() {
        let storage = FileStorage::new("/tmp", 8);
        let mut exe = pdf("x.exe");
        exe.content_type = "application/x-msdownload".into();
        assert!(storage.check(&exe).is_err());

        let big = pdf("big.pdf");
        assert!(storage.check(&big).is_err(), "13 bytes exceeds limit of 8");
    }

    #[tokio::test]
    async fn test_uncommitted_upload_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), 1024);

        let pending = storage.save(&pdf("notes.pdf")).await.unwrap();
        let path = pending.path().to_path_buf();
        assert!(path.exists());
        drop(pending);
        assert!(!path.exists());

        let pending = storage.save(&pdf("notes.pdf")).await.unwrap();
        let path = pending.path().to_path_buf();
        pending.commit();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), 1024);

        assert!(matches!(
            storage.resolve("../etc/passwd").await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            storage.resolve("missing.pdf").await,
            Err(AppError::NotFound(_))
        ));

        let pending = storage.save(&pdf("ok.pdf")).await.unwrap();
        let name = pending.file_url().trim_start_matches(UPLOAD_URL_PREFIX).to_string();
        pending.commit();
        assert!(storage.resolve(&name).await.is_ok());
    }

    #[test]
    fn test_preview_content_types() {
        assert_eq!(preview_content_type("a.PDF"), "application/pdf");
        assert_eq!(preview_content_type("a.jpeg"), "image/jpeg");
        assert_eq!(preview_content_type("a.zip"), "application/octet-stream");
    }
}
