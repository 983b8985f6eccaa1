//! Image uploads to the media host over SFTP.
//!
//! ARCHITECTURE
//! ============
//! Avatars and dog photos live in two directories on the same SSH host and
//! are served from two public base URLs. Each directory is one [`SftpStore`]
//! behind the [`ImageStore`] trait so routes never see SSH types and tests
//! can swap in an in-memory store.
//!
//! `ssh2` is blocking; every transfer runs on Tokio's blocking pool with a
//! fresh session.

use std::io::Write;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::config::{BucketSettings, SftpSettings};

/// Largest accepted image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no file received")]
    Empty,
    #[error("file is too large, maximum is 5 MB")]
    TooLarge,
    #[error("unable to determine the file type")]
    UnknownType,
    #[error("only JPG, PNG and WEBP images are supported")]
    UnsupportedType,
    #[error("remote upload directory is not configured")]
    NoRemoteDir,
    #[error("sftp transfer failed: {0}")]
    Ssh(#[from] ssh2::Error),
    #[error("sftp transfer failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload worker failed: {0}")]
    Worker(String),
}

impl StorageError {
    /// Errors caused by the uploaded file rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Empty | Self::UnknownType | Self::UnsupportedType)
    }
}

/// An uploaded image as received from a multipart field.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the image for `owner_id`, returning its public URL.
    async fn upload(&self, owner_id: i64, image: ImageUpload) -> Result<String, StorageError>;

    /// Remove an image previously uploaded for `owner_id`. URLs outside the
    /// store or naming another owner's file are ignored. Failures are logged,
    /// not returned.
    async fn delete_by_url(&self, owner_id: i64, url: &str);
}

// =============================================================================
// PURE HELPERS
// =============================================================================

/// Pick the stored extension from the content type, falling back to the
/// original file name.
///
/// # Errors
///
/// Returns [`StorageError::UnknownType`] when neither source names a type and
/// [`StorageError::UnsupportedType`] for non-image extensions.
pub fn resolve_extension(content_type: Option<&str>, file_name: Option<&str>) -> Result<&'static str, StorageError> {
    if let Some(content_type) = content_type {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => return Ok(".jpg"),
            "image/png" => return Ok(".png"),
            "image/webp" => return Ok(".webp"),
            _ => {}
        }
    }

    let extension = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .ok_or(StorageError::UnknownType)?;

    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Ok(".jpg"),
        "png" => Ok(".png"),
        "webp" => Ok(".webp"),
        _ => Err(StorageError::UnsupportedType),
    }
}

/// Size and type checks for an upload, returning the extension to use.
///
/// # Errors
///
/// Returns [`StorageError::Empty`], [`StorageError::TooLarge`] or a type error.
pub fn validate_upload(image: &ImageUpload) -> Result<&'static str, StorageError> {
    if image.bytes.is_empty() {
        return Err(StorageError::Empty);
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(StorageError::TooLarge);
    }
    resolve_extension(image.content_type.as_deref(), image.file_name.as_deref())
}

/// `<prefix>-<owner>-<unix millis><ext>`
#[must_use]
pub fn object_name(prefix: &str, owner_id: i64, at: OffsetDateTime, extension: &str) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("{prefix}-{owner_id}-{millis}{extension}")
}

/// Use `/` separators and end with exactly one trailing slash.
///
/// # Errors
///
/// Returns [`StorageError::NoRemoteDir`] for a blank directory.
pub fn normalize_remote_dir(dir: &str) -> Result<String, StorageError> {
    let dir = dir.trim();
    if dir.is_empty() {
        return Err(StorageError::NoRemoteDir);
    }
    let mut normalized = dir.replace('\\', "/");
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

/// Every directory from the root down to `dir`, for creating missing levels.
#[must_use]
pub fn dir_prefixes(dir: &str) -> Vec<String> {
    let absolute = dir.starts_with('/');
    let mut current = String::new();
    let mut prefixes = Vec::new();
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        if !current.is_empty() || absolute {
            current.push('/');
        }
        current.push_str(part);
        prefixes.push(current.clone());
    }
    prefixes
}

/// File name of `url` when it sits directly under `base_url`.
#[must_use]
pub fn file_name_from_url(base_url: &str, url: &str) -> Option<String> {
    let url = url.trim();
    if base_url.is_empty() || url.len() < base_url.len() {
        return None;
    }
    let (head, tail) = url.split_at_checked(base_url.len())?;
    if !head.eq_ignore_ascii_case(base_url) || !tail.starts_with('/') {
        return None;
    }
    let relative = tail.trim_start_matches('/');
    if relative.is_empty() || relative.contains('/') || relative.contains('\\') || relative == ".." {
        return None;
    }
    Some(relative.to_owned())
}

/// Like [`file_name_from_url`], but only for files named by [`object_name`]
/// for `prefix` and `owner_id`. Stored image URLs are member-editable, so
/// deletes go through this check.
#[must_use]
pub fn owned_file_name(base_url: &str, prefix: &str, owner_id: i64, url: &str) -> Option<String> {
    let name = file_name_from_url(base_url, url)?;
    name.starts_with(&format!("{prefix}-{owner_id}-")).then_some(name)
}

// =============================================================================
// SFTP STORE
// =============================================================================

#[derive(Debug, Clone)]
struct SshTarget {
    host: String,
    port: u16,
    user: String,
    password: String,
}

impl SshTarget {
    fn open(&self) -> Result<ssh2::Sftp, StorageError> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))?;
        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_password(&self.user, &self.password)?;
        Ok(session.sftp()?)
    }
}

/// One remote directory published under one public base URL.
#[derive(Debug, Clone)]
pub struct SftpStore {
    target: Arc<SshTarget>,
    remote_dir: String,
    public_base_url: String,
    prefix: &'static str,
}

impl SftpStore {
    /// # Errors
    ///
    /// Returns [`StorageError::NoRemoteDir`] when the bucket has no directory.
    pub fn new(sftp: &SftpSettings, bucket: &BucketSettings, prefix: &'static str) -> Result<Self, StorageError> {
        Ok(Self {
            target: Arc::new(SshTarget {
                host: sftp.host.clone(),
                port: sftp.port,
                user: sftp.user.clone(),
                password: sftp.password.clone(),
            }),
            remote_dir: normalize_remote_dir(&bucket.remote_dir)?,
            public_base_url: bucket.public_base_url.trim_end_matches('/').to_owned(),
            prefix,
        })
    }

    /// Store for member avatars (`member-...` files).
    ///
    /// # Errors
    ///
    /// See [`SftpStore::new`].
    pub fn avatars(sftp: &SftpSettings) -> Result<Self, StorageError> {
        Self::new(sftp, &sftp.avatars, "member")
    }

    /// Store for dog photos (`dog-...` files).
    ///
    /// # Errors
    ///
    /// See [`SftpStore::new`].
    pub fn dog_photos(sftp: &SftpSettings) -> Result<Self, StorageError> {
        Self::new(sftp, &sftp.dog_photos, "dog")
    }
}

fn ensure_remote_dir(sftp: &ssh2::Sftp, dir: &str) -> Result<(), StorageError> {
    if sftp.stat(Path::new(dir)).is_ok() {
        return Ok(());
    }
    for prefix in dir_prefixes(dir) {
        let path = Path::new(&prefix);
        if sftp.stat(path).is_err() {
            sftp.mkdir(path, 0o755)?;
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl ImageStore for SftpStore {
    async fn upload(&self, owner_id: i64, image: ImageUpload) -> Result<String, StorageError> {
        let extension = validate_upload(&image)?;
        let name = object_name(self.prefix, owner_id, OffsetDateTime::now_utc(), extension);
        let remote_path = format!("{}{name}", self.remote_dir);

        let target = Arc::clone(&self.target);
        let remote_dir = self.remote_dir.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let sftp = target.open()?;
            ensure_remote_dir(&sftp, &remote_dir)?;
            let mut file = sftp.create(Path::new(&remote_path))?;
            file.write_all(&image.bytes)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Worker(e.to_string()))??;

        tracing::info!(owner_id, file = %name, "image uploaded");
        Ok(format!("{}/{name}", self.public_base_url))
    }

    async fn delete_by_url(&self, owner_id: i64, url: &str) {
        let Some(name) = owned_file_name(&self.public_base_url, self.prefix, owner_id, url) else {
            tracing::debug!(owner_id, url, "not deleting image outside the owner's files");
            return;
        };
        let remote_path = format!("{}{name}", self.remote_dir);
        let target = Arc::clone(&self.target);

        let outcome = tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let sftp = target.open()?;
            let path = Path::new(&remote_path);
            if sftp.stat(path).is_ok() {
                sftp.unlink(path)?;
            }
            Ok(())
        })
        .await;

        match outcome {
            Ok(Ok(())) => tracing::info!(file = %name, "old image deleted"),
            Ok(Err(e)) => tracing::warn!(error = %e, file = %name, "failed to delete old image"),
            Err(e) => tracing::warn!(error = %e, file = %name, "image delete worker failed"),
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
