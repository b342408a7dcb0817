//! Turning attachment references into local files.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::attachment::AttachmentReference;
use crate::{MailError, Result};

/// A materialized attachment on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentHandle {
    path: PathBuf,
}

impl AttachmentHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Produces local handles for attachment references.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Fetch or decode `reference` into a local file.
    async fn resolve(&self, reference: &str) -> Result<AttachmentHandle>;

    /// Delete the file behind `handle`. Releasing twice is a no-op.
    fn release(&self, handle: &AttachmentHandle);
}

/// Configuration for [`FileContentResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Directory the files are written to.
    pub directory: PathBuf,
    /// Whole-request timeout for remote fetches.
    pub timeout: Duration,
    /// Redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir(),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

impl ResolverConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }
}

/// Resolves references to files in a local directory.
///
/// Remote files are named after the SHA-256 of their URL, so the same URL
/// always lands on the same path. Inline payloads get a fresh unique name.
/// TLS certificates of remote hosts are not verified; attachment URLs are
/// expected to point at trusted internal hosts.
pub struct FileContentResolver {
    client: reqwest::Client,
    config: ResolverConfig,
}

impl FileContentResolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| MailError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    async fn fetch(&self, url: Url) -> Result<AttachmentHandle> {
        let name = remote_file_name(&url);

        debug!(url = %url, "Fetching remote attachment");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        self.write(&name, &bytes).await
    }

    async fn write(&self, name: &str, contents: &[u8]) -> Result<AttachmentHandle> {
        tokio::fs::create_dir_all(&self.config.directory).await?;
        let path = self.config.directory.join(name);
        tokio::fs::write(&path, contents).await?;
        Ok(AttachmentHandle::new(path))
    }
}

fn remote_file_name(url: &Url) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    match AttachmentReference::remote_extension(url) {
        Some(ext) => format!("{}.{}", digest, ext),
        None => digest,
    }
}

fn inline_file_name(extension: &str) -> String {
    format!("file_{}.{}", uuid::Uuid::new_v4().simple(), extension)
}

#[async_trait]
impl ContentResolver for FileContentResolver {
    async fn resolve(&self, reference: &str) -> Result<AttachmentHandle> {
        match AttachmentReference::parse(reference)? {
            AttachmentReference::Remote(url) => self.fetch(url).await,
            AttachmentReference::Inline {
                extension, data, ..
            } => self.write(&inline_file_name(extension), &data).await,
        }
    }

    fn release(&self, handle: &AttachmentHandle) {
        match std::fs::remove_file(handle.path()) {
            Ok(()) => debug!(path = %handle.path().display(), "Released attachment"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %handle.path().display(), error = %e, "Failed to release attachment"),
        }
    }
}
