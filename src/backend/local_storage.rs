//! LocalObjectStorage: upload payloads on local disk beneath
//! `base_path/{owner_id}/{file}` plus HMAC-signed, time-limited read links
//! served by the `/files` route.

use super::{BackendError, BackendResult, ObjectStorage, StoredObject};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use md5::Context;
use sha2::Sha256;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use subtle::ConstantTimeEq;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_OBJECT_PATH_LEN: usize = 1024;

/// Object storage rooted at a directory on disk.
///
/// Paths are the opaque keys recorded on uploads. Objects are written once:
/// uploading onto an existing path fails with `ObjectExists`.
#[derive(Clone)]
pub struct LocalObjectStorage {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,

    /// Externally reachable base URL, used to build signed links.
    public_url: String,

    signing_key: Vec<u8>,
}

impl LocalObjectStorage {
    pub fn new(
        base_path: impl Into<PathBuf>,
        public_url: impl Into<String>,
        signing_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            signing_key: signing_key.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Basic path validation to avoid trivial traversal vectors.
    ///
    /// Rejects empty paths, paths that begin with `/`, contain `..`, a
    /// backslash or control bytes.
    fn ensure_path_safe(&self, path: &str) -> BackendResult<()> {
        let invalid = path.is_empty()
            || path.len() > MAX_OBJECT_PATH_LEN
            || path.starts_with('/')
            || path.contains("..")
            || path
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(BackendError::InvalidPath(path.to_string()));
        }
        Ok(())
    }

    fn object_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    fn sign(&self, path: &str, expires: i64) -> BackendResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|_| BackendError::InvalidSignature)?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Check a signed link's `expires` and `signature` query values for `path`.
    pub fn verify_signature(&self, path: &str, expires: i64, signature: &str) -> BackendResult<()> {
        self.ensure_path_safe(path)?;
        let expected = self.sign(path, expires)?;
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return Err(BackendError::InvalidSignature);
        }
        if expires <= Utc::now().timestamp() {
            return Err(BackendError::LinkExpired);
        }
        Ok(())
    }

    /// Open an object for streaming out, returning the handle and its length.
    pub async fn open(&self, path: &str) -> BackendResult<(File, u64)> {
        self.ensure_path_safe(path)?;
        let file = File::open(self.object_path(path)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BackendError::ObjectNotFound(path.to_string())
            } else {
                BackendError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Remove empty directories from `start` up to, not including, `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    /// Write to a temporary sibling, fsync, then rename into place. The temp
    /// file is removed on any failure.
    async fn upload(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> BackendResult<StoredObject> {
        self.ensure_path_safe(path)?;

        let file_path = self.object_path(path);
        if fs::try_exists(&file_path).await? {
            return Err(BackendError::ObjectExists(path.to_string()));
        }

        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BackendError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let mut digest = Context::new();
        digest.consume(&data);
        let etag = format!("{:x}", digest.compute());

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await
        }
        .await;

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BackendError::Io(err));
        }

        info!(
            path = %path,
            content_type = %content_type,
            size_bytes = data.len(),
            etag = %etag,
            "stored object"
        );

        Ok(StoredObject {
            path: path.to_string(),
            size_bytes: data.len() as u64,
            etag,
        })
    }

    async fn remove(&self, path: &str) -> BackendResult<()> {
        self.ensure_path_safe(path)?;
        let file_path = self.object_path(path);

        match fs::remove_file(&file_path).await {
            Ok(_) => info!(path = %path, "removed object"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("object {} already missing", file_path.display());
            }
            Err(err) => return Err(BackendError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> BackendResult<String> {
        self.ensure_path_safe(path)?;
        if !fs::try_exists(self.object_path(path)).await? {
            return Err(BackendError::ObjectNotFound(path.to_string()));
        }

        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.sign(path, expires)?;
        Ok(format!(
            "{}/files/{}?expires={}&signature={}",
            self.public_url, path, expires, signature
        ))
    }
}
