//! On-disk token cache
//!
//! Stores client registrations and SSO access tokens as JSON files in
//! a user-scoped directory, one record per file. Tokens are keyed by
//! the SHA-256 of their start URL, registrations by region. All writes
//! are atomic (temp file, fsync, rename) with 0600 permissions.
//!
//! Reads apply the safety margin: a token inside the margin of its
//! expiry is reported as a miss, identically to absence. Records that
//! cannot be read or parsed are also misses: everything here is
//! re-derivable by logging in again, so there is nothing to preserve.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use common::{ClientRegistration, DEFAULT_SAFETY_MARGIN, SsoAccessToken};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::CacheError;

/// Cache storage operations, as a seam so the device flow and the
/// orchestrator can run against an in-memory fake in tests.
#[allow(async_fn_in_trait)]
pub trait TokenStore {
    /// Valid token for `start_url`, or `None` on absence, expiry
    /// within the margin, or an unreadable record.
    async fn get_token(&self, start_url: &str) -> Option<SsoAccessToken>;

    /// Persist a freshly issued token. Fails with [`CacheError::Stale`]
    /// rather than writing a token already expired at write time.
    async fn put_token(&self, token: &SsoAccessToken) -> Result<(), CacheError>;

    /// Valid client registration for `region`, or `None`.
    async fn get_registration(&self, region: &str) -> Option<ClientRegistration>;

    async fn put_registration(
        &self,
        region: &str,
        registration: &ClientRegistration,
    ) -> Result<(), CacheError>;
}

/// File-backed token cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    dir: PathBuf,
    margin: Duration,
}

impl FileTokenCache {
    pub fn new(dir: PathBuf) -> Self {
        Self::with_margin(dir, DEFAULT_SAFETY_MARGIN)
    }

    pub fn with_margin(dir: PathBuf, margin: Duration) -> Self {
        Self { dir, margin }
    }

    fn token_path(&self, start_url: &str) -> PathBuf {
        let digest = Sha256::digest(start_url.as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }

    fn registration_path(&self, region: &str) -> PathBuf {
        self.dir.join(format!("register-{region}.json"))
    }

    async fn read_record<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache record, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache record, treating as miss");
                None
            }
        }
    }

    async fn write_record<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| CacheError::Serialize(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::Io(format!("creating cache directory: {e}")))?;
        write_atomic(path, &json).await
    }
}

impl TokenStore for FileTokenCache {
    async fn get_token(&self, start_url: &str) -> Option<SsoAccessToken> {
        let path = self.token_path(start_url);
        let token: SsoAccessToken = self.read_record(&path).await?;

        // Same-file collisions can't realistically happen, but a record
        // claiming a different start URL must never be handed out.
        if token.start_url != start_url {
            warn!(path = %path.display(), "cache record start URL mismatch, treating as miss");
            return None;
        }
        if !token.is_valid(Utc::now(), self.margin) {
            debug!(start_url, "cached token expired or inside safety margin");
            return None;
        }
        Some(token)
    }

    async fn put_token(&self, token: &SsoAccessToken) -> Result<(), CacheError> {
        if token.expires_at <= Utc::now() {
            return Err(CacheError::Stale);
        }
        self.write_record(&self.token_path(&token.start_url), token)
            .await?;
        debug!(start_url = %token.start_url, expires_at = %token.expires_at, "cached access token");
        Ok(())
    }

    async fn get_registration(&self, region: &str) -> Option<ClientRegistration> {
        let registration: ClientRegistration =
            self.read_record(&self.registration_path(region)).await?;
        if !registration.is_valid(Utc::now(), self.margin) {
            debug!(region, "cached client registration expired");
            return None;
        }
        Some(registration)
    }

    async fn put_registration(
        &self,
        region: &str,
        registration: &ClientRegistration,
    ) -> Result<(), CacheError> {
        self.write_record(&self.registration_path(region), registration)
            .await?;
        debug!(region, "cached client registration");
        Ok(())
    }
}

/// Atomic whole-record replace: write a pid-suffixed temp file in the
/// same directory, fsync, then rename over the target. A crash
/// mid-write leaves the old record intact, never a torn one.
async fn write_atomic(path: &Path, json: &str) -> Result<(), CacheError> {
    let dir = path
        .parent()
        .ok_or_else(|| CacheError::Io("cache path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CacheError::Io("cache path has no file name".into()))?;
    let tmp_path = dir.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| CacheError::Io(format!("creating temp cache file: {e}")))?;
    file.write_all(json.as_bytes())
        .await
        .map_err(|e| CacheError::Io(format!("writing temp cache file: {e}")))?;
    file.sync_all()
        .await
        .map_err(|e| CacheError::Io(format!("syncing temp cache file: {e}")))?;
    drop(file);

    // Tokens live in this file, owner-only access.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| CacheError::Io(format!("setting cache file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| CacheError::Io(format!("renaming temp cache file: {e}")))?;
    Ok(())
}
