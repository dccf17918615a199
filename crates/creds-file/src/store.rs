//! Locked read-modify-write access to the credentials file
//!
//! The advisory lock lives on a sibling `<name>.lock` file, not on the
//! credentials file itself: the atomic rename replaces the target
//! inode, which would silently drop a lock held on it. The lock is
//! held only for the duration of one read-modify-write cycle, never
//! across a network call, and is released on every exit path by the
//! guard's `Drop`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use common::RoleCredential;
use fs4::fs_std::FileExt;
use ini::Ini;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Default total time to wait for the file lock.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Cadence of lock acquisition attempts within the wait window.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// One profile's entry as stored on disk.
///
/// `expires_at` is optional because entries written by other tools may
/// omit it; such entries are treated as expired (there is no way to
/// know they are still good), never as corrupt.
#[derive(Clone)]
pub struct StoredCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    /// Whether the entry is still usable at `now` given the margin.
    pub fn is_valid(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at
            .map(|expires_at| common::is_valid(expires_at, now, margin))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Handle to the shared credentials file.
#[derive(Debug, Clone)]
pub struct CredentialsFile {
    path: PathBuf,
    lock_wait: Duration,
}

impl CredentialsFile {
    pub fn new(path: PathBuf) -> Self {
        Self::with_lock_wait(path, DEFAULT_LOCK_WAIT)
    }

    pub fn with_lock_wait(path: PathBuf, lock_wait: Duration) -> Self {
        Self { path, lock_wait }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Merge `credential` into the section for `profile`, leaving every
    /// other section untouched.
    ///
    /// The on-disk content is re-read under the lock (another process
    /// may have written since any earlier read), merged, and replaced
    /// atomically.
    pub async fn upsert(&self, profile: &str, credential: &RoleCredential) -> Result<()> {
        let _lock = FileLock::acquire(&self.lock_path(), self.lock_wait).await?;

        let mut file = self.load()?;
        file.with_section(Some(profile))
            .set("aws_access_key_id", &credential.access_key_id)
            .set("aws_secret_access_key", &credential.secret_access_key)
            .set("aws_session_token", &credential.session_token)
            // Legacy duplicate some SDKs still read.
            .set("aws_security_token", &credential.session_token)
            .set(
                "aws_session_expiration",
                credential
                    .expires_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        self.replace(&file)?;

        info!(profile, path = %self.path.display(), "wrote credentials");
        Ok(())
    }

    /// Read the entry for `profile`, if any, under the same lock.
    ///
    /// A section without the credential keys belongs to some other
    /// tool's configuration (e.g. a static-key profile) and is
    /// reported as absent, not as an error.
    pub async fn read(&self, profile: &str) -> Result<Option<StoredCredential>> {
        let _lock = FileLock::acquire(&self.lock_path(), self.lock_wait).await?;

        let file = self.load()?;
        let Some(section) = file.section(Some(profile)) else {
            return Ok(None);
        };
        let (Some(access_key_id), Some(secret_access_key), Some(session_token)) = (
            section.get("aws_access_key_id"),
            section.get("aws_secret_access_key"),
            section.get("aws_session_token"),
        ) else {
            debug!(profile, "section exists but holds no session credentials");
            return Ok(None);
        };

        let expires_at = section
            .get("aws_session_expiration")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(Some(StoredCredential {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: session_token.to_string(),
            expires_at,
        }))
    }

    /// Parse the current on-disk content. A missing file is an empty
    /// store; an unparseable one is `Corrupt`, because partial parses could
    /// silently drop other profiles' entries on the next write.
    fn load(&self) -> Result<Ini> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Ini::new()),
            Err(e) => return Err(StoreError::Io(format!("reading credentials file: {e}"))),
        };
        Ini::load_from_str(&contents).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Atomic whole-file replace with owner-only permissions.
    fn replace(&self, file: &Ini) -> Result<()> {
        let mut contents = Vec::new();
        file.write_to(&mut contents)
            .map_err(|e| StoreError::Io(format!("serializing credentials file: {e}")))?;

        let dir = self
            .path
            .parent()
            .ok_or_else(|| StoreError::Io("credentials path has no parent directory".into()))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| StoreError::Io(format!("creating credentials directory: {e}")))?;

        let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));
        let mut tmp = std::fs::File::create(&tmp_path)
            .map_err(|e| StoreError::Io(format!("creating temp credentials file: {e}")))?;
        tmp.write_all(&contents)
            .map_err(|e| StoreError::Io(format!("writing temp credentials file: {e}")))?;
        tmp.sync_all()
            .map_err(|e| StoreError::Io(format!("syncing temp credentials file: {e}")))?;
        drop(tmp);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| StoreError::Io(format!("setting credentials permissions: {e}")))?;
        }

        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| StoreError::Io(format!("renaming temp credentials file: {e}")))?;
        Ok(())
    }
}

/// Scoped exclusive advisory lock. Released on drop, on every exit
/// path including errors.
struct FileLock {
    file: std::fs::File,
}

impl FileLock {
    async fn acquire(path: &Path, wait: Duration) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Io(format!("creating lock directory: {e}")))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| StoreError::Io(format!("opening lock file: {e}")))?;

        let deadline = Instant::now() + wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(true) => return Ok(Self { file }),
                Ok(false) => {}
                Err(e) => return Err(StoreError::Io(format!("acquiring file lock: {e}"))),
            }
            if Instant::now() >= deadline {
                return Err(StoreError::LockTimeout);
            }
            tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::sync::Arc;

    fn credential(suffix: &str) -> RoleCredential {
        RoleCredential {
            account_id: "111111111111".into(),
            role_name: "Admin".into(),
            access_key_id: format!("ASIA{suffix}"),
            secret_access_key: format!("secret-{suffix}"),
            session_token: format!("token-{suffix}"),
            expires_at: Utc::now() + TimeDelta::hours(1),
        }
    }

    fn store(dir: &tempfile::TempDir) -> CredentialsFile {
        CredentialsFile::new(dir.path().join("credentials"))
    }

    #[tokio::test]
    async fn upsert_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let creds = store(&dir);

        creds.upsert("dev", &credential("1")).await.unwrap();
        let entry = creds.read("dev").await.unwrap().unwrap();
        assert_eq!(entry.access_key_id, "ASIA1");
        assert_eq!(entry.secret_access_key, "secret-1");
        assert_eq!(entry.session_token, "token-1");
        assert!(entry.expires_at.is_some());
    }

    #[tokio::test]
    async fn missing_profile_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let creds = store(&dir);
        creds.upsert("dev", &credential("1")).await.unwrap();
        assert!(creds.read("prod").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_preserves_other_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(
            &path,
            "[static-profile]\naws_access_key_id=AKIASTATIC\naws_secret_access_key=longterm\n",
        )
        .unwrap();

        let creds = CredentialsFile::new(path.clone());
        creds.upsert("dev", &credential("1")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[static-profile]"));
        assert!(contents.contains("AKIASTATIC"));
        assert!(contents.contains("[dev]"));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_entry_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let creds = store(&dir);

        creds.upsert("dev", &credential("old")).await.unwrap();
        creds.upsert("dev", &credential("new")).await.unwrap();

        let entry = creds.read("dev").await.unwrap().unwrap();
        assert_eq!(entry.access_key_id, "ASIAnew");
        let contents = std::fs::read_to_string(creds.path()).unwrap();
        assert!(!contents.contains("token-old"));
    }

    #[tokio::test]
    async fn section_without_session_keys_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(&path, "[dev]\nregion=us-east-1\n").unwrap();

        let creds = CredentialsFile::new(path);
        assert!(creds.read("dev").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_fails_loudly_on_read_and_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        let garbage = "[dev\naws_access_key_id"; // unterminated section header
        std::fs::write(&path, garbage).unwrap();

        let creds = CredentialsFile::new(path.clone());
        assert!(matches!(
            creds.read("dev").await,
            Err(StoreError::Corrupt(_))
        ));
        assert!(matches!(
            creds.upsert("dev", &credential("1")).await,
            Err(StoreError::Corrupt(_))
        ));
        // The failed upsert must not have touched the file.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), garbage);
    }

    #[tokio::test]
    async fn concurrent_upserts_for_distinct_profiles_lose_nothing() {
        let dir = Arc::new(tempfile::tempdir().unwrap());
        let path = dir.path().join("credentials");

        // Separate handles, as independent invocations would have.
        let mut handles = Vec::new();
        for i in 0..10 {
            let creds = CredentialsFile::new(path.clone());
            handles.push(tokio::spawn(async move {
                creds
                    .upsert(&format!("profile-{i}"), &credential(&i.to_string()))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let creds = CredentialsFile::new(path);
        for i in 0..10 {
            let entry = creds
                .read(&format!("profile-{i}"))
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("profile-{i} lost"));
            assert_eq!(entry.access_key_id, format!("ASIA{i}"));
        }
    }

    #[tokio::test]
    async fn contended_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let creds =
            CredentialsFile::with_lock_wait(dir.path().join("credentials"), Duration::from_millis(200));

        let _held = FileLock::acquire(&creds.lock_path(), Duration::from_secs(1))
            .await
            .unwrap();

        let result = creds.read("dev").await;
        assert!(matches!(result, Err(StoreError::LockTimeout)));
    }

    #[tokio::test]
    async fn lock_is_released_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(&path, "[broken").unwrap();

        let creds = CredentialsFile::new(path.clone());
        assert!(creds.read("dev").await.is_err());

        // The corrupt-parse error path must still have dropped the lock.
        std::fs::write(&path, "").unwrap();
        assert!(creds.read("dev").await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn credentials_file_is_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let creds = store(&dir);
        creds.upsert("dev", &credential("1")).await.unwrap();

        let mode = std::fs::metadata(creds.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credentials file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn entry_without_expiration_is_never_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(
            &path,
            "[dev]\naws_access_key_id=A\naws_secret_access_key=B\naws_session_token=C\n",
        )
        .unwrap();

        let creds = CredentialsFile::new(path);
        let entry = creds.read("dev").await.unwrap().unwrap();
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_valid(Utc::now(), Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn stored_validity_honors_the_margin() {
        let entry = StoredCredential {
            access_key_id: "A".into(),
            secret_access_key: "B".into(),
            session_token: "C".into(),
            expires_at: Some(Utc::now() + TimeDelta::minutes(10)),
        };
        assert!(entry.is_valid(Utc::now(), Duration::from_secs(60)));
        assert!(!entry.is_valid(Utc::now(), Duration::from_secs(3600)));
    }
}
