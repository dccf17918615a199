//! Shared credentials file store
//!
//! Reads and writes the profile-keyed INI credentials file that other
//! tools consume (`aws_access_key_id` / `aws_secret_access_key` /
//! `aws_session_token` sections). The file is a shared resource:
//! other invocations of this tool and unrelated processes may touch
//! it concurrently, so every write is a read-modify-write cycle under
//! an exclusive advisory lock, and the replace itself is atomic
//! (temp file, fsync, rename).
//!
//! The file format is a compatibility contract. This crate only ever
//! merges in the one section it was asked to update; all other
//! sections pass through byte-for-byte as parsed. An unparseable file
//! is an error, never a best-effort partial parse that could silently
//! drop someone else's profile.

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{CredentialsFile, DEFAULT_LOCK_WAIT, StoredCredential};
