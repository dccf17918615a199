//! Error taxonomy for provider and cache operations
//!
//! Closed enums: every provider failure is mapped onto one of these
//! variants, and unknown provider error codes land in `Transport`
//! rather than growing the taxonomy.

/// Errors from the device-authorization flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("client registration failed: {0}")]
    Registration(String),

    #[error("device authorization expired before the request was approved")]
    Expired,

    #[error("authorization was denied")]
    Denied,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from exchanging an access token for role credentials.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The access token was rejected. The caller should re-authenticate
    /// once, not retry the exchange blindly.
    #[error("access token rejected by the provider: {0}")]
    Unauthorized(String),

    #[error("account/role not granted to this user: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from the private on-disk token cache.
///
/// Read paths never surface these: a record that cannot be read or
/// parsed is treated as a cache miss because everything in the cache
/// is re-derivable. Writes do surface them.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("cache record serialization failed: {0}")]
    Serialize(String),

    #[error("refusing to cache an already-expired token")]
    Stale,
}
