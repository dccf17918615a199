//! Session-level error type
//!
//! Wraps the component errors with the profile and step that failed,
//! so the CLI can print an actionable message without inspecting
//! internals.

use creds_file::StoreError;
use sso_auth::{AuthError, ExchangeError};

/// Errors from `ensure_credential`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("authentication failed for profile '{profile}'")]
    Auth {
        profile: String,
        #[source]
        source: AuthError,
    },

    #[error("credential exchange failed for profile '{profile}'")]
    Exchange {
        profile: String,
        #[source]
        source: ExchangeError,
    },

    #[error("credentials store failure for profile '{profile}'")]
    Store {
        profile: String,
        #[source]
        source: StoreError,
    },
}
