//! Core data types shared across the workspace
//!
//! Secret-bearing types implement `Debug` by hand so tokens and keys
//! never leak into logs or error output.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expiry::is_valid;

/// OAuth client registration for one identity-provider endpoint.
///
/// Created on first use against a region's OIDC endpoint, cached on
/// disk, and reused until `expires_at`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    pub expires_at: DateTime<Utc>,
}

impl ClientRegistration {
    pub fn is_valid(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        is_valid(self.expires_at, now, margin)
    }
}

impl fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// SSO access token for one start URL, obtained via the device grant.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoAccessToken {
    pub start_url: String,
    pub region: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SsoAccessToken {
    pub fn is_valid(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        is_valid(self.expires_at, now, margin)
    }
}

impl fmt::Debug for SsoAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoAccessToken")
            .field("start_url", &self.start_url)
            .field("region", &self.region)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Temporary access/secret/session-token triple scoped to one account
/// and role. Immutable once issued: replaced wholesale, never patched.
#[derive(Clone)]
pub struct RoleCredential {
    pub account_id: String,
    pub role_name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl RoleCredential {
    pub fn is_valid(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        is_valid(self.expires_at, now, margin)
    }
}

impl fmt::Debug for RoleCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredential")
            .field("account_id", &self.account_id)
            .field("role_name", &self.role_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Static mapping from a profile name to the account/role/SSO instance
/// it resolves to. Read-only to the core; loaded by the CLI from the
/// AWS shared config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileBinding {
    pub account_id: String,
    pub role_name: String,
    pub start_url: String,
    /// Region of the SSO instance (OIDC and portal endpoints).
    pub sso_region: String,
    /// The profile's working region, if configured. Only used for
    /// shell-export output, never for the SSO endpoints.
    pub default_region: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn token_debug_redacts_secret() {
        let token = SsoAccessToken {
            start_url: "https://x.awsapps.com/start".into(),
            region: "us-east-1".into(),
            access_token: "tok-supersecret".into(),
            expires_at: t("2025-06-01T12:00:00Z"),
        };
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("tok-supersecret"));
        assert!(debug.contains("https://x.awsapps.com/start"));
    }

    #[test]
    fn credential_debug_redacts_secret_and_session_token() {
        let cred = RoleCredential {
            account_id: "111111111111".into(),
            role_name: "Admin".into(),
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "secret-key".into(),
            session_token: "session-tok".into(),
            expires_at: t("2025-06-01T12:00:00Z"),
        };
        let debug = format!("{cred:?}");
        assert!(!debug.contains("secret-key"));
        assert!(!debug.contains("session-tok"));
        // The key id is not a secret and stays visible for debugging.
        assert!(debug.contains("AKIAEXAMPLE"));
    }

    #[test]
    fn registration_debug_redacts_client_secret() {
        let reg = ClientRegistration {
            client_id: "client-abc".into(),
            client_secret: "shhh".into(),
            expires_at: t("2025-06-01T12:00:00Z"),
        };
        let debug = format!("{reg:?}");
        assert!(!debug.contains("shhh"));
        assert!(debug.contains("client-abc"));
    }

    #[test]
    fn cache_record_serializes_camel_case() {
        let token = SsoAccessToken {
            start_url: "https://x.awsapps.com/start".into(),
            region: "us-east-1".into(),
            access_token: "tok".into(),
            expires_at: t("2025-06-01T12:00:00Z"),
        };
        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains("\"startUrl\""));
        assert!(json.contains("\"accessToken\""));
        assert!(json.contains("\"expiresAt\""));
    }
}
