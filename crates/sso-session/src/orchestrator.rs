//! The session orchestrator
//!
//! Implements the cache-first decision chain and the single bounded
//! re-authentication on a rejected token. All network work happens
//! before the credentials-store lock is ever taken; the store only
//! sees a finished credential.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use common::{DEFAULT_SAFETY_MARGIN, ProfileBinding, RoleCredential};
use sso_auth::{ExchangeError, TokenStore};
use tracing::{debug, info};

use crate::error::SessionError;
use crate::traits::{Authenticator, CredentialStore, Exchanger};

/// Top-level state machine for resolving one profile to a usable
/// credential.
pub struct SessionOrchestrator<A, X, T, S> {
    bindings: HashMap<String, ProfileBinding>,
    authenticator: A,
    exchanger: X,
    tokens: T,
    credentials: S,
    margin: Duration,
}

impl<A, X, T, S> SessionOrchestrator<A, X, T, S>
where
    A: Authenticator,
    X: Exchanger,
    T: TokenStore,
    S: CredentialStore,
{
    pub fn new(
        bindings: HashMap<String, ProfileBinding>,
        authenticator: A,
        exchanger: X,
        tokens: T,
        credentials: S,
    ) -> Self {
        Self {
            bindings,
            authenticator,
            exchanger,
            tokens,
            credentials,
            margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Binding for `profile`, if configured.
    pub fn binding(&self, profile: &str) -> Option<&ProfileBinding> {
        self.bindings.get(profile)
    }

    /// Return a credential for `profile` that is valid right now.
    ///
    /// Serves from the credentials store when possible, then from a
    /// cached SSO token plus one exchange, and only as a last resort
    /// runs the device-authorization flow. Two immediate calls perform
    /// at most one set of network round-trips: the second is answered
    /// entirely from the store.
    pub async fn ensure_credential(&self, profile: &str) -> Result<RoleCredential, SessionError> {
        let binding = self
            .bindings
            .get(profile)
            .ok_or_else(|| SessionError::UnknownProfile(profile.to_string()))?;

        // Still-valid stored credential: return it unchanged, no network.
        let stored = self
            .credentials
            .read(profile)
            .await
            .map_err(|source| SessionError::Store {
                profile: profile.to_string(),
                source,
            })?;
        if let Some(entry) = stored {
            if let Some(expires_at) = entry.expires_at.filter(|_| entry.is_valid(Utc::now(), self.margin)) {
                debug!(profile, %expires_at, "serving credential from the credentials store");
                return Ok(RoleCredential {
                    account_id: binding.account_id.clone(),
                    role_name: binding.role_name.clone(),
                    access_key_id: entry.access_key_id,
                    secret_access_key: entry.secret_access_key,
                    session_token: entry.session_token,
                    expires_at,
                });
            }
            debug!(profile, "stored credential expired or inside safety margin");
        }

        // Still-valid SSO token skips the device flow entirely.
        let (token, token_was_cached) = match self.tokens.get_token(&binding.start_url).await {
            Some(token) => {
                debug!(start_url = %binding.start_url, "reusing cached SSO token");
                (token, true)
            }
            None => {
                info!(start_url = %binding.start_url, "no valid SSO token, starting device authorization");
                let token = self
                    .authenticator
                    .authenticate(binding)
                    .await
                    .map_err(|source| SessionError::Auth {
                        profile: profile.to_string(),
                        source,
                    })?;
                (token, false)
            }
        };

        let credential = match self.exchanger.exchange(&token, binding).await {
            Ok(credential) => credential,
            // A rejected token means our cache was stale. One forced
            // re-authentication, never a loop.
            Err(ExchangeError::Unauthorized(reason)) if token_was_cached => {
                info!(profile, reason, "cached token rejected, re-authenticating once");
                let fresh = self
                    .authenticator
                    .authenticate(binding)
                    .await
                    .map_err(|source| SessionError::Auth {
                        profile: profile.to_string(),
                        source,
                    })?;
                self.exchanger
                    .exchange(&fresh, binding)
                    .await
                    .map_err(|source| SessionError::Exchange {
                        profile: profile.to_string(),
                        source,
                    })?
            }
            Err(source) => {
                return Err(SessionError::Exchange {
                    profile: profile.to_string(),
                    source,
                });
            }
        };

        self.credentials
            .upsert(profile, &credential)
            .await
            .map_err(|source| SessionError::Store {
                profile: profile.to_string(),
                source,
            })?;

        info!(profile, expires_at = %credential.expires_at, "credential ready");
        Ok(credential)
    }
}
