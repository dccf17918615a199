//! Device-authorization flow
//!
//! State machine driving one login attempt:
//! Idle → Registering → AwaitingUserAction → Polling →
//! {Authorized, Expired, Denied, Error}.
//!
//! Registration is reused from the token cache when still valid. The
//! poll loop honors the provider's backoff signal (`slow_down` adds
//! five seconds to the interval for the rest of the session, per
//! RFC 8628) and enforces the session deadline against the injected
//! clock. The only exits are the four terminal states; the caller is
//! never left guessing whether to keep waiting.

use std::time::Duration;

use chrono::TimeDelta;
use common::SsoAccessToken;
use tracing::{debug, info, warn};

use crate::cache::TokenStore;
use crate::clock::Clock;
use crate::error::AuthError;
use crate::oidc::{CreateTokenError, DeviceAuthorizationSession, OidcApi};

/// Increment added to the poll interval on each `slow_down` signal.
const SLOW_DOWN_BACKOFF: Duration = Duration::from_secs(5);

/// Drives the device grant against one OIDC endpoint.
#[derive(Debug)]
pub struct DeviceAuthClient<A, C> {
    api: A,
    clock: C,
    client_name: String,
}

impl<A: OidcApi, C: Clock> DeviceAuthClient<A, C> {
    pub fn new(api: A, clock: C, client_name: impl Into<String>) -> Self {
        Self {
            api,
            clock,
            client_name: client_name.into(),
        }
    }

    /// Run one complete device-authorization flow for `start_url`.
    ///
    /// `prompt` is invoked exactly once, after the provider has issued
    /// the session, with the verification URI and user code to show
    /// the user. On success the token is written through to `cache`
    /// before returning; a cache write failure downgrades to a warning
    /// because the token in hand is still perfectly usable.
    pub async fn authenticate<T, F>(
        &self,
        cache: &T,
        start_url: &str,
        region: &str,
        mut prompt: F,
    ) -> Result<SsoAccessToken, AuthError>
    where
        T: TokenStore,
        F: FnMut(&DeviceAuthorizationSession),
    {
        // Registering
        let registration = match cache.get_registration(region).await {
            Some(registration) => {
                debug!(region, "reusing cached client registration");
                registration
            }
            None => {
                let registration = self.api.register_client(&self.client_name).await?;
                if let Err(e) = cache.put_registration(region, &registration).await {
                    warn!(region, error = %e, "failed to cache client registration");
                }
                registration
            }
        };

        // AwaitingUserAction
        let session = self
            .api
            .start_device_authorization(&registration, start_url)
            .await?;
        info!(
            user_code = %session.user_code,
            verification_uri = %session.verification_uri,
            "device authorization started"
        );
        prompt(&session);

        // Polling
        let deadline = self.clock.now() + clamp_delta(session.expires_in);
        let mut interval = session.interval;

        loop {
            self.clock.sleep(interval).await;
            if self.clock.now() >= deadline {
                return Err(AuthError::Expired);
            }

            match self
                .api
                .create_token(&registration, &session.device_code)
                .await
            {
                Ok(grant) => {
                    let token = SsoAccessToken {
                        start_url: start_url.to_string(),
                        region: region.to_string(),
                        access_token: grant.access_token,
                        expires_at: self.clock.now() + clamp_delta(grant.expires_in),
                    };
                    if let Err(e) = cache.put_token(&token).await {
                        warn!(start_url, error = %e, "failed to cache access token");
                    }
                    info!(start_url, expires_at = %token.expires_at, "device authorization succeeded");
                    return Ok(token);
                }
                Err(CreateTokenError::AuthorizationPending) => {
                    debug!("authorization pending, polling again");
                }
                Err(CreateTokenError::SlowDown) => {
                    interval += SLOW_DOWN_BACKOFF;
                    debug!(interval_secs = interval.as_secs(), "provider requested slow down");
                }
                Err(CreateTokenError::AccessDenied) => return Err(AuthError::Denied),
                Err(CreateTokenError::ExpiredToken) => return Err(AuthError::Expired),
                Err(CreateTokenError::Transport(msg)) => return Err(AuthError::Transport(msg)),
            }
        }
    }
}

/// Longest provider-supplied delta taken at face value, one year.
/// Sessions and tokens never live anywhere near this long.
const MAX_PROVIDER_DELTA_SECS: u64 = 365 * 24 * 60 * 60;

/// Std → chrono duration, capped so adding the result to a current
/// timestamp stays inside chrono's representable range no matter what
/// the provider sends.
fn clamp_delta(duration: Duration) -> TimeDelta {
    TimeDelta::seconds(duration.as_secs().min(MAX_PROVIDER_DELTA_SECS) as i64)
}
