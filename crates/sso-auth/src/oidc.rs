//! OIDC endpoint client
//!
//! Wire-level calls against the provider's OIDC API for one region:
//! RegisterClient, StartDeviceAuthorization, and CreateToken. Each is
//! a JSON request/response over HTTPS. Provider error codes are mapped
//! onto a closed set of variants here so the poll loop in `device`
//! never has to interpret raw bodies.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::ClientRegistration;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Poll interval used when the provider omits one (RFC 8628 default).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Grant type for device-code token requests.
const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// One device-authorization session. Ephemeral: lives only for the
/// duration of a single login attempt and is never persisted.
#[derive(Clone)]
pub struct DeviceAuthorizationSession {
    pub device_code: String,
    /// Short code the user confirms in the browser.
    pub user_code: String,
    pub verification_uri: String,
    /// Verification URI with the user code already embedded, when the
    /// provider supplies one. Preferred for browser opening.
    pub verification_uri_complete: Option<String>,
    /// How long the session stays approvable.
    pub expires_in: Duration,
    /// Provider-requested base poll interval.
    pub interval: Duration,
}

impl fmt::Debug for DeviceAuthorizationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceAuthorizationSession")
            .field("device_code", &"[REDACTED]")
            .field("user_code", &self.user_code)
            .field("verification_uri", &self.verification_uri)
            .field("expires_in", &self.expires_in)
            .field("interval", &self.interval)
            .finish()
    }
}

/// Successful CreateToken response.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Duration,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Outcome of one CreateToken poll that did not yield a token.
#[derive(Debug, thiserror::Error)]
pub enum CreateTokenError {
    #[error("authorization pending")]
    AuthorizationPending,

    #[error("provider asked to slow down")]
    SlowDown,

    #[error("authorization denied")]
    AccessDenied,

    #[error("device code expired")]
    ExpiredToken,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Map a provider error code onto the closed variant set.
///
/// Accepts both the OAuth snake_case codes and the provider's
/// exception-name aliases. Unknown codes are transport errors, never
/// a reason to keep or stop polling on a guess.
pub(crate) fn map_create_token_error(code: &str, detail: String) -> CreateTokenError {
    match code {
        "authorization_pending" | "AuthorizationPendingException" => {
            CreateTokenError::AuthorizationPending
        }
        "slow_down" | "SlowDownException" => CreateTokenError::SlowDown,
        "access_denied" | "AccessDeniedException" => CreateTokenError::AccessDenied,
        "expired_token" | "ExpiredTokenException" => CreateTokenError::ExpiredToken,
        _ => CreateTokenError::Transport(detail),
    }
}

/// Provider-side OIDC operations, as a seam so the poll loop can be
/// tested against a scripted fake.
#[allow(async_fn_in_trait)]
pub trait OidcApi {
    async fn register_client(&self, client_name: &str) -> Result<ClientRegistration, AuthError>;

    async fn start_device_authorization(
        &self,
        registration: &ClientRegistration,
        start_url: &str,
    ) -> Result<DeviceAuthorizationSession, AuthError>;

    async fn create_token(
        &self,
        registration: &ClientRegistration,
        device_code: &str,
    ) -> Result<TokenGrant, CreateTokenError>;
}

/// HTTP client for one region's OIDC endpoint.
#[derive(Debug, Clone)]
pub struct OidcClient {
    http: reqwest::Client,
    base: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterClientRequest<'a> {
    client_name: &'a str,
    client_type: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterClientResponse {
    client_id: String,
    client_secret: String,
    /// Unix timestamp in seconds.
    client_secret_expires_at: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartDeviceAuthorizationRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    start_url: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartDeviceAuthorizationResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    verification_uri_complete: Option<String>,
    /// Seconds until the session expires (delta, not absolute).
    expires_in: u64,
    /// Requested poll interval in seconds; optional per RFC 8628.
    #[serde(default)]
    interval: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    device_code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct OidcErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

impl OidcClient {
    /// Client for the OIDC endpoint of `region`.
    pub fn new(http: reqwest::Client, region: &str) -> Self {
        Self {
            http,
            base: format!("https://oidc.{region}.amazonaws.com"),
        }
    }
}

impl OidcApi for OidcClient {
    async fn register_client(&self, client_name: &str) -> Result<ClientRegistration, AuthError> {
        let response = self
            .http
            .post(format!("{}/client/register", self.base))
            .json(&RegisterClientRequest {
                client_name,
                client_type: "public",
            })
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("client registration request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(AuthError::Registration(format!(
                "registration endpoint returned {status}: {body}"
            )));
        }

        let parsed: RegisterClientResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Registration(format!("invalid registration response: {e}")))?;

        let expires_at = DateTime::<Utc>::from_timestamp(parsed.client_secret_expires_at, 0)
            .ok_or_else(|| {
                AuthError::Registration(format!(
                    "registration expiry out of range: {}",
                    parsed.client_secret_expires_at
                ))
            })?;

        Ok(ClientRegistration {
            client_id: parsed.client_id,
            client_secret: parsed.client_secret,
            expires_at,
        })
    }

    async fn start_device_authorization(
        &self,
        registration: &ClientRegistration,
        start_url: &str,
    ) -> Result<DeviceAuthorizationSession, AuthError> {
        let response = self
            .http
            .post(format!("{}/device_authorization", self.base))
            .json(&StartDeviceAuthorizationRequest {
                client_id: &registration.client_id,
                client_secret: &registration.client_secret,
                start_url,
            })
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("device authorization request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(AuthError::Transport(format!(
                "device authorization endpoint returned {status}: {body}"
            )));
        }

        let parsed: StartDeviceAuthorizationResponse = response.json().await.map_err(|e| {
            AuthError::Transport(format!("invalid device authorization response: {e}"))
        })?;

        Ok(DeviceAuthorizationSession {
            device_code: parsed.device_code,
            user_code: parsed.user_code,
            verification_uri: parsed.verification_uri,
            verification_uri_complete: parsed.verification_uri_complete,
            expires_in: Duration::from_secs(parsed.expires_in),
            interval: parsed
                .interval
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        })
    }

    async fn create_token(
        &self,
        registration: &ClientRegistration,
        device_code: &str,
    ) -> Result<TokenGrant, CreateTokenError> {
        let response = self
            .http
            .post(format!("{}/token", self.base))
            .json(&CreateTokenRequest {
                client_id: &registration.client_id,
                client_secret: &registration.client_secret,
                grant_type: DEVICE_GRANT_TYPE,
                device_code,
            })
            .send()
            .await
            .map_err(|e| CreateTokenError::Transport(format!("token request: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let parsed: CreateTokenResponse = response
                .json()
                .await
                .map_err(|e| CreateTokenError::Transport(format!("invalid token response: {e}")))?;
            return Ok(TokenGrant {
                access_token: parsed.access_token,
                expires_in: Duration::from_secs(parsed.expires_in),
            });
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        match serde_json::from_str::<OidcErrorBody>(&body) {
            Ok(OidcErrorBody {
                error: Some(code),
                error_description,
            }) => {
                let detail = error_description
                    .unwrap_or_else(|| format!("token endpoint returned {status}: {code}"));
                Err(map_create_token_error(&code, detail))
            }
            _ => Err(CreateTokenError::Transport(format!(
                "token endpoint returned {status}: {body}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping_covers_oauth_codes() {
        assert!(matches!(
            map_create_token_error("authorization_pending", String::new()),
            CreateTokenError::AuthorizationPending
        ));
        assert!(matches!(
            map_create_token_error("slow_down", String::new()),
            CreateTokenError::SlowDown
        ));
        assert!(matches!(
            map_create_token_error("access_denied", String::new()),
            CreateTokenError::AccessDenied
        ));
        assert!(matches!(
            map_create_token_error("expired_token", String::new()),
            CreateTokenError::ExpiredToken
        ));
    }

    #[test]
    fn error_code_mapping_accepts_exception_aliases() {
        assert!(matches!(
            map_create_token_error("AuthorizationPendingException", String::new()),
            CreateTokenError::AuthorizationPending
        ));
        assert!(matches!(
            map_create_token_error("SlowDownException", String::new()),
            CreateTokenError::SlowDown
        ));
    }

    #[test]
    fn unknown_error_code_maps_to_transport() {
        let err = map_create_token_error("quota_exceeded", "429 from provider".into());
        match err {
            CreateTokenError::Transport(detail) => assert_eq!(detail, "429 from provider"),
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[test]
    fn device_authorization_response_deserializes() {
        let json = r#"{
            "deviceCode": "dc-123",
            "userCode": "WDJB-MJHT",
            "verificationUri": "https://device.sso.us-east-1.amazonaws.com/",
            "verificationUriComplete": "https://device.sso.us-east-1.amazonaws.com/?user_code=WDJB-MJHT",
            "expiresIn": 600,
            "interval": 1
        }"#;
        let parsed: StartDeviceAuthorizationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.user_code, "WDJB-MJHT");
        assert_eq!(parsed.expires_in, 600);
        assert_eq!(parsed.interval, Some(1));
    }

    #[test]
    fn device_authorization_interval_is_optional() {
        let json = r#"{
            "deviceCode": "dc-123",
            "userCode": "WDJB-MJHT",
            "verificationUri": "https://device.sso.us-east-1.amazonaws.com/",
            "expiresIn": 600
        }"#;
        let parsed: StartDeviceAuthorizationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.interval, None);
        assert_eq!(parsed.verification_uri_complete, None);
    }

    #[test]
    fn register_client_response_deserializes() {
        let json = r#"{
            "clientId": "client-abc",
            "clientSecret": "secret",
            "clientSecretExpiresAt": 1764547200,
            "clientIdIssuedAt": 1756771200
        }"#;
        let parsed: RegisterClientResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.client_id, "client-abc");
        assert_eq!(parsed.client_secret_expires_at, 1764547200);
    }

    #[test]
    fn create_token_response_deserializes() {
        let json = r#"{"accessToken":"at-xyz","tokenType":"Bearer","expiresIn":28800}"#;
        let parsed: CreateTokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token, "at-xyz");
        assert_eq!(parsed.expires_in, 28800);
    }

    #[test]
    fn session_debug_redacts_device_code() {
        let session = DeviceAuthorizationSession {
            device_code: "dc-secret".into(),
            user_code: "WDJB-MJHT".into(),
            verification_uri: "https://device.sso.us-east-1.amazonaws.com/".into(),
            verification_uri_complete: None,
            expires_in: Duration::from_secs(600),
            interval: Duration::from_secs(5),
        };
        let debug = format!("{session:?}");
        assert!(!debug.contains("dc-secret"));
        assert!(debug.contains("WDJB-MJHT"));
    }
}
