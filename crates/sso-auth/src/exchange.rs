//! Role credential exchange
//!
//! Turns a valid SSO access token plus an (account, role) pair into a
//! temporary access/secret/session-token triple. Pure request/response
//! against the portal endpoint; caching the result is the caller's
//! job, never this module's.

use chrono::{DateTime, Utc};
use common::{RoleCredential, SsoAccessToken};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::ExchangeError;

/// Bearer-token header the portal endpoint expects.
const BEARER_HEADER: &str = "x-amz-sso_bearer_token";

/// HTTP client for one region's role-credential endpoint.
#[derive(Debug, Clone)]
pub struct RoleCredentialClient {
    http: reqwest::Client,
    base: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetRoleCredentialsResponse {
    role_credentials: WireRoleCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRoleCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    /// Unix timestamp in milliseconds.
    expiration: i64,
}

impl RoleCredentialClient {
    /// Client for the portal endpoint of `region`.
    pub fn new(http: reqwest::Client, region: &str) -> Self {
        Self {
            http,
            base: format!("https://portal.sso.{region}.amazonaws.com"),
        }
    }

    /// Fetch a role credential for `(account_id, role_name)`.
    pub async fn exchange(
        &self,
        token: &SsoAccessToken,
        account_id: &str,
        role_name: &str,
    ) -> Result<RoleCredential, ExchangeError> {
        let response = self
            .http
            .get(format!("{}/federation/credentials", self.base))
            .query(&[("account_id", account_id), ("role_name", role_name)])
            .header(BEARER_HEADER, &token.access_token)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(format!("role credential request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(map_exchange_failure(status, body));
        }

        let parsed: GetRoleCredentialsResponse = response.json().await.map_err(|e| {
            ExchangeError::Transport(format!("invalid role credential response: {e}"))
        })?;

        let expires_at = DateTime::<Utc>::from_timestamp_millis(parsed.role_credentials.expiration)
            .ok_or_else(|| {
                ExchangeError::Transport(format!(
                    "credential expiration out of range: {}",
                    parsed.role_credentials.expiration
                ))
            })?;

        Ok(RoleCredential {
            account_id: account_id.to_string(),
            role_name: role_name.to_string(),
            access_key_id: parsed.role_credentials.access_key_id,
            secret_access_key: parsed.role_credentials.secret_access_key,
            session_token: parsed.role_credentials.session_token,
            expires_at,
        })
    }
}

/// Map a non-success portal status onto the closed exchange taxonomy.
///
/// 401/403 mean the access token is stale or revoked; the caller
/// should re-authenticate, not retry. 404 means the account/role pair
/// is not granted to this user. Everything else is transport.
fn map_exchange_failure(status: StatusCode, body: String) -> ExchangeError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ExchangeError::Unauthorized(format!("portal endpoint returned {status}: {body}"))
        }
        StatusCode::NOT_FOUND => {
            ExchangeError::NotFound(format!("portal endpoint returned {status}: {body}"))
        }
        _ => ExchangeError::Transport(format!("portal endpoint returned {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_statuses_trigger_reauthentication() {
        assert!(matches!(
            map_exchange_failure(StatusCode::UNAUTHORIZED, "expired".into()),
            ExchangeError::Unauthorized(_)
        ));
        assert!(matches!(
            map_exchange_failure(StatusCode::FORBIDDEN, "revoked".into()),
            ExchangeError::Unauthorized(_)
        ));
    }

    #[test]
    fn missing_role_maps_to_not_found() {
        let err = map_exchange_failure(StatusCode::NOT_FOUND, "no such role".into());
        match err {
            ExchangeError::NotFound(msg) => assert!(msg.contains("no such role")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn other_statuses_map_to_transport() {
        assert!(matches!(
            map_exchange_failure(StatusCode::INTERNAL_SERVER_ERROR, "oops".into()),
            ExchangeError::Transport(_)
        ));
        assert!(matches!(
            map_exchange_failure(StatusCode::TOO_MANY_REQUESTS, "slow".into()),
            ExchangeError::Transport(_)
        ));
    }

    #[test]
    fn request_query_carries_account_and_role() {
        let request = reqwest::Client::new()
            .get("https://portal.sso.us-east-1.amazonaws.com/federation/credentials")
            .query(&[("account_id", "111111111111"), ("role_name", "Admin")])
            .build()
            .unwrap();
        assert_eq!(
            request.url().query(),
            Some("account_id=111111111111&role_name=Admin")
        );
    }

    #[test]
    fn role_credentials_response_deserializes() {
        let json = r#"{
            "roleCredentials": {
                "accessKeyId": "ASIAEXAMPLE",
                "secretAccessKey": "secret",
                "sessionToken": "session",
                "expiration": 1764547200000
            }
        }"#;
        let parsed: GetRoleCredentialsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.role_credentials.access_key_id, "ASIAEXAMPLE");
        assert_eq!(parsed.role_credentials.expiration, 1764547200000);

        let expires_at =
            DateTime::<Utc>::from_timestamp_millis(parsed.role_credentials.expiration).unwrap();
        assert_eq!(expires_at.timestamp(), 1764547200);
    }
}
