//! Web console federation sign-in
//!
//! Turns a role credential into a browser login URL using the AWS
//! federation endpoint: the credential is traded for a short-lived
//! sign-in token, which is then embedded in a console login URL.

use anyhow::{Context, Result};
use common::RoleCredential;
use reqwest::Url;
use serde::{Deserialize, Serialize};

const FEDERATION_ENDPOINT: &str = "https://signin.aws.amazon.com/federation";

/// Console session length requested from the federation endpoint,
/// twelve hours.
const SESSION_DURATION_SECS: u64 = 43_200;

#[derive(Serialize)]
struct FederationSession<'a> {
    #[serde(rename = "sessionId")]
    session_id: &'a str,
    #[serde(rename = "sessionKey")]
    session_key: &'a str,
    #[serde(rename = "sessionToken")]
    session_token: &'a str,
}

#[derive(Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

/// Build a ready-to-open console login URL for `credential`.
pub async fn login_url(
    http: &reqwest::Client,
    credential: &RoleCredential,
    region: &str,
) -> Result<String> {
    let session = serde_json::to_string(&FederationSession {
        session_id: &credential.access_key_id,
        session_key: &credential.secret_access_key,
        session_token: &credential.session_token,
    })
    .context("cannot serialize the federation session")?;

    let response = http
        .get(FEDERATION_ENDPOINT)
        .query(&[
            ("Action", "getSigninToken"),
            ("SessionDuration", &SESSION_DURATION_SECS.to_string()),
            ("Session", &session),
        ])
        .send()
        .await
        .context("federation getSigninToken request failed")?
        .error_for_status()
        .context("federation endpoint rejected the credential")?;

    let token: SigninTokenResponse = response
        .json()
        .await
        .context("cannot parse the federation response")?;

    build_login_url(&credential.account_id, region, &token.signin_token)
}

/// Console logout URL for the account's region.
pub fn logout_url(region: &str) -> String {
    format!("https://{region}.console.aws.amazon.com/console/logout!doLogout")
}

fn build_login_url(account_id: &str, region: &str, signin_token: &str) -> Result<String> {
    let destination = format!("https://{region}.console.aws.amazon.com/");
    let base = format!("https://{account_id}.signin.aws.amazon.com/federation");
    let url = Url::parse_with_params(
        &base,
        &[
            ("Action", "login"),
            ("Issuer", "sso-creds"),
            ("Destination", &destination),
            ("SigninToken", signin_token),
        ],
    )
    .context("cannot build the console login URL")?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_encodes_the_destination() {
        let url = build_login_url("123456789012", "eu-west-1", "tok123").unwrap();
        assert!(url.starts_with("https://123456789012.signin.aws.amazon.com/federation?"));
        assert!(url.contains("Action=login"));
        assert!(url.contains("SigninToken=tok123"));
        assert!(url.contains("Destination=https%3A%2F%2Feu-west-1.console.aws.amazon.com%2F"));
    }

    #[test]
    fn logout_url_targets_the_region() {
        assert_eq!(
            logout_url("us-east-1"),
            "https://us-east-1.console.aws.amazon.com/console/logout!doLogout"
        );
    }

    #[test]
    fn federation_session_uses_the_expected_field_names() {
        let json = serde_json::to_string(&FederationSession {
            session_id: "AKIA",
            session_key: "secret",
            session_token: "token",
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"sessionId":"AKIA","sessionKey":"secret","sessionToken":"token"}"#
        );
    }
}
