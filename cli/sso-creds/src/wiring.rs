//! Concrete service wiring
//!
//! Builds the orchestrator out of the real HTTP clients, the on-disk
//! token cache, and the shared credentials file. Each SSO instance can
//! live in its own region, so the OIDC and portal clients are built
//! per call from the binding rather than once up front.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use common::{ProfileBinding, RoleCredential, SsoAccessToken};
use creds_file::CredentialsFile;
use sso_auth::{
    AuthError, DeviceAuthClient, ExchangeError, FileTokenCache, OidcClient, RoleCredentialClient,
    SystemClock,
};
use sso_session::{Authenticator, Exchanger, SessionOrchestrator};

use crate::browser;
use crate::config;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const CLIENT_NAME: &str = "sso-creds";

pub type Orchestrator =
    SessionOrchestrator<DeviceAuthenticator, PortalExchanger, FileTokenCache, CredentialsFile>;

/// Shared HTTP client for all AWS endpoints.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("cannot build the HTTP client")
}

/// Assemble the full stack from the environment.
pub fn build_orchestrator(bindings: HashMap<String, ProfileBinding>) -> Result<Orchestrator> {
    let http = http_client()?;
    let cache_dir = config::token_cache_dir()?;
    let tokens = FileTokenCache::new(cache_dir.clone());
    let credentials = CredentialsFile::new(config::credentials_path()?);

    let authenticator = DeviceAuthenticator {
        http: http.clone(),
        tokens: FileTokenCache::new(cache_dir),
    };
    let exchanger = PortalExchanger { http };

    Ok(SessionOrchestrator::new(
        bindings,
        authenticator,
        exchanger,
        tokens,
        credentials,
    ))
}

/// Runs the interactive device flow, prompting on stderr and opening
/// the verification page in a browser when possible.
pub struct DeviceAuthenticator {
    http: reqwest::Client,
    tokens: FileTokenCache,
}

impl Authenticator for DeviceAuthenticator {
    async fn authenticate(&self, binding: &ProfileBinding) -> Result<SsoAccessToken, AuthError> {
        let oidc = OidcClient::new(self.http.clone(), &binding.sso_region);
        let client = DeviceAuthClient::new(oidc, SystemClock, CLIENT_NAME);
        client
            .authenticate(&self.tokens, &binding.start_url, &binding.sso_region, |session| {
                eprintln!(
                    "Confirm the code {} at {} to authorize this request.",
                    session.user_code, session.verification_uri
                );
                let url = session
                    .verification_uri_complete
                    .as_deref()
                    .unwrap_or(&session.verification_uri);
                browser::open_best_effort(url);
            })
            .await
    }
}

pub struct PortalExchanger {
    http: reqwest::Client,
}

impl Exchanger for PortalExchanger {
    async fn exchange(
        &self,
        token: &SsoAccessToken,
        binding: &ProfileBinding,
    ) -> Result<RoleCredential, ExchangeError> {
        let client = RoleCredentialClient::new(self.http.clone(), &binding.sso_region);
        client
            .exchange(token, &binding.account_id, &binding.role_name)
            .await
    }
}
