//! Dependency seams for the orchestrator
//!
//! Cache handles and provider clients are injected rather than global,
//! so tests run the full decision logic against in-memory fakes. The
//! token-store seam is `sso_auth::TokenStore`; the remaining seams
//! live here.

use common::{ProfileBinding, RoleCredential, SsoAccessToken};
use creds_file::{CredentialsFile, StoreError, StoredCredential};
use sso_auth::{AuthError, ExchangeError};

/// Runs a complete device-authorization flow for a binding's SSO
/// instance. Implementations write the token through to the token
/// cache as their own side effect.
#[allow(async_fn_in_trait)]
pub trait Authenticator {
    async fn authenticate(&self, binding: &ProfileBinding) -> Result<SsoAccessToken, AuthError>;
}

/// Exchanges an access token for the binding's role credential.
#[allow(async_fn_in_trait)]
pub trait Exchanger {
    async fn exchange(
        &self,
        token: &SsoAccessToken,
        binding: &ProfileBinding,
    ) -> Result<RoleCredential, ExchangeError>;
}

/// The shared credentials store, as seen by the orchestrator.
#[allow(async_fn_in_trait)]
pub trait CredentialStore {
    async fn read(&self, profile: &str) -> Result<Option<StoredCredential>, StoreError>;
    async fn upsert(&self, profile: &str, credential: &RoleCredential) -> Result<(), StoreError>;
}

impl CredentialStore for CredentialsFile {
    async fn read(&self, profile: &str) -> Result<Option<StoredCredential>, StoreError> {
        CredentialsFile::read(self, profile).await
    }

    async fn upsert(&self, profile: &str, credential: &RoleCredential) -> Result<(), StoreError> {
        CredentialsFile::upsert(self, profile, credential).await
    }
}
