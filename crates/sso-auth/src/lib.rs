//! SSO identity-provider client library
//!
//! Drives the OAuth2 device-authorization grant against an AWS SSO
//! instance and exchanges the resulting access token for role-scoped
//! credentials. This crate owns everything that talks to the provider
//! plus the private on-disk token cache; the shared credentials file
//! lives in `creds-file` and the top-level decision logic in
//! `sso-session`.
//!
//! Login flow:
//! 1. `cache::FileTokenCache` is consulted for a still-valid token
//! 2. On a miss, `device::DeviceAuthClient::authenticate()` runs the
//!    device grant (RegisterClient → StartDeviceAuthorization → poll
//!    CreateToken) and writes the token back through the cache
//! 3. `exchange::RoleCredentialClient::exchange()` turns the token
//!    into an access/secret/session-token triple

pub mod cache;
pub mod clock;
pub mod device;
pub mod error;
pub mod exchange;
pub mod oidc;

pub use cache::{FileTokenCache, TokenStore};
pub use clock::{Clock, SystemClock};
pub use device::DeviceAuthClient;
pub use error::{AuthError, CacheError, ExchangeError};
pub use exchange::RoleCredentialClient;
pub use oidc::{CreateTokenError, DeviceAuthorizationSession, OidcApi, OidcClient, TokenGrant};
