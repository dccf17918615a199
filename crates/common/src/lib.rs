//! Shared model types for the SSO credential tooling
//!
//! Every other crate in the workspace speaks in these types: the
//! client registration and access token held by the token cache, the
//! role credential written to the shared credentials file, and the
//! profile binding that ties a profile name to an account/role/SSO
//! instance. Expiry validity (with the safety margin) lives here so
//! every cache applies the same rule.

pub mod expiry;
pub mod model;

pub use expiry::{DEFAULT_SAFETY_MARGIN, is_valid};
pub use model::{ClientRegistration, ProfileBinding, RoleCredential, SsoAccessToken};
