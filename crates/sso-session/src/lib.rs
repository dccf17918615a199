//! Session orchestration
//!
//! The top-level decision logic: given a profile name, hand back a
//! role credential that is usable right now, touching the network only
//! when the caches cannot satisfy the request.
//!
//! Decision order for `ensure_credential(profile)`:
//! 1. A still-valid entry in the shared credentials file wins, with
//!    no network at all.
//! 2. A still-valid SSO token skips the device flow and goes straight
//!    to the exchange.
//! 3. Otherwise the full device-authorization flow runs first.
//!
//! The orchestrator performs no retries; the one exception is a single
//! forced re-authentication when the exchange rejects a token that the
//! cache considered valid.

pub mod error;
pub mod orchestrator;
pub mod traits;

pub use error::SessionError;
pub use orchestrator::SessionOrchestrator;
pub use traits::{Authenticator, CredentialStore, Exchanger};
