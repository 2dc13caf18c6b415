//! A collection of primitives useful for more than one protocol endpoint.
//!
//! A primitive is the smallest independent unit of policy used by the
//! protocol endpoints. For example, an `authorizer` stores and surrenders
//! authorization codes. Abstracting away the underlying primitives makes it
//! possible to provide, e.g., an independent database based implementation
//! of each while the endpoints stay pure coordinators.
//!
//! Every side effect of request processing flows through one of these
//! traits: loading a client, persisting an authorization, minting a token,
//! generating random codes. The endpoints themselves never touch a clock or
//! an entropy source, which is what makes them deterministically testable
//! with the in-memory implementations provided here.

use chrono::DateTime;
use chrono::Utc;

pub mod authorizer;
pub mod generator;
pub mod grant;
pub mod issuer;
pub mod registrar;
pub mod scope;

/// The point in time an operation happens at (Utc).
///
/// Endpoints receive the current instant as an argument instead of reading a
/// clock, so two runs over the same inputs behave identically.
pub type Time = DateTime<Utc>;

/// Commonly used primitives for frontends and backends.
pub mod prelude {
    pub use super::authorizer::{Authorizer, AuthMap};
    pub use super::generator::{CodeGenerator, RandomGenerator};
    pub use super::grant::{AccessGrant, Authorization, GrantType};
    pub use super::issuer::{IssuedToken, Issuer, TokenSigner};
    pub use super::registrar::{AuthMethod, Client, ClientMap, ExactUrl, Registrar};
    pub use super::scope::Scope;
}
