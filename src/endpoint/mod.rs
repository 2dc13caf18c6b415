//! Generic request interfaces consumed by the protocol endpoints.
//!
//! The endpoints in [`code_grant`] do not care how a request arrived, only
//! which parameters it carries. An http adapter translates its own request
//! type into the [`QueryParameter`] multimap (and, for the token endpoint,
//! the raw `Authorization` header) and relays the returned url or json body
//! back onto the wire. Nothing in this crate speaks http itself.
//!
//! [`code_grant`]: ../code_grant/index.html
//! [`QueryParameter`]: query/trait.QueryParameter.html

pub mod query;

pub use self::query::{NormalizedParameter, ParameterError, QueryParameter};
