//! The protocol endpoints of [RFC 6749] and OpenID Connect Core.
//!
//! This module codifies the requirements from the rfc into types and
//! functions as safely as possible. The results are abstract: the
//! authorization endpoint produces a redirect url, the token endpoint a json
//! body, both to be relayed onto the wire by a frontend using its own
//! request and response types.
//!
//! The endpoints are pure coordinators. Loading a client, persisting an
//! authorization, checking an owner's password, minting a token: each goes
//! through a primitive handed in via the respective `Endpoint` trait, so
//! that processing a request is deterministic given the answers of the
//! primitives.
//!
//! ## Error routing
//!
//! Errors are not all alike here. The authorization endpoint distinguishes
//! errors the *resource owner* must see (an untrusted client or redirect
//! url, see [`EvilClientError`]) from errors the *client* receives encoded
//! into its own redirect url. The token endpoint talks to the client
//! directly and answers with the json error codes of section 5.2, plus the
//! http 401 distinction for failed `Authorization` header authentication.
//!
//! [RFC 6749]: https://tools.ietf.org/html/rfc6749
//! [`EvilClientError`]: error/enum.EvilClientError.html

pub mod accesstoken;
pub mod authorization;
pub mod client_auth;
pub mod error;

#[cfg(test)]
mod tests;
