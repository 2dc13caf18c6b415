//! # portcullis
//!
//! An OAuth 2.0 and OpenID Connect authorization server core, for use behind
//! any web front-end, featuring a set of configurable and pluggable
//! backends.
//!
//! ## About
//!
//! `portcullis` implements the two protocol endpoints that mint credentials:
//! the authorization endpoint, turning an owner-approved request into an
//! authorization code, and the token endpoint, exchanging grants for access
//! tokens, refresh tokens and ID tokens. Both depend on a front-end facing
//! web server for network operations and on back-end implementations for
//! policies and data storage. The interfaces point in both directions, so
//! that the front-end is as easily pluggable as the back-end.
//!
//! ## Running an authorization server
//!
//! A set of [`primitives`] needs to be chosen. These will depend on the
//! policies needed for your use case but will in general encompass a
//! [`Registrar`], an [`Authorizer`] and an [`Issuer`]. There is a simple,
//! in-memory or self-contained implementation provided for each of those.
//! More complex solutions might require a customized trait implementation,
//! especially when specific consistency requirements or cryptographic
//! standards are needed.
//!
//! Next, implement the two `Endpoint` traits of [`code_grant`] over your
//! primitives, together with an [`OwnerApproval`] connecting the
//! authorization endpoint to your session and consent handling. A thin http
//! adapter then feeds request parameters into
//! [`authorization_request`]/[`access_token`] and writes the returned
//! redirect url or json body back onto the wire.
//!
//! _WARNING_: Custom front-ends MUST ensure a secure transportation layer
//! with confidential clients. This means using TLS for communication over
//! HTTPS.
//!
//! [`primitives`]: primitives/index.html
//! [`Registrar`]: primitives/registrar/trait.Registrar.html
//! [`Authorizer`]: primitives/authorizer/trait.Authorizer.html
//! [`Issuer`]: primitives/issuer/trait.Issuer.html
//! [`code_grant`]: code_grant/index.html
//! [`OwnerApproval`]: code_grant/authorization/trait.OwnerApproval.html
//! [`authorization_request`]: code_grant/authorization/fn.authorization_request.html
//! [`access_token`]: code_grant/accesstoken/fn.access_token.html
#![warn(missing_docs)]

pub mod code_grant;
pub mod endpoint;
pub mod primitives;
