//! Client authentication for the token endpoint.
//!
//! A token request must present exactly one proof of client identity:
//! `Authorization: Basic`, secret form parameters, a signed JWT assertion,
//! or nothing at all for a registered public client. Which one is acceptable
//! is part of the client's registration, and any disagreement between the
//! offered and the registered method fails authentication without telling
//! the caller which part mismatched.
use std::borrow::Cow;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use log::warn;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::endpoint::query::{maybe, QueryParameter};
use crate::primitives::Time;
use crate::primitives::registrar::{AuthMethod, Client, Registrar};

use super::accesstoken::{Error, Request};

/// The one assertion type understood in `client_assertion_type` (rfc7523).
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// The credential source a request settled on.
enum Credentials {
    /// No credentials were offered.
    None,

    /// Credentials from the `Authorization` header.
    Basic { client_id: String, passphrase: String },

    /// Credentials from the form body.
    Post { client_id: String, passphrase: String },

    /// A JWT assertion from the form body.
    Assertion { assertion: String },

    /// Multiple possible credentials were offered.
    ///
    /// This is a security issue, only one attempt must be made per request.
    Duplicate,
}

impl Credentials {
    fn add(&mut self, new: Self) {
        let old = std::mem::replace(self, Credentials::None);
        *self = match old {
            Credentials::None => new,
            _ => Credentials::Duplicate,
        };
    }
}

#[derive(Deserialize)]
struct AssertionClaims {
    iss: String,
    sub: String,
    exp: i64,
}

/// Establish which client is speaking, or fail the request.
///
/// On success the registered client snapshot is returned for the grant
/// handling to check its policy against. All authentication failures
/// collapse into `invalid_client`; only the http status differs depending on
/// whether the credentials came in the `Authorization` header.
pub fn authenticate_client(
    registrar: &dyn Registrar, request: &dyn Request, now: Time,
) -> Result<Client, Error> {
    let body = request.body();
    let mut credentials = Credentials::None;

    if let Some(header) = request.authorization_header() {
        let (client_id, passphrase) = decode_basic(&header)?;
        credentials.add(Credentials::Basic {
            client_id,
            passphrase,
        });
    }

    // An explicit `client_id` parameter is legal next to any method but must
    // then agree with the authenticated identity, checked at the end.
    let param_client = maybe(body, "client_id")
        .map_err(|_| Error::invalid())?
        .map(Cow::into_owned);

    if let Some(passphrase) = maybe(body, "client_secret").map_err(|_| Error::invalid())? {
        match &param_client {
            Some(client_id) => credentials.add(Credentials::Post {
                client_id: client_id.clone(),
                passphrase: passphrase.into_owned(),
            }),
            None => return Err(Error::invalid()),
        }
    }

    let assertion = maybe(body, "client_assertion").map_err(|_| Error::invalid())?;
    let assertion_type = maybe(body, "client_assertion_type").map_err(|_| Error::invalid())?;
    match (assertion, assertion_type) {
        (Some(assertion), Some(ref kind)) if kind == JWT_BEARER_ASSERTION_TYPE => credentials
            .add(Credentials::Assertion {
                assertion: assertion.into_owned(),
            }),
        (None, None) => (),
        // An assertion of a foreign type, or a type without an assertion.
        (_, _) => return Err(Error::invalid()),
    }

    let client = match credentials {
        Credentials::None => match &param_client {
            Some(client_id) => check_public(registrar, client_id)?,
            None => return Err(Error::invalid_client()),
        },
        Credentials::Basic {
            client_id,
            passphrase,
        } => check_secret(registrar, &client_id, passphrase.as_bytes(), true)?,
        Credentials::Post {
            client_id,
            passphrase,
        } => check_secret(registrar, &client_id, passphrase.as_bytes(), false)?,
        Credentials::Assertion { assertion } => check_assertion(registrar, &assertion, now)?,
        Credentials::Duplicate => return Err(Error::invalid()),
    };

    if let Some(param_client) = param_client {
        if param_client != client.client_id {
            return Err(Error::invalid());
        }
    }

    Ok(client)
}

/// Split a `Basic` authorization header into its credential pair.
fn decode_basic(header: &str) -> Result<(String, String), Error> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or("");
    let encoded = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Basic") {
        return Err(Error::unauthorized("Basic"));
    }

    let decoded = base64::decode(encoded.trim()).map_err(|_| Error::unauthorized("Basic"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| Error::unauthorized("Basic"))?;
    match decoded.split_once(':') {
        Some((client_id, passphrase)) => Ok((client_id.to_string(), passphrase.to_string())),
        None => Err(Error::unauthorized("Basic")),
    }
}

fn load_client(
    registrar: &dyn Registrar, client_id: &str, fail: impl Fn() -> Error,
) -> Result<Client, Error> {
    match registrar.client(client_id) {
        Ok(Some(client)) => Ok(client),
        Ok(None) => {
            warn!("token request for unknown client {}", client_id);
            Err(fail())
        }
        Err(()) => Err(Error::Primitive),
    }
}

fn check_secret(
    registrar: &dyn Registrar, client_id: &str, passphrase: &[u8], via_header: bool,
) -> Result<Client, Error> {
    let fail = || {
        if via_header {
            Error::unauthorized("Basic")
        } else {
            Error::invalid_client()
        }
    };
    let expected_method = if via_header {
        AuthMethod::ClientSecretBasic
    } else {
        AuthMethod::ClientSecretPost
    };

    let client = load_client(registrar, client_id, fail)?;
    if client.auth_method != expected_method {
        warn!(
            "client {} authenticated via {} but is registered for {}",
            client_id, expected_method, client.auth_method
        );
        return Err(fail());
    }

    let secret = client.secret.as_ref().ok_or_else(fail)?;
    // Guessing attempts must not learn the matching prefix length.
    let matches: bool = secret.as_bytes().ct_eq(passphrase).into();
    if !matches {
        warn!("client {} presented a wrong secret", client_id);
        return Err(fail());
    }

    Ok(client)
}

fn check_public(registrar: &dyn Registrar, client_id: &str) -> Result<Client, Error> {
    let client = load_client(registrar, client_id, Error::invalid_client)?;
    if client.auth_method != AuthMethod::None {
        // A confidential client must never downgrade to unauthenticated use.
        return Err(Error::invalid_client());
    }
    Ok(client)
}

fn check_assertion(
    registrar: &dyn Registrar, assertion: &str, now: Time,
) -> Result<Client, Error> {
    let fail = Error::invalid_client;

    let header = decode_header(assertion).map_err(|_| fail())?;
    // The subject names the client; it cannot be trusted before the
    // signature check but is needed to find the verification key.
    let asserted_id = peek_subject(assertion).ok_or_else(fail)?;
    let client = load_client(registrar, &asserted_id, fail)?;

    match client.auth_method {
        AuthMethod::ClientSecretJwt => (),
        AuthMethod::PrivateKeyJwt => {
            warn!("client {} uses private_key_jwt which is not supported", asserted_id);
            return Err(fail());
        }
        _ => return Err(fail()),
    }

    if let Some(pinned) = &client.auth_alg {
        let pinned: Algorithm = pinned.parse().map_err(|_| fail())?;
        if pinned != header.alg {
            return Err(fail());
        }
    }

    // `client_secret_jwt` is symmetric by definition.
    match header.alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => (),
        _ => return Err(fail()),
    }

    let secret = client.secret.as_ref().ok_or_else(fail)?;

    let mut validation = Validation::new(header.alg);
    validation.set_required_spec_claims(&["iss", "sub", "exp"]);
    // Expiry is checked against the injected clock below.
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<AssertionClaims>(
        assertion,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| fail())?;

    if data.claims.iss != data.claims.sub || data.claims.sub != asserted_id {
        return Err(fail());
    }
    if data.claims.exp <= now.timestamp() {
        return Err(fail());
    }

    Ok(client)
}

/// Read the unverified `sub` claim to locate the verification key.
fn peek_subject(assertion: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Subject {
        sub: String,
    }

    let payload = assertion.split('.').nth(1)?;
    let decoded = base64::decode_config(payload, base64::URL_SAFE_NO_PAD).ok()?;
    let subject: Subject = serde_json::from_slice(&decoded).ok()?;
    Some(subject.sub)
}
