//! Issuers create bearer tokens, refresh tokens and ID tokens.
//!
//! Internally similar to the authorization module, tokens issued here live
//! longer and can be renewed. The provided implementation signs the grant
//! into the refresh token itself so that no refresh state needs to be kept
//! on the server.
use std::sync::{MutexGuard, RwLockWriteGuard};

use base64::URL_SAFE_NO_PAD;
use chrono::Duration;
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Time;
use super::generator::CodeGenerator;
use super::grant::{AccessGrant, GrantType};
use super::registrar::Client;
use super::scope::Scope;

/// Issuers create bearer tokens.
///
/// It's the issuer's decision whether a refresh token is offered or not. In
/// any case, it is also responsible for determining the lifetime of the
/// tokens it mints and for recovering the grant behind a refresh token when
/// one is presented again.
pub trait Issuer {
    /// Create an access token for the given parameters.
    ///
    /// `owner_id` is absent exactly when the client acts on its own behalf
    /// (client credentials). The returned lifetime is echoed verbatim to the
    /// client as `expires_in`.
    fn issue(
        &mut self, owner_id: Option<&str>, client: &Client, grant_type: GrantType, scope: &[Scope],
        now: Time,
    ) -> Result<IssuedToken, ()>;

    /// Create a signed ID token asserting the authenticated subject.
    fn issue_id_token(&mut self, request: IdTokenRequest) -> Result<String, ()>;

    /// Recover the grant embedded in a refresh token.
    ///
    /// `Ok(None)` means the token is not one of ours (or has been tampered
    /// with); validity of the recovered grant itself is checked by the
    /// caller.
    fn recover_refresh(&self, client: &Client, token: &str) -> Result<Option<AccessGrant>, ()>;
}

/// Token parameters returned to a client.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    /// The bearer token.
    pub token: String,

    /// The refresh token, if the issuer decided to offer one.
    pub refresh: Option<String>,

    /// Lifetime of the bearer token in seconds.
    pub expires_in: i64,
}

impl IssuedToken {
    /// Construct a token that can not be refreshed.
    pub fn without_refresh(token: String, expires_in: i64) -> Self {
        IssuedToken {
            token,
            refresh: None,
            expires_in,
        }
    }
}

/// Everything that flows into an ID token.
#[derive(Clone, Copy)]
pub struct IdTokenRequest<'a> {
    /// The authenticated subject the token asserts.
    pub owner_id: &'a str,

    /// The client the token is issued to, its id becomes the audience.
    pub client: &'a Client,

    /// Nonce from the authorization request, echoed back if present.
    pub nonce: Option<&'a str>,

    /// Issuing time, used for `iat` and `exp`.
    pub now: Time,

    /// The access token issued alongside, hashed into `at_hash`.
    pub access_token: Option<&'a str>,

    /// The authorization code that was exchanged, hashed into `c_hash`.
    pub code: Option<&'a str>,
}

impl<'a, I: Issuer + ?Sized> Issuer for &'a mut I {
    fn issue(
        &mut self, owner_id: Option<&str>, client: &Client, grant_type: GrantType, scope: &[Scope],
        now: Time,
    ) -> Result<IssuedToken, ()> {
        (**self).issue(owner_id, client, grant_type, scope, now)
    }

    fn issue_id_token(&mut self, request: IdTokenRequest) -> Result<String, ()> {
        (**self).issue_id_token(request)
    }

    fn recover_refresh(&self, client: &Client, token: &str) -> Result<Option<AccessGrant>, ()> {
        (**self).recover_refresh(client, token)
    }
}

impl<I: Issuer + ?Sized> Issuer for Box<I> {
    fn issue(
        &mut self, owner_id: Option<&str>, client: &Client, grant_type: GrantType, scope: &[Scope],
        now: Time,
    ) -> Result<IssuedToken, ()> {
        (**self).issue(owner_id, client, grant_type, scope, now)
    }

    fn issue_id_token(&mut self, request: IdTokenRequest) -> Result<String, ()> {
        (**self).issue_id_token(request)
    }

    fn recover_refresh(&self, client: &Client, token: &str) -> Result<Option<AccessGrant>, ()> {
        (**self).recover_refresh(client, token)
    }
}

impl<'a, I: Issuer + ?Sized> Issuer for MutexGuard<'a, I> {
    fn issue(
        &mut self, owner_id: Option<&str>, client: &Client, grant_type: GrantType, scope: &[Scope],
        now: Time,
    ) -> Result<IssuedToken, ()> {
        (**self).issue(owner_id, client, grant_type, scope, now)
    }

    fn issue_id_token(&mut self, request: IdTokenRequest) -> Result<String, ()> {
        (**self).issue_id_token(request)
    }

    fn recover_refresh(&self, client: &Client, token: &str) -> Result<Option<AccessGrant>, ()> {
        (**self).recover_refresh(client, token)
    }
}

impl<'a, I: Issuer + ?Sized> Issuer for RwLockWriteGuard<'a, I> {
    fn issue(
        &mut self, owner_id: Option<&str>, client: &Client, grant_type: GrantType, scope: &[Scope],
        now: Time,
    ) -> Result<IssuedToken, ()> {
        (**self).issue(owner_id, client, grant_type, scope, now)
    }

    fn issue_id_token(&mut self, request: IdTokenRequest) -> Result<String, ()> {
        (**self).issue_id_token(request)
    }

    fn recover_refresh(&self, client: &Client, token: &str) -> Result<Option<AccessGrant>, ()> {
        (**self).recover_refresh(client, token)
    }
}

type HmacSha256 = Hmac<Sha256>;

const MAC_LEN: usize = 32;

/// An issuer signing the grant into the refresh token itself.
///
/// Access tokens are random strings from the configured generator and carry
/// no state. Refresh tokens are the serialized grant followed by an
/// HMAC-SHA256 signature over it, so no refresh token storage is needed and
/// [`recover_refresh`] is self-contained. The trade-off is the loss of
/// revocability before expiry.
///
/// ID tokens are JWTs signed with the same key using HS256.
///
/// [`recover_refresh`]: trait.Issuer.html#tymethod.recover_refresh
pub struct TokenSigner<G: CodeGenerator = super::generator::RandomGenerator> {
    issuer: String,
    key: Vec<u8>,
    generator: G,
}

#[derive(Serialize, Deserialize)]
struct IdClaims {
    iss: String,
    sub: String,
    aud: String,
    exp: i64,
    iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    at_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    c_hash: Option<String>,
}

impl<G: CodeGenerator> TokenSigner<G> {
    /// Construct a signer from a custom secret.
    ///
    /// `issuer` becomes the `iss` claim of every ID token. The key signs
    /// refresh tokens and ID tokens alike; it must be shared with nothing
    /// but the token verification path.
    pub fn new(issuer: &str, key: &[u8], generator: G) -> Self {
        TokenSigner {
            issuer: issuer.to_string(),
            key: key.to_vec(),
            generator,
        }
    }

    /// Construct a signer whose tokens are only valid for the program execution.
    pub fn ephemeral(issuer: &str, generator: G) -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::new(issuer, &key, generator)
    }

    fn mac(&self, data: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(data);
        mac
    }

    fn sign_grant(&self, grant: &AccessGrant) -> Result<String, ()> {
        let mut raw = rmp_serde::to_vec(grant).map_err(|_| ())?;
        let mac = self.mac(&raw).finalize();
        raw.extend_from_slice(&mac.into_bytes());
        Ok(base64::encode_config(&raw, URL_SAFE_NO_PAD))
    }

    fn extract_grant(&self, token: &str) -> Option<AccessGrant> {
        let raw = base64::decode_config(token, URL_SAFE_NO_PAD).ok()?;
        if raw.len() <= MAC_LEN {
            return None;
        }
        let (data, tag) = raw.split_at(raw.len() - MAC_LEN);
        self.mac(data).verify_slice(tag).ok()?;
        rmp_serde::from_slice(data).ok()
    }

    /// Hash a token into the left-most half of its SHA-256 digest, base64url
    /// encoded, as OpenID Connect requires for `at_hash` and `c_hash`.
    fn half_hash(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        base64::encode_config(&digest[..digest.len() / 2], URL_SAFE_NO_PAD)
    }
}

impl<G: CodeGenerator> Issuer for TokenSigner<G> {
    fn issue(
        &mut self, owner_id: Option<&str>, client: &Client, grant_type: GrantType, scope: &[Scope],
        now: Time,
    ) -> Result<IssuedToken, ()> {
        let token = self.generator.generate()?;

        // Client credentials grants are short-lived by design, a client can
        // always repeat the flow with its own credentials.
        let offer_refresh =
            client.allows_grant(GrantType::RefreshToken) && grant_type != GrantType::ClientCredentials;

        let refresh = if offer_refresh {
            let grant = AccessGrant {
                owner_id: owner_id.map(str::to_string),
                client_id: client.client_id.clone(),
                grant_type,
                scope: scope.to_vec(),
                until: now + Duration::seconds(client.refresh_token_validity),
            };
            Some(self.sign_grant(&grant)?)
        } else {
            None
        };

        Ok(IssuedToken {
            token,
            refresh,
            expires_in: client.access_token_validity,
        })
    }

    fn issue_id_token(&mut self, request: IdTokenRequest) -> Result<String, ()> {
        let claims = IdClaims {
            iss: self.issuer.clone(),
            sub: request.owner_id.to_string(),
            aud: request.client.client_id.clone(),
            exp: (request.now + Duration::seconds(request.client.access_token_validity)).timestamp(),
            iat: request.now.timestamp(),
            nonce: request.nonce.map(str::to_string),
            at_hash: request.access_token.map(Self::half_hash),
            c_hash: request.code.map(Self::half_hash),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.key),
        )
        .map_err(|_| ())
    }

    fn recover_refresh(&self, _client: &Client, token: &str) -> Result<Option<AccessGrant>, ()> {
        Ok(self.extract_grant(token))
    }
}
