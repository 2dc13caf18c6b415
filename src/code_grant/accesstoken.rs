//! Provides the handling for Access Token Requests.
use std::borrow::Cow;
use std::collections::HashMap;

use chrono::Duration;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::code_grant::client_auth::authenticate_client;
use crate::code_grant::error::{AccessTokenError, AccessTokenErrorType};
use crate::endpoint::query::{maybe, require, ParameterError, QueryParameter};
use crate::primitives::Time;
use crate::primitives::authorizer::Authorizer;
use crate::primitives::grant::GrantType;
use crate::primitives::issuer::{IdTokenRequest, IssuedToken, Issuer};
use crate::primitives::registrar::{
    check_client_scope, check_requested_scope, Client, Registrar,
};
use crate::primitives::scope::{fmt_scope, parse_scope, Scope};

/// Validity of an authorization code between its issuance and its exchange,
/// in seconds. The boundary is inclusive: a code aged exactly this many
/// seconds is still accepted.
pub const CODE_VALIDITY_SECONDS: i64 = 300;

/// Token Response
#[derive(Deserialize, Serialize)]
pub(crate) struct TokenResponse {
    /// The access token issued by the authorization server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// The refresh token, which can be used to obtain new access tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The signed ID token, present when the grant carried `openid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// The type of the token issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// The lifetime in seconds of the access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// The scope, which limits the permissions on the access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Trait based retrieval of parameters necessary for access token request handling.
pub trait Request {
    /// Received request might not be encoded correctly. This method gives implementors the chance
    /// to signal that a request was received but its encoding was generally malformed. If this is
    /// the case, then no other attribute will be queried. This method exists mainly to make
    /// frontends straightforward by not having them handle special cases for malformed requests.
    fn valid(&self) -> bool;

    /// The raw value of the `Authorization` header, if one was sent.
    fn authorization_header(&self) -> Option<Cow<str>>;

    /// The key-value pairs of the `x-www-form-urlencoded` body.
    fn body(&self) -> &dyn QueryParameter;
}

/// Required functionality to respond to access token requests.
///
/// Each method will only be invoked exactly once when processing a correct
/// and authorized request, and potentially less than once when the request
/// is faulty. These methods should be implemented by internally using
/// `primitives`.
pub trait Endpoint {
    /// Get the client corresponding to some id.
    fn registrar(&self) -> &dyn Registrar;

    /// Get the authorizer from which we can recover the authorization.
    fn authorizer(&mut self) -> &mut dyn Authorizer;

    /// Return the issuer instance to create the access token.
    fn issuer(&mut self) -> &mut dyn Issuer;

    /// Verify resource owner password credentials for the `password` grant.
    fn owner_authenticator(&mut self) -> &mut dyn OwnerAuthenticator;
}

/// Verifies the credentials of a resource owner for the `password` grant.
pub trait OwnerAuthenticator {
    /// Check the credential pair, returning the owner's subject identifier
    /// when it is correct and `Ok(None)` when it is not.
    fn authenticate(
        &mut self, username: &str, password: &str,
    ) -> std::result::Result<Option<String>, ()>;
}

/// The parameters a grant validation settled on, input to token minting.
struct Validated {
    /// The resource owner, absent for client credentials.
    owner_id: Option<String>,

    /// The flow the grant was originally obtained through.
    grant_type: GrantType,

    /// The effective scope of the new token.
    scope: Vec<Scope>,

    /// Present when an ID token must accompany the access token.
    openid: Option<OpenIdContext>,
}

/// What the ID token must commit to.
struct OpenIdContext {
    nonce: Option<String>,
    code: String,
}

/// Try to redeem a grant for an access token.
pub fn access_token(
    handler: &mut dyn Endpoint, request: &dyn Request, now: Time,
) -> Result<BearerToken> {
    if !request.valid() {
        return Err(Error::invalid());
    }

    let client = authenticate_client(handler.registrar(), request, now)?;
    let body = request.body();

    let kind = match require(body, "grant_type") {
        Ok(kind) => kind,
        Err(ParameterError::Missing) => {
            return Err(Error::invalid_description("missing grant_type parameter"))
        }
        Err(ParameterError::Repeated) => {
            return Err(Error::invalid_description("repeated grant_type parameter"))
        }
    };

    let kind: GrantType = match kind.parse() {
        Ok(kind) => kind,
        Err(_) => return Err(Error::invalid_with(AccessTokenErrorType::UnsupportedGrantType)),
    };

    debug!("client {} redeems a {} grant", client.client_id, kind);

    let validated = match kind {
        // The implicit flow mints its token at the authorization endpoint,
        // it has no business here even for clients registered for it.
        GrantType::Implicit => {
            return Err(Error::invalid_grant(
                "Implicit grant is not supported by the token endpoint",
            ))
        }
        kind if !client.allows_grant(kind) => {
            return Err(Error::invalid_with(AccessTokenErrorType::UnauthorizedClient))
        }
        GrantType::AuthorizationCode => redeem_code(handler, body, &client, now)?,
        GrantType::ClientCredentials => redeem_client_credentials(body, &client)?,
        GrantType::ResourceOwner => redeem_owner_credentials(handler, body, &client)?,
        GrantType::RefreshToken => redeem_refresh_token(handler, body, &client, now)?,
    };

    let token = handler
        .issuer()
        .issue(
            validated.owner_id.as_deref(),
            &client,
            validated.grant_type,
            &validated.scope,
            now,
        )
        .map_err(|()| Error::Primitive)?;

    let id_token = match (&validated.openid, &validated.owner_id) {
        (Some(context), Some(owner_id)) => {
            let id_token = handler
                .issuer()
                .issue_id_token(IdTokenRequest {
                    owner_id,
                    client: &client,
                    nonce: context.nonce.as_deref(),
                    now,
                    access_token: Some(&token.token),
                    code: Some(&context.code),
                })
                .map_err(|()| Error::Primitive)?;
            Some(id_token)
        }
        _ => None,
    };

    Ok(BearerToken {
        token,
        id_token,
        scope: validated.scope,
    })
}

fn redeem_code(
    handler: &mut dyn Endpoint, body: &dyn QueryParameter, client: &Client, now: Time,
) -> Result<Validated> {
    let code = require(body, "code").map_err(|_| Error::invalid())?;

    let saved = match handler.authorizer().extract(&code) {
        Err(()) => return Err(Error::Primitive),
        Ok(None) => return Err(Error::invalid_grant("Invalid authorization code")),
        Ok(Some(saved)) => saved,
    };

    // The exchange must repeat the redirect_uri of the authorization request
    // verbatim, both being absent counts as a match.
    let redirect_uri = maybe(body, "redirect_uri").map_err(|_| Error::invalid())?;
    if saved.redirect_uri.as_deref() != redirect_uri.as_deref() {
        return Err(Error::invalid_grant(
            "Redirect uri does not match the authorization request",
        ));
    }

    if saved.client_id != client.client_id {
        return Err(Error::invalid_grant(
            "Authorization code was issued to a different client",
        ));
    }

    if now.signed_duration_since(saved.issued_at) > Duration::seconds(CODE_VALIDITY_SECONDS) {
        return Err(Error::invalid_grant("Expired code"));
    }

    let openid = if saved.scope.contains(&Scope::OpenId) {
        Some(OpenIdContext {
            nonce: saved.nonce,
            code: code.into_owned(),
        })
    } else {
        None
    };

    Ok(Validated {
        owner_id: Some(saved.owner_id),
        grant_type: GrantType::AuthorizationCode,
        scope: saved.scope,
        openid,
    })
}

fn redeem_client_credentials(body: &dyn QueryParameter, client: &Client) -> Result<Validated> {
    let scope = negotiated_scope(body, client)?;

    Ok(Validated {
        owner_id: None,
        grant_type: GrantType::ClientCredentials,
        scope,
        openid: None,
    })
}

fn redeem_owner_credentials(
    handler: &mut dyn Endpoint, body: &dyn QueryParameter, client: &Client,
) -> Result<Validated> {
    let username = require(body, "username").map_err(|_| Error::invalid())?;
    let password = require(body, "password").map_err(|_| Error::invalid())?;

    let owner_id = match handler.owner_authenticator().authenticate(&username, &password) {
        Err(()) => return Err(Error::Primitive),
        Ok(None) => return Err(Error::invalid_grant("authentication failed")),
        Ok(Some(owner_id)) => owner_id,
    };

    let scope = negotiated_scope(body, client)?;

    Ok(Validated {
        owner_id: Some(owner_id),
        grant_type: GrantType::ResourceOwner,
        scope,
        openid: None,
    })
}

fn redeem_refresh_token(
    handler: &mut dyn Endpoint, body: &dyn QueryParameter, client: &Client, now: Time,
) -> Result<Validated> {
    let token = require(body, "refresh_token").map_err(|_| Error::invalid())?;

    let grant = match handler.issuer().recover_refresh(client, &token) {
        Err(()) => return Err(Error::Primitive),
        Ok(None) => return Err(Error::invalid_grant("Invalid refresh token")),
        Ok(Some(grant)) => grant,
    };

    if grant.client_id != client.client_id {
        return Err(Error::invalid_grant(
            "Refresh token was issued to a different client",
        ));
    }

    if grant.until < now {
        return Err(Error::invalid_grant("Refresh token has expired"));
    }

    let requested = match maybe(body, "scope").map_err(|_| Error::invalid())? {
        None => None,
        Some(raw) => Some(parse_scope(&raw).map_err(|err| Error::invalid_scope(err.to_string()))?),
    };

    // A refresh may narrow the original grant but never widen it.
    let scope = check_requested_scope(&grant.scope, requested.as_deref())
        .map_err(|err| Error::invalid_scope(err.to_string()))?;

    Ok(Validated {
        owner_id: grant.owner_id,
        grant_type: grant.grant_type,
        scope,
        openid: None,
    })
}

/// Resolve the scope parameter of a fresh grant against the client bound.
fn negotiated_scope(body: &dyn QueryParameter, client: &Client) -> Result<Vec<Scope>> {
    let requested = match maybe(body, "scope").map_err(|_| Error::invalid())? {
        None => None,
        Some(raw) => Some(parse_scope(&raw).map_err(|err| Error::invalid_scope(err.to_string()))?),
    };

    check_client_scope(client, requested.as_deref())
        .map_err(|err| Error::invalid_scope(err.to_string()))
}

/// Defines actions for the response to an access token request.
#[derive(Debug)]
pub enum Error {
    /// The request did not represent a valid token request.
    Invalid(ErrorDescription),

    /// The client did not properly authorize itself.
    ///
    /// The second member names the authentication scheme for the
    /// `WWW-Authenticate` header of the 401 response.
    Unauthorized(ErrorDescription, String),

    /// An underlying primitive operation did not complete successfully.
    ///
    /// This is expected to occur with some endpoints. The frontend should
    /// decide how to handle this and if this is temporary.
    Primitive,
}

/// Simple wrapper around AccessTokenError.
///
/// Enables additional json functionality to generate a properly formatted
/// response in the user of this module.
#[derive(Debug)]
pub struct ErrorDescription {
    error: AccessTokenError,
}

type Result<T> = std::result::Result<T, Error>;

/// Represents an access token, an optional refresh and ID token, and the
/// associated scope for serialization.
pub struct BearerToken {
    token: IssuedToken,
    id_token: Option<String>,
    scope: Vec<Scope>,
}

impl Error {
    pub(crate) fn invalid() -> Self {
        Error::Invalid(ErrorDescription {
            error: AccessTokenError::default(),
        })
    }

    pub(crate) fn invalid_with(with_type: AccessTokenErrorType) -> Self {
        Error::Invalid(ErrorDescription {
            error: AccessTokenError::new(with_type),
        })
    }

    pub(crate) fn invalid_description(description: &'static str) -> Self {
        let mut error = AccessTokenError::default();
        error.explain(description);
        Error::Invalid(ErrorDescription { error })
    }

    pub(crate) fn invalid_client() -> Self {
        Error::invalid_with(AccessTokenErrorType::InvalidClient)
    }

    pub(crate) fn invalid_grant(description: &'static str) -> Self {
        let mut error = AccessTokenError::new(AccessTokenErrorType::InvalidGrant);
        error.explain(description);
        Error::Invalid(ErrorDescription { error })
    }

    pub(crate) fn invalid_scope(description: String) -> Self {
        let mut error = AccessTokenError::new(AccessTokenErrorType::InvalidScope);
        error.explain(description);
        Error::Invalid(ErrorDescription { error })
    }

    pub(crate) fn unauthorized(authtype: &str) -> Self {
        Error::Unauthorized(
            ErrorDescription {
                error: AccessTokenError::new(AccessTokenErrorType::InvalidClient),
            },
            authtype.to_string(),
        )
    }

    /// Get a handle to the description the client will receive.
    ///
    /// Some types of this error don't return any description which is
    /// represented by a `None` result.
    pub fn description(&mut self) -> Option<&mut AccessTokenError> {
        match self {
            Error::Invalid(description) => Some(description.description()),
            Error::Unauthorized(description, _) => Some(description.description()),
            Error::Primitive => None,
        }
    }
}

impl ErrorDescription {
    /// Get a handle to the description the client will receive.
    pub fn description(&mut self) -> &mut AccessTokenError {
        &mut self.error
    }

    /// Convert the error into a json string, viable for being sent over a
    /// network with `application/json` encoding.
    pub fn to_json(&self) -> String {
        let asmap = self
            .error
            .iter()
            .map(|(k, v)| (k.to_string(), v.into_owned()))
            .collect::<HashMap<String, String>>();
        serde_json::to_string(&asmap).unwrap()
    }
}

impl BearerToken {
    /// The opaque access token.
    pub fn access_token(&self) -> &str {
        &self.token.token
    }

    /// The refresh token, if one was issued.
    pub fn refresh_token(&self) -> Option<&str> {
        self.token.refresh.as_deref()
    }

    /// The signed ID token, if the grant carried `openid`.
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    /// Lifetime of the access token in seconds.
    pub fn expires_in(&self) -> i64 {
        self.token.expires_in
    }

    /// The scope the token is good for.
    pub fn scope(&self) -> &[Scope] {
        &self.scope
    }

    /// Convert the token into a json string, viable for being sent over a
    /// network with `application/json` encoding.
    pub fn to_json(&self) -> String {
        let token_response = TokenResponse {
            access_token: Some(self.token.token.clone()),
            refresh_token: self.token.refresh.clone(),
            id_token: self.id_token.clone(),
            token_type: Some("bearer".to_owned()),
            expires_in: Some(self.token.expires_in),
            scope: if self.scope.is_empty() {
                None
            } else {
                Some(fmt_scope(&self.scope))
            },
            error: None,
        };

        serde_json::to_string(&token_response).unwrap()
    }
}
