//! Provides the handling for Authorization Code Requests.
use std::borrow::Cow;

use log::debug;
use url::Url;

use crate::code_grant::error::{AuthorizationError, AuthorizationErrorType, EvilClientError};
use crate::endpoint::query::{maybe, require, ParameterError, QueryParameter};
use crate::primitives::Time;
use crate::primitives::authorizer::Authorizer;
use crate::primitives::grant::{Authorization, GrantType};
use crate::primitives::registrar::{check_client_scope, Client, Registrar};
use crate::primitives::scope::{fmt_scope, parse_scope, Scope};

/// Required functionality to respond to authorization code requests.
///
/// Each method will only be invoked exactly once when processing a correct
/// and authorized request, and potentially less than once when the request
/// is faulty. These methods should be implemented by internally using
/// `primitives`.
pub trait Endpoint {
    /// Look up the client a request claims to act for.
    fn registrar(&self) -> &dyn Registrar;

    /// Generate and store an authorization code for an approved grant.
    fn authorizer(&mut self) -> &mut dyn Authorizer;

    /// Obtain the resource owner's decision about the request.
    fn approval(&mut self) -> &mut dyn OwnerApproval;
}

/// Answer of the resource owner to an authorization request.
pub enum OwnerConsent {
    /// The owner approved, possibly for fewer scopes than requested.
    Granted(Vec<Scope>),

    /// The owner turned the request down.
    Denied,

    /// The approval machinery failed, e.g. the session could not be read.
    Error,
}

/// Asks the resource owner whether a request should go through.
///
/// This is where login sessions, consent screens and remembered decisions
/// live, none of which this crate implements. The endpoint only relies on
/// the answer: the granted scope may be narrower than the requested one but
/// anything outside the client's registered bound is discarded.
pub trait OwnerApproval {
    /// Decide the request of `client` on behalf of `owner_id`.
    fn approve(
        &mut self, owner_id: &str, client: &Client, requested: &[Scope], now: Time,
    ) -> OwnerConsent;
}

/// Encapsulates a redirect to a valid redirect_uri with an error response.
///
/// The implementation makes it possible to alter the contained error, for
/// example to provide additional optional information. The error type should
/// not be altered by the frontend but the specificalities of this should be
/// enforced by the frontend instead.
#[derive(Clone, Debug)]
pub struct ErrorUrl {
    base_uri: Url,
    state: Option<String>,
    error: AuthorizationError,
    use_fragment: bool,
}

impl ErrorUrl {
    /// Construct a new error, already fixing the state parameter if it exists.
    pub fn new(url: Url, state: Option<&str>, error: AuthorizationError) -> ErrorUrl {
        ErrorUrl {
            base_uri: url,
            state: state.map(str::to_string),
            error,
            use_fragment: false,
        }
    }

    /// Encode the error into the fragment instead of the query component.
    ///
    /// This is the encoding the implicit flow requires; current flows all
    /// use the query form.
    pub fn with_fragment(mut self) -> Self {
        self.use_fragment = true;
        self
    }

    /// Get a handle to the description the client will receive.
    pub fn description(&mut self) -> &mut AuthorizationError {
        &mut self.error
    }

    /// Finalize the error url by saving its parameters in the redirect_uri.
    pub fn into_url(self) -> Url {
        let mut url = self.base_uri;
        let pairs = self
            .error
            .into_iter()
            .chain(self.state.map(|state| ("state", Cow::Owned(state))));

        if self.use_fragment {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            serializer.extend_pairs(pairs);
            url.set_fragment(Some(&serializer.finish()));
        } else {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        url
    }
}

impl From<ErrorUrl> for Url {
    fn from(error: ErrorUrl) -> Url {
        error.into_url()
    }
}

/// Byte-wise normal form of a `response_type` parameter.
///
/// OpenID Connect permits compound values such as `code id_token` whose
/// token order carries no meaning, so comparison has to be order
/// insensitive.
fn normalize_response_type(response_type: &str) -> String {
    let mut tokens: Vec<String> = response_type
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    tokens.sort();
    tokens.join(" ")
}

/// Process an authorization request on behalf of an authenticated resource owner.
///
/// The two-tier error handling is the load bearing part: until the client
/// and its redirect url are resolved against the registry, nothing may be
/// redirected and errors surface as [`EvilClientError`] for a local error
/// page. Afterwards every error is encoded into the validated redirect url
/// and returned as a regular `Ok` result for the frontend to redirect to,
/// exactly like a success response.
///
/// [`EvilClientError`]: ../error/enum.EvilClientError.html
pub fn authorization_request(
    handler: &mut dyn Endpoint, owner_id: &str, query: &dyn QueryParameter, now: Time,
) -> Result<Url, EvilClientError> {
    let client_id = match require(query, "client_id") {
        Ok(client_id) => client_id.into_owned(),
        Err(ParameterError::Missing) => {
            return Err(EvilClientError::invalid_client("missing client_id parameter"))
        }
        Err(ParameterError::Repeated) => {
            return Err(EvilClientError::invalid_client("repeated client_id parameter"))
        }
    };

    let client = match handler.registrar().client(&client_id) {
        Ok(Some(client)) => client,
        Ok(None) => return Err(EvilClientError::invalid_client("no such client")),
        Err(()) => return Err(EvilClientError::invalid_client("client registry unavailable")),
    };

    // The uri is matched verbatim against the registered entries, parsing
    // happens only after the match has pinned it to a trusted value.
    let requested_uri = match maybe(query, "redirect_uri") {
        Ok(uri) => uri.map(Cow::into_owned),
        Err(_) => return Err(EvilClientError::InvalidRedirectUri),
    };

    let bound_uri = match &requested_uri {
        Some(uri) if uri.contains('#') => return Err(EvilClientError::FragmentInUri),
        Some(uri) => match client
            .redirect_uris
            .iter()
            .find(|registered| registered.as_str() == uri)
        {
            Some(registered) => registered.to_url(),
            None => return Err(EvilClientError::InvalidRedirectUri),
        },
        None => match client.default_redirect_uri() {
            Some(registered) => registered.to_url(),
            None => return Err(EvilClientError::InvalidRedirectUri),
        },
    };

    // The state must be recovered before any client-visible error so the
    // client can correlate the response with its request. A repeated state
    // is the one error reported without echoing it.
    let state = match maybe(query, "state") {
        Ok(state) => state.map(Cow::into_owned),
        Err(_) => {
            let mut error = client_error(&bound_uri, None, AuthorizationErrorType::InvalidRequest);
            error.description().explain("repeated state parameter");
            return Ok(error.into_url());
        }
    };

    let response_type = match require(query, "response_type") {
        Ok(response_type) => response_type,
        Err(cause) => {
            let mut error = client_error(
                &bound_uri,
                state.as_deref(),
                AuthorizationErrorType::InvalidRequest,
            );
            error.description().explain(match cause {
                ParameterError::Missing => "missing response_type parameter",
                ParameterError::Repeated => "repeated response_type parameter",
            });
            return Ok(error.into_url());
        }
    };

    if normalize_response_type(&response_type) != "code" {
        let error = client_error(
            &bound_uri,
            state.as_deref(),
            AuthorizationErrorType::UnsupportedResponseType,
        );
        return Ok(error.into_url());
    }

    if !client.allows_grant(GrantType::AuthorizationCode) {
        let error = client_error(
            &bound_uri,
            state.as_deref(),
            AuthorizationErrorType::UnauthorizedClient,
        );
        return Ok(error.into_url());
    }

    let nonce = match maybe(query, "nonce") {
        Ok(nonce) => nonce.map(Cow::into_owned),
        Err(_) => {
            let mut error = client_error(
                &bound_uri,
                state.as_deref(),
                AuthorizationErrorType::InvalidRequest,
            );
            error.description().explain("repeated nonce parameter");
            return Ok(error.into_url());
        }
    };

    let requested_scope = match maybe(query, "scope") {
        Ok(None) => None,
        Ok(Some(raw)) => match parse_scope(&raw) {
            Ok(scope) => Some(scope),
            Err(err) => {
                let mut error = client_error(
                    &bound_uri,
                    state.as_deref(),
                    AuthorizationErrorType::InvalidScope,
                );
                error.description().explain(err.to_string());
                return Ok(error.into_url());
            }
        },
        Err(_) => {
            let mut error = client_error(
                &bound_uri,
                state.as_deref(),
                AuthorizationErrorType::InvalidRequest,
            );
            error.description().explain("repeated scope parameter");
            return Ok(error.into_url());
        }
    };

    let requested = match check_client_scope(&client, requested_scope.as_deref()) {
        Ok(scope) => scope,
        Err(err) => {
            let mut error = client_error(
                &bound_uri,
                state.as_deref(),
                AuthorizationErrorType::InvalidScope,
            );
            error.description().explain(err.to_string());
            return Ok(error.into_url());
        }
    };

    let granted = match handler.approval().approve(owner_id, &client, &requested, now) {
        OwnerConsent::Granted(mut granted) => {
            // The owner may narrow the request but never exceed the client bound.
            granted.retain(|scope| client.allowed_scope.contains(scope));
            granted
        }
        OwnerConsent::Denied => {
            let error = client_error(
                &bound_uri,
                state.as_deref(),
                AuthorizationErrorType::AccessDenied,
            );
            return Ok(error.into_url());
        }
        OwnerConsent::Error => {
            let error = client_error(
                &bound_uri,
                state.as_deref(),
                AuthorizationErrorType::ServerError,
            );
            return Ok(error.into_url());
        }
    };

    let authorization = Authorization {
        owner_id: owner_id.to_string(),
        client_id: client.client_id.clone(),
        issued_at: now,
        scope: granted.clone(),
        nonce,
        redirect_uri: requested_uri,
    };

    let code = match handler.authorizer().authorize(authorization) {
        Ok(code) => code,
        Err(()) => {
            let error = client_error(
                &bound_uri,
                state.as_deref(),
                AuthorizationErrorType::ServerError,
            );
            return Ok(error.into_url());
        }
    };

    debug!("issued authorization code to client {}", client.client_id);

    let mut url = bound_uri;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("code", &code);
        if let Some(state) = &state {
            pairs.append_pair("state", state);
        }
        // The client is notified whenever it got something different from
        // what it asked for.
        if !granted.is_empty() && requested_scope.as_ref() != Some(&granted) {
            pairs.append_pair("scope", &fmt_scope(&granted));
        }
    }

    Ok(url)
}

fn client_error(uri: &Url, state: Option<&str>, kind: AuthorizationErrorType) -> ErrorUrl {
    ErrorUrl::new(uri.clone(), state, AuthorizationError::new(kind))
}
