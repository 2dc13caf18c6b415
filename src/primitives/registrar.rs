//! Registrars administer a database of known clients.
//!
//! A registrar hands the protocol endpoints an immutable snapshot of a
//! registered client: its redirect urls, its allowed scopes, the grant types
//! it may use and the way it authenticates at the token endpoint. Checking
//! any of those against a concrete request is the job of the endpoints, the
//! registrar only answers lookups.
use std::collections::HashMap;
use std::fmt;
use std::iter::{Extend, FromIterator};
use std::rc::Rc;
use std::str;
use std::sync::Arc;

use url::{Url, ParseError as ParseUrlError};

use super::grant::GrantType;
use super::scope::{Scope, find_excess};

/// Registrars provide a way to look up clients.
///
/// In general, implementations of this trait will probably offer an interface
/// for registering new clients. This interface is not covered by this
/// library.
pub trait Registrar {
    /// Look up the client registered under `client_id`.
    ///
    /// `Ok(None)` means the registry was consulted and knows no such client,
    /// `Err(())` that the registry itself failed. The two cases are treated
    /// very differently by callers: the former is an attacker-visible
    /// protocol answer, the latter a server error.
    fn client(&self, client_id: &str) -> Result<Option<Client>, ()>;
}

/// A redirect url that must be matched exactly by the client.
///
/// Semantically these urls are all the same:
///
/// * `https://client.example/oauth2/redirect`
/// * `https://client.example/oauth2/redirect/`
/// * `https://client.example/oauth2/../oauth2/redirect/`
/// * `https://client.example:443/oauth2/redirect`
///
/// When the url is parsed then typically one canonical form is chosen by the
/// parsing library. When a string comparison is done then all others do not
/// match the expected value that was originally passed to the registration.
/// This type always stores the original string instead, comparison is done
/// character-by-character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExactUrl(String);

impl ExactUrl {
    /// Try to create an exact url from a string.
    ///
    /// The string still needs to form a valid url, only the comparison is
    /// literal.
    pub fn new(url: String) -> Result<Self, ParseUrlError> {
        let _: Url = url.parse()?;
        Ok(ExactUrl(url))
    }

    /// View the url as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Turn the url into a semantic `Url`.
    pub fn to_url(&self) -> Url {
        self.0.parse().expect("was validated")
    }
}

impl str::FromStr for ExactUrl {
    type Err = ParseUrlError;

    fn from_str(st: &str) -> Result<Self, Self::Err> {
        let _: Url = st.parse()?;
        Ok(ExactUrl(st.to_string()))
    }
}

impl fmt::Display for ExactUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a client proves its identity at the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    /// `client_secret_basic`: id and secret in the `Authorization` header.
    ClientSecretBasic,

    /// `client_secret_post`: id and secret as form parameters.
    ClientSecretPost,

    /// `client_secret_jwt`: a JWT assertion HMAC-signed with the secret.
    ClientSecretJwt,

    /// `private_key_jwt`: a JWT assertion signed with a registered key.
    PrivateKeyJwt,

    /// `none`: a public client without credentials.
    None,
}

impl AuthMethod {
    /// The registered metadata name of this method.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::ClientSecretBasic => "client_secret_basic",
            AuthMethod::ClientSecretPost => "client_secret_post",
            AuthMethod::ClientSecretJwt => "client_secret_jwt",
            AuthMethod::PrivateKeyJwt => "private_key_jwt",
            AuthMethod::None => "none",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered client and the policy bounds placed on it.
///
/// There are two types of clients, public and confidential. Public clients
/// operate without proof of identity while confidential clients hold a
/// secret the token endpoint verifies on every request. A snapshot of this
/// struct is all the endpoints ever see of the registry.
///
/// Two invariants tie the fields together and are checked on registration in
/// [`ClientMap`]: a client without a secret must use the `none`
/// authentication method, and `refresh_token` may only be authorized
/// together with a grant that can produce a refresh token in the first
/// place (`authorization_code` or `password`).
///
/// [`ClientMap`]: struct.ClientMap.html
#[derive(Clone, Debug)]
pub struct Client {
    /// The unique identifier of this client.
    pub client_id: String,

    /// The shared secret, absent for public clients.
    ///
    /// Stored verbatim: the token endpoint compares it in constant time and
    /// `client_secret_jwt` uses it as an HMAC key, both of which rule out
    /// one-way hashed storage.
    pub secret: Option<String>,

    /// The grant types this client may use.
    pub authorized_grant_types: Vec<GrantType>,

    /// The registered redirect urls, matched verbatim. The first entry is
    /// the default when a request names none.
    pub redirect_uris: Vec<ExactUrl>,

    /// Lifetime of issued access tokens, in seconds.
    pub access_token_validity: i64,

    /// Lifetime of issued refresh tokens, in seconds.
    pub refresh_token_validity: i64,

    /// The upper bound of every scope ever granted to this client.
    pub allowed_scope: Vec<Scope>,

    /// How the client authenticates at the token endpoint.
    pub auth_method: AuthMethod,

    /// Expected JWS `alg` for assertion authentication, if pinned.
    pub auth_alg: Option<String>,
}

impl Client {
    /// Create a public client without credentials.
    pub fn public(client_id: &str) -> Client {
        Client {
            client_id: client_id.to_string(),
            secret: None,
            authorized_grant_types: vec![GrantType::AuthorizationCode],
            redirect_uris: vec![],
            access_token_validity: 3600,
            refresh_token_validity: 3600 * 24,
            allowed_scope: vec![],
            auth_method: AuthMethod::None,
            auth_alg: None,
        }
    }

    /// Create a confidential client holding `secret`.
    pub fn confidential(client_id: &str, secret: &str, auth_method: AuthMethod) -> Client {
        Client {
            client_id: client_id.to_string(),
            secret: Some(secret.to_string()),
            authorized_grant_types: vec![GrantType::AuthorizationCode],
            redirect_uris: vec![],
            access_token_validity: 3600,
            refresh_token_validity: 3600 * 24,
            allowed_scope: vec![],
            auth_method,
            auth_alg: None,
        }
    }

    /// Replace the registered redirect urls.
    pub fn with_redirect_uris(mut self, uris: Vec<ExactUrl>) -> Self {
        self.redirect_uris = uris;
        self
    }

    /// Replace the authorized grant types.
    pub fn with_grant_types(mut self, grants: Vec<GrantType>) -> Self {
        self.authorized_grant_types = grants;
        self
    }

    /// Replace the allowed scope set.
    pub fn with_scope(mut self, scope: Vec<Scope>) -> Self {
        self.allowed_scope = scope;
        self
    }

    /// Pin the JWS algorithm expected in assertion authentication.
    pub fn with_auth_alg(mut self, alg: &str) -> Self {
        self.auth_alg = Some(alg.to_string());
        self
    }

    /// Set the token lifetimes, in seconds.
    pub fn with_token_validity(mut self, access: i64, refresh: i64) -> Self {
        self.access_token_validity = access;
        self.refresh_token_validity = refresh;
        self
    }

    /// Whether the client may use the given grant type.
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.authorized_grant_types.contains(&grant)
    }

    /// The redirect url used when a request names none.
    pub fn default_redirect_uri(&self) -> Option<&ExactUrl> {
        self.redirect_uris.first()
    }

    /// Whether the url appears in the registered list, compared verbatim.
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered.as_str() == uri)
    }

    fn invariants_hold(&self) -> bool {
        if self.secret.is_none() && self.auth_method != AuthMethod::None {
            return false;
        }
        if self.allows_grant(GrantType::RefreshToken)
            && !self.allows_grant(GrantType::AuthorizationCode)
            && !self.allows_grant(GrantType::ResourceOwner)
        {
            return false;
        }
        true
    }
}

/// The result of a scope negotiation, the scopes actually in effect.
///
/// Preserves the order of the request so responses can echo it.
pub type NegotiatedScope = Vec<Scope>;

/// A scope request exceeded what the policy permits.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeError {
    forbidden: Scope,
}

impl ScopeError {
    /// The first scope-token of the request that fell outside the bound.
    pub fn forbidden(&self) -> &Scope {
        &self.forbidden
    }
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Scope not allowed: {}", self.forbidden)
    }
}

/// Bound a scope request by the client's registered scope set.
///
/// An absent request defaults to everything the client is allowed; an
/// explicit request must be a subset of it and is returned in request order.
pub fn check_client_scope(
    client: &Client, requested: Option<&[Scope]>,
) -> Result<NegotiatedScope, ScopeError> {
    match requested {
        None => Ok(client.allowed_scope.clone()),
        Some(requested) => match find_excess(requested, &client.allowed_scope) {
            None => Ok(requested.to_vec()),
            Some(forbidden) => Err(ScopeError {
                forbidden: forbidden.clone(),
            }),
        },
    }
}

/// Bound a scope request by a previously granted scope set.
///
/// Used when exchanging a refresh token: the new scope may narrow the
/// original grant but never widen it. An absent request keeps the existing
/// scope.
pub fn check_requested_scope(
    existing: &[Scope], requested: Option<&[Scope]>,
) -> Result<NegotiatedScope, ScopeError> {
    match requested {
        None => Ok(existing.to_vec()),
        Some(requested) => match find_excess(requested, existing) {
            None => Ok(requested.to_vec()),
            Some(forbidden) => Err(ScopeError {
                forbidden: forbidden.clone(),
            }),
        },
    }
}

/// A very simple, in-memory hash map of client ids to client entries.
#[derive(Clone, Debug, Default)]
pub struct ClientMap {
    clients: HashMap<String, Client>,
}

impl ClientMap {
    /// Create an empty map without any clients in it.
    pub fn new() -> ClientMap {
        ClientMap::default()
    }

    /// Insert or update the client record.
    ///
    /// Rejects clients violating the registration invariants, see [`Client`].
    ///
    /// [`Client`]: struct.Client.html
    pub fn register_client(&mut self, client: Client) -> Result<(), RegistrationError> {
        if !client.invariants_hold() {
            return Err(RegistrationError {
                client_id: client.client_id,
            });
        }
        self.clients.insert(client.client_id.clone(), client);
        Ok(())
    }
}

/// A client could not be registered because its record is inconsistent.
#[derive(Clone, Debug)]
pub struct RegistrationError {
    client_id: String,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Inconsistent client registration: {}", self.client_id)
    }
}

impl std::error::Error for RegistrationError {}

impl Extend<Client> for ClientMap {
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = Client>,
    {
        iter.into_iter().for_each(|client| {
            let _ = self.register_client(client);
        })
    }
}

impl FromIterator<Client> for ClientMap {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Client>,
    {
        let mut into = ClientMap::new();
        into.extend(iter);
        into
    }
}

impl Registrar for ClientMap {
    fn client(&self, client_id: &str) -> Result<Option<Client>, ()> {
        Ok(self.clients.get(client_id).cloned())
    }
}

impl<'s, R: Registrar + ?Sized> Registrar for &'s R {
    fn client(&self, client_id: &str) -> Result<Option<Client>, ()> {
        (**self).client(client_id)
    }
}

impl<R: Registrar + ?Sized> Registrar for Box<R> {
    fn client(&self, client_id: &str) -> Result<Option<Client>, ()> {
        (**self).client(client_id)
    }
}

impl<R: Registrar + ?Sized> Registrar for Rc<R> {
    fn client(&self, client_id: &str) -> Result<Option<Client>, ()> {
        (**self).client(client_id)
    }
}

impl<R: Registrar + ?Sized> Registrar for Arc<R> {
    fn client(&self, client_id: &str) -> Result<Option<Client>, ()> {
        (**self).client(client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::scope::parse_scope;

    #[test]
    fn exact_url_is_literal() {
        let registered: ExactUrl = "http://example.com/cb".parse().unwrap();
        assert_eq!(registered.as_str(), "http://example.com/cb");
        // Semantically equal urls do not match verbatim.
        assert_ne!(registered.as_str(), "http://example.com:80/cb");
        assert!("not a url".parse::<ExactUrl>().is_err());
    }

    #[test]
    fn lookup() {
        let mut map = ClientMap::new();
        map.register_client(Client::public("app")).unwrap();

        assert!(map.client("app").unwrap().is_some());
        assert!(map.client("nope").unwrap().is_none());
    }

    #[test]
    fn rejects_secretless_confidential() {
        let mut client = Client::public("app");
        client.auth_method = AuthMethod::ClientSecretBasic;

        let mut map = ClientMap::new();
        assert!(map.register_client(client).is_err());
    }

    #[test]
    fn rejects_standalone_refresh_grant() {
        let client = Client::confidential("app", "secret", AuthMethod::ClientSecretBasic)
            .with_grant_types(vec![GrantType::RefreshToken]);

        let mut map = ClientMap::new();
        assert!(map.register_client(client).is_err());

        let client = Client::confidential("app", "secret", AuthMethod::ClientSecretBasic)
            .with_grant_types(vec![GrantType::AuthorizationCode, GrantType::RefreshToken]);
        assert!(map.register_client(client).is_ok());
    }

    #[test]
    fn client_scope_check() {
        let client =
            Client::public("app").with_scope(parse_scope("openid email profile").unwrap());

        let narrowed = check_client_scope(&client, Some(&parse_scope("email openid").unwrap()[..]));
        assert_eq!(narrowed, Ok(parse_scope("email openid").unwrap()));

        let defaulted = check_client_scope(&client, None).unwrap();
        assert_eq!(defaulted, client.allowed_scope);

        let excess = check_client_scope(&client, Some(&parse_scope("email admin").unwrap()[..]));
        assert_eq!(
            excess.unwrap_err().forbidden(),
            &Scope::Custom("admin".to_string())
        );
    }

    #[test]
    fn requested_scope_check() {
        let existing = parse_scope("read write").unwrap();

        let kept = check_requested_scope(&existing, None).unwrap();
        assert_eq!(kept, existing);

        let narrowed =
            check_requested_scope(&existing, Some(&parse_scope("write").unwrap()[..])).unwrap();
        assert_eq!(narrowed, parse_scope("write").unwrap());

        assert!(check_requested_scope(&existing, Some(&parse_scope("admin").unwrap()[..])).is_err());
    }
}
