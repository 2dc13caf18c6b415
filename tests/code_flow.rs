//! End-to-end walk through the authorization code flow against the public api.
use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use url::Url;

use portcullis::code_grant::accesstoken::{self, access_token, OwnerAuthenticator};
use portcullis::code_grant::authorization::{
    self, authorization_request, OwnerApproval, OwnerConsent,
};
use portcullis::endpoint::QueryParameter;
use portcullis::primitives::Time;
use portcullis::primitives::prelude::*;
use portcullis::primitives::registrar::AuthMethod;
use portcullis::primitives::scope::parse_scope;

struct Approve;

impl OwnerApproval for Approve {
    fn approve(&mut self, _: &str, _: &Client, requested: &[Scope], _: Time) -> OwnerConsent {
        OwnerConsent::Granted(requested.to_vec())
    }
}

struct NoOwners;

impl OwnerAuthenticator for NoOwners {
    fn authenticate(&mut self, _: &str, _: &str) -> Result<Option<String>, ()> {
        Ok(None)
    }
}

struct Server {
    registrar: ClientMap,
    authorizer: AuthMap<RandomGenerator>,
    issuer: TokenSigner<RandomGenerator>,
    approval: Approve,
    owners: NoOwners,
}

impl Server {
    fn new() -> Self {
        let client = Client::confidential("app", "appsecret", AuthMethod::ClientSecretBasic)
            .with_redirect_uris(vec![
                "http://app2".parse().unwrap(),
                "http://app".parse().unwrap(),
            ])
            .with_grant_types(vec![GrantType::AuthorizationCode, GrantType::RefreshToken])
            .with_scope(parse_scope("openid account").unwrap())
            .with_token_validity(3600, 86400);

        let mut registrar = ClientMap::new();
        registrar.register_client(client).unwrap();

        Server {
            registrar,
            authorizer: AuthMap::new(RandomGenerator::new(8)),
            issuer: TokenSigner::ephemeral("https://issuer.example", RandomGenerator::new(16)),
            approval: Approve,
            owners: NoOwners,
        }
    }
}

impl authorization::Endpoint for Server {
    fn registrar(&self) -> &dyn Registrar {
        &self.registrar
    }

    fn authorizer(&mut self) -> &mut dyn Authorizer {
        &mut self.authorizer
    }

    fn approval(&mut self) -> &mut dyn OwnerApproval {
        &mut self.approval
    }
}

impl accesstoken::Endpoint for Server {
    fn registrar(&self) -> &dyn Registrar {
        &self.registrar
    }

    fn authorizer(&mut self) -> &mut dyn Authorizer {
        &mut self.authorizer
    }

    fn issuer(&mut self) -> &mut dyn Issuer {
        &mut self.issuer
    }

    fn owner_authenticator(&mut self) -> &mut dyn OwnerAuthenticator {
        &mut self.owners
    }
}

struct TokenRequest {
    body: HashMap<String, Vec<String>>,
    auth: Option<String>,
}

impl accesstoken::Request for TokenRequest {
    fn valid(&self) -> bool {
        true
    }

    fn authorization_header(&self) -> Option<Cow<str>> {
        self.auth.as_deref().map(Cow::Borrowed)
    }

    fn body(&self) -> &dyn QueryParameter {
        &self.body
    }
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in pairs {
        map.entry(key.to_string()).or_default().push(value.to_string());
    }
    map
}

fn now() -> Time {
    Utc.timestamp_opt(1_400_000_000, 0).unwrap()
}

#[test]
fn authorization_code_round_trip() {
    let mut server = Server::new();

    // The resource owner approves the request in their user agent.
    let query = params(&[
        ("client_id", "app"),
        ("response_type", "code"),
        ("state", "xyz"),
        ("redirect_uri", "http://app"),
        ("scope", "openid account"),
        ("nonce", "n-0S6_WzA2Mj"),
    ]);
    let redirect: Url = authorization_request(&mut server, "isabella", &query, now()).unwrap();

    assert!(redirect.as_str().starts_with("http://app"));
    let pairs: HashMap<_, _> = redirect.query_pairs().collect();
    assert_eq!(pairs.get("state").map(|s| s.as_ref()), Some("xyz"));
    let code = pairs.get("code").expect("Missing authorization code").to_string();

    // The client exchanges the code within its validity window.
    let request = TokenRequest {
        body: params(&[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", "http://app"),
        ]),
        auth: Some(format!("Basic {}", base64::encode("app:appsecret"))),
    };
    let token = access_token(&mut server, &request, now() + chrono::Duration::seconds(60))
        .expect("Exchange of a fresh code must succeed");

    let body: serde_json::Value = serde_json::from_str(&token.to_json()).unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 3600);
    assert_eq!(body["scope"], "openid account");
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert!(body["id_token"].is_string());

    // The very same code is worthless from here on.
    let replay = access_token(&mut server, &request, now() + chrono::Duration::seconds(61));
    match replay {
        Err(accesstoken::Error::Invalid(description)) => {
            let encoded: HashMap<String, String> =
                serde_json::from_str(&description.to_json()).unwrap();
            assert_eq!(encoded.get("error").map(String::as_str), Some("invalid_grant"));
        }
        _ => panic!("A code must be redeemable exactly once"),
    }

    // The refresh token obtained in the exchange keeps working instead.
    let refresh = body["refresh_token"].as_str().unwrap().to_string();
    let request = TokenRequest {
        body: params(&[("grant_type", "refresh_token"), ("refresh_token", &refresh)]),
        auth: Some(format!("Basic {}", base64::encode("app:appsecret"))),
    };
    let refreshed = access_token(&mut server, &request, now() + chrono::Duration::seconds(7200))
        .expect("Refreshing with a live token must succeed");
    assert_eq!(refreshed.scope(), token.scope());
}

#[test]
fn wrong_basic_secret_asks_for_authentication() {
    let mut server = Server::new();
    let request = TokenRequest {
        body: params(&[("grant_type", "authorization_code"), ("code", "anything")]),
        auth: Some(format!("Basic {}", base64::encode("app:wrong"))),
    };

    match access_token(&mut server, &request, now()) {
        Err(accesstoken::Error::Unauthorized(description, scheme)) => {
            assert_eq!(scheme, "Basic");
            let encoded: HashMap<String, String> =
                serde_json::from_str(&description.to_json()).unwrap();
            assert_eq!(encoded.get("error").map(String::as_str), Some("invalid_client"));
        }
        _ => panic!("Wrong header credentials must yield a 401 with a challenge"),
    }
}
