//! Test benches for the two protocol endpoints.
//!
//! Everything runs against in-memory primitives and a pinned clock, so each
//! case is a deterministic function of its crafted request.
use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{TimeZone, Utc};

use crate::code_grant::accesstoken::{self, OwnerAuthenticator};
use crate::code_grant::authorization as authorization_mod;
use crate::code_grant::authorization::{OwnerApproval, OwnerConsent};
use crate::endpoint::query::QueryParameter;
use crate::primitives::Time;
use crate::primitives::authorizer::{AuthMap, Authorizer};
use crate::primitives::generator::RandomGenerator;
use crate::primitives::issuer::{Issuer, TokenSigner};
use crate::primitives::registrar::{Client, ClientMap, Registrar};
use crate::primitives::scope::Scope;


/// The pinned instant all test requests happen at.
fn now() -> Time {
    Utc.timestamp_opt(1_400_000_000, 0).unwrap()
}

/// Scripted stand-in for the consent machinery.
enum Approval {
    /// Approve exactly what was asked for.
    AllRequested,

    /// Approve a fixed scope regardless of the request.
    Narrowed(Vec<Scope>),

    /// Turn every request down.
    Deny,

    /// Fail as a broken session store would.
    Broken,
}

impl OwnerApproval for Approval {
    fn approve(
        &mut self, _: &str, _: &Client, requested: &[Scope], _: Time,
    ) -> OwnerConsent {
        match self {
            Approval::AllRequested => OwnerConsent::Granted(requested.to_vec()),
            Approval::Narrowed(scope) => OwnerConsent::Granted(scope.clone()),
            Approval::Deny => OwnerConsent::Denied,
            Approval::Broken => OwnerConsent::Error,
        }
    }
}

/// Owner credential verification from a fixed user table.
#[derive(Default)]
struct PasswordMap {
    users: HashMap<String, String>,
}

impl PasswordMap {
    fn with_user(mut self, username: &str, password: &str) -> Self {
        self.users.insert(username.to_string(), password.to_string());
        self
    }
}

impl OwnerAuthenticator for PasswordMap {
    fn authenticate(
        &mut self, username: &str, password: &str,
    ) -> Result<Option<String>, ()> {
        Ok(self
            .users
            .get(username)
            .filter(|expected| expected.as_str() == password)
            .map(|_| username.to_string()))
    }
}

/// One backend serving both endpoints, the way a deployment would.
struct TestBackend {
    registrar: ClientMap,
    authorizer: AuthMap<RandomGenerator>,
    issuer: TokenSigner<RandomGenerator>,
    approval: Approval,
    owners: PasswordMap,
}

impl TestBackend {
    fn new(clients: Vec<Client>) -> Self {
        let mut registrar = ClientMap::new();
        for client in clients {
            registrar.register_client(client).expect("Test client is consistent");
        }

        TestBackend {
            registrar,
            authorizer: AuthMap::new(RandomGenerator::new(8)),
            issuer: TokenSigner::ephemeral("https://issuer.example", RandomGenerator::new(16)),
            approval: Approval::AllRequested,
            owners: PasswordMap::default(),
        }
    }

    fn with_approval(mut self, approval: Approval) -> Self {
        self.approval = approval;
        self
    }

    fn with_owners(mut self, owners: PasswordMap) -> Self {
        self.owners = owners;
        self
    }
}

impl authorization_mod::Endpoint for TestBackend {
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

impl accesstoken::Endpoint for TestBackend {
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

/// Open and simple implementation of a token request.
#[derive(Clone, Debug, Default)]
struct CraftedRequest {
    /// The key-value pairs of an `x-www-form-urlencoded` body.
    body: HashMap<String, Vec<String>>,

    /// Provided authorization header.
    auth: Option<String>,
}

impl accesstoken::Request for CraftedRequest {
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

/// Build a parameter multimap, repeated keys accumulate.
fn params(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in pairs {
        map.entry(key.to_string()).or_default().push(value.to_string());
    }
    map
}

fn basic_header(client_id: &str, passphrase: &str) -> String {
    format!(
        "Basic {}",
        base64::encode(format!("{}:{}", client_id, passphrase))
    )
}
