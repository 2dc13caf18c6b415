//! Authorizers are needed to exchange authorization codes for bearer tokens.
//!
//! The role of an authorizer is to ensure the consistency and security of
//! requests in which a client is willing to trade an authorization code for a
//! bearer token. It first persists records according to parameters approved
//! by the resource owner, then surrenders each record at most once when the
//! client side presents the code.
use std::collections::HashMap;
use std::sync::{MutexGuard, RwLockWriteGuard};

use super::grant::Authorization;
use super::generator::CodeGenerator;

/// Authorizers create and manage authorization codes.
///
/// The authorization code can be traded for a bearer token at the token
/// endpoint.
pub trait Authorizer {
    /// Persist the record under a fresh code and return that code.
    fn authorize(&mut self, grant: Authorization) -> Result<String, ()>;

    /// Retrieve the record associated with a code, invalidating the code in
    /// the process. In particular, a code must not be usable twice (there is
    /// no stateless implementation of an authorizer for this reason).
    fn extract(&mut self, code: &str) -> Result<Option<Authorization>, ()>;
}

/// An in-memory hash map.
///
/// This authorizer saves a mapping of generated codes to their associated
/// records. The generator is itself trait based and can be chosen during
/// construction. It is assumed to not be possible for two different records
/// to generate the same code.
pub struct AuthMap<G: CodeGenerator = Box<dyn CodeGenerator + Send + Sync + 'static>> {
    generator: G,
    codes: HashMap<String, Authorization>,
}

impl<G: CodeGenerator> AuthMap<G> {
    /// Create an authorizer whose codes come from the `generator`.
    ///
    /// The code map is initially empty and is filled by the methods provided
    /// in its [`Authorizer`] implementation.
    ///
    /// [`Authorizer`]: trait.Authorizer.html
    pub fn new(generator: G) -> Self {
        AuthMap {
            generator,
            codes: HashMap::new(),
        }
    }
}

impl<'a, A: Authorizer + ?Sized> Authorizer for &'a mut A {
    fn authorize(&mut self, grant: Authorization) -> Result<String, ()> {
        (**self).authorize(grant)
    }

    fn extract(&mut self, code: &str) -> Result<Option<Authorization>, ()> {
        (**self).extract(code)
    }
}

impl<A: Authorizer + ?Sized> Authorizer for Box<A> {
    fn authorize(&mut self, grant: Authorization) -> Result<String, ()> {
        (**self).authorize(grant)
    }

    fn extract(&mut self, code: &str) -> Result<Option<Authorization>, ()> {
        (**self).extract(code)
    }
}

impl<'a, A: Authorizer + ?Sized> Authorizer for MutexGuard<'a, A> {
    fn authorize(&mut self, grant: Authorization) -> Result<String, ()> {
        (**self).authorize(grant)
    }

    fn extract(&mut self, code: &str) -> Result<Option<Authorization>, ()> {
        (**self).extract(code)
    }
}

impl<'a, A: Authorizer + ?Sized> Authorizer for RwLockWriteGuard<'a, A> {
    fn authorize(&mut self, grant: Authorization) -> Result<String, ()> {
        (**self).authorize(grant)
    }

    fn extract(&mut self, code: &str) -> Result<Option<Authorization>, ()> {
        (**self).extract(code)
    }
}

impl<G: CodeGenerator> Authorizer for AuthMap<G> {
    fn authorize(&mut self, grant: Authorization) -> Result<String, ()> {
        let code = self.generator.generate()?;
        self.codes.insert(code.clone(), grant);
        Ok(code)
    }

    fn extract(&mut self, code: &str) -> Result<Option<Authorization>, ()> {
        Ok(self.codes.remove(code))
    }
}

#[cfg(test)]
/// Tests for authorizer implementations, including those provided here.
pub mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::primitives::generator::RandomGenerator;
    use crate::primitives::scope::parse_scope;

    /// Tests some invariants that should be upheld by all authorizers.
    ///
    /// Custom implementations may want to import and use this in their own
    /// tests.
    pub fn simple_test_suite(authorizer: &mut dyn Authorizer) {
        let grant = Authorization {
            owner_id: "Owner".to_string(),
            client_id: "Client".to_string(),
            issued_at: Utc.timestamp_opt(1_400_000_000, 0).unwrap(),
            scope: parse_scope("one two three").unwrap(),
            nonce: Some("n-0S6_WzA2Mj".to_string()),
            redirect_uri: Some("https://example.com/redirect_me".to_string()),
        };

        let code = authorizer
            .authorize(grant.clone())
            .expect("Authorization should not fail here");
        let recovered_grant = authorizer
            .extract(&code)
            .expect("Primitive failed extracting grant")
            .expect("Could not extract grant for valid code");

        if grant != recovered_grant {
            panic!("Grant was not stored correctly");
        }

        if authorizer.extract(&code).unwrap().is_some() {
            panic!("Code must only be usable once");
        }

        // Authorize the same grant again.
        let code_again = authorizer
            .authorize(grant)
            .expect("Authorization should not fail here");
        // We don't produce the same code twice.
        assert_ne!(code, code_again);
    }

    #[test]
    fn random_test_suite() {
        let mut storage = AuthMap::new(RandomGenerator::new(16));
        simple_test_suite(&mut storage);
    }

    #[test]
    #[should_panic]
    fn bad_generator() {
        struct BadGenerator;

        impl CodeGenerator for BadGenerator {
            fn generate(&mut self) -> Result<String, ()> {
                Ok("YOLO.HowBadCanItBeToRepeatTokens?".into())
            }
        }

        let mut storage = AuthMap::new(BadGenerator);
        simple_test_suite(&mut storage);
    }
}
