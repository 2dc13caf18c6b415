//! Generators produce the opaque strings used as authorization codes and
//! access tokens.
//!
//! A generated string carries no meaning of its own, all state lives in the
//! store that maps it back to a grant. The security of the scheme rests
//! entirely on the entropy of the generator: outputs must be unguessable and
//! must not repeat within the lifetime of any stored grant.
use std::rc::Rc;
use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};

/// Generic source of opaque, url-safe code strings.
///
/// The interface is reused for authorization codes and bearer tokens.
///
/// ## Requirements on implementations
///
/// When queried repeatedly, outputs must be indistinguishable from a random
/// function with at least 64 bits of entropy. Anything below that makes
/// codes guessable within their validity window.
pub trait CodeGenerator {
    /// Produce a fresh code string.
    fn generate(&mut self) -> Result<String, ()>;
}

/// Generates codes from random bytes, hex encoded.
///
/// Each byte is chosen by the operating system generator. This generator
/// will always succeed.
pub struct RandomGenerator {
    random: OsRng,
    len: usize,
}

impl RandomGenerator {
    /// Generates codes with a specific byte length.
    ///
    /// The hex encoded output is twice as many characters. Eight bytes are
    /// the accepted minimum.
    pub fn new(length: usize) -> RandomGenerator {
        assert!(length >= 8, "Generated codes require at least 64 bits of entropy");
        RandomGenerator {
            random: OsRng,
            len: length,
        }
    }

    fn new_code(&self) -> String {
        let mut result = vec![0; self.len];
        let mut rnd = self.random;
        rnd.try_fill_bytes(result.as_mut_slice())
            .expect("Failed to generate random code");
        hex::encode(&result)
    }
}

impl<'a, T: CodeGenerator + ?Sized + 'a> CodeGenerator for Box<T> {
    fn generate(&mut self) -> Result<String, ()> {
        (**self).generate()
    }
}

impl<'a, T: CodeGenerator + ?Sized + 'a> CodeGenerator for &'a mut T {
    fn generate(&mut self) -> Result<String, ()> {
        (**self).generate()
    }
}

impl CodeGenerator for RandomGenerator {
    fn generate(&mut self) -> Result<String, ()> {
        Ok(self.new_code())
    }
}

impl<'a> CodeGenerator for &'a RandomGenerator {
    fn generate(&mut self) -> Result<String, ()> {
        Ok(self.new_code())
    }
}

impl CodeGenerator for Rc<RandomGenerator> {
    fn generate(&mut self) -> Result<String, ()> {
        Ok(self.new_code())
    }
}

impl CodeGenerator for Arc<RandomGenerator> {
    fn generate(&mut self) -> Result<String, ()> {
        Ok(self.new_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_output_shape() {
        let mut generator = RandomGenerator::new(8);
        let code = generator.generate().unwrap();
        assert_eq!(code.len(), 16);
        assert!(code.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_outputs() {
        let mut generator = RandomGenerator::new(8);
        let one = generator.generate().unwrap();
        let two = generator.generate().unwrap();
        assert_ne!(one, two);
    }

    #[test]
    #[should_panic]
    fn too_little_entropy() {
        let _ = RandomGenerator::new(4);
    }

    #[test]
    fn assert_send_sync_static() {
        fn uses<T: Send + Sync + 'static>(_: T) {}
        uses(RandomGenerator::new(16));
    }
}
