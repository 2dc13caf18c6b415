//! Defines the Scope type and parsing/formatting according to the rfc.
use std::{fmt, str};

use serde::{Deserialize, Serialize};

/// A single named capability a client may request.
///
/// `openid` is not just another name: its presence on a grant switches the
/// token endpoint into OpenID Connect mode and an ID token is minted next to
/// the access token. All other names are opaque to this crate and only
/// compared for equality against a client's registered scope set.
///
/// Scope-tokens are restricted to the following subset of ascii:
///   - The character '!'
///   - The character range '\x23' to '\x5b' which includes numbers and upper case letters
///   - The character range '\x5d' to '\x7e' which includes lower case letters
///
/// In particular, the characters '\x22' (`"`) and '\x5c' (`\`) are not allowed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The OpenID Connect marker scope, `openid` on the wire.
    OpenId,

    /// Any other scope-token.
    Custom(String),
}

/// The wire representation of the [`Scope::OpenId`] marker.
///
/// [`Scope::OpenId`]: enum.Scope.html
pub const OPENID: &str = "openid";

impl Scope {
    fn invalid_scope_char(ch: char) -> bool {
        match ch {
            '\x21' => false,
            ch if ('\x23'..='\x5b').contains(&ch) => false,
            ch if ('\x5d'..='\x7e').contains(&ch) => false,
            _ => true,
        }
    }

    /// View the scope-token as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Scope::OpenId => OPENID,
            Scope::Custom(name) => name,
        }
    }
}

/// Error returned from parsing a scope as encoded in an authorization request.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseScopeErr {
    /// A character was encountered which is not allowed to appear in scope strings.
    InvalidCharacter(char),

    /// The input contained no scope-token at all.
    Empty,
}

impl str::FromStr for Scope {
    type Err = ParseScopeErr;

    fn from_str(string: &str) -> Result<Scope, ParseScopeErr> {
        if string.is_empty() {
            return Err(ParseScopeErr::Empty);
        }
        if let Some(ch) = string.chars().find(|&ch| Scope::invalid_scope_char(ch)) {
            return Err(ParseScopeErr::InvalidCharacter(ch));
        }
        if string == OPENID {
            Ok(Scope::OpenId)
        } else {
            Ok(Scope::Custom(string.to_string()))
        }
    }
}

/// Parse a space-delimited scope string into the scope-tokens it lists.
///
/// Order is preserved, the response to a client must echo scopes in request
/// order. Repeated separators are ignored, an all-whitespace input parses to
/// the empty list.
pub fn parse_scope(string: &str) -> Result<Vec<Scope>, ParseScopeErr> {
    string
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}

/// Format a scope list back into its space-delimited wire form.
pub fn fmt_scope(scope: &[Scope]) -> String {
    scope
        .iter()
        .map(Scope::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Test whether every scope-token of `requested` also appears in `within`.
///
/// Returns the first offending scope-token otherwise. The comparison ignores
/// order and duplicates, only membership counts.
pub fn find_excess<'a>(requested: &'a [Scope], within: &[Scope]) -> Option<&'a Scope> {
    requested.iter().find(|scope| !within.contains(scope))
}

impl fmt::Display for ParseScopeErr {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            ParseScopeErr::InvalidCharacter(chr) => {
                write!(fmt, "Encountered invalid character in scope: {}", chr)
            }
            ParseScopeErr::Empty => write!(fmt, "Scope-token must not be empty"),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_tuple("Scope").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let string: String = Deserialize::deserialize(deserializer)?;
        str::FromStr::from_str(&string).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single() {
        assert_eq!("openid".parse::<Scope>(), Ok(Scope::OpenId));
        assert_eq!("email".parse::<Scope>(), Ok(Scope::Custom("email".to_string())));
        // `openid` is case sensitive on the wire.
        assert_eq!(
            "OpenID".parse::<Scope>(),
            Ok(Scope::Custom("OpenID".to_string()))
        );
    }

    #[test]
    fn reject_invalid_characters() {
        assert_eq!(
            "with\"quote".parse::<Scope>(),
            Err(ParseScopeErr::InvalidCharacter('"'))
        );
        assert_eq!(
            "back\\slash".parse::<Scope>(),
            Err(ParseScopeErr::InvalidCharacter('\\'))
        );
        assert_eq!("".parse::<Scope>(), Err(ParseScopeErr::Empty));
    }

    #[test]
    fn list_preserves_order() {
        let parsed = parse_scope("email  openid profile").unwrap();
        assert_eq!(
            parsed,
            vec![
                Scope::Custom("email".to_string()),
                Scope::OpenId,
                Scope::Custom("profile".to_string()),
            ]
        );
        assert_eq!(fmt_scope(&parsed), "email openid profile");
    }

    #[test]
    fn empty_list() {
        assert_eq!(parse_scope("   "), Ok(vec![]));
        assert_eq!(fmt_scope(&[]), "");
    }

    #[test]
    fn excess_detection() {
        let allowed = parse_scope("openid email").unwrap();
        let fitting = parse_scope("email openid").unwrap();
        let excessive = parse_scope("email admin").unwrap();

        assert_eq!(find_excess(&fitting, &allowed), None);
        assert_eq!(
            find_excess(&excessive, &allowed),
            Some(&Scope::Custom("admin".to_string()))
        );
        assert_eq!(find_excess(&[], &allowed), None);
    }

    #[test]
    fn roundtrip_serialization_scope() {
        let scope = "openid".parse::<Scope>().unwrap();
        let serialized = rmp_serde::to_vec(&scope).unwrap();
        let deserialized = rmp_serde::from_slice::<Scope>(&serialized).unwrap();
        assert_eq!(scope, deserialized);
    }
}
