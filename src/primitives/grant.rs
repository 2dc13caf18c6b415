//! Encapsulates the records behind authorization codes and refresh tokens.
use std::{fmt, str};

use serde::{Deserialize, Serialize};

use super::Time;
use super::scope::Scope;

/// The protocol by which a client obtains its tokens.
///
/// Clients are registered with the subset of these they may use. The wire
/// representation is the `grant_type` parameter of the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantType {
    /// The authorization code flow, `authorization_code`.
    AuthorizationCode,

    /// The implicit flow, `implicit`. Recognized but not serviced.
    Implicit,

    /// The resource owner password credentials flow, `password`.
    ResourceOwner,

    /// The client credentials flow, `client_credentials`.
    ClientCredentials,

    /// Exchange of a refresh token, `refresh_token`.
    RefreshToken,
}

impl GrantType {
    /// The `grant_type` parameter value identifying this grant.
    pub fn as_str(self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::Implicit => "implicit",
            GrantType::ResourceOwner => "password",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

/// Error returned when a `grant_type` parameter names no known grant.
#[derive(Clone, Debug, PartialEq)]
pub struct UnknownGrantType;

impl str::FromStr for GrantType {
    type Err = UnknownGrantType;

    fn from_str(string: &str) -> Result<GrantType, UnknownGrantType> {
        match string {
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "implicit" => Ok(GrantType::Implicit),
            "password" => Ok(GrantType::ResourceOwner),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            "refresh_token" => Ok(GrantType::RefreshToken),
            _ => Err(UnknownGrantType),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record persisted behind an authorization code.
///
/// Created by the authorization endpoint when the resource owner approves a
/// request, recovered exactly once by the token endpoint. Everything the code
/// exchange needs to re-validate the original request is kept verbatim, in
/// particular the `redirect_uri` exactly as the client sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    /// Identifies the resource owner that approved the request.
    pub owner_id: String,

    /// Identifies the client to which the code was issued.
    pub client_id: String,

    /// When the code was minted (Utc). The code expires a fixed interval
    /// after this instant.
    pub issued_at: Time,

    /// The scope granted by the resource owner, possibly empty.
    pub scope: Vec<Scope>,

    /// The OpenID Connect nonce of the request, if one was sent.
    pub nonce: Option<String>,

    /// The `redirect_uri` parameter of the authorization request, if one was
    /// sent. The token endpoint requires the exchange to repeat it verbatim.
    pub redirect_uri: Option<String>,
}

/// The grant embedded in a refresh token.
///
/// This can be stored in a database or serialized into a self-encoded token
/// without worrying about lifetimes or shared state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// The resource owner behind the grant. Absent for grants obtained via
    /// client credentials, where the client acts on its own behalf.
    pub owner_id: Option<String>,

    /// Identifies the client to which the grant was issued.
    pub client_id: String,

    /// The flow through which the grant was originally obtained.
    pub grant_type: GrantType,

    /// The scope attached to the grant.
    pub scope: Vec<Scope>,

    /// Expiration date of the grant (Utc).
    pub until: Time,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn grant_type_wire_names() {
        for &grant in &[
            GrantType::AuthorizationCode,
            GrantType::Implicit,
            GrantType::ResourceOwner,
            GrantType::ClientCredentials,
            GrantType::RefreshToken,
        ] {
            assert_eq!(grant.as_str().parse::<GrantType>(), Ok(grant));
        }
        assert_eq!("token".parse::<GrantType>(), Err(UnknownGrantType));
        // Wire names are lowercase only.
        assert_eq!("Password".parse::<GrantType>(), Err(UnknownGrantType));
    }

    #[test]
    fn roundtrip_serialization_access_grant() {
        let grant = AccessGrant {
            owner_id: Some("Owner".to_string()),
            client_id: "Client".to_string(),
            grant_type: GrantType::AuthorizationCode,
            scope: vec![Scope::OpenId, Scope::Custom("email".to_string())],
            until: Utc.timestamp_opt(1_400_000_000, 0).unwrap(),
        };

        let serialized = rmp_serde::to_vec(&grant).unwrap();
        let deserialized = rmp_serde::from_slice::<AccessGrant>(&serialized).unwrap();
        assert_eq!(grant, deserialized);
    }
}
