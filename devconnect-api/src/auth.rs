use anyhow::Context;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::{Error, UserId};

/// Validity of tokens minted without an explicit lifetime, in seconds
pub const DEFAULT_TOKEN_TTL: i64 = 3600;

/// Identity recovered from a bearer token
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Claims {
    pub id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Expiration, in seconds since the epoch
    pub exp: i64,
}

impl Claims {
    pub fn new(id: UserId, ttl_secs: i64) -> Claims {
        Claims {
            id,
            name: None,
            avatar: None,
            exp: chrono::Utc::now().timestamp() + ttl_secs,
        }
    }
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKeys(<redacted>)")
    }
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> TokenKeys {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, claims: &Claims) -> anyhow::Result<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .with_context(|| format!("signing token for user {}", claims.id))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        let validation = Validation::new(Algorithm::HS256);
        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => {
                tracing::debug!(?err, "rejecting bearer token");
                Err(Error::Unauthorized)
            }
        }
    }
}
