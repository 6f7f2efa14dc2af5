use anyhow::{Context, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

pub const TOKEN_TTL_DAYS: i64 = 7;

/// HS256 key pair derived from the server secret.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(keys: &JwtKeys, user_id: i64) -> Result<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        user_id,
        iat: now.timestamp(),
        exp: (now + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };
    encode(&Header::default(), &claims, &keys.encoding).context("Failed to sign token")
}

/// `None` for anything other than a valid, unexpired token.
pub fn decode_token(keys: &JwtKeys, token: &str) -> Option<Claims> {
    decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map(|data| data.claims)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let keys = JwtKeys::new(b"test-secret");
        let token = issue_token(&keys, 42).unwrap();

        let claims = decode_token(&keys, &token).unwrap();
        assert_eq!(claims.user_id, 42);
        // sub mirrors the id; no other identity leaks into the token
        assert_eq!(claims.sub, "42");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let keys = JwtKeys::new(b"test-secret");
        let token = issue_token(&keys, 42).unwrap();

        let other = JwtKeys::new(b"other-secret");
        assert!(decode_token(&other, &token).is_none());
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = JwtKeys::new(b"test-secret");
        assert!(decode_token(&keys, "not-a-token").is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = JwtKeys::new(b"test-secret");
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "42".to_string(),
            user_id: 42,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(decode_token(&keys, &token).is_none());
    }
}
