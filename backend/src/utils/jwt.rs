use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AuthError, types::UserId};

/// The only algorithm access tokens are signed or accepted with.
pub const ACCESS_TOKEN_ALGORITHM: Algorithm = Algorithm::HS512;

/// Number of random bytes in a refresh secret.
pub const REFRESH_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,    // expiration time
    pub iat: i64,    // issued at
    pub jti: String, // JWT ID
}

impl Claims {
    pub fn new(user_id: UserId, ttl: Duration) -> Self {
        let now = Utc::now();
        let exp = now + ttl;

        Self {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidAccessToken)
    }
}

/// Outcome of checking an access token's signature and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenStatus {
    Valid(Claims),
    /// Signature checks out but `exp` has passed. Refresh still needs the subject.
    ExpiredButAuthentic(Claims),
    Invalid,
}

/// Mints and validates access tokens and generates refresh secrets.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue_access_token(&self, user_id: UserId) -> anyhow::Result<String> {
        let claims = Claims::new(user_id, self.access_ttl);
        let token = encode(
            &Header::new(ACCESS_TOKEN_ALGORITHM),
            &claims,
            &self.encoding_key,
        )?;

        Ok(token)
    }

    pub fn verify_access_token(&self, token: &str) -> AccessTokenStatus {
        // Expiry is checked by hand so an expired but authentic token can
        // still hand its subject to the refresh flow.
        let mut validation = Validation::new(ACCESS_TOKEN_ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(err) => {
                if matches!(err.kind(), ErrorKind::InvalidAlgorithm) {
                    tracing::debug!("Rejected access token signed with unexpected algorithm");
                }
                return AccessTokenStatus::Invalid;
            }
        };

        if claims.exp < Utc::now().timestamp() {
            AccessTokenStatus::ExpiredButAuthentic(claims)
        } else {
            AccessTokenStatus::Valid(claims)
        }
    }

    /// Returns the claims of any authentic token, expired or not.
    pub fn parse_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        match self.verify_access_token(token) {
            AccessTokenStatus::Valid(claims) | AccessTokenStatus::ExpiredButAuthentic(claims) => {
                Ok(claims)
            }
            AccessTokenStatus::Invalid => Err(AuthError::InvalidAccessToken),
        }
    }
}

/// Generates a new refresh secret: 256 random bits as lowercase hex.
pub fn issue_refresh_secret() -> String {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Wraps a refresh secret for transport. The encoding adds no secrecy.
pub fn encode_refresh_token(secret: &str) -> String {
    STANDARD.encode(secret.as_bytes())
}

pub fn decode_refresh_token(encoded: &str) -> anyhow::Result<String> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| anyhow::anyhow!("Invalid refresh token encoding: {}", e))?;
    let secret = String::from_utf8(bytes)
        .map_err(|_| anyhow::anyhow!("Refresh token is not valid UTF-8"))?;
    if secret.is_empty() {
        return Err(anyhow::anyhow!("Refresh token is empty"));
    }

    Ok(secret)
}
