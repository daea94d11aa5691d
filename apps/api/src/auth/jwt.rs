use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::user::Role;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("wrong token type: expected {expected}")]
    WrongType { expected: &'static str },

    #[error("invalid token: {0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        }
    }
}

/// Claims shared by access and refresh tokens; `token_type` tells them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    #[serde(skip)]
    pub refresh_jti: Uuid,
    #[serde(skip)]
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, access_token_minutes: i64, refresh_token_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::minutes(access_token_minutes),
            refresh_ttl: Duration::days(refresh_token_days),
        }
    }

    fn sign(
        &self,
        user_id: Uuid,
        role: Role,
        token_type: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(String, Claims), TokenError> {
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
            token_type: token_type.to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok((token, claims))
    }

    /// Issues a fresh access token and refresh token for the user.
    pub fn issue_pair(&self, user_id: Uuid, role: Role) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let (access_token, _) = self.sign(user_id, role, ACCESS, now, self.access_ttl)?;
        let (refresh_token, refresh) = self.sign(user_id, role, REFRESH, now, self.refresh_ttl)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
            refresh_jti: refresh.jti,
            refresh_expires_at: now + self.refresh_ttl,
        })
    }

    fn validate(&self, token: &str, expected: &'static str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        if data.claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(data.claims)
    }

    pub fn validate_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, ACCESS)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, REFRESH)
    }
}
