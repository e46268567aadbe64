use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

/// Audience of the short-lived `state` tokens used by the Google sign-in
/// redirect. Keeps them from being accepted as access tokens.
const OAUTH_STATE_AUDIENCE: &str = "nakliyenet-oauth-state";

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    state_ttl: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        anyhow::ensure!(!config.jwt_secret.is_empty(), "JWT secret must not be empty");
        let secret = config.jwt_secret.as_bytes();
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            access_ttl: Duration::minutes(config.jwt_expiry_minutes),
            state_ttl: Duration::minutes(config.oauth_state_expiry_minutes),
        })
    }

    /// Access token lifetime in seconds, echoed to clients as `expires_in`.
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn generate_token(&self, user_id: Uuid, email: &str, is_admin: bool) -> Result<String> {
        let (iat, exp) = self.window(self.access_ttl);
        self.sign(&Claims {
            sub: user_id,
            email: email.to_owned(),
            is_admin,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp,
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.audience)
    }

    /// How long an OAuth `state` stays valid.
    pub fn oauth_state_ttl(&self) -> Duration {
        self.state_ttl
    }

    /// Signed `state` parameter for the OAuth redirect round trip, and the
    /// nonce inside it. The nonce is also handed to the browser as a cookie
    /// so the callback can tell which client started the sign-in.
    pub fn generate_oauth_state(&self) -> Result<(String, Uuid)> {
        let (iat, exp) = self.window(self.state_ttl);
        let nonce = Uuid::new_v4();
        let token = self.sign(&OAuthStateClaims {
            nonce,
            iss: self.issuer.clone(),
            aud: OAUTH_STATE_AUDIENCE.to_string(),
            iat,
            exp,
        })?;
        Ok((token, nonce))
    }

    pub fn verify_oauth_state(&self, token: &str) -> Result<OAuthStateClaims> {
        self.verify(token, OAUTH_STATE_AUDIENCE)
    }

    fn window(&self, ttl: Duration) -> (usize, usize) {
        let now = Utc::now();
        (now.timestamp() as usize, (now + ttl).timestamp() as usize)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, audience: &str) -> Result<T> {
        let mut validation = Validation::default();
        validation.set_audience(&[audience]);
        validation.set_issuer(&[self.issuer.as_str()]);
        Ok(decode::<T>(token, &self.decoding, &validation)?.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthStateClaims {
    pub nonce: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}
