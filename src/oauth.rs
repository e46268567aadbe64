use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::GoogleOAuthConfig;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Identity returned by an external sign-in provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalIdentity {
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Trades an authorization code for the user's identity.
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity>;
}

pub struct GoogleIdentityProvider {
    http: reqwest::Client,
    config: GoogleOAuthConfig,
}

impl GoogleIdentityProvider {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorize_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            GOOGLE_AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", "openid email profile"),
                ("response_type", "code"),
                ("state", state),
            ],
        )
        .context("failed to build Google authorize URL")?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity> {
        let token: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("failed to reach Google token endpoint")?
            .error_for_status()
            .context("Google rejected the authorization code")?
            .json()
            .await
            .context("failed to decode Google token response")?;

        let identity = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("failed to reach Google userinfo endpoint")?
            .error_for_status()
            .context("Google rejected the access token")?
            .json()
            .await
            .context("failed to decode Google user info")?;

        Ok(identity)
    }
}
