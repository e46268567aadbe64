use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use bigdecimal::BigDecimal;
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub oauth_state_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    pub refresh_cookie_secure: bool,
    pub refresh_cookie_domain: Option<String>,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
    /// Public origin used for canonical links, the sitemap and OAuth redirects.
    pub site_base_url: String,
    /// Share of every escrowed amount kept by the platform, 0 to 100.
    pub platform_fee_percent: BigDecimal,
    /// Label stored on payment records; there is no live gateway behind it.
    pub payment_provider: String,
    pub google_oauth: Option<GoogleOAuthConfig>,
}

#[derive(Clone, Debug)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let site_base_url = site_base_url(optional("SITE_BASE_URL"));
        let platform_fee_percent = parse_or("PLATFORM_FEE_PERCENT", BigDecimal::from(10))?;
        check_fee_percent(&platform_fee_percent)?;

        let google_oauth = match (
            optional("GOOGLE_OAUTH_CLIENT_ID"),
            optional("GOOGLE_OAUTH_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_uri: optional("GOOGLE_OAUTH_REDIRECT_URI")
                    .unwrap_or_else(|| format!("{site_base_url}/oauth/google/callback")),
            }),
            (None, None) => None,
            _ => bail!("GOOGLE_OAUTH_CLIENT_ID and GOOGLE_OAUTH_CLIENT_SECRET must be set together"),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_pool_size: env::var("DATABASE_MAX_POOL_SIZE")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_MAX_POOL_SIZE),
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parse_or("SERVER_PORT", 8000)?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: optional("JWT_ISSUER").unwrap_or_else(|| "nakliyenet".to_string()),
            jwt_audience: optional("JWT_AUDIENCE")
                .unwrap_or_else(|| "nakliyenet-clients".to_string()),
            jwt_expiry_minutes: parse_or("JWT_EXPIRY_MINUTES", 60)?,
            oauth_state_expiry_minutes: parse_or("OAUTH_STATE_EXPIRY_MINUTES", 10)?,
            refresh_token_expiry_days: parse_or("REFRESH_TOKEN_EXPIRY_DAYS", 30)?,
            refresh_cookie_secure: optional("REFRESH_COOKIE_SECURE")
                .map(|value| is_truthy(&value))
                .unwrap_or(false),
            refresh_cookie_domain: optional("REFRESH_COOKIE_DOMAIN"),
            cors_allowed_origin: optional("CORS_ALLOWED_ORIGIN"),
            aws_endpoint_url: optional("AWS_ENDPOINT_URL"),
            aws_access_key_id: optional("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: optional("AWS_SECRET_ACCESS_KEY"),
            aws_region: optional("AWS_REGION").unwrap_or_else(|| "eu-central-1".to_string()),
            s3_bucket: required("S3_BUCKET")?,
            site_base_url,
            platform_fee_percent,
            payment_provider: optional("PAYMENT_PROVIDER")
                .unwrap_or_else(|| "test-provider".to_string()),
            google_oauth,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} must be set"))
}

/// Unset and blank variables are treated the same.
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>()
        .map_err(|err| anyhow::anyhow!("{key} has an invalid value {raw:?}: {err}"))
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

fn site_base_url(raw: Option<String>) -> String {
    raw.map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| "https://nakliyenet.com".to_string())
}

fn check_fee_percent(percent: &BigDecimal) -> Result<()> {
    if *percent < BigDecimal::from(0) || *percent > BigDecimal::from(100) {
        bail!("PLATFORM_FEE_PERCENT must be between 0 and 100, got {percent}");
    }
    Ok(())
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
