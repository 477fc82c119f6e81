pub mod keys;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Opaque SMS provider credentials. The concrete shape is provider-specific;
/// the core only cares whether credentials are present.
#[derive(Debug, Clone)]
pub struct SmsProviderCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,

    pub database_url: Option<String>,
    pub database_pool: Option<PgPool>,

    pub jwt_encoding_key: Option<Arc<EncodingKey>>,
    pub jwt_decoding_key: Option<Arc<DecodingKey>>,
    pub jwt_algorithm: Algorithm,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_access_ttl: Duration,
    pub jwt_refresh_ttl: Duration,

    pub bcrypt_cost: u32,
    pub mfa_challenge_ttl: Duration,
    pub default_trust_ttl_days: i64,

    pub otp_return_to_client: bool,
    pub app_env: String,
    pub sms_provider_credentials: Option<SmsProviderCredentials>,

    /// `database_url`, `jwt_private_key`, and `jwt_public_key` were all set.
    /// When false, the auth core is mounted as a stub that returns
    /// Unimplemented for every operation and no interceptor is installed.
    pub auth_enabled: bool,
}

fn parse_duration_env(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(raw) => parse_duration_literal(&raw).unwrap_or_else(|| {
            tracing::warn!(key, raw, "could not parse duration, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Parses literals like "15m", "168h", "10m", "30s" — the shorthand this
/// crate's own config values use.
fn parse_duration_literal(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (number_part, unit) = raw.split_at(raw.len() - 1);
    let amount: u64 = number_part.parse().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount * 60)),
        "h" => Some(Duration::from_secs(amount * 3600)),
        "d" => Some(Duration::from_secs(amount * 86400)),
        _ => raw.parse::<u64>().ok().map(Duration::from_secs),
    }
}

fn validate_cors_origins(origins: &[String]) {
    for origin in origins {
        if origin.starts_with("http://") && !origin.contains("localhost") {
            tracing::warn!(origin, "insecure http:// CORS origin outside localhost");
        }
        if let Some(host_part) = origin.split("://").nth(1) {
            let host = host_part.split(':').next().unwrap_or("");
            if host.parse::<std::net::IpAddr>().is_ok() {
                tracing::warn!(origin, "IP-literal CORS origin, prefer a domain name");
            }
        }
    }
}

impl AppConfig {
    pub async fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        validate_cors_origins(&cors_origins);

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let otp_return_to_client = env::var("OTP_RETURN_TO_CLIENT")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        if otp_return_to_client && app_env == "production" {
            bail!("OTP_RETURN_TO_CLIENT must not be enabled when APP_ENV=production");
        }

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let jwt_private_key = env::var("JWT_PRIVATE_KEY").ok().filter(|s| !s.is_empty());
        let jwt_public_key = env::var("JWT_PUBLIC_KEY").ok().filter(|s| !s.is_empty());

        let auth_enabled =
            database_url.is_some() && jwt_private_key.is_some() && jwt_public_key.is_some();

        let (database_pool, jwt_encoding_key, jwt_decoding_key, jwt_algorithm) = if auth_enabled {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url.as_ref().unwrap())
                .await
                .context("connecting to database_url")?;

            let key_material = keys::load_key_material(
                jwt_private_key.as_ref().unwrap(),
                jwt_public_key.as_ref().unwrap(),
            )
            .context("loading jwt key material")?;

            (
                Some(pool),
                Some(Arc::new(key_material.encoding_key)),
                Some(Arc::new(key_material.decoding_key)),
                key_material.algorithm,
            )
        } else {
            tracing::warn!(
                "auth core disabled: database_url, jwt_private_key, and jwt_public_key must all be set"
            );
            (None, None, None, Algorithm::RS256)
        };

        let bcrypt_cost = env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::services::password_hasher::DEFAULT_BCRYPT_COST);

        let sms_provider_credentials = match (
            env::var("SMS_ACCOUNT_SID").ok().filter(|s| !s.is_empty()),
            env::var("SMS_AUTH_TOKEN").ok().filter(|s| !s.is_empty()),
            env::var("SMS_FROM_NUMBER").ok().filter(|s| !s.is_empty()),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => {
                Some(SmsProviderCredentials {
                    account_sid,
                    auth_token,
                    from_number,
                })
            }
            _ => None,
        };

        Ok(Self {
            server_host,
            server_port,
            cors_origins,
            database_url,
            database_pool,
            jwt_encoding_key,
            jwt_decoding_key,
            jwt_algorithm,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "auth".to_string()),
            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "api".to_string()),
            jwt_access_ttl: parse_duration_env("JWT_ACCESS_TTL", Duration::from_secs(15 * 60)),
            jwt_refresh_ttl: parse_duration_env(
                "JWT_REFRESH_TTL",
                Duration::from_secs(168 * 3600),
            ),
            bcrypt_cost,
            mfa_challenge_ttl: parse_duration_env("MFA_CHALLENGE_TTL", Duration::from_secs(600)),
            default_trust_ttl_days: env::var("DEFAULT_TRUST_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            otp_return_to_client,
            app_env,
            sms_provider_credentials,
            auth_enabled,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Dev-mode OTP store and peek endpoint require both guards to hold.
    pub fn dev_otp_enabled(&self) -> bool {
        self.otp_return_to_client && self.app_env != "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shorthand_durations() {
        assert_eq!(parse_duration_literal("15m"), Some(Duration::from_secs(900)));
        assert_eq!(
            parse_duration_literal("168h"),
            Some(Duration::from_secs(168 * 3600))
        );
        assert_eq!(parse_duration_literal("30s"), Some(Duration::from_secs(30)));
    }
}
