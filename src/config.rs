// config.rs
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";
const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Credentials and endpoints for the M-Pesa API.
///
/// Every credential is optional here; the services report a configuration
/// error the first time a missing value is actually needed.
#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub passkey: Option<String>,
    pub short_code: Option<String>,
    pub callback_url: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl MpesaConfig {
    pub fn auth_url(&self) -> String {
        format!("{}/oauth/v1/generate?grant_type=client_credentials", self.base_url)
    }

    pub fn stk_push_url(&self) -> String {
        format!("{}/mpesa/stkpush/v1/processrequest", self.base_url)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub trust_proxy: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub allowed_origin: Option<String>,
    pub mpesa: MpesaConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = Environment::parse(get("APP_ENV").as_deref());

        let base_url = get("MPESA_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| match environment {
                Environment::Production => PRODUCTION_BASE_URL.to_string(),
                Environment::Development => SANDBOX_BASE_URL.to_string(),
            });

        let timeout_secs: u64 = parse_or(get("MPESA_HTTP_TIMEOUT_SECS"), 30, "MPESA_HTTP_TIMEOUT_SECS")?;
        let max_requests: u32 = parse_or(get("RATE_LIMIT_MAX"), 100, "RATE_LIMIT_MAX")?;
        let window_secs: u64 = parse_or(get("RATE_LIMIT_WINDOW_SECS"), 15 * 60, "RATE_LIMIT_WINDOW_SECS")?;
        let trust_proxy: bool = parse_or(get("TRUST_PROXY"), false, "TRUST_PROXY")?;

        Ok(AppConfig {
            environment,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("PORT"), 5000, "PORT")?,
            allowed_origin: get("ALLOWED_ORIGIN"),
            mpesa: MpesaConfig {
                consumer_key: get("MPESA_CONSUMER_KEY"),
                consumer_secret: get("MPESA_CONSUMER_SECRET"),
                passkey: get("MPESA_PASSKEY"),
                short_code: get("MPESA_SHORTCODE"),
                callback_url: get("MPESA_CALLBACK_URL"),
                base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            rate_limit: RateLimitConfig {
                max_requests: max_requests.max(1),
                window: Duration::from_secs(window_secs.max(1)),
                trust_proxy,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_or<T>(value: Option<String>, default: T, key: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
