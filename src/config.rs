use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_OTP_LENGTH: usize = 6;
const DEFAULT_OTP_TTL_SECS: u64 = 300;
const DEFAULT_OTP_RESEND_COOLDOWN_SECS: u64 = 30;
const DEFAULT_COD_HISTORY_THRESHOLD: u64 = 5;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_INTENT_TTL_SECS: u64 = 900;
const DEFAULT_SESSION_TTL_SECS: u64 = 1800;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Payment gateway configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the hosted-checkout gateway
    pub base_url: String,

    /// API key identifier sent with intent creation
    pub key_id: String,

    /// Shared secret used to verify callback signatures
    #[validate(length(min = 16))]
    pub secret: String,

    /// Request timeout for gateway round-trips, in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// Payment brands listed in the UI but not routable; selecting one
    /// short-circuits with a generic "temporarily unavailable" error.
    #[serde(default)]
    pub disabled_brands: Vec<String>,

    /// How long an unverified payment intent stays claimable before the
    /// sweeper evicts it
    #[serde(default = "default_intent_ttl")]
    pub intent_ttl_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            key_id: "dev_key".to_string(),
            secret: "dev_gateway_secret_not_for_production".to_string(),
            timeout_secs: default_gateway_timeout(),
            disabled_brands: vec!["paylater".to_string()],
            intent_ttl_secs: default_intent_ttl(),
        }
    }
}

/// Checkout wizard configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Fixed COD safety-deposit amount charged to low-history customers
    #[serde(default = "default_cod_deposit_amount")]
    pub cod_deposit_amount: Decimal,

    /// Customers with at most this many completed orders must pay the
    /// COD deposit before a cash-on-delivery order is accepted.
    #[serde(default = "default_cod_history_threshold")]
    pub cod_history_threshold: u64,

    /// One-time-code length in digits
    #[serde(default = "default_otp_length")]
    pub otp_length: usize,

    /// Server-side ticket expiry; client countdowns are cosmetic only
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: u64,

    /// Minimum delay between OTP sends for one session
    #[serde(default = "default_otp_resend_cooldown")]
    pub otp_resend_cooldown_secs: u64,

    /// How long an idle checkout session survives before the sweeper
    /// evicts it
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            cod_deposit_amount: default_cod_deposit_amount(),
            cod_history_threshold: default_cod_history_threshold(),
            otp_length: default_otp_length(),
            otp_ttl_secs: default_otp_ttl(),
            otp_resend_cooldown_secs: default_otp_resend_cooldown(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64))]
    pub jwt_secret: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to create missing tables on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated CORS origins; unset means permissive in development
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default)]
    #[validate]
    pub gateway: GatewayConfig,

    #[serde(default)]
    #[validate]
    pub checkout: CheckoutConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_otp_length() -> usize {
    DEFAULT_OTP_LENGTH
}

fn default_otp_ttl() -> u64 {
    DEFAULT_OTP_TTL_SECS
}

fn default_otp_resend_cooldown() -> u64 {
    DEFAULT_OTP_RESEND_COOLDOWN_SECS
}

fn default_cod_history_threshold() -> u64 {
    DEFAULT_COD_HISTORY_THRESHOLD
}

fn default_cod_deposit_amount() -> Decimal {
    Decimal::from(50)
}

fn default_gateway_timeout() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

fn default_intent_ttl() -> u64 {
    DEFAULT_INTENT_TTL_SECS
}

fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Loads configuration from `config/default.toml`, an environment
/// overlay (`config/{environment}.toml`), and `APP__`-prefixed
/// environment variables, in that order of precedence.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", run_env.clone())?
        .set_default("database_url", "postgres://localhost/storefront")?
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", run_env));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    let cfg: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    if !cfg.is_development() && cfg.jwt_secret == DEV_DEFAULT_JWT_SECRET {
        return Err(ConfigError::Message(
            "refusing to start outside development with the default JWT secret".to_string(),
        ));
    }

    Ok(cfg)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("storefront_api={0},tower_http={0}", log_level)));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_defaults_match_product_rules() {
        let cfg = CheckoutConfig::default();
        assert_eq!(cfg.cod_history_threshold, 5);
        assert_eq!(cfg.cod_deposit_amount, Decimal::from(50));
        assert_eq!(cfg.otp_length, 6);
    }

    #[test]
    fn gateway_defaults_include_disabled_brand() {
        let cfg = GatewayConfig::default();
        assert!(cfg.disabled_brands.contains(&"paylater".to_string()));
    }
}
