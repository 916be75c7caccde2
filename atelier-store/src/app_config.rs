use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Gap enforced after every appointment before the next may start.
    pub buffer_minutes: u32,
    /// How long an unpaid hold may block a slot.
    pub hold_timeout_minutes: i64,
    pub currency: String,
    /// "HH:MM" session windows; the studio day as shown on the booking page.
    pub session_windows: Vec<SessionWindowConfig>,
    /// Where the gateway sends the customer after checkout. The success URL
    /// must keep the `{CHECKOUT_SESSION_ID}` placeholder.
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionWindowConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Overridable for tests against a stub server.
    #[serde(default = "default_stripe_api_base")]
    pub api_base: String,
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment overrides, e.g. ATELIER__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("ATELIER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl BusinessRules {
    /// Window pairs in the shape atelier-booking's rules builder expects.
    pub fn window_pairs(&self) -> Vec<(String, String)> {
        self.session_windows
            .iter()
            .map(|w| (w.start.clone(), w.end.clone()))
            .collect()
    }
}
