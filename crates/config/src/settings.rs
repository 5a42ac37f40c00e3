use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub realtime: RealtimeSettings,
    pub ai: AiSettings,
    pub cache: CacheSettings,
    pub presence: PresenceSettings,
    pub sharing: SharingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
}

impl AppSettings {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub issuer: String,
}

/// Timing knobs shared by the `/ws` hub and the client connection manager.
#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    pub heartbeat_interval_secs: u64,
    pub ack_timeout_secs: u64,
    pub typing_timeout_secs: u64,
    pub reconnection_attempts: u32,
    pub reconnection_delay_ms: u64,
    pub reconnection_delay_max_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub user_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PresenceSettings {
    /// A user flagged online but silent for longer than this is shown as recently active.
    pub online_window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SharingSettings {
    pub default_ttl_hours: u32,
    pub max_ttl_hours: u32,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("KINDRED"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.environment", "development")?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "kindred")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.refresh_token_ttl_secs", 2592000)?
            .set_default("jwt.issuer", "kindred")?
            .set_default("realtime.heartbeat_interval_secs", 20)?
            .set_default("realtime.ack_timeout_secs", 10)?
            .set_default("realtime.typing_timeout_secs", 3)?
            .set_default("realtime.reconnection_attempts", 5)?
            .set_default("realtime.reconnection_delay_ms", 1000)?
            .set_default("realtime.reconnection_delay_max_ms", 5000)?
            .set_default("ai.api_key", None::<String>)?
            .set_default("ai.base_url", "https://api.anthropic.com")?
            .set_default("ai.model", "claude-sonnet-4-5-20250929")?
            .set_default("ai.max_tokens", 512)?
            .set_default("cache.user_ttl_secs", 300)?
            .set_default("cache.sweep_interval_secs", 60)?
            .set_default("presence.online_window_secs", 300)?
            .set_default("sharing.default_ttl_hours", 72)?
            .set_default("sharing.max_ttl_hours", 720)?
            .build()?;

        config.try_deserialize()
    }
}
