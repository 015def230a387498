use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub mailer: MailerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// Lifecycle engine knobs. The windows default to the product's fixed
/// values (7-day warning, 24-hour grace notify, 7-day grace period,
/// monthly usage reset) but stay configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_warning_window_days")]
    pub warning_window_days: i64,
    #[serde(default = "default_grace_notify_hours")]
    pub grace_notify_hours: i64,
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: i64,
    #[serde(default = "default_usage_reset_days")]
    pub usage_reset_days: i64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_account_timeout_secs")]
    pub account_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailerConfig {
    pub base_url: String,
    pub api_key: String,
    pub from_address: String,
}

fn default_max_connections() -> u32 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_acquire_timeout_secs() -> u64 {
    10
}
fn default_warning_window_days() -> i64 {
    7
}
fn default_grace_notify_hours() -> i64 {
    24
}
fn default_grace_period_days() -> i64 {
    7
}
fn default_usage_reset_days() -> i64 {
    30
}
fn default_sweep_interval_secs() -> u64 {
    6 * 3600
}
fn default_account_timeout_secs() -> u64 {
    30
}
fn default_concurrency() -> usize {
    8
}
fn default_page_size() -> u64 {
    200
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            warning_window_days: default_warning_window_days(),
            grace_notify_hours: default_grace_notify_hours(),
            grace_period_days: default_grace_period_days(),
            usage_reset_days: default_usage_reset_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            account_timeout_secs: default_account_timeout_secs(),
            concurrency: default_concurrency(),
            page_size: default_page_size(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 优先读取配置文件，缺失时完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("Failed to parse {config_path}: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = env::var("DATABASE_URL").map_err(|_| {
                    "DATABASE_URL is not set and no config.toml was found".to_string()
                })?;
                Config {
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: default_max_connections(),
                        connect_timeout_secs: default_connect_timeout_secs(),
                        acquire_timeout_secs: default_acquire_timeout_secs(),
                    },
                    scheduler: SchedulerConfig::default(),
                    mailer: MailerConfig {
                        base_url: env::var("MAILER_BASE_URL").unwrap_or_default(),
                        api_key: env::var("MAILER_API_KEY").unwrap_or_default(),
                        from_address: env::var("MAILER_FROM_ADDRESS").unwrap_or_default(),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("SWEEP_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            config.scheduler.sweep_interval_secs = n;
        }
        if let Ok(v) = env::var("SWEEP_CONCURRENCY")
            && let Ok(n) = v.parse()
        {
            config.scheduler.concurrency = n;
        }
        if let Ok(v) = env::var("MAILER_BASE_URL") {
            config.mailer.base_url = v;
        }
        if let Ok(v) = env::var("MAILER_API_KEY") {
            config.mailer.api_key = v;
        }
        if let Ok(v) = env::var("MAILER_FROM_ADDRESS") {
            config.mailer.from_address = v;
        }

        Ok(config)
    }
}
