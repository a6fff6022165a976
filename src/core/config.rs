//! Runtime configuration.
//!
//! Layering: built-in defaults, then the YAML file, then `FILEDROP_*`
//! environment variables (a `.env` file is honoured through dotenvy).

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use indoc::indoc;
use serde::{Deserialize, Serialize};

use crate::core::error::{AppError, AppResult};

/// Default config file name
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Prefix for environment overrides, e.g. `FILEDROP_TELEGRAM_TOKEN`
pub const ENV_PREFIX: &str = "FILEDROP_";

/// Outbound HTTP settings shared by the payment providers and geolocation
pub mod network {
    use super::Duration;

    /// Request timeout in seconds for every outbound HTTP call
    pub const TIMEOUT_SECS: u64 = 30;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }

    /// Geolocation lookups are best effort and get a shorter budget
    pub const GEOIP_TIMEOUT_SECS: u64 = 5;

    pub fn geoip_timeout() -> Duration {
        Duration::from_secs(GEOIP_TIMEOUT_SECS)
    }
}

/// Top-up limits
pub mod topup {
    /// Largest amount accepted in a single top-up
    pub const CEILING: f64 = 10_000.0;
}

/// File list pagination
pub mod pagination {
    pub const FILES_PER_PAGE: usize = 8;
}

/// Default `menu_text` template. Tokens: `%%bal%%`, `%%price%%`, `%%refund%%`.
pub const DEFAULT_MENU_TEXT: &str =
    "💰 Ваш баланс: %%bal%%\n📄 Загрузка: %%price%% USDT\n➕ Возврат за удаление: %%refund%% USDT\nВыберите действие:";

/// Commented default written on first start.
pub const DEFAULT_CONFIG_YAML: &str = indoc! {r#"
    # filedrop configuration
    # Every key can be overridden with a FILEDROP_<KEY> environment variable.

    # Bot token from @BotFather
    telegram_token: ""
    # Custom Bot API server, leave empty for api.telegram.org
    bot_api_url: ""

    # Payment providers; a provider is enabled when its token is set
    cryptobot_token: ""
    xrocket_token: ""
    # Minimum top-up per provider, 0 disables the check
    cryptobot_min_topup: 0.1
    xrocket_min_topup: 0.1
    cryptobot_api_url: "https://pay.crypt.bot/api"
    xrocket_api_url: "https://pay.xrocket.tg"
    invoice_currency: "USDT"

    database_path: "filestorage.db"
    logs_database_path: "downloads.db"
    file_storage_path: "files"
    log_file_path: "filedrop.log"

    # Files up to this size (bytes) cost price_upload; every started
    # 50 MiB above it adds price_per_chunk
    max_file_size: 104857600
    price_per_chunk: 1.0
    price_upload: 1.0
    price_refund: 0.5

    # Public base URL for download links and the HTTP listener
    domain: "http://localhost:8080"
    http_address: ":8080"
    tls_cert: ""
    tls_key: ""

    # Telegram id of the administrator, 0 disables the admin panel
    admin_id: 0

    # Tokens: %%bal%%, %%price%%, %%refund%%
    menu_text: "💰 Ваш баланс: %%bal%%\n📄 Загрузка: %%price%% USDT\n➕ Возврат за удаление: %%refund%% USDT\nВыберите действие:"

    # Record downloads and notify owners
    download_logging: true
    geoip_url: "https://ipinfo.io"
"#};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub telegram_token: String,
    pub bot_api_url: Option<String>,
    pub cryptobot_token: String,
    pub xrocket_token: String,
    pub cryptobot_min_topup: f64,
    pub xrocket_min_topup: f64,
    pub cryptobot_api_url: String,
    pub xrocket_api_url: String,
    pub invoice_currency: String,
    pub database_path: String,
    pub logs_database_path: String,
    pub file_storage_path: String,
    pub log_file_path: String,
    /// Free-size threshold in bytes
    pub max_file_size: u64,
    /// Price of every started 50 MiB above `max_file_size`
    pub price_per_chunk: f64,
    pub price_upload: f64,
    pub price_refund: f64,
    pub domain: String,
    pub http_address: String,
    pub tls_cert: String,
    pub tls_key: String,
    pub admin_id: i64,
    pub menu_text: String,
    pub download_logging: bool,
    pub geoip_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            bot_api_url: None,
            cryptobot_token: String::new(),
            xrocket_token: String::new(),
            cryptobot_min_topup: 0.1,
            xrocket_min_topup: 0.1,
            cryptobot_api_url: "https://pay.crypt.bot/api".to_string(),
            xrocket_api_url: "https://pay.xrocket.tg".to_string(),
            invoice_currency: "USDT".to_string(),
            database_path: "filestorage.db".to_string(),
            logs_database_path: "downloads.db".to_string(),
            file_storage_path: "files".to_string(),
            log_file_path: "filedrop.log".to_string(),
            max_file_size: 100 * 1024 * 1024,
            price_per_chunk: 1.0,
            price_upload: 1.0,
            price_refund: 0.5,
            domain: "http://localhost:8080".to_string(),
            http_address: ":8080".to_string(),
            tls_cert: String::new(),
            tls_key: String::new(),
            admin_id: 0,
            menu_text: DEFAULT_MENU_TEXT.to_string(),
            download_logging: true,
            geoip_url: "https://ipinfo.io".to_string(),
        }
    }
}

/// Outcome of [`bootstrap`].
#[derive(Debug)]
pub enum Bootstrap {
    Loaded(Box<Config>),
    /// No config existed; a default one was written to this path
    Generated(String),
}

impl Config {
    /// Loads the layered configuration from `path`. A missing file is not an
    /// error here; defaults and environment still apply.
    pub fn load(path: &str) -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        if self.bot_api_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            self.bot_api_url = None;
        }
        self
    }

    /// Checks the settings needed to run the bot.
    pub fn validate(&self) -> AppResult<()> {
        if self.telegram_token.trim().is_empty() {
            return Err(AppError::Config("telegram_token is empty".to_string()));
        }
        for (name, value) in [
            ("price_upload", self.price_upload),
            ("price_refund", self.price_refund),
            ("price_per_chunk", self.price_per_chunk),
            ("cryptobot_min_topup", self.cryptobot_min_topup),
            ("xrocket_min_topup", self.xrocket_min_topup),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Config(format!("{name} must be a non-negative number")));
            }
        }
        if self.tls_cert.is_empty() != self.tls_key.is_empty() {
            return Err(AppError::Config(
                "tls_cert and tls_key must be set together".to_string(),
            ));
        }
        if self.domain.trim().is_empty() {
            return Err(AppError::Config("domain is empty".to_string()));
        }
        Ok(())
    }

    pub fn cryptobot_enabled(&self) -> bool {
        !self.cryptobot_token.is_empty()
    }

    pub fn xrocket_enabled(&self) -> bool {
        !self.xrocket_token.is_empty()
    }

    pub fn tls_enabled(&self) -> bool {
        !self.tls_cert.is_empty() && !self.tls_key.is_empty()
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admin_id != 0 && self.admin_id == telegram_id
    }

    /// `:8080` binds every interface.
    pub fn bind_address(&self) -> String {
        if self.http_address.starts_with(':') {
            format!("0.0.0.0{}", self.http_address)
        } else {
            self.http_address.clone()
        }
    }

    /// Builds the public link for a slug.
    pub fn public_link(&self, slug: &str) -> String {
        format!("{}/{}", self.domain.trim_end_matches('/'), slug)
    }

    pub fn log_summary(&self) {
        log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        log::info!("⚙️  Configuration");
        log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        log::info!(
            "💳 CryptoBot: {}",
            if self.cryptobot_enabled() { "enabled" } else { "disabled" }
        );
        log::info!(
            "💳 xRocket: {}",
            if self.xrocket_enabled() { "enabled" } else { "disabled" }
        );
        if !self.cryptobot_enabled() && !self.xrocket_enabled() {
            log::warn!("⚠️  No payment provider configured, top-ups are unavailable");
        }
        log::info!("📁 Storage: {}", self.file_storage_path);
        log::info!("🌐 Domain: {}", self.domain);
        log::info!(
            "🔌 HTTP: {} (TLS {})",
            self.bind_address(),
            if self.tls_enabled() { "on" } else { "off" }
        );
        if self.admin_id == 0 {
            log::warn!("⚠️  admin_id not set, admin panel disabled");
        } else {
            log::info!("👮 Admin: set");
        }
    }
}

/// Writes the default config to `path`, refusing to overwrite an existing one.
pub fn write_default(path: &str) -> AppResult<()> {
    if Path::new(path).exists() {
        return Err(AppError::Config(format!("{path} already exists")));
    }
    std::fs::write(path, DEFAULT_CONFIG_YAML)?;
    Ok(())
}

/// Loads the config, or generates a default file when none exists.
pub fn bootstrap(path: &str) -> AppResult<Bootstrap> {
    if !Path::new(path).exists() {
        write_default(path)?;
        return Ok(Bootstrap::Generated(path.to_string()));
    }
    Ok(Bootstrap::Loaded(Box::new(Config::load(path)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn default_yaml_matches_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, DEFAULT_CONFIG_YAML).unwrap();

        let loaded = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    #[serial]
    fn bootstrap_generates_then_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let path = path.to_str().unwrap();

        assert!(matches!(bootstrap(path).unwrap(), Bootstrap::Generated(_)));
        assert!(matches!(bootstrap(path).unwrap(), Bootstrap::Loaded(_)));
        assert!(write_default(path).is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "admin_id: 5\nprice_upload: 2.5\n").unwrap();

        std::env::set_var("FILEDROP_ADMIN_ID", "77");
        let loaded = Config::load(path.to_str().unwrap());
        std::env::remove_var("FILEDROP_ADMIN_ID");

        let loaded = loaded.unwrap();
        assert_eq!(loaded.admin_id, 77);
        assert_eq!(loaded.price_upload, 2.5);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::default();
        assert!(cfg.validate().is_err());

        cfg.telegram_token = "123:abc".into();
        assert!(cfg.validate().is_ok());

        cfg.tls_cert = "cert.pem".into();
        assert!(cfg.validate().is_err());
        cfg.tls_key = "key.pem".into();
        assert!(cfg.validate().is_ok());

        cfg.price_refund = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn address_and_links() {
        let mut cfg = Config::default();
        assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
        cfg.http_address = "127.0.0.1:9000".into();
        assert_eq!(cfg.bind_address(), "127.0.0.1:9000");

        cfg.domain = "https://files.example.com/".into();
        assert_eq!(cfg.public_link("abc"), "https://files.example.com/abc");
    }

    #[test]
    fn admin_zero_means_nobody() {
        let cfg = Config::default();
        assert!(!cfg.is_admin(0));
    }
}
