//! Settings for the `splitsphere` service.
//!
//! Sources, lowest priority first: built-in defaults, the TOML file
//! (`config/splitsphere.toml` unless `--config` says otherwise, optional),
//! `SPLITSPHERE__SECTION__KEY` environment variables, command line flags.
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use engine::{Currency, EngineConfig, SplitPolicy};
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(name = "splitsphere", version, about = "Shared-expense ledger service")]
pub struct Cli {
    /// Settings file, TOML.
    #[arg(long, default_value = "config/splitsphere.toml")]
    pub config: String,
    /// Log level for the service crates (`error` .. `trace`).
    #[arg(long)]
    pub level: Option<String>,
    #[arg(long)]
    pub bind: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    /// Database URL, e.g. `sqlite:./splitsphere.db?mode=rwc`.
    #[arg(long)]
    pub database: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            database: default_database(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub jwt_secret: String,
    pub issuer: Option<String>,
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub split_policy: SplitPolicy,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default = "default_member_limit")]
    pub default_member_limit: u32,
    #[serde(default = "default_min_floor_minor")]
    pub default_min_floor_minor: i64,
    #[serde(default = "default_analysis_ttl_secs")]
    pub analysis_ttl_secs: u64,
    #[serde(default)]
    pub default_currency: Currency,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            split_policy: SplitPolicy::default(),
            auto_approve: false,
            default_member_limit: default_member_limit(),
            default_min_floor_minor: default_min_floor_minor(),
            analysis_ttl_secs: default_analysis_ttl_secs(),
            default_currency: Currency::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ParserService {
    /// Base URL of the parsing service. Without it AI text falls back to the
    /// local quick-add parser and receipts are refused.
    pub endpoint: Option<String>,
    #[serde(default = "default_parser_timeout_secs")]
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for ParserService {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_parser_timeout_secs(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub server: Server,
    pub auth: Auth,
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub parser: ParserService,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database() -> String {
    "sqlite:./splitsphere.db?mode=rwc".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_leeway_secs() -> u64 {
    30
}

fn default_member_limit() -> u32 {
    32
}

fn default_min_floor_minor() -> i64 {
    200_000
}

fn default_analysis_ttl_secs() -> u64 {
    30
}

fn default_parser_timeout_secs() -> u64 {
    20
}

impl Settings {
    pub fn new(cli: &Cli) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(&cli.config).required(false))
            .add_source(
                Environment::with_prefix("SPLITSPHERE")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("app.level", cli.level.clone())?
            .set_override_option("server.bind", cli.bind.clone())?
            .set_override_option("server.port", cli.port.map(i64::from))?
            .set_override_option("server.database", cli.database.clone())?
            .build()?;

        settings.try_deserialize()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            split_policy: self.ledger.split_policy,
            auto_approve: self.ledger.auto_approve,
            default_member_limit: self.ledger.default_member_limit,
            default_min_floor_minor: self.ledger.default_min_floor_minor,
            default_currency: self.ledger.default_currency,
            analysis_ttl: Duration::from_secs(self.ledger.analysis_ttl_secs),
            extract_timeout: Duration::from_secs(self.parser.timeout_secs),
        }
    }

    pub fn server_config(&self) -> server::ServerConfig {
        server::ServerConfig {
            max_upload_bytes: self.server.max_upload_bytes,
            request_timeout: Duration::from_secs(self.server.request_timeout_secs),
        }
    }

    pub fn auth_config(&self) -> server::AuthConfig {
        server::AuthConfig {
            jwt_secret: self.auth.jwt_secret.clone(),
            issuer: self.auth.issuer.clone(),
            leeway_secs: self.auth.leeway_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let settings = from_toml("[auth]\njwt_secret = \"s\"\n").unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.ledger.default_member_limit, 32);
        assert_eq!(settings.ledger.split_policy, SplitPolicy::CreationTime);
        assert!(settings.parser.endpoint.is_none());
        assert_eq!(settings.engine_config().analysis_ttl, Duration::from_secs(30));
    }

    #[test]
    fn ledger_section_is_typed() {
        let settings = from_toml(
            "[auth]\njwt_secret = \"s\"\n[ledger]\nsplit_policy = \"current_membership\"\ndefault_currency = \"EUR\"\n",
        )
        .unwrap();
        assert_eq!(settings.ledger.split_policy, SplitPolicy::CurrentMembership);
        assert_eq!(settings.ledger.default_currency, Currency::Eur);
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(from_toml("[server]\nport = 8080\n").is_err());
    }
}
