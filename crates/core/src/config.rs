use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::note::NoteStrategy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub telephony: TelephonyConfig,
    pub crm: CrmConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    /// Public URL the remote systems deliver webhooks to.
    pub public_base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TelephonyConfig {
    /// Only needed once a real telephony client is plugged in.
    pub api_key: Option<SecretString>,
    pub inbox_base_url: String,
    pub phone_number_ids: Vec<String>,
    pub sync_transcripts: bool,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub provider: String,
    pub api_key: Option<SecretString>,
    pub note_strategy: NoteStrategy,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub page_limit: u32,
    pub resource_chunk_size: usize,
    pub webhook_destination: String,
    pub page_destination: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub public_base_url: Option<String>,
    pub telephony_api_key: Option<String>,
    pub crm_provider: Option<String>,
    pub crm_api_key: Option<String>,
    pub crm_note_strategy: Option<NoteStrategy>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://callbridge.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                public_base_url: None,
            },
            telephony: TelephonyConfig {
                api_key: None,
                inbox_base_url: "https://my.openphone.com/inbox".to_string(),
                phone_number_ids: Vec::new(),
                sync_transcripts: false,
            },
            crm: CrmConfig {
                provider: "generic".to_string(),
                api_key: None,
                note_strategy: NoteStrategy::UpdateInPlace,
            },
            sync: SyncConfig {
                page_limit: 100,
                resource_chunk_size: 10,
                webhook_destination: "webhooks".to_string(),
                page_destination: "sync-pages".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("callbridge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(public_base_url) = server.public_base_url {
                self.server.public_base_url = Some(public_base_url);
            }
        }

        if let Some(telephony) = patch.telephony {
            if let Some(telephony_api_key_value) = telephony.api_key {
                self.telephony.api_key = Some(secret_value(telephony_api_key_value));
            }
            if let Some(inbox_base_url) = telephony.inbox_base_url {
                self.telephony.inbox_base_url = inbox_base_url;
            }
            if let Some(phone_number_ids) = telephony.phone_number_ids {
                self.telephony.phone_number_ids = phone_number_ids;
            }
            if let Some(sync_transcripts) = telephony.sync_transcripts {
                self.telephony.sync_transcripts = sync_transcripts;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(provider) = crm.provider {
                self.crm.provider = provider;
            }
            if let Some(crm_api_key_value) = crm.api_key {
                self.crm.api_key = Some(secret_value(crm_api_key_value));
            }
            if let Some(note_strategy) = crm.note_strategy {
                self.crm.note_strategy = note_strategy;
            }
        }

        if let Some(sync) = patch.sync {
            if let Some(page_limit) = sync.page_limit {
                self.sync.page_limit = page_limit;
            }
            if let Some(resource_chunk_size) = sync.resource_chunk_size {
                self.sync.resource_chunk_size = resource_chunk_size;
            }
            if let Some(webhook_destination) = sync.webhook_destination {
                self.sync.webhook_destination = webhook_destination;
            }
            if let Some(page_destination) = sync.page_destination {
                self.sync.page_destination = page_destination;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CALLBRIDGE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CALLBRIDGE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CALLBRIDGE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CALLBRIDGE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CALLBRIDGE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CALLBRIDGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CALLBRIDGE_SERVER_PORT") {
            self.server.port = parse_u16("CALLBRIDGE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CALLBRIDGE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CALLBRIDGE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("CALLBRIDGE_SERVER_PUBLIC_BASE_URL") {
            self.server.public_base_url = Some(value);
        }

        if let Some(value) = read_env("CALLBRIDGE_TELEPHONY_API_KEY") {
            self.telephony.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CALLBRIDGE_TELEPHONY_INBOX_BASE_URL") {
            self.telephony.inbox_base_url = value;
        }
        if let Some(value) = read_env("CALLBRIDGE_TELEPHONY_PHONE_NUMBER_IDS") {
            self.telephony.phone_number_ids = value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = read_env("CALLBRIDGE_TELEPHONY_SYNC_TRANSCRIPTS") {
            self.telephony.sync_transcripts =
                parse_bool("CALLBRIDGE_TELEPHONY_SYNC_TRANSCRIPTS", &value)?;
        }

        if let Some(value) = read_env("CALLBRIDGE_CRM_PROVIDER") {
            self.crm.provider = value;
        }
        if let Some(value) = read_env("CALLBRIDGE_CRM_API_KEY") {
            self.crm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CALLBRIDGE_CRM_NOTE_STRATEGY") {
            self.crm.note_strategy = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "CALLBRIDGE_CRM_NOTE_STRATEGY".to_string(),
                value: value.clone(),
            })?;
        }

        if let Some(value) = read_env("CALLBRIDGE_SYNC_PAGE_LIMIT") {
            self.sync.page_limit = parse_u32("CALLBRIDGE_SYNC_PAGE_LIMIT", &value)?;
        }
        if let Some(value) = read_env("CALLBRIDGE_SYNC_RESOURCE_CHUNK_SIZE") {
            self.sync.resource_chunk_size =
                parse_u32("CALLBRIDGE_SYNC_RESOURCE_CHUNK_SIZE", &value)? as usize;
        }

        let log_level =
            read_env("CALLBRIDGE_LOGGING_LEVEL").or_else(|| read_env("CALLBRIDGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CALLBRIDGE_LOGGING_FORMAT").or_else(|| read_env("CALLBRIDGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(public_base_url) = overrides.public_base_url {
            self.server.public_base_url = Some(public_base_url);
        }
        if let Some(telephony_api_key) = overrides.telephony_api_key {
            self.telephony.api_key = Some(secret_value(telephony_api_key));
        }
        if let Some(provider) = overrides.crm_provider {
            self.crm.provider = provider;
        }
        if let Some(crm_api_key) = overrides.crm_api_key {
            self.crm.api_key = Some(secret_value(crm_api_key));
        }
        if let Some(note_strategy) = overrides.crm_note_strategy {
            self.crm.note_strategy = note_strategy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_telephony(&self.telephony)?;
        validate_sync(&self.sync)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("callbridge.toml"), PathBuf::from("config/callbridge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(base_url) = &server.public_base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "server.public_base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_telephony(telephony: &TelephonyConfig) -> Result<(), ConfigError> {
    if telephony.api_key.as_ref().is_some_and(|key| key.expose_secret().trim().is_empty()) {
        return Err(ConfigError::Validation(
            "telephony.api_key must not be blank (unset it or set CALLBRIDGE_TELEPHONY_API_KEY)"
                .to_string(),
        ));
    }

    if !telephony.inbox_base_url.starts_with("https://")
        && !telephony.inbox_base_url.starts_with("http://")
    {
        return Err(ConfigError::Validation(
            "telephony.inbox_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_sync(sync: &SyncConfig) -> Result<(), ConfigError> {
    if sync.page_limit == 0 || sync.page_limit > 500 {
        return Err(ConfigError::Validation("sync.page_limit must be in range 1..=500".to_string()));
    }

    if sync.resource_chunk_size == 0 {
        return Err(ConfigError::Validation(
            "sync.resource_chunk_size must be greater than zero".to_string(),
        ));
    }

    if sync.webhook_destination.trim().is_empty() || sync.page_destination.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sync.webhook_destination and sync.page_destination must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    telephony: Option<TelephonyPatch>,
    crm: Option<CrmPatch>,
    sync: Option<SyncPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    public_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TelephonyPatch {
    api_key: Option<String>,
    inbox_base_url: Option<String>,
    phone_number_ids: Option<Vec<String>>,
    sync_transcripts: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    provider: Option<String>,
    api_key: Option<String>,
    note_strategy: Option<NoteStrategy>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncPatch {
    page_limit: Option<u32>,
    resource_chunk_size: Option<usize>,
    webhook_destination: Option<String>,
    page_destination: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
