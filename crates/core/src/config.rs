use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub mail: MailConfig,
    pub calendar: CalendarConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Base URL used when building user-facing links (transcript exports).
    pub public_base_url: String,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub enabled: bool,
    pub relay_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub from_address: String,
    pub from_name: String,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub calendar_id: String,
    /// IANA timezone name used for conflict-check windows.
    pub timezone: String,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    /// Hard bound on router/worker/synthesizer steps per run.
    pub max_iterations: u32,
    /// TTL for cached availability checks, in seconds.
    pub check_ttl_secs: i64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
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
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub max_iterations: Option<u32>,
    pub check_ttl_secs: Option<i64>,
    pub timezone: Option<String>,
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
                url: "sqlite://staffer.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                public_base_url: "http://localhost:8080".to_string(),
                graceful_shutdown_secs: 15,
            },
            mail: MailConfig {
                enabled: false,
                relay_url: None,
                api_key: None,
                from_address: String::new(),
                from_name: "Chief of Staff".to_string(),
            },
            calendar: CalendarConfig {
                enabled: false,
                base_url: None,
                api_key: None,
                calendar_id: "primary".to_string(),
                timezone: "UTC".to_string(),
            },
            workflow: WorkflowConfig { max_iterations: 10, check_ttl_secs: 300 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("staffer.toml"));
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

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(public_base_url) = server.public_base_url {
                self.server.public_base_url = public_base_url;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(mail) = patch.mail {
            if let Some(enabled) = mail.enabled {
                self.mail.enabled = enabled;
            }
            if let Some(relay_url) = mail.relay_url {
                self.mail.relay_url = Some(relay_url);
            }
            if let Some(mail_api_key_value) = mail.api_key {
                self.mail.api_key = Some(secret_value(mail_api_key_value));
            }
            if let Some(from_address) = mail.from_address {
                self.mail.from_address = from_address;
            }
            if let Some(from_name) = mail.from_name {
                self.mail.from_name = from_name;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(enabled) = calendar.enabled {
                self.calendar.enabled = enabled;
            }
            if let Some(base_url) = calendar.base_url {
                self.calendar.base_url = Some(base_url);
            }
            if let Some(calendar_api_key_value) = calendar.api_key {
                self.calendar.api_key = Some(secret_value(calendar_api_key_value));
            }
            if let Some(calendar_id) = calendar.calendar_id {
                self.calendar.calendar_id = calendar_id;
            }
            if let Some(timezone) = calendar.timezone {
                self.calendar.timezone = timezone;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(max_iterations) = workflow.max_iterations {
                self.workflow.max_iterations = max_iterations;
            }
            if let Some(check_ttl_secs) = workflow.check_ttl_secs {
                self.workflow.check_ttl_secs = check_ttl_secs;
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
        if let Some(value) = read_env("STAFFER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STAFFER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("STAFFER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STAFFER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("STAFFER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STAFFER_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("STAFFER_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("STAFFER_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("STAFFER_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("STAFFER_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("STAFFER_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("STAFFER_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("STAFFER_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("STAFFER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STAFFER_SERVER_PORT") {
            self.server.port = parse_u16("STAFFER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("STAFFER_SERVER_PUBLIC_BASE_URL") {
            self.server.public_base_url = value;
        }
        if let Some(value) = read_env("STAFFER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("STAFFER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("STAFFER_MAIL_ENABLED") {
            self.mail.enabled = parse_bool("STAFFER_MAIL_ENABLED", &value)?;
        }
        if let Some(value) = read_env("STAFFER_MAIL_RELAY_URL") {
            self.mail.relay_url = Some(value);
        }
        if let Some(value) = read_env("STAFFER_MAIL_API_KEY") {
            self.mail.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("STAFFER_MAIL_FROM_ADDRESS") {
            self.mail.from_address = value;
        }
        if let Some(value) = read_env("STAFFER_MAIL_FROM_NAME") {
            self.mail.from_name = value;
        }

        if let Some(value) = read_env("STAFFER_CALENDAR_ENABLED") {
            self.calendar.enabled = parse_bool("STAFFER_CALENDAR_ENABLED", &value)?;
        }
        if let Some(value) = read_env("STAFFER_CALENDAR_BASE_URL") {
            self.calendar.base_url = Some(value);
        }
        if let Some(value) = read_env("STAFFER_CALENDAR_API_KEY") {
            self.calendar.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("STAFFER_CALENDAR_ID") {
            self.calendar.calendar_id = value;
        }
        if let Some(value) = read_env("STAFFER_CALENDAR_TIMEZONE") {
            self.calendar.timezone = value;
        }

        if let Some(value) = read_env("STAFFER_WORKFLOW_MAX_ITERATIONS") {
            self.workflow.max_iterations = parse_u32("STAFFER_WORKFLOW_MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("STAFFER_WORKFLOW_CHECK_TTL_SECS") {
            self.workflow.check_ttl_secs =
                parse_u32("STAFFER_WORKFLOW_CHECK_TTL_SECS", &value)? as i64;
        }

        let log_level = read_env("STAFFER_LOGGING_LEVEL").or_else(|| read_env("STAFFER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STAFFER_LOGGING_FORMAT").or_else(|| read_env("STAFFER_LOG_FORMAT"));
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
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self.workflow.max_iterations = max_iterations;
        }
        if let Some(check_ttl_secs) = overrides.check_ttl_secs {
            self.workflow.check_ttl_secs = check_ttl_secs;
        }
        if let Some(timezone) = overrides.timezone {
            self.calendar.timezone = timezone;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_mail(&self.mail)?;
        validate_calendar(&self.calendar)?;
        validate_workflow(&self.workflow)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("staffer.toml"), PathBuf::from("config/staffer.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }
    if llm.provider != LlmProvider::Ollama && llm.api_key.is_none() {
        return Err(ConfigError::Validation(format!(
            "llm.api_key is required for provider {:?}",
            llm.provider
        )));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    if server.public_base_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "server.public_base_url must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_mail(mail: &MailConfig) -> Result<(), ConfigError> {
    if mail.enabled {
        if mail.relay_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "mail.relay_url is required when mail.enabled is true".to_string(),
            ));
        }
        if mail.from_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "mail.from_address is required when mail.enabled is true".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    if calendar.calendar_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "calendar.calendar_id must not be empty".to_string(),
        ));
    }
    crate::errors::parse_timezone(&calendar.timezone)
        .map_err(|err| ConfigError::Validation(format!("calendar.timezone: {err}")))?;
    if calendar.enabled && calendar.base_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "calendar.base_url is required when calendar.enabled is true".to_string(),
        ));
    }
    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.max_iterations == 0 || workflow.max_iterations > 50 {
        return Err(ConfigError::Validation(
            "workflow.max_iterations must be in range 1..=50".to_string(),
        ));
    }
    if workflow.check_ttl_secs <= 0 || workflow.check_ttl_secs > 3600 {
        return Err(ConfigError::Validation(
            "workflow.check_ttl_secs must be in range 1..=3600".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
    if !LEVELS.contains(&logging.level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level `{}` is not one of trace|debug|info|warn|error",
            logging.level
        )));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    mail: Option<MailPatch>,
    calendar: Option<CalendarPatch>,
    workflow: Option<WorkflowPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    public_base_url: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    enabled: Option<bool>,
    relay_url: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
    from_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    calendar_id: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    max_iterations: Option<u32>,
    check_ttl_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
