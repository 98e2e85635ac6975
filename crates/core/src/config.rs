use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub guardrails: GuardrailConfig,
    pub monitor: MonitorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub username: String,
    pub password: SecretString,
    /// Zero disables expiry.
    pub token_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_tool_rounds: u32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub offline_fallback: bool,
    pub documents_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct GuardrailConfig {
    pub enabled: bool,
    pub sensitive_topics: Vec<String>,
    pub blocked_terms: Vec<String>,
    pub relevance_check: bool,
}

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub host: Option<String>,
    pub public_key: Option<String>,
    pub secret_key: Option<SecretString>,
    pub environment: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
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
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
    pub token_ttl_secs: Option<u64>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub offline_fallback: Option<bool>,
    pub guardrails_enabled: Option<bool>,
    pub monitor_enabled: Option<bool>,
    pub server_port: Option<u16>,
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

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 8 * 60 * 60;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig {
                username: String::new(),
                password: String::new().into(),
                token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                temperature: 0.2,
                timeout_secs: 30,
                max_tool_rounds: 4,
            },
            agent: AgentConfig { offline_fallback: true, documents_dir: None },
            guardrails: GuardrailConfig::default(),
            monitor: MonitorConfig {
                enabled: true,
                host: None,
                public_key: None,
                secret_key: None,
                environment: "development".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitive_topics: vec![
                "extremism".to_string(),
                "weapons".to_string(),
                "politics".to_string(),
            ],
            blocked_terms: Vec::new(),
            relevance_check: true,
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
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
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

impl AuthConfig {
    /// Both configured values must be present before any login can succeed.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.expose_secret().is_empty()
    }
}

impl LlmConfig {
    pub fn endpoint_base(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, LlmProvider::OpenAi) => "https://api.openai.com/v1".to_string(),
            (None, LlmProvider::Ollama) => "http://localhost:11434/v1".to_string(),
        }
    }

    /// Whether the agent has what it needs to reach the provider at all.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            LlmProvider::OpenAi => self
                .api_key
                .as_ref()
                .map(|value| !value.expose_secret().trim().is_empty())
                .unwrap_or(false),
            LlmProvider::Ollama => !self.endpoint_base().is_empty(),
        }
    }
}

impl MonitorConfig {
    pub fn is_configured(&self) -> bool {
        let has_host = self.host.as_ref().map(|host| !host.trim().is_empty()).unwrap_or(false);
        let has_public =
            self.public_key.as_ref().map(|key| !key.trim().is_empty()).unwrap_or(false);
        let has_secret = self
            .secret_key
            .as_ref()
            .map(|key| !key.expose_secret().trim().is_empty())
            .unwrap_or(false);
        self.enabled && has_host && has_public && has_secret
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("agentdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(auth) = patch.auth {
            if let Some(username) = auth.username {
                self.auth.username = username;
            }
            if let Some(auth_password_value) = auth.password {
                self.auth.password = secret_value(auth_password_value);
            }
            if let Some(token_ttl_secs) = auth.token_ttl_secs {
                self.auth.token_ttl_secs = token_ttl_secs;
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
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tool_rounds) = llm.max_tool_rounds {
                self.llm.max_tool_rounds = max_tool_rounds;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(offline_fallback) = agent.offline_fallback {
                self.agent.offline_fallback = offline_fallback;
            }
            if let Some(documents_dir) = agent.documents_dir {
                self.agent.documents_dir = Some(documents_dir);
            }
        }

        if let Some(guardrails) = patch.guardrails {
            if let Some(enabled) = guardrails.enabled {
                self.guardrails.enabled = enabled;
            }
            if let Some(sensitive_topics) = guardrails.sensitive_topics {
                self.guardrails.sensitive_topics = sensitive_topics;
            }
            if let Some(blocked_terms) = guardrails.blocked_terms {
                self.guardrails.blocked_terms = blocked_terms;
            }
            if let Some(relevance_check) = guardrails.relevance_check {
                self.guardrails.relevance_check = relevance_check;
            }
        }

        if let Some(monitor) = patch.monitor {
            if let Some(enabled) = monitor.enabled {
                self.monitor.enabled = enabled;
            }
            if let Some(host) = monitor.host {
                self.monitor.host = Some(host);
            }
            if let Some(public_key) = monitor.public_key {
                self.monitor.public_key = Some(public_key);
            }
            if let Some(monitor_secret_value) = monitor.secret_key {
                self.monitor.secret_key = Some(secret_value(monitor_secret_value));
            }
            if let Some(environment) = monitor.environment {
                self.monitor.environment = environment;
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
        if let Some(value) = read_env_any(&["AGENTDESK_AUTH_USERNAME", "AGENT_API_USERNAME"]) {
            self.auth.username = value;
        }
        if let Some(value) = read_env_any(&["AGENTDESK_AUTH_PASSWORD", "AGENT_API_PASSWORD"]) {
            self.auth.password = secret_value(value);
        }
        if let Some(value) = read_env("AGENTDESK_AUTH_TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = parse_u64("AGENTDESK_AUTH_TOKEN_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("AGENTDESK_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env_any(&["AGENTDESK_LLM_API_KEY", "OPENAI_API_KEY"]) {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AGENTDESK_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env_any(&["AGENTDESK_LLM_MODEL", "OPENAI_MODEL"]) {
            self.llm.model = value;
        }
        if let Some(value) = read_env("AGENTDESK_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("AGENTDESK_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("AGENTDESK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("AGENTDESK_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AGENTDESK_LLM_MAX_TOOL_ROUNDS") {
            self.llm.max_tool_rounds = parse_u32("AGENTDESK_LLM_MAX_TOOL_ROUNDS", &value)?;
        }

        if let Some(value) = read_env("AGENTDESK_AGENT_OFFLINE_FALLBACK") {
            self.agent.offline_fallback = parse_bool("AGENTDESK_AGENT_OFFLINE_FALLBACK", &value)?;
        }
        if let Some(value) = read_env("AGENTDESK_AGENT_DOCUMENTS_DIR") {
            self.agent.documents_dir = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("AGENTDESK_GUARDRAILS_ENABLED") {
            self.guardrails.enabled = parse_bool("AGENTDESK_GUARDRAILS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("AGENTDESK_GUARDRAILS_SENSITIVE_TOPICS") {
            self.guardrails.sensitive_topics = parse_list(&value);
        }
        if let Some(value) = read_env("AGENTDESK_GUARDRAILS_BLOCKED_TERMS") {
            self.guardrails.blocked_terms = parse_list(&value);
        }
        if let Some(value) = read_env("AGENTDESK_GUARDRAILS_RELEVANCE_CHECK") {
            self.guardrails.relevance_check =
                parse_bool("AGENTDESK_GUARDRAILS_RELEVANCE_CHECK", &value)?;
        }

        if let Some(value) = read_env("AGENTDESK_MONITOR_ENABLED") {
            self.monitor.enabled = parse_bool("AGENTDESK_MONITOR_ENABLED", &value)?;
        }
        if let Some(value) = read_env_any(&["AGENTDESK_MONITOR_HOST", "LANGFUSE_HOST"]) {
            self.monitor.host = Some(value);
        }
        if let Some(value) =
            read_env_any(&["AGENTDESK_MONITOR_PUBLIC_KEY", "LANGFUSE_PUBLIC_KEY"])
        {
            self.monitor.public_key = Some(value);
        }
        if let Some(value) =
            read_env_any(&["AGENTDESK_MONITOR_SECRET_KEY", "LANGFUSE_SECRET_KEY"])
        {
            self.monitor.secret_key = Some(secret_value(value));
        }
        if let Some(value) =
            read_env_any(&["AGENTDESK_MONITOR_ENVIRONMENT", "LANGFUSE_TRACING_ENVIRONMENT"])
        {
            self.monitor.environment = value;
        }

        if let Some(value) = read_env("AGENTDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("AGENTDESK_SERVER_PORT") {
            self.server.port = parse_u16("AGENTDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("AGENTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("AGENTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env_any(&["AGENTDESK_LOGGING_LEVEL", "AGENTDESK_LOG_LEVEL"]) {
            self.logging.level = value;
        }
        if let Some(value) = read_env_any(&["AGENTDESK_LOGGING_FORMAT", "AGENTDESK_LOG_FORMAT"])
        {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(username) = overrides.auth_username {
            self.auth.username = username;
        }
        if let Some(password) = overrides.auth_password {
            self.auth.password = secret_value(password);
        }
        if let Some(token_ttl_secs) = overrides.token_ttl_secs {
            self.auth.token_ttl_secs = token_ttl_secs;
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
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(offline_fallback) = overrides.offline_fallback {
            self.agent.offline_fallback = offline_fallback;
        }
        if let Some(guardrails_enabled) = overrides.guardrails_enabled {
            self.guardrails.enabled = guardrails_enabled;
        }
        if let Some(monitor_enabled) = overrides.monitor_enabled {
            self.monitor.enabled = monitor_enabled;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_monitor(&self.monitor)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("agentdesk.toml"), PathBuf::from("config/agentdesk.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_tool_rounds == 0 || llm.max_tool_rounds > 16 {
        return Err(ConfigError::Validation(
            "llm.max_tool_rounds must be in range 1..=16".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_monitor(monitor: &MonitorConfig) -> Result<(), ConfigError> {
    if let Some(host) = &monitor.host {
        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(ConfigError::Validation(
                "monitor.host must start with http:// or https://".to_string(),
            ));
        }
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

fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
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

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
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
    auth: Option<AuthPatch>,
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    guardrails: Option<GuardrailPatch>,
    monitor: Option<MonitorPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    username: Option<String>,
    password: Option<String>,
    token_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
    max_tool_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    offline_fallback: Option<bool>,
    documents_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct GuardrailPatch {
    enabled: Option<bool>,
    sensitive_topics: Option<Vec<String>>,
    blocked_terms: Option<Vec<String>>,
    relevance_check: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct MonitorPatch {
    enabled: Option<bool>,
    host: Option<String>,
    public_key: Option<String>,
    secret_key: Option<String>,
    environment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, GuardrailConfig, LlmProvider, LoadOptions,
        LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_AGENTDESK_PASSWORD", "travel-demo");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("agentdesk.toml");
            fs::write(
                &path,
                r#"
[auth]
username = "student"
password = "${TEST_AGENTDESK_PASSWORD}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.auth.username == "student", "username should come from the file")?;
            ensure(
                config.auth.password.expose_secret() == "travel-demo",
                "password should be interpolated from the environment",
            )?;
            ensure(config.auth.is_configured(), "credentials should be considered configured")?;
            Ok(())
        })();

        clear_vars(&["TEST_AGENTDESK_PASSWORD"]);
        result
    }

    #[test]
    fn conventional_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AGENT_API_USERNAME", "student");
        env::set_var("AGENT_API_PASSWORD", "travel-demo");
        env::set_var("OPENAI_MODEL", "gpt-4.1-mini");
        env::set_var("AGENTDESK_LOG_LEVEL", "warn");
        env::set_var("AGENTDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.auth.username == "student", "username alias should be honoured")?;
            ensure(
                config.auth.password.expose_secret() == "travel-demo",
                "password alias should be honoured",
            )?;
            ensure(config.llm.model == "gpt-4.1-mini", "model alias should be honoured")?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "AGENT_API_USERNAME",
            "AGENT_API_PASSWORD",
            "OPENAI_MODEL",
            "AGENTDESK_LOG_LEVEL",
            "AGENTDESK_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AGENTDESK_AUTH_USERNAME", "from-env");
        env::set_var("AGENTDESK_SERVER_PORT", "9100");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("agentdesk.toml");
            fs::write(
                &path,
                r#"
[auth]
username = "from-file"
password = "file-password"
token_ttl_secs = 60

[server]
port = 9000

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    server_port: Some(9200),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 9200, "override port should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.auth.username == "from-env", "env username should win over file")?;
            ensure(
                config.auth.password.expose_secret() == "file-password",
                "file password should win over defaults",
            )?;
            ensure(config.auth.token_ttl_secs == 60, "file ttl should win over defaults")?;
            Ok(())
        })();

        clear_vars(&["AGENTDESK_AUTH_USERNAME", "AGENTDESK_SERVER_PORT"]);
        result
    }

    #[test]
    fn missing_credentials_do_not_fail_loading() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        ensure(!config.auth.is_configured(), "defaults carry no credentials")?;
        ensure(config.agent.offline_fallback, "offline fallback should default to enabled")?;
        ensure(
            matches!(config.llm.provider, LlmProvider::OpenAi),
            "default provider should be openai",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AGENTDESK_LLM_TIMEOUT_SECS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.timeout_secs")
            );
            ensure(has_message, "validation failure should mention llm.timeout_secs")
        })();

        clear_vars(&["AGENTDESK_LLM_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AGENTDESK_SERVER_PORT", "not-a-port");

        let result = (|| -> Result<(), String> {
            match AppConfig::load(LoadOptions::default()) {
                Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                    ensure(key == "AGENTDESK_SERVER_PORT", "error should name the variable")
                }
                Err(other) => Err(format!("unexpected error: {other}")),
                Ok(_) => Err("expected invalid override error".to_string()),
            }
        })();

        clear_vars(&["AGENTDESK_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AGENTDESK_AUTH_PASSWORD", "pw-secret-value");
        env::set_var("AGENTDESK_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("pw-secret-value"), "debug output should not contain password")?;
            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(config.llm.is_configured(), "api key should make the llm configured")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["AGENTDESK_AUTH_PASSWORD", "AGENTDESK_LLM_API_KEY"]);
        result
    }

    #[test]
    fn endpoint_base_depends_on_provider() {
        let mut config = AppConfig::default();
        assert_eq!(config.llm.endpoint_base(), "https://api.openai.com/v1");

        config.llm.provider = LlmProvider::Ollama;
        assert_eq!(config.llm.endpoint_base(), "http://localhost:11434/v1");
        assert!(config.llm.is_configured());

        config.llm.base_url = Some("http://gateway.local/v1/".to_string());
        assert_eq!(config.llm.endpoint_base(), "http://gateway.local/v1");
    }

    #[test]
    fn monitor_requires_host_and_both_keys() {
        let mut config = AppConfig::default();
        assert!(!config.monitor.is_configured());

        config.monitor.host = Some("https://cloud.example.com".to_string());
        config.monitor.public_key = Some("pk-lf-1".to_string());
        assert!(!config.monitor.is_configured());

        config.monitor.secret_key = Some("sk-lf-1".to_string().into());
        assert!(config.monitor.is_configured());

        config.monitor.enabled = false;
        assert!(!config.monitor.is_configured());
    }

    #[test]
    fn guardrail_defaults_match_app_defaults() {
        let guardrails = GuardrailConfig::default();

        assert!(guardrails.enabled);
        assert!(guardrails.relevance_check);
        assert!(guardrails.sensitive_topics.iter().any(|topic| topic == "politics"));
        assert_eq!(
            AppConfig::default().guardrails.sensitive_topics,
            guardrails.sensitive_topics
        );
    }
}
