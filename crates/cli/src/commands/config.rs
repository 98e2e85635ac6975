use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use agentdesk_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let optional = |value: Option<&str>| value.unwrap_or("<unset>").to_string();
    let list = |values: &[String]| {
        if values.is_empty() {
            "<none>".to_string()
        } else {
            values.join(", ")
        }
    };

    vec![
        Field {
            key: "auth.username",
            value: if config.auth.username.is_empty() {
                "<unset>".to_string()
            } else {
                config.auth.username.clone()
            },
            env_keys: &["AGENTDESK_AUTH_USERNAME", "AGENT_API_USERNAME"],
        },
        Field {
            key: "auth.password",
            value: redact_secret(Some(&config.auth.password)),
            env_keys: &["AGENTDESK_AUTH_PASSWORD", "AGENT_API_PASSWORD"],
        },
        Field {
            key: "auth.token_ttl_secs",
            value: config.auth.token_ttl_secs.to_string(),
            env_keys: &["AGENTDESK_AUTH_TOKEN_TTL_SECS"],
        },
        Field {
            key: "llm.provider",
            value: format!("{:?}", config.llm.provider),
            env_keys: &["AGENTDESK_LLM_PROVIDER"],
        },
        Field {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["AGENTDESK_LLM_MODEL", "OPENAI_MODEL"],
        },
        Field {
            key: "llm.base_url",
            value: optional(config.llm.base_url.as_deref()),
            env_keys: &["AGENTDESK_LLM_BASE_URL"],
        },
        Field {
            key: "llm.api_key",
            value: redact_secret(config.llm.api_key.as_ref()),
            env_keys: &["AGENTDESK_LLM_API_KEY", "OPENAI_API_KEY"],
        },
        Field {
            key: "llm.temperature",
            value: config.llm.temperature.to_string(),
            env_keys: &["AGENTDESK_LLM_TEMPERATURE"],
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["AGENTDESK_LLM_TIMEOUT_SECS"],
        },
        Field {
            key: "llm.max_tool_rounds",
            value: config.llm.max_tool_rounds.to_string(),
            env_keys: &["AGENTDESK_LLM_MAX_TOOL_ROUNDS"],
        },
        Field {
            key: "agent.offline_fallback",
            value: config.agent.offline_fallback.to_string(),
            env_keys: &["AGENTDESK_AGENT_OFFLINE_FALLBACK"],
        },
        Field {
            key: "agent.documents_dir",
            value: optional(config.agent.documents_dir.as_deref().and_then(Path::to_str)),
            env_keys: &["AGENTDESK_AGENT_DOCUMENTS_DIR"],
        },
        Field {
            key: "guardrails.enabled",
            value: config.guardrails.enabled.to_string(),
            env_keys: &["AGENTDESK_GUARDRAILS_ENABLED"],
        },
        Field {
            key: "guardrails.sensitive_topics",
            value: list(&config.guardrails.sensitive_topics),
            env_keys: &["AGENTDESK_GUARDRAILS_SENSITIVE_TOPICS"],
        },
        Field {
            key: "guardrails.blocked_terms",
            value: list(&config.guardrails.blocked_terms),
            env_keys: &["AGENTDESK_GUARDRAILS_BLOCKED_TERMS"],
        },
        Field {
            key: "guardrails.relevance_check",
            value: config.guardrails.relevance_check.to_string(),
            env_keys: &["AGENTDESK_GUARDRAILS_RELEVANCE_CHECK"],
        },
        Field {
            key: "monitor.enabled",
            value: config.monitor.enabled.to_string(),
            env_keys: &["AGENTDESK_MONITOR_ENABLED"],
        },
        Field {
            key: "monitor.host",
            value: optional(config.monitor.host.as_deref()),
            env_keys: &["AGENTDESK_MONITOR_HOST", "LANGFUSE_HOST"],
        },
        Field {
            key: "monitor.public_key",
            value: optional(config.monitor.public_key.as_deref()),
            env_keys: &["AGENTDESK_MONITOR_PUBLIC_KEY", "LANGFUSE_PUBLIC_KEY"],
        },
        Field {
            key: "monitor.secret_key",
            value: redact_secret(config.monitor.secret_key.as_ref()),
            env_keys: &["AGENTDESK_MONITOR_SECRET_KEY", "LANGFUSE_SECRET_KEY"],
        },
        Field {
            key: "monitor.environment",
            value: config.monitor.environment.clone(),
            env_keys: &["AGENTDESK_MONITOR_ENVIRONMENT", "LANGFUSE_TRACING_ENVIRONMENT"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["AGENTDESK_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["AGENTDESK_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["AGENTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["AGENTDESK_LOGGING_LEVEL", "AGENTDESK_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["AGENTDESK_LOGGING_FORMAT", "AGENTDESK_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("agentdesk.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/agentdesk.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognisable key prefix (`sk-`, `pk-lf-`) and hides the rest.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, rest)) = trimmed.split_once('-') {
        if prefix.len() <= 4 && !rest.is_empty() {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}
