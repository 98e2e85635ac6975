use agentdesk_agent::monitor::{IngestionMonitor, TraceMonitor};
use agentdesk_core::config::{AppConfig, LlmProvider, LoadOptions};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const SKIPPED_NO_CONFIG: &str = "skipped because configuration did not load";

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_credentials(&config));
            checks.push(check_llm_provider(&config));
            checks.push(check_documents_dir(&config));
            checks.push(check_monitor(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            let skipped =
                ["auth_credentials", "llm_provider", "documents_dir", "monitor_reachability"];
            for name in skipped {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: SKIPPED_NO_CONFIG.to_string(),
                });
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_fail { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_fail {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_credentials(config: &AppConfig) -> DoctorCheck {
    if config.auth.is_configured() {
        DoctorCheck {
            name: "auth_credentials",
            status: CheckStatus::Pass,
            details: format!("login enabled for `{}`", config.auth.username),
        }
    } else {
        DoctorCheck {
            name: "auth_credentials",
            status: CheckStatus::Fail,
            details: "auth.username and auth.password must both be set; /login returns 500 until they are"
                .to_string(),
        }
    }
}

/// A missing key is not fatal: the server answers from canned replies.
fn check_llm_provider(config: &AppConfig) -> DoctorCheck {
    if config.llm.is_configured() {
        return DoctorCheck {
            name: "llm_provider",
            status: CheckStatus::Pass,
            details: format!(
                "{:?} at {} using `{}`",
                config.llm.provider,
                config.llm.endpoint_base(),
                config.llm.model
            ),
        };
    }

    let hint = match config.llm.provider {
        LlmProvider::OpenAi => "set OPENAI_API_KEY or AGENTDESK_LLM_API_KEY",
        LlmProvider::Ollama => "set AGENTDESK_LLM_BASE_URL",
    };
    if config.agent.offline_fallback {
        DoctorCheck {
            name: "llm_provider",
            status: CheckStatus::Skipped,
            details: format!("agent will run in offline mode; {hint}"),
        }
    } else {
        DoctorCheck {
            name: "llm_provider",
            status: CheckStatus::Fail,
            details: format!("agent is unconfigured and offline fallback is disabled; {hint}"),
        }
    }
}

fn check_documents_dir(config: &AppConfig) -> DoctorCheck {
    match &config.agent.documents_dir {
        None => DoctorCheck {
            name: "documents_dir",
            status: CheckStatus::Skipped,
            details: "agent.documents_dir not set; read_document tool disabled".to_string(),
        },
        Some(dir) if dir.is_dir() => DoctorCheck {
            name: "documents_dir",
            status: CheckStatus::Pass,
            details: format!("documents served from `{}`", dir.display()),
        },
        Some(dir) => DoctorCheck {
            name: "documents_dir",
            status: CheckStatus::Fail,
            details: format!("`{}` is not a readable directory", dir.display()),
        },
    }
}

fn check_monitor(config: &AppConfig) -> DoctorCheck {
    let monitor = match IngestionMonitor::from_config(&config.monitor) {
        Ok(Some(monitor)) => monitor,
        Ok(None) => {
            return DoctorCheck {
                name: "monitor_reachability",
                status: CheckStatus::Skipped,
                details: "monitor disabled or missing host/public_key/secret_key".to_string(),
            };
        }
        Err(error) => {
            return DoctorCheck {
                name: "monitor_reachability",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "monitor_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    // Turns are still served while the monitor is down, so this never fails the report.
    if runtime.block_on(monitor.is_reachable()) {
        DoctorCheck {
            name: "monitor_reachability",
            status: CheckStatus::Pass,
            details: "monitor host accepted the configured keys".to_string(),
        }
    } else {
        DoctorCheck {
            name: "monitor_reachability",
            status: CheckStatus::Skipped,
            details: "monitor host unreachable or keys rejected; turns will not be traced"
                .to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
