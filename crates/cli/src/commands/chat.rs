use std::time::Duration;

use agentdesk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use crate::commands::CommandResult;

const COMMAND: &str = "chat";
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ChatArgs {
    pub message: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_id: Option<String>,
}

enum ChatFailure {
    Connection(String),
    Rejected { stage: &'static str, status: u16, detail: String },
    Response(String),
}

pub fn run(args: ChatArgs) -> CommandResult {
    let (username, password) = match resolve_credentials(&args) {
        Ok(pair) => pair,
        Err(result) => return result,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    let base_url = args.url.trim_end_matches('/').to_string();
    match runtime.block_on(exchange(&base_url, &username, &password, &args)) {
        Ok(body) => {
            let reply = body["reply"].as_str().unwrap_or_default().to_string();
            CommandResult::success_with_data(COMMAND, reply, Some(body))
        }
        Err(ChatFailure::Connection(message)) => {
            CommandResult::failure(COMMAND, "connection", message, 3)
        }
        Err(ChatFailure::Rejected { stage, status, detail }) => {
            let error_class = if status == 401 { "unauthorized" } else { "request_failed" };
            let message = format!("{stage} failed ({status}): {detail}");
            CommandResult::failure(COMMAND, error_class, message, 4)
        }
        Err(ChatFailure::Response(message)) => {
            CommandResult::failure(COMMAND, "invalid_response", message, 5)
        }
    }
}

/// Flags win; otherwise the configured server credentials are reused.
fn resolve_credentials(args: &ChatArgs) -> Result<(String, String), CommandResult> {
    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        return Ok((username.clone(), password.clone()));
    }

    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
    })?;
    let username = args.username.clone().unwrap_or_else(|| config.auth.username.clone());
    let password =
        args.password.clone().unwrap_or_else(|| config.auth.password.expose_secret().to_string());

    if username.trim().is_empty() || password.is_empty() {
        return Err(CommandResult::failure(
            COMMAND,
            "credentials_missing",
            "pass --username/--password or set AGENT_API_USERNAME/AGENT_API_PASSWORD",
            2,
        ));
    }
    Ok((username, password))
}

async fn exchange(
    base_url: &str,
    username: &str,
    password: &str,
    args: &ChatArgs,
) -> Result<Value, ChatFailure> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|error| ChatFailure::Connection(error.to_string()))?;

    let login = post_json(
        &client,
        &format!("{base_url}/login"),
        None,
        json!({ "username": username, "password": password }),
        "login",
    )
    .await?;
    let token = login["token"]
        .as_str()
        .ok_or_else(|| ChatFailure::Response("login response had no token".to_string()))?
        .to_string();

    let mut payload = json!({ "message": args.message });
    if let Some(session_id) = &args.session_id {
        payload["session_id"] = Value::String(session_id.clone());
    }
    post_json(&client, &format!("{base_url}/chat"), Some(&token), payload, "chat").await
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
    body: Value,
    stage: &'static str,
) -> Result<Value, ChatFailure> {
    let mut request = client.post(url).json(&body);
    if let Some(token) = token {
        request = request.header("x_auth_token", token);
    }

    let response = request
        .send()
        .await
        .map_err(|error| {
            ChatFailure::Connection(format!("{stage} request to {url} failed: {error}"))
        })?;
    let status = response.status();
    let value: Value = response
        .json()
        .await
        .map_err(|error| ChatFailure::Response(format!("{stage} response was not JSON: {error}")))?;

    if !status.is_success() {
        let detail = value["detail"].as_str().unwrap_or("unexpected error").to_string();
        return Err(ChatFailure::Rejected { stage, status: status.as_u16(), detail });
    }
    Ok(value)
}
