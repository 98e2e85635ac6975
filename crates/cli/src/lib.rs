pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::chat::ChatArgs;

#[derive(Debug, Parser)]
#[command(
    name = "agentdesk",
    about = "Agentdesk operator CLI",
    long_about = "Talk to a running agentdesk server, inspect configuration, and check readiness.",
    after_help = "Examples:\n  agentdesk chat \"How do I deploy Streamlit?\"\n  agentdesk config\n  agentdesk doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Log in to a running server and send one chat message")]
    Chat {
        #[arg(help = "Message to send")]
        message: String,
        #[arg(long, default_value = "http://127.0.0.1:8000", help = "Server base URL")]
        url: String,
        #[arg(long, help = "Username (defaults to auth.username from config)")]
        username: Option<String>,
        #[arg(long, help = "Password (defaults to auth.password from config)")]
        password: Option<String>,
        #[arg(long, help = "Continue an existing session id")]
        session_id: Option<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credentials, LLM provider and monitor readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { message, url, username, password, session_id } => {
            commands::chat::run(ChatArgs { message, url, username, password, session_id })
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
