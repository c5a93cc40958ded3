//! flowdesk - command-line client for the flowdesk workflow backend.
//!
//! Logs in, keeps the session across runs, opens views behind the
//! navigation guard and issues authenticated API calls.

mod app;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use flowdesk_core::api::Method;

/// Directory for an additional log file, if set
const ENV_LOG_DIR: &str = "FLOWDESK_LOG_DIR";

#[derive(Parser, Debug)]
#[command(name = "flowdesk")]
#[command(author, version, about = "Command-line client for the flowdesk workflow backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Defaults to the last username used
        username: Option<String>,

        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },

    /// End the local session
    Logout {
        /// Also forget the remembered password
        #[arg(long)]
        forget: bool,
    },

    /// Show the stored session
    Status,

    /// Ask the server who you are
    Whoami,

    /// Open a view, e.g. /dashboard or /tasks
    Open {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Send a raw API request
    Call {
        /// HTTP method
        #[arg(value_parser = parse_method)]
        method: Method,

        /// Path relative to the API base URL
        path: String,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
}

fn parse_method(raw: &str) -> Result<Method, String> {
    raw.to_ascii_uppercase()
        .parse()
        .map_err(|_| format!("invalid HTTP method: {}", raw))
}

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so the file log is flushed.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "flowdesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _log_guard = init_tracing();
    info!("flowdesk starting");

    let mut app = App::new()?;

    match cli.command {
        Commands::Login { username, remember } => app.login(username, remember).await,
        Commands::Logout { forget } => app.logout(forget),
        Commands::Status => app.status(),
        Commands::Whoami => app.whoami().await,
        Commands::Open { path } => app.open(&path).await,
        Commands::Call { method, path, data } => app.call(method, &path, data.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("DELETE").unwrap(), Method::DELETE);
        assert!(parse_method("not a method").is_err());
    }

    #[test]
    fn test_open_defaults_to_root() {
        let cli = Cli::try_parse_from(["flowdesk", "open"]).unwrap();
        match cli.command {
            Commands::Open { path } => assert_eq!(path, "/"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_call_with_body() {
        let cli = Cli::try_parse_from([
            "flowdesk", "call", "post", "/instances", "--data", r#"{"template_id": 1}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Call { method, path, data } => {
                assert_eq!(method, Method::POST);
                assert_eq!(path, "/instances");
                assert_eq!(data.as_deref(), Some(r#"{"template_id": 1}"#));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
