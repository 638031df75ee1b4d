//! Command-line front end for a timeclock API session.
//!
//! Signs in, keeps the bearer token in the user's data directory, and sends
//! requests through the refresh coordinator like any other client would.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::{Value, json};

use timeclock_auth::{AuthorizationStore, GateMode, Permission};
use timeclock_client::{ApiRequest, ClientConfig, FileCredentialStore, ReqwestTransport, Session, TracingNavigator};
use timeclock_observability::ObservabilityConfig;

#[derive(Parser)]
#[command(name = "timeclock")]
#[command(about = "Talk to a timeclock API with a persistent session")]
struct Cli {
    /// Human-readable logs instead of JSON lines.
    #[arg(long, global = true)]
    pretty_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the issued token
    Login {
        identifier: String,
        #[arg(long, env = "TIMECLOCK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored token
    Logout,

    /// Show the principal and scopes of the stored session
    Whoami,

    /// Check whether the stored session holds the given permissions
    Can {
        #[arg(required = true)]
        permissions: Vec<String>,
        /// Grant when any permission is held (default: all of them)
        #[arg(long)]
        any: bool,
    },

    /// Send a request, refreshing the session if the token has expired
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut logging = ObservabilityConfig::from_env();
    if cli.pretty_logs {
        logging = logging.pretty();
    }
    timeclock_observability::init(&logging);

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let credentials = FileCredentialStore::in_data_dir(&config.credential_key)?;
    tracing::debug!(path = ?credentials.path(), api_url = %config.api_url, "session storage");

    let transport = ReqwestTransport::new(&config);
    let session = Session::new(
        config,
        Arc::new(transport),
        Arc::new(credentials),
        AuthorizationStore::new(),
        Arc::new(TracingNavigator),
    );
    session.bootstrap();

    match cli.command {
        Commands::Login { identifier, password } => {
            let state = session.login(&identifier, &password).await?;
            print_json(&json!({
                "principal_id": state.principal_id(),
                "scopes": state.sorted_scopes(),
            }))?;
        }
        Commands::Logout => {
            session.logout();
        }
        Commands::Whoami => match session.authorization().get_state() {
            Some(state) => print_json(&json!({
                "principal_id": state.principal_id(),
                "scopes": state.sorted_scopes(),
            }))?,
            None => bail!("not signed in"),
        },
        Commands::Can { permissions, any } => {
            let required: Vec<Permission> = permissions.into_iter().map(Permission::from).collect();
            let mode = if any { GateMode::Any } else { GateMode::All };
            let decision = session.authorization().explain(&required, mode);
            print_json(&serde_json::to_value(&decision)?)?;
            if !decision.granted {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Request { method, path, body } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method {method:?}"))?;
            let mut request = ApiRequest::new(method, path);
            if let Some(body) = body {
                let body: Value = serde_json::from_str(&body).context("--body must be valid JSON")?;
                request = request.with_json(body);
            }

            let response = session.send(request).await?;
            eprintln!("{}", response.status);
            match response.json::<Value>() {
                Ok(value) => print_json(&value)?,
                Err(_) => println!("{}", response.text()),
            }
            if !response.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
