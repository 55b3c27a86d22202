//! Courier CLI - issue orchestrated requests from the command line.
//!
//! ```text
//! courier get|post|put|delete <path> [json]
//! courier users [id]
//! ```
//!
//! Settings come from `~/.courier/config.toml`; the bearer token lives in the
//! configured credential file and is refreshed in place on a 401.

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use courier_config::CourierConfig;
use courier_core::courier_types::{
    CredentialStore, MemoryCredentialStore, Method, RequestDescriptor,
};
use courier_core::{Notifier, RequestOrchestrator, UserService};
use courier_utils::FileCredentialStore;

#[derive(Debug, Parser)]
#[command(name = "courier")]
#[command(about = "Send orchestrated HTTP requests and print the JSON reply")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// GET a path; JSON object becomes query parameters
    Get(RequestArgs),
    /// POST a path with an optional JSON body
    Post(RequestArgs),
    /// PUT a path with an optional JSON body
    Put(RequestArgs),
    /// DELETE a path; JSON object becomes query parameters
    #[command(alias = "del")]
    Delete(RequestArgs),
    /// List users, or fetch one by id
    Users {
        id: Option<u64>,
    },
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// Path relative to the configured base URL
    path: String,
    /// JSON payload
    json: Option<String>,
}

impl RequestArgs {
    fn payload(&self) -> Result<Option<Value>> {
        self.json
            .as_deref()
            .map(|raw| {
                serde_json::from_str(raw)
                    .with_context(|| format!("argument is not valid JSON: {raw}"))
            })
            .transpose()
    }
}

/// Prints user-facing failure messages to stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("courier: {message}");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_courier_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Stdout carries the JSON result; keep logs off it.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_courier_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in courier_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn courier_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.courier/logs/courier.log
    if let Some(dir) = courier_config::courier_dir() {
        candidates.push(dir.join("logs").join("courier.log"));
    }

    // Fallback: ./.courier/logs/courier.log
    candidates.push(PathBuf::from(".courier").join("logs").join("courier.log"));

    candidates
}

fn build_orchestrator() -> Result<RequestOrchestrator> {
    let config = CourierConfig::load()?.unwrap_or_default();
    let resolved = config.resolve()?;

    let credentials: Arc<dyn CredentialStore> = match resolved.auth.credential_file() {
        Some(path) => Arc::new(
            FileCredentialStore::open(path)
                .with_context(|| format!("failed to open credentials at {}", path.display()))?,
        ),
        None => {
            tracing::warn!("No credential file location; using an in-memory store");
            Arc::new(MemoryCredentialStore::default())
        }
    };

    let orchestrator = RequestOrchestrator::builder(resolved.orchestrator)
        .credentials(credentials)
        .refresh_path(resolved.auth.refresh_path())
        .notifier(Arc::new(StderrNotifier))
        .build()?;
    Ok(orchestrator)
}

async fn send(
    orchestrator: &RequestOrchestrator,
    method: Method,
    args: &RequestArgs,
) -> Result<Value> {
    let mut descriptor = RequestDescriptor::new(method, args.path.as_str())?;
    if let Some(payload) = args.payload()? {
        descriptor = if matches!(method, Method::Get | Method::Delete) {
            descriptor.with_params(payload)?
        } else {
            descriptor.with_body(payload)?
        };
    }
    Ok(orchestrator.request_value(descriptor).await?)
}

async fn run(command: Commands, orchestrator: &RequestOrchestrator) -> Result<Value> {
    let users = || UserService::new(orchestrator.clone());
    let value = match command {
        Commands::Get(args) => send(orchestrator, Method::Get, &args).await?,
        Commands::Post(args) => send(orchestrator, Method::Post, &args).await?,
        Commands::Put(args) => send(orchestrator, Method::Put, &args).await?,
        Commands::Delete(args) => send(orchestrator, Method::Delete, &args).await?,
        Commands::Users { id: None } => serde_json::to_value(users().fetch_users().await?)?,
        Commands::Users { id: Some(id) } => {
            serde_json::to_value(users().fetch_user_by_id(id).await?)?
        }
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();
    let orchestrator = build_orchestrator()?;

    let result = tokio::select! {
        result = run(cli.command, &orchestrator) => result,
        _ = tokio::signal::ctrl_c() => {
            let cancelled = orchestrator.cancel_all_requests();
            tracing::info!(cancelled, "Interrupted");
            bail!("interrupted");
        }
    };
    orchestrator.dispose();

    let value = result?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
