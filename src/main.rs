//! `webstate` CLI: drives the client runtime against a live backend.
//!
//! The session is persisted to `--state-file`, so `login` in one invocation
//! is visible to `whoami` in the next.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use webstate::config::ConfigError;
use webstate::net::api;
use webstate::net::transport::TransportError;
use webstate::net::types::ThemeMode;
use webstate::persist::{FileStorage, StorageError};
use webstate::runtime::InitError;
use webstate::{ApiError, AppHandle, ClientConfig, Dependencies};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
    #[error("not signed in; run `webstate login` first")]
    NotSignedIn,
    #[error("profile unavailable: {0}")]
    Profile(String),
    #[error("unknown theme `{0}`; expected light, dark or system")]
    UnknownTheme(String),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "webstate", about = "Drive the client state layer against a backend")]
struct Cli {
    #[arg(long, env = "WEBSTATE_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "WEBSTATE_STATE_FILE", default_value = ".webstate.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// `GET /health`.
    Health,
    Login {
        username: String,
        #[arg(long, env = "WEBSTATE_PASSWORD")]
        password: String,
    },
    Register {
        username: String,
        #[arg(long, env = "WEBSTATE_PASSWORD")]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Print the signed-in profile.
    Whoami,
    Logout,
    /// Show the theme, or set it to light, dark or system.
    Theme {
        mode: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(e) = dotenv {
        tracing::debug!(error = %e, "no .env loaded");
    }

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }

    let storage = Arc::new(FileStorage::open(&cli.state_file)?);
    let deps = Dependencies::from_config(&config, storage)?;
    let handle = webstate::initialize(config, deps)?;

    let result = run(&handle, cli.command).await;
    handle.settle().await;
    handle.shutdown();
    result
}

async fn run(handle: &AppHandle, command: Command) -> Result<(), CliError> {
    match command {
        Command::Health => {
            let status = api::health(handle.client()).await?;
            println!("{}: {}", status.status, status.message);
        }
        Command::Login { username, password } => {
            let user = handle.auth().login(&username, &password).await?;
            println!("signed in as {} ({})", user.username, user.id);
        }
        Command::Register { username, password, email } => {
            let user = handle.auth().register(&username, &password, email.as_deref()).await?;
            println!("registered {} ({})", user.username, user.id);
        }
        Command::Whoami => {
            if !handle.auth().get().is_authenticated() {
                return Err(CliError::NotSignedIn);
            }
            handle.settle().await;
            let state = handle.user().get();
            let Some(profile) = state.profile else {
                return Err(CliError::Profile(state.error.unwrap_or_else(|| "signed out".to_owned())));
            };
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Logout => {
            handle.auth().logout().await;
            println!("signed out");
        }
        Command::Theme { mode } => {
            let theme = handle.theme();
            if let Some(raw) = mode {
                let mode = ThemeMode::parse(&raw).ok_or(CliError::UnknownTheme(raw))?;
                theme.set_mode(mode);
            }
            println!("{} (showing {})", theme.mode().as_str(), theme.effective_scheme().as_str());
        }
    }
    Ok(())
}
