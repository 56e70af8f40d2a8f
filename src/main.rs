mod app;
mod client;
mod config;
mod models;
mod persistence;
mod tui;
mod workspace;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use app::{parse_target, run_tui};
use client::{DojoApi, HttpDojoApi, HttpServiceProbe};
use config::Settings;
use models::FlagSource;
use persistence::FilePreferenceStore;
use workspace::{Collaborators, NextOutcome, SystemClipboard, WorkspaceController};

#[derive(Parser)]
#[command(name = "dojo-workbench")]
#[command(version = "0.1.0")]
#[command(about = "TUI for pwn.college dojo workspaces")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Dojo host, e.g. pwn.college or localhost:8080
    #[arg(long, env = "DOJO_HOST", global = true)]
    host: Option<String>,

    /// Talk plain HTTP (local dojo deployments)
    #[arg(long, global = true)]
    insecure_http: bool,

    /// Value of the dojo `session` cookie
    #[arg(long, env = "DOJO_SESSION", hide_env_values = true, global = true)]
    session: Option<String>,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the running challenge and its workspace
    Status,
    /// Start a challenge (dojo/module/challenge) and wait until it is up
    Start {
        challenge: String,
        /// Privileged practice sandbox
        #[arg(short, long)]
        practice: bool,
    },
    /// Submit a flag for the running challenge
    Submit { flag: String },
    /// Start the next challenge in the progression
    Next,
    /// Terminate the running sandbox
    Kill,
    /// Reset the home directory of the running sandbox
    ResetHome,
    /// Interactive workspace (the default)
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if cli.insecure_http {
        settings.server.protocol = "http".to_string();
    }
    if cli.session.is_some() {
        settings.server.session = cli.session;
    }

    init_logging().context("could not set up logging")?;

    let api: Arc<dyn DojoApi> = Arc::new(HttpDojoApi::new(&settings.server)?);
    let probe = Arc::new(HttpServiceProbe::new(&settings.server)?);
    let controller = Arc::new(WorkspaceController::new(
        settings,
        Collaborators {
            api: Arc::clone(&api),
            probe,
            clipboard: Arc::new(SystemClipboard),
            preferences: Arc::new(FilePreferenceStore::open_default()),
        },
    )?);

    match cli.command {
        Some(Commands::Status) => {
            let Some(challenge) = controller.restore_session().await else {
                println!("No running challenge");
                return Ok(());
            };
            println!("Running: {challenge}");
            let service = controller.store().active_service();
            let workspace = api.workspace(service).await?;
            match workspace.iframe_src {
                Some(src) if workspace.active => println!(
                    "{}: {}{}",
                    service.display_name(),
                    controller.settings().server.origin(),
                    src
                ),
                _ => println!(
                    "{}: {}",
                    service.display_name(),
                    workspace.error.unwrap_or_else(|| "not available".to_string())
                ),
            }
        }
        Some(Commands::Start { challenge, practice }) => {
            let Some((target, practice_word)) = parse_target(&challenge) else {
                bail!("expected dojo/module/challenge, got {challenge:?}");
            };
            controller.open_challenge(&target, practice || practice_word).await?;
            println!("Starting {target}...");
            wait_until_ready(&controller).await?;
        }
        Some(Commands::Submit { flag }) => {
            controller.restore_session().await;
            match controller.submission().submit(&flag, FlagSource::Manual).await {
                Ok(Some(result)) => println!("{}", result.message()),
                Ok(None) => bail!("nothing to submit"),
                Err(e) => bail!("{e}"),
            }
        }
        Some(Commands::Next) => {
            controller.restore_session().await;
            match controller.next().await? {
                NextOutcome::NoNext => println!("No next challenge"),
                NextOutcome::InPlace(target) | NextOutcome::Reloaded(target) => {
                    println!("Starting {target}...");
                    wait_until_ready(&controller).await?;
                }
            }
        }
        Some(Commands::Kill) => {
            controller.terminate().await?;
            println!("Sandbox terminated");
        }
        Some(Commands::ResetHome) => {
            controller.reset_home().await?;
            println!("Home directory reset");
        }
        Some(Commands::Tui) | None => {
            run_tui(controller).await?;
        }
    }

    Ok(())
}

/// Block until the selected service answers, or the start times out
async fn wait_until_ready(controller: &WorkspaceController) -> Result<()> {
    let limit = controller.settings().lifecycle.start_timeout() + Duration::from_secs(5);
    let mut session = controller.store().subscribe();
    tokio::time::timeout(limit, session.wait_for(|s| !s.is_starting()))
        .await
        .context("timed out waiting for the sandbox")?
        .context("workspace closed")?;

    let readiness = controller.prober().state();
    match (readiness.ready, readiness.url) {
        (true, Some(url)) => println!("Ready: {url}"),
        _ => match readiness.error {
            Some(error) => bail!(error),
            None => println!("Started, but the service did not confirm it is up"),
        },
    }
    Ok(())
}

/// The TUI owns the terminal, so logs go to a file under the config directory
fn init_logging() -> Result<()> {
    let dir = config::config_dir();
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("dojo-workbench.log"))?;

    let filter = EnvFilter::try_from_env("DOJO_WORKBENCH_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
