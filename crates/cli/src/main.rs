use crate::{
    conn::{ConnectionKind, ConnectionPinger, MySqlConnectionPinger},
    env::EnvManager,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use chrono::Utc;
use clap::Parser;
use commands::Commands;
use connectors::adapter::StoreRegistry;
use engine_config::settings::{SyncConfig, default_state_dir};
use engine_core::{
    progress::ProgressService,
    state::{StateStore, sled_store::SledStateStore},
};
use engine_runtime::{
    error::RunnerError,
    plan,
    report::Outcome,
    runner::BatchRunner,
    step::Synchronizer,
};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod conn;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "tablesync",
    version = "0.1.0",
    about = "Resumable table synchronization between MySQL databases"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let code = match run(cli.command).await {
        Ok(code) => code,
        Err(CliError::Runner(RunnerError::ShutdownRequested)) => {
            warn!("Stopped on request, run the same job id again to resume");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(command: Commands) -> Result<ExitCode, CliError> {
    match command {
        Commands::Sync {
            config,
            job,
            env_file,
        } => sync(&config, job, env_file).await,
        Commands::Plan { config } => {
            let config = SyncConfig::load(&config)?;
            let operations = plan::operations(&config.to_options(Utc::now().timestamp()));
            output::print_json(&operations)?;
            Ok(ExitCode::Success)
        }
        Commands::Progress {
            job,
            json,
            state_dir,
        } => {
            let dir = state_dir.unwrap_or_else(default_state_dir);
            let service = ProgressService::new(open_state_store(&dir)?);
            let status = service.job_status(&job).await?;

            if json {
                output::print_json(&status)?;
            } else {
                output::print_progress_table(&status);
            }
            Ok(ExitCode::Success)
        }
        Commands::TestConn { conn_str } => {
            match ConnectionKind::from_str(&conn_str)? {
                ConnectionKind::MySql => MySqlConnectionPinger { conn_str }.ping().await?,
            }
            Ok(ExitCode::Success)
        }
    }
}

async fn sync(
    config_path: &Path,
    job: Option<String>,
    env_file: Option<PathBuf>,
) -> Result<ExitCode, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = env_file {
        env.load_from_file(path)?;
    }

    let config = SyncConfig::load(config_path)?;
    let urls = config.resolved_stores(|var| env.get(var))?;
    let registry = StoreRegistry::connect_all(&urls).await?;

    let options = config.to_options(Utc::now().timestamp());
    let store = open_state_store(&config.state_dir())?;

    let job_id = job.unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(
        job_id = %job_id,
        source = %options.source,
        destination = %options.destination,
        "Synchronizing tables"
    );

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let runner = BatchRunner::new(Synchronizer::new(registry), store, shutdown.cancel_token());
    let report = runner.run(&job_id, options).await?;
    report.log();

    Ok(match report.outcome() {
        Outcome::Synchronized => ExitCode::Success,
        Outcome::SynchronizedWithErrors => ExitCode::PartialSync,
        Outcome::Failed => ExitCode::GeneralError,
    })
}

fn open_state_store(path: &Path) -> Result<Arc<dyn StateStore>, CliError> {
    let store = SledStateStore::open(path)?;
    info!(path = %path.display(), "Opened state database");
    Ok(Arc::new(store))
}
