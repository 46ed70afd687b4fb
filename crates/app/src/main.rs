use std::path::PathBuf;

use anyhow::Context;

use jobwatch_app::JobSystem;
use jobwatch_infra::AppConfig;

const DEFAULT_CONFIG: &str = "config.yaml";

/// `--config <path>`, a bare path argument, `JOBWATCH_CONFIG`, or
/// `config.yaml`, in that order.
fn config_path() -> PathBuf {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return PathBuf::from(path);
            }
        } else if let Some(path) = arg.strip_prefix("--config=") {
            return PathBuf::from(path);
        } else if !arg.starts_with('-') {
            return PathBuf::from(arg);
        }
    }
    std::env::var_os("JOBWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn load_env_file() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Ok(_) | Err(dotenvy::Error::Io(_)) => Ok(()),
        Err(e) => Err(e).context("failed to parse .env file"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file()?;

    let path = config_path();
    let config = AppConfig::load(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    jobwatch_observability::init(&config.logging);

    let system = JobSystem::from_config(&config).context("failed to build job system")?;
    system
        .shutdown_coordinator()
        .listen_for_signals()
        .context("failed to install signal handlers")?;

    let exit = system.run().await?;
    tracing::info!(exit = ?exit, "job system exited");

    let code = exit.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
