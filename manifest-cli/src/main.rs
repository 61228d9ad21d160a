use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use manifest_store::{JsonFileBackend, PerformanceStore};

mod commands;
mod config;
mod state;

use commands::{DimsCommand, GoalCommand, TaskCommand};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("MANIFEST_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "manifest", version, long_version = LONG_VERSION, about = "Personal performance tracker")]
struct Cli {
    /// Data home (default: $MANIFEST_HOME or ~/.manifest)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write or print ~/.manifest/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that open the data directory.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// List stored years, most recent first
    Years,

    /// Print the current month in the configured timezone
    Month,

    /// Dimension registry commands
    Dims {
        #[command(subcommand)]
        command: DimsCommand,
    },

    /// Show a year (or one dimension of it) with aggregates
    Show {
        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        dim: Option<String>,

        /// Print the raw document as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Edit annual and quarterly goals
    Goal {
        #[command(subcommand)]
        command: GoalCommand,
    },

    /// Add, update, delete and list monthly tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Month-by-month completion for one dimension
    Analysis {
        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        dim: String,
    },

    /// Set year-level dimension weights, e.g. `health=2 career=1`
    Weights {
        #[arg(long)]
        year: Option<String>,

        weights: Vec<String>,
    },

    /// Override the status -> score mapping for one dimension
    Scoring {
        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        dim: String,

        #[arg(long, default_value_t = 100.0)]
        completed: f64,

        #[arg(long, default_value_t = 50.0)]
        in_progress: f64,

        #[arg(long, default_value_t = 0.0)]
        not_started: f64,
    },

    /// Delete one year's document
    DeleteYear { year: String },

    /// Delete every year's document (dimensions are kept)
    Reset {
        /// Required; there is no undo
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let home = state::ensure_manifest_home(cli.home.as_deref())?;
    let cfg = config::load_config(&home)?;
    init_logging(&cfg.logging.filter);

    match cli.command {
        Command::Config { command } => run_config(&home, &cfg, command),
        Command::Store(command) => run_store(&home, &cfg, command).await,
    }
}

async fn run_store(home: &Path, cfg: &config::Config, command: StoreCommand) -> Result<()> {
    let store_cfg = cfg.store_config()?;
    let data_dir = cfg.data_dir(home);
    tracing::debug!(data_dir = %data_dir.display(), "opening store");
    let backend = Arc::new(JsonFileBackend::new(data_dir));
    let store = PerformanceStore::open(backend, store_cfg).await?;
    let app = commands::App::new(store);

    match command {
        StoreCommand::Years => app.years().await,
        StoreCommand::Month => {
            app.month();
            Ok(())
        }
        StoreCommand::Dims { command } => app.dims(command).await,
        StoreCommand::Show { year, dim, json } => app.show(year, dim, json).await,
        StoreCommand::Goal { command } => app.goal(command).await,
        StoreCommand::Task { command } => app.task(command).await,
        StoreCommand::Analysis { year, dim } => app.analysis(year, &dim).await,
        StoreCommand::Weights { year, weights } => app.weights(year, &weights).await,
        StoreCommand::Scoring {
            year,
            dim,
            completed,
            in_progress,
            not_started,
        } => {
            app.scoring(year, &dim, completed, in_progress, not_started)
                .await
        }
        StoreCommand::DeleteYear { year } => app.delete_year(&year).await,
        StoreCommand::Reset { yes } => app.reset(yes).await,
    }
}

fn run_config(home: &Path, cfg: &config::Config, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Init => {
            let (path, written) = config::init_config(home)?;
            if written {
                println!("Wrote {}", path.display());
            } else {
                println!("Config already exists: {}", path.display());
            }
        }
        ConfigCommand::Show => {
            print!("{}", toml::to_string_pretty(cfg).context("serialize config")?);
        }
    }
    Ok(())
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_and_store_commands_route_separately() {
        let cli = Cli::try_parse_from(["manifest", "config", "init"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                command: ConfigCommand::Init
            }
        ));

        let cli = Cli::try_parse_from(["manifest", "--home", "/tmp/m", "years"]).unwrap();
        assert!(matches!(cli.command, Command::Store(StoreCommand::Years)));
        assert_eq!(cli.home.as_deref(), Some(Path::new("/tmp/m")));

        let cli = Cli::try_parse_from(["manifest", "task", "add", "--dim", "health", "--title", "Run", "--month", "3"])
            .unwrap();
        assert!(matches!(cli.command, Command::Store(StoreCommand::Task { .. })));
        assert!(Cli::try_parse_from(["manifest", "task", "add", "--dim", "health", "--title", "Run", "--month", "13"]).is_err());
    }
}
