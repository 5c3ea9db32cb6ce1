use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use scmsync::App;
use scmsync::Config;
use scmsync::DEFAULT_JOBS;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "scmsync")]
#[command(about = "Keep local working copies in sync with their upstream repositories", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = Config::DEFAULT_PATH)]
    pub config: PathBuf,
    /// Log command output and other diagnostics
    #[arg(long)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize working copies with upstream
    Sync {
        /// Only synchronize repositories that report incoming changes
        #[arg(long)]
        check_incoming: bool,
        /// Projects to synchronize (defaults to all)
        #[arg(short, long = "project")]
        projects: Vec<String>,
        /// Number of repositories to process at once
        #[arg(short, long, default_value_t = DEFAULT_JOBS)]
        jobs: usize,
    },
    /// Report which working copies have incoming changes
    Incoming {
        /// Projects to check (defaults to all)
        #[arg(short, long = "project")]
        projects: Vec<String>,
        /// Number of repositories to process at once
        #[arg(short, long, default_value_t = DEFAULT_JOBS)]
        jobs: usize,
    },
}

fn setup_logging(debug: bool) -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let default_level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env()?;
    tracing_subscriber::fmt()
        .event_format(format)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.debug)?;

    let config = Config::load(&cli.config)?;

    let ok = match cli.command {
        Commands::Sync {
            check_incoming,
            projects,
            jobs,
        } => {
            App::new(config)
                .with_jobs(jobs)
                .cmd_sync(&projects, check_incoming, &mut std::io::stdout())
                .await?
        }
        Commands::Incoming { projects, jobs } => {
            App::new(config)
                .with_jobs(jobs)
                .cmd_incoming(&projects, &mut std::io::stdout())
                .await?
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
