mod check_cmd;
mod config;
mod validate_cmd;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use validate_cmd::ValidateArgs;

#[derive(Parser)]
#[command(name = "pact", about = "Contract-gated handoff validation for coding agents")]
struct Cli {
    /// Per-condition timeout in milliseconds (overrides PACT_TIMEOUT_MS)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Audit log path (overrides PACT_LOG_FILE)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a pact config file with default settings
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Parse the embedded contract in a file and print a summary
    Check {
        /// File containing agent output
        file: PathBuf,
    },
    /// Validate a handoff against the contract embedded in an output file
    Validate {
        /// File containing the producing agent's output
        file: PathBuf,
        /// Producing agent id
        #[arg(long)]
        from: String,
        /// Receiving agent id
        #[arg(long)]
        to: String,
        /// JSON file with the handoff data (defaults to null)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();
    if path.exists() && !force {
        bail!(
            "config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    config::save_config(&config::ConfigFile::default())?;
    println!("Wrote config file to {}.", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Check { file } => {
            check_cmd::run_check(&file)?;
        }
        Commands::Validate {
            file,
            from,
            to,
            data,
            json,
        } => {
            let resolved = config::resolve(cli.timeout_ms, cli.log_file);
            let success = validate_cmd::run_validate(
                ValidateArgs {
                    file: &file,
                    from_agent: &from,
                    to_agent: &to,
                    data_file: data.as_deref(),
                    json,
                },
                resolved,
            )
            .await?;

            if !success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
