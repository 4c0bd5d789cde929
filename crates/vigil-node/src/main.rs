use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_node::{logging, NodeConfig, Script, ScriptRunner, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil - escrowed removal tasks with appeals", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output directory for configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Replay a JSON script against an in-memory deployment
    Run {
        /// Script file
        script: PathBuf,

        /// Stop at the first rejected step and exit with an error
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (ignore if it doesn't)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Priority order: ENV vars > Config file > Defaults
    let mut config = NodeConfig::load(cli.config.as_deref())?;
    config.apply_env_overrides();

    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        let log_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vigil={}", log_level)),
            ))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    config.validate()?;

    match cli.command {
        Commands::Init { output } => {
            info!(output_dir = ?output, "🧬 Initializing new configuration");
            std::fs::create_dir_all(&output)?;

            let path = output.join(DEFAULT_CONFIG_FILE);
            if path.exists() {
                warn!(path = %path.display(), "Configuration already exists, leaving it");
                return Ok(());
            }
            NodeConfig::default().save_to_file(&path)?;
            info!(path = %path.display(), "📝 Configuration written");
        }

        Commands::Run { script, strict } => {
            let loaded = Script::from_file(&script)?;
            info!(
                script = %script.display(),
                steps = loaded.steps.len(),
                seed = %config.simulation.beacon_seed,
                "📜 Loaded script"
            );

            let mut runner = ScriptRunner::new(&config)?;
            let report = runner.run(&loaded, strict).await?;
            let rendered =
                serde_json::to_string_pretty(&report).context("rendering script report")?;
            println!("{}", rendered);

            if let Some(index) = report.halted_at {
                let error = report
                    .steps
                    .get(index)
                    .and_then(|s| s.error.clone())
                    .unwrap_or_default();
                anyhow::bail!("script halted at step {}: {}", index, error);
            }
        }
    }

    Ok(())
}
