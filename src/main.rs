//! Map Tiler CLI
//!
//! Turns uploaded map-sea captures into slippy-map tile pyramids.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use map_tiler::{build_runtime, init_rayon, run_pipeline, scan_uploads, Config, RunOutcome};

#[derive(Parser)]
#[command(name = "map-tiler")]
#[command(about = "Stitch uploaded map captures and cut them into tile pyramids", long_about = None)]
struct Cli {
    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Override the upload root
    #[arg(long, global = true)]
    upload_root: Option<PathBuf>,

    /// Override the storage root
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process pending uploads (default if no command specified)
    Run,

    /// Validate pending uploads without processing anything
    Scan,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli.config, cli.upload_root, cli.storage_root)?;
            run_command(config)?;
        }

        Some(Commands::Scan) => {
            let config = load_config(&cli.config, cli.upload_root, cli.storage_root)?;
            scan_command(config)?;
        }

        Some(Commands::Validate) => {
            let config = load_config(&cli.config, cli.upload_root, cli.storage_root)?;
            config.validate()?;
            println!("Configuration is valid");
        }

        Some(Commands::GenerateConfig { output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

/// Read the config file if present and apply command-line overrides.
fn load_config(
    path: &PathBuf,
    upload_root: Option<PathBuf>,
    storage_root: Option<PathBuf>,
) -> Result<Config> {
    let mut config = if path.exists() {
        Config::from_file(path)?
    } else {
        tracing::info!("No configuration at {}, using defaults", path.display());
        Config::default()
    };

    if let Some(root) = upload_root {
        config.paths.upload_root = root;
    }
    if let Some(root) = storage_root {
        config.paths.storage_root = root;
    }

    Ok(config)
}

fn run_command(config: Config) -> Result<()> {
    config.validate()?;

    // Initialize Rayon
    init_rayon(config.processing.rayon_threads)?;

    // Build and run Tokio runtime
    let runtime = build_runtime(config.processing.worker_threads)?;
    match runtime.block_on(run_pipeline(config))? {
        RunOutcome::Completed(report) => {
            println!("{}", report.stats);
        }
        RunOutcome::AlreadyRunning => {
            println!("Another run is in progress; nothing done");
        }
    }

    Ok(())
}

fn scan_command(config: Config) -> Result<()> {
    config.validate()?;
    let report = scan_uploads(&config)?;
    print!("{}", report);
    Ok(())
}

fn generate_config_command(output: PathBuf) -> Result<()> {
    let yaml = r#"# Map Tiler Configuration

# === PATHS ===
paths:
  # Uploads are read from <upload_root>/<tenant>/<item>/
  upload_root: "/var/www/map_uploads"

  # Pyramids are written to <storage_root>/<tenant>/<item>/<zoom>/<col>_<row>.png
  storage_root: "/var/www/map_storage"

  # A run refuses to start while this file exists.
  # A crashed run leaves it behind; remove it by hand.
  lock_path: "/tmp/map_process_running"

# === STORE: per-tenant item database ===
store:
  host: "localhost"
  port: 5432
  database: "cadvanced"

  # Table holding one row per item, with `id` and `processed` columns
  table: "Maps"

  connect_timeout_secs: 10

  # false: the update is a notification; the upload is removed even if it fails
  # true:  the upload is kept until the update succeeds
  require_commit: false

  retry:
    max_retries: 3
    initial_backoff_ms: 100
    max_backoff_ms: 10000

# === REGISTRY: where tenant credentials come from ===
registry:
  # Must print a JSON array of instances with their env under pm2_env.env
  command: "pm2"
  args: ["jlist"]
  schema_var: "DB_SCHEMA"
  username_var: "DB_USERNAME"
  password_var: "DB_PASSWORD"

# === PROCESSING ===
processing:
  # Tenants processed side by side (items of a tenant are always sequential)
  tenant_concurrency: 1

  # Tokio async worker threads (null = num CPUs)
  # worker_threads: 4

  # Rayon thread pool size for tile encoding (null = num CPUs)
  # rayon_threads: 4

  # Log a metrics summary at the end of the run
  enable_metrics: true

  # metrics_output_path: "/tmp/map_tiler_metrics.json"
"#;

    std::fs::write(&output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}
