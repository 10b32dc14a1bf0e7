use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use vanagon_scan::{
    config::{Config, FileConfig, TargetSelection},
    output::{print_result, OutputFormat},
    pipeline::Pipeline,
    source::{enumerate_targets, VanagonSource},
};

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "vanagon-scan")]
#[command(
    author,
    version,
    about = "Scan vanagon project/platform gem dependencies for vulnerabilities"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML tuning file (default: <workspace>/.vanagon-scan.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Output format (github, json, table)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Maximum number of simultaneous scans
    #[arg(short, long, global = true)]
    concurrency: Option<usize>,

    /// Skip recording a snyk monitor snapshot
    #[arg(long, global = true)]
    no_monitor: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build manifests for every target and scan them (default)
    Scan,

    /// List the targets that would be scanned
    Targets,

    /// Show or create the tuning file
    Config {
        /// Generate default tuning file
        #[arg(long)]
        init: bool,

        /// Show tuning file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug || env_flag("INPUT_SVDEBUG"));

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.command.unwrap_or(Commands::Scan) {
        Commands::Scan => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(limit) = cli.concurrency {
                config.concurrency = limit;
            }
            config.no_monitor |= cli.no_monitor;
            config.validate()?;

            let format = match cli.format {
                Some(f) => OutputFormat::from_str(&f).map_err(|e| anyhow::anyhow!(e))?,
                None => OutputFormat::default(),
            };
            run_scan(&config, format).await
        }
        Commands::Targets => {
            let selection = TargetSelection::load(cli.config.as_deref())?;
            let source = VanagonSource::new(&selection.workspace);
            for target in enumerate_targets(&source, &selection.skip).await? {
                println!("{}\t{}", target.project, target.platform);
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(cli.config.as_deref(), init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_scan(config: &Config, format: OutputFormat) -> Result<u8> {
    debug!(
        workspace = %config.workspace.display(),
        scanner = ?config.scanner.kind(),
        concurrency = config.concurrency,
        "===DEBUG IS ON==="
    );

    let pipeline = Pipeline::from_config(config);
    let report = pipeline.execute(&config.skip).await?;

    print_result(&report, format, config.github_output.as_deref())?;

    Ok(pipeline.scanner().mode().exit_code(&report))
}

fn handle_config(explicit: Option<&Path>, init: bool, show_path: bool) -> Result<()> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let workspace = match std::env::var("GITHUB_WORKSPACE") {
                Ok(w) if !w.is_empty() => PathBuf::from(w),
                _ => std::env::current_dir()?,
            };
            FileConfig::default_path(&workspace)
        }
    };

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let content = FileConfig::generate_default_config();
        std::fs::write(&config_path, &content)?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("{}", content);
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'vanagon-scan config --init' to create one.");
        println!();
        println!("Default configuration:");
        println!("{}", FileConfig::generate_default_config());
    }

    Ok(())
}
