use anyhow::Result;
use clap::Parser;
use conda_reconcile::application::{EnsureOptions, PackageState};
use conda_reconcile::commands::{self, config::Config};
use std::path::PathBuf;

/// conda-reconcile - declarative conda package management
///
/// Compares declared packages against a conda environment and installs,
/// updates or removes what differs.
///
/// Examples:
///   conda-reconcile -n work ensure numpy=1.26 scipy     # Install if missing
///   conda-reconcile -n work ensure --state absent scipy # Remove if present
#[derive(Parser, Debug)]
#[command(author, version = env!("CONDA_RECONCILE_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the conda executable (defaults to CONDA_EXE, then conda on PATH)
    #[arg(
        long,
        env = "CONDA_RECONCILE_EXECUTABLE",
        value_name = "PATH",
        global = true
    )]
    executable: Option<PathBuf>,

    /// Environment name, or a path for a prefix environment
    #[arg(
        long = "env",
        short = 'n',
        env = "CONDA_RECONCILE_ENV",
        value_name = "NAME|PATH",
        global = true
    )]
    environment: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Bring packages to the requested state
    Ensure(EnsureArgs),

    /// List packages installed in the environment
    List,

    /// List conda environments
    Envs,

    /// Show which packages are absent or present, without changing anything
    Diff(DiffArgs),
}

#[derive(clap::Args, Debug)]
struct EnsureArgs {
    /// Package specifiers in the format "name" or "name=version"
    #[arg(value_name = "SPEC")]
    packages: Vec<String>,

    /// Additional channel to search (repeatable)
    #[arg(long = "channel", short = 'c', value_name = "CHANNEL")]
    channels: Vec<String>,

    /// Desired package state
    #[arg(long, value_enum, default_value_t = PackageState::Present)]
    state: PackageState,

    /// Python version for a newly created environment
    #[arg(long = "python", value_name = "VERSION")]
    python_version: Option<String>,

    /// Treat any installed version as satisfying a versioned specifier
    #[arg(long)]
    no_check_version: bool,

    /// Report what would change without changing anything
    #[arg(long = "check")]
    dry_run: bool,
}

#[derive(clap::Args, Debug)]
struct DiffArgs {
    /// Package specifiers in the format "name" or "name=version"
    #[arg(value_name = "SPEC", required = true)]
    packages: Vec<String>,

    /// Ignore versions when comparing
    #[arg(long)]
    no_check_version: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        if json {
            println!("{}", commands::failure_json(&err));
        } else {
            eprintln!("Error: {:#}", err);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let runtime = conda_reconcile::runtime::RealRuntime;
    let config = Config::new(runtime, cli.executable, cli.environment, cli.json)?;

    match cli.command {
        Commands::Ensure(args) => {
            let options = EnsureOptions {
                state: args.state,
                check_version: !args.no_check_version,
                dry_run: args.dry_run,
                channels: args.channels,
                python_version: args.python_version,
            };
            commands::ensure(config, &args.packages, options).await?
        }
        Commands::List => commands::list(config).await?,
        Commands::Envs => commands::envs(config).await?,
        Commands::Diff(args) => {
            commands::diff(config, &args.packages, !args.no_check_version).await?
        }
    }
    Ok(())
}
