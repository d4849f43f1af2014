use anyhow::Result;
use clap::Parser;
use log::error;
use scaff::commands::{self, Settings};
use scaff::dispatch::{DEFAULT_RUNNER, DispatchPayload};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// scaff - project scaffolding CLI
///
/// Each subcommand is implemented by a package published to an npm-compatible
/// registry. The package is downloaded into a local versioned cache on first
/// use, kept up to date on later runs, and executed with the arguments given
/// here.
///
/// Examples:
///   scaff init my-app              # Scaffold my-app with the latest init package
///   scaff init --target-path ./pkg # Run a local checkout of the init package
///   scaff cache list               # Show cached package versions
#[derive(Parser, Debug)]
#[command(author, version = env!("SCAFF_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging and print full error chains
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Use the package at this path instead of the cache (also via SCAFF_TARGET_PATH)
    #[arg(
        long = "target-path",
        visible_alias = "tp",
        env = "SCAFF_TARGET_PATH",
        value_name = "PATH",
        global = true
    )]
    pub target_path: Option<PathBuf>,

    /// Home directory; relative paths are taken from the user's home (also via SCAFF_HOME)
    #[arg(long, env = "SCAFF_HOME", value_name = "PATH", global = true)]
    pub home: Option<PathBuf>,

    /// Registry base URL (defaults to https://registry.npmjs.org)
    #[arg(long, env = "SCAFF_REGISTRY", value_name = "URL", global = true)]
    pub registry: Option<String>,

    /// Use the npmmirror.com registry
    #[arg(long, global = true, conflicts_with = "registry")]
    pub mirror: bool,

    /// Interpreter used to run package entry points
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_RUNNER, global = true)]
    pub runner: String,

    /// Install package dependencies after download
    #[arg(long, global = true)]
    pub install_deps: bool,

    /// Skip checking the registry for a newer scaff
    #[arg(long, env = "SCAFF_NO_UPDATE_CHECK", global = true)]
    pub no_update_check: bool,

    /// Registry request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 5, global = true)]
    pub timeout: u64,

    /// Extra attempts for failed registry requests
    #[arg(long, value_name = "N", default_value_t = 0, global = true)]
    pub retries: usize,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Create a new project
    Init(InitArgs),

    /// Inspect or clean the package cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(clap::Args, Debug, Serialize)]
pub struct InitArgs {
    /// Name of the project to create
    #[arg(value_name = "PROJECT_NAME")]
    #[serde(skip)]
    pub project_name: Option<String>,

    /// Initialize even if the current directory is not empty
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// List cached package versions
    List,

    /// Remove superseded versions and leftovers of failed installs
    Prune {
        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            home: self.home.clone(),
            target_path: self.target_path.clone(),
            registry: self.registry.clone(),
            mirror: self.mirror,
            runner: self.runner.clone(),
            install_deps: self.install_deps,
            update_check: !self.no_update_check,
            timeout: Duration::from_secs(self.timeout),
            retries: self.retries,
        }
    }
}

/// `init [projectName]`: the name slot is always present, `null` when omitted.
fn init_payload(args: &InitArgs) -> Result<DispatchPayload> {
    DispatchPayload::new("init")
        .optional_arg(args.project_name.as_deref())
        .with_options(args)
}

async fn run(cli: Cli) -> Result<i32> {
    let runtime = scaff::runtime::RealRuntime;
    let settings = cli.settings();

    match cli.command {
        Commands::Init(args) => commands::run(runtime, &settings, init_payload(&args)?).await,
        Commands::Cache(CacheCommands::List) => {
            commands::cache_list(runtime, &settings)?;
            Ok(0)
        }
        Commands::Cache(CacheCommands::Prune { dry_run }) => {
            commands::cache_prune(runtime, &settings, dry_run)?;
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let debug = cli.debug;
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            if debug {
                eprintln!("{:?}", e);
            }
            1
        }
    };
    std::process::exit(code);
}
