mod console;
mod context;
mod logging;
mod session;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use zinspector_settings::{ConfigStore, ShellConfig};
use zinspector_supervisor::find_free_port;

use crate::context::AppContext;

const DEFAULT_CONFIG_FILE: &str = "zinspector.json";

#[derive(Parser)]
#[command(
    name = "zinspector-shell",
    about = "Console front end for the ZInspector engine",
    author,
    version
)]
struct Cli {
    /// 設定檔路徑；預設為目前目錄下的 zinspector.json。 / Configuration file (defaults to ./zinspector.json).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// 日誌過濾條件，優先於 ZINSPECTOR_LOG。 / Log filter, e.g. `debug` or `backend=debug`; overrides ZINSPECTOR_LOG.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 啟動後端並讀取主控台指令。 / Start the backend and read console commands.
    Run,
    /// 顯示第一個可用的連接埠。 / Print the first free port in a range.
    FindPort(FindPortArgs),
    /// 檢視或建立設定檔。 / Show or create the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct FindPortArgs {
    /// 掃描起點；預設取自設定檔。 / First port to probe (defaults to the configured range).
    #[arg(long)]
    start: Option<u16>,
    /// 掃描終點（含）。 / Last port to probe, inclusive.
    #[arg(long)]
    end: Option<u16>,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// 以 JSON 顯示目前生效的設定。 / Print the effective configuration as JSON.
    Show,
    /// 寫入預設設定。 / Write the default configuration.
    Init(ConfigInitArgs),
}

#[derive(Args)]
struct ConfigInitArgs {
    /// 覆寫既有檔案。 / Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        log_level,
        command,
    } = Cli::parse();
    let config_path = resolve_config_path(config)?;
    let store = ConfigStore::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    logging::init(log_level.as_deref(), &store.config().logging.level)?;

    match command {
        Commands::Run => run_session(store.config().clone()),
        Commands::FindPort(args) => execute_find_port(args, store.config()),
        Commands::Config(ConfigCommand::Show) => {
            println!("{}", store.to_pretty_json()?);
            Ok(())
        }
        Commands::Config(ConfigCommand::Init(args)) => init_config(args, &config_path),
    }
}

fn run_session(config: ShellConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(session::run(AppContext::new(config)))
}

fn execute_find_port(args: FindPortArgs, config: &ShellConfig) -> Result<()> {
    let range = config.backend.port_range;
    let start = args.start.unwrap_or(range.start);
    let end = args.end.unwrap_or(range.end);
    let port = find_free_port(start, end)?;
    println!("{port}");
    Ok(())
}

fn init_config(args: ConfigInitArgs, path: &Path) -> Result<()> {
    if path.exists() && !args.force {
        bail!(
            "config file '{}' already exists; use --force to overwrite",
            path.display()
        );
    }
    ConfigStore::new(path, ShellConfig::default())
        .save()
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn resolve_config_path(config: Option<PathBuf>) -> Result<PathBuf> {
    let path = config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}
