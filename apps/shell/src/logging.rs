use std::io::{self, IsTerminal};

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "ZINSPECTOR_LOG";

/// Installs the global subscriber writing to stderr.
/// （安裝寫入標準錯誤輸出的全域日誌訂閱者。）
///
/// Precedence: `--log-level`, then `ZINSPECTOR_LOG`, then the configured level.
pub fn init(cli_level: Option<&str>, configured_level: &str) -> Result<()> {
    let directive = match cli_level {
        Some(level) => level.to_string(),
        None => match std::env::var(LOG_ENV) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => configured_level.to_string(),
        },
    };
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
        .map_err(|err| anyhow!(err))
}
