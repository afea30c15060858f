//! Configuration of the console shell.
//! （主控台殼層的設定。）

pub mod config;

pub use config::{
    BackendConfig, ConfigError, ConfigStore, ExplorerConfig, LoggingConfig, PortRange,
    ShellConfig,
};
