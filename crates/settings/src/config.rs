use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings of the console shell.
/// （主控台殼層的設定。）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
            explorer: ExplorerConfig::default(),
        }
    }
}

impl ShellConfig {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }
        self.backend.sanitize();
        self.logging.sanitize();
    }
}

/// Inclusive range of ports probed for the backend listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 55000,
            end: 55100,
        }
    }
}

impl PortRange {
    pub fn is_valid(&self) -> bool {
        self.start != 0 && self.start <= self.end
    }
}

/// How the backend engine is launched and reached.
/// （後端引擎的啟動與連線方式。）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables for the backend process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port_range: PortRange,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
}

fn default_program() -> String {
    "python".to_string()
}

fn default_args() -> Vec<String> {
    vec!["dist/server/zinspector.py".to_string()]
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_connect_attempts() -> u32 {
    20
}

fn default_connect_delay_ms() -> u64 {
    250
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            working_dir: None,
            env: BTreeMap::new(),
            host: default_host(),
            port_range: PortRange::default(),
            connect_attempts: default_connect_attempts(),
            connect_delay_ms: default_connect_delay_ms(),
        }
    }
}

impl BackendConfig {
    fn sanitize(&mut self) {
        if self.program.trim().is_empty() {
            self.program = default_program();
        }
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if !self.port_range.is_valid() {
            self.port_range = PortRange::default();
        }
        self.connect_attempts = self.connect_attempts.max(1);
        self.env.retain(|key, _| !key.trim().is_empty() && !key.contains('='));
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    fn sanitize(&mut self) {
        if self.level.trim().is_empty() {
            self.level = default_level();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Where "print tree" also writes the tree, if anywhere.
    #[serde(default)]
    pub dump_path: Option<PathBuf>,
}

/// JSON file holding a [`ShellConfig`].
/// （保存 [`ShellConfig`] 的 JSON 檔案。）
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    data: ShellConfig,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, config: ShellConfig) -> Self {
        Self {
            path: path.into(),
            data: config,
        }
    }

    /// Loads the file at `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let mut data = ShellConfig::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: ShellConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn config(&self) -> &ShellConfig {
        &self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), ConfigError>
    where
        F: FnMut(&mut ShellConfig),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn to_pretty_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(&self.data).map_err(|source| ConfigError::Serialize {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = self.to_pretty_json()?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| ConfigError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
