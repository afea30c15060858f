//! Backend command line.
//! （後端程序的指令列。）
//!
//! The supervisor turns a [`LaunchSpec`] into a `tokio::process::Command` with piped
//! output, a closed stdin and kill-on-drop, so a shell that dies never leaves the engine
//! running behind it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

/// Program, arguments and environment the backend is started with.
/// （啟動後端所用的程式、參數與環境變數。）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Added on top of the shell's own environment.
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn push_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends the `--port <N>` pair the backend binds its listener to.
    /// （加入後端監聽所用的 `--port <N>` 參數。）
    pub fn with_port(self, port: u16) -> Self {
        self.push_arg("--port").push_arg(port.to_string())
    }

    /// Merges `vars` into the backend environment; later keys win.
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Command line as shown in logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_appended_after_script_arguments() {
        let spec = LaunchSpec::new("python")
            .with_args(["dist/server/zinspector.py"])
            .with_port(55001);
        assert_eq!(
            spec.args,
            vec!["dist/server/zinspector.py", "--port", "55001"]
        );
        assert_eq!(spec.display(), "python dist/server/zinspector.py --port 55001");
        assert_eq!(LaunchSpec::new("engine").display(), "engine");
    }

    #[test]
    fn later_environment_entries_override_earlier_ones() {
        let spec = LaunchSpec::new("engine")
            .with_envs([("MODE", "gui"), ("PYTHONUNBUFFERED", "1")])
            .with_envs([("MODE", "headless")]);
        assert_eq!(spec.env.get("MODE").map(String::as_str), Some("headless"));
        assert_eq!(spec.env.len(), 2);
    }
}
