use std::future::Future;
use std::sync::Mutex;

use crate::command::Command;
use crate::error::WorkflowError;

/// Source of user input for commands that need it.
/// （提供指令所需使用者輸入的協作者。）
///
/// Returning `None` means the user dismissed the prompt.
pub trait Prompter: Send {
    fn project_name(&mut self) -> impl Future<Output = Option<String>> + Send;

    fn mesh_path(&mut self) -> impl Future<Output = Option<String>> + Send;
}

/// User-visible channel for workflow failures.
pub trait ErrorSurface: Send + Sync {
    fn report(&self, command: &Command, error: &WorkflowError);
}

/// Prompter for non-interactive callers: every prompt is dismissed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    async fn project_name(&mut self) -> Option<String> {
        None
    }

    async fn mesh_path(&mut self) -> Option<String> {
        None
    }
}

/// Error surface that keeps every report, in order.
#[derive(Debug, Default)]
pub struct CollectedErrors {
    reports: Mutex<Vec<String>>,
}

impl CollectedErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().expect("error reports poisoned").clone()
    }
}

impl ErrorSurface for CollectedErrors {
    fn report(&self, command: &Command, error: &WorkflowError) {
        let mut guard = self.reports.lock().expect("error reports poisoned");
        guard.push(format!("{command}: {error}"));
    }
}
