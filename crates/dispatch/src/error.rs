use std::fmt;

use thiserror::Error;
use zinspector_explorer::{ObjectTreeError, TreeSnapshotStoreError};
use zinspector_rpc::RpcError;

/// Workflow step that issued a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    CreateProject,
    ListProjects,
    ImportMesh,
    FetchTree,
    GetName,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStep::CreateProject => "createProject",
            WorkflowStep::ListProjects => "getObjects",
            WorkflowStep::ImportMesh => "importMesh",
            WorkflowStep::FetchTree => "getObjectTree",
            WorkflowStep::GetName => "getName",
        };
        f.write_str(name)
    }
}

/// Failure that aborted a command workflow.
/// （中止指令流程的錯誤。）
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{step} failed: {source}")]
    Rpc {
        step: WorkflowStep,
        #[source]
        source: RpcError,
    },
    #[error("no projects found")]
    NoProjects,
    #[error("failed to render object tree: {0}")]
    Render(#[from] ObjectTreeError),
    #[error(transparent)]
    Dump(#[from] TreeSnapshotStoreError),
}

impl WorkflowError {
    pub(crate) fn rpc(step: WorkflowStep) -> impl FnOnce(RpcError) -> Self {
        move |source| WorkflowError::Rpc { step, source }
    }

    /// The RPC failure behind this error, if any.
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            WorkflowError::Rpc { source, .. } => Some(source),
            _ => None,
        }
    }
}
