use std::fmt;

use zinspector_explorer::{ExpandedSet, ObjectNode, SelectedSet};

/// User-initiated command handled by the dispatcher.
/// （由分派器處理的使用者指令。）
///
/// Commands that need user input carry it optionally; when it is missing the dispatcher asks
/// the [`Prompter`](crate::Prompter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewProject { name: Option<String> },
    /// Project request coming from the explorer view; runs the new-project workflow.
    OpenProject { name: Option<String> },
    ImportMesh { path: Option<String> },
    RefreshExplorer,
    PrintObjectTree,
    ObjectName(String),
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::NewProject { .. } => "new project",
            Command::OpenProject { .. } => "open project",
            Command::ImportMesh { .. } => "import mesh",
            Command::RefreshExplorer => "refresh explorer",
            Command::PrintObjectTree => "print object tree",
            Command::ObjectName(_) => "object name",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a completed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The prompt was dismissed; nothing was sent to the backend.
    Cancelled,
    /// Backend state changed and subscribers were brought up to date.
    Synchronized {
        tree: ObjectNode,
        expanded: ExpandedSet,
        selected: SelectedSet,
        reached: usize,
    },
    /// Read-only tree fetch.
    Tree(ObjectNode),
    Name(String),
}

impl Outcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }
}
