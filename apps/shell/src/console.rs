//! Console front end: command parsing, prompts, error reporting and tree rendering.
//! （主控台前端：指令解析、提示輸入、錯誤回報與樹狀顯示。）

use std::io::{self, Write};

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};
use zinspector_dispatch::{Command, ErrorSurface, Prompter, WorkflowError};
use zinspector_explorer::{ObjectNode, SelectionMode, TreeState};

pub const HELP: &str = "\
commands:
  new [name]      create a project and select it
  open [name]     same as new, as requested by the explorer view
  import [path]   import a mesh into the first project
  refresh         reload the explorer tree
  tree            print the object tree as JSON
  name <id>       print the name of an object
  help            show this list
  quit            stop the backend and exit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Empty,
    Help,
    Quit,
    Run(Command),
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_string());
    match word.to_ascii_lowercase().as_str() {
        "new" => ConsoleInput::Run(Command::NewProject { name: argument }),
        "open" => ConsoleInput::Run(Command::OpenProject { name: argument }),
        "import" => ConsoleInput::Run(Command::ImportMesh { path: argument }),
        "refresh" => ConsoleInput::Run(Command::RefreshExplorer),
        "tree" => ConsoleInput::Run(Command::PrintObjectTree),
        "name" => match argument {
            Some(id) => ConsoleInput::Run(Command::ObjectName(id)),
            None => ConsoleInput::Usage("usage: name <id>"),
        },
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" => ConsoleInput::Quit,
        _ => ConsoleInput::Unknown(word.to_string()),
    }
}

/// Asks for missing command arguments on the console input.
/// （在主控台輸入中詢問缺少的指令參數。）
///
/// A blank answer or end of input dismisses the prompt.
pub struct ConsolePrompter<'a, R> {
    input: &'a mut FramedRead<R, LinesCodec>,
}

impl<'a, R> ConsolePrompter<'a, R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(input: &'a mut FramedRead<R, LinesCodec>) -> Self {
        Self { input }
    }

    async fn ask(&mut self, label: &str) -> Option<String> {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{label}: ");
        let _ = stdout.flush();
        match self.input.next().await {
            Some(Ok(line)) => {
                let answer = line.trim();
                (!answer.is_empty()).then(|| answer.to_string())
            }
            _ => None,
        }
    }
}

impl<R> Prompter for ConsolePrompter<'_, R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn project_name(&mut self) -> Option<String> {
        self.ask("project name").await
    }

    async fn mesh_path(&mut self) -> Option<String> {
        self.ask("mesh path").await
    }
}

/// Prints workflow failures on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSurface;

impl ErrorSurface for ConsoleSurface {
    fn report(&self, command: &Command, error: &WorkflowError) {
        eprintln!("error: {command} failed: {error}");
    }
}

/// Renders the explorer view: collapsed nodes hide their children, selected nodes are
/// marked `*` (anchor) or `+` (extension).
pub fn render_tree(state: &TreeState) -> String {
    let mut out = String::new();
    render_node(state, &state.tree, 0, &mut out);
    out
}

fn render_node(state: &TreeState, node: &ObjectNode, depth: usize, out: &mut String) {
    let expanded = state.expanded.contains(&node.id);
    let marker = if node.is_leaf() {
        "   "
    } else if expanded {
        "[-]"
    } else {
        "[+]"
    };
    let selection = match state.selected.mode_for(&node.id) {
        Some(SelectionMode::Replace) => " *",
        Some(SelectionMode::Extend) => " +",
        None => "",
    };
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!(
        "{marker} {} ({}){selection}\n",
        node.label, node.id
    ));
    if expanded {
        for child in &node.children {
            render_node(state, child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zinspector_explorer::{ExpandedSet, SelectedSet};

    #[test]
    fn parses_commands_with_optional_arguments() {
        assert_eq!(
            parse_line("new  Widget Assembly "),
            ConsoleInput::Run(Command::NewProject {
                name: Some("Widget Assembly".into())
            })
        );
        assert_eq!(
            parse_line("import"),
            ConsoleInput::Run(Command::ImportMesh { path: None })
        );
        assert_eq!(
            parse_line("NAME p1"),
            ConsoleInput::Run(Command::ObjectName("p1".into()))
        );
        assert_eq!(parse_line("name"), ConsoleInput::Usage("usage: name <id>"));
        assert_eq!(parse_line("   "), ConsoleInput::Empty);
        assert_eq!(parse_line("exit"), ConsoleInput::Quit);
        assert_eq!(parse_line("frobnicate x"), ConsoleInput::Unknown("frobnicate".into()));
    }

    #[tokio::test]
    async fn prompter_reads_answers_and_treats_blank_as_dismissal() {
        let mut input = FramedRead::new(&b"Widget\n\n"[..], LinesCodec::new());
        let mut prompter = ConsolePrompter::new(&mut input);
        assert_eq!(prompter.project_name().await, Some("Widget".into()));
        assert_eq!(prompter.mesh_path().await, None);
        assert_eq!(prompter.mesh_path().await, None);
    }

    #[test]
    fn renders_only_expanded_branches() {
        let tree = ObjectNode::explorer_root(vec![
            ObjectNode::new("p1", "Widget")
                .with_children(vec![ObjectNode::new("m1", "bolt.stl")]),
            ObjectNode::new("p2", "Gear").with_children(vec![ObjectNode::new("m2", "cog.stl")]),
        ]);
        let state = TreeState {
            revision: 1,
            tree,
            expanded: ["#root", "p1"].into_iter().collect::<ExpandedSet>(),
            selected: ["m1", "p2"].into_iter().collect::<SelectedSet>(),
        };
        assert_eq!(
            render_tree(&state),
            "[-] Projects (#root)\n  [-] Widget (p1)\n        bolt.stl (m1) *\n  [+] Gear (p2) +\n"
        );
    }
}
