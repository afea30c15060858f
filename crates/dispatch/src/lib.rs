//! Command workflows for the object explorer.
//! （物件瀏覽器的指令流程。）

mod collaborators;
mod command;
mod dispatcher;
mod error;

pub use collaborators::{CollectedErrors, ErrorSurface, NoPrompt, Prompter};
pub use command::{Command, Outcome};
pub use dispatcher::CommandDispatcher;
pub use error::{WorkflowError, WorkflowStep};
