//! Command workflows over the backend object service.
//! （建構於後端物件服務之上的指令流程。）
//!
//! Each workflow chains its backend calls strictly one after another and, when it changed
//! backend state, finishes by fetching the whole tree and publishing it together with the
//! expansion and selection cursors. Any failing step aborts the rest of the workflow.

use std::sync::Arc;

use tracing::{debug, info, warn};
use zinspector_explorer::{
    ExpandedSet, ObjectNode, SelectedSet, SyncChannel, TreeSnapshotStore, EXPLORER_ROOT_ID,
};
use zinspector_rpc::ObjectService;

use crate::collaborators::{ErrorSurface, Prompter};
use crate::command::{Command, Outcome};
use crate::error::{WorkflowError, WorkflowStep};

/// Runs [`Command`]s against an [`ObjectService`] and publishes the results.
pub struct CommandDispatcher<S> {
    service: S,
    channel: Arc<SyncChannel>,
    dump: Option<TreeSnapshotStore>,
}

impl<S: ObjectService> CommandDispatcher<S> {
    pub fn new(service: S, channel: Arc<SyncChannel>) -> Self {
        Self {
            service,
            channel,
            dump: None,
        }
    }

    /// Also writes every printed tree to `store`.
    pub fn with_dump(mut self, store: TreeSnapshotStore) -> Self {
        self.dump = Some(store);
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn channel(&self) -> &Arc<SyncChannel> {
        &self.channel
    }

    /// Runs `command` and reports a failure to `surface` exactly once.
    /// （執行指令；失敗時僅向錯誤介面回報一次。）
    pub async fn execute<P, E>(
        &self,
        command: Command,
        prompter: &mut P,
        surface: &E,
    ) -> Result<Outcome, WorkflowError>
    where
        P: Prompter,
        E: ErrorSurface + ?Sized,
    {
        let label = command.clone();
        let result = self.run(command, prompter).await;
        if let Err(err) = &result {
            warn!(command = %label, error = %err, "command failed");
            surface.report(&label, err);
        }
        result
    }

    /// Runs `command` without reporting; the caller owns the error.
    pub async fn run<P: Prompter>(
        &self,
        command: Command,
        prompter: &mut P,
    ) -> Result<Outcome, WorkflowError> {
        debug!(command = %command, "running command");
        match command {
            Command::NewProject { name } | Command::OpenProject { name } => {
                let name = match name {
                    Some(name) => Some(name),
                    None => prompter.project_name().await,
                };
                match name {
                    Some(name) => self.new_project(&name).await,
                    None => Ok(Outcome::Cancelled),
                }
            }
            Command::ImportMesh { path } => {
                let path = match path {
                    Some(path) => Some(path),
                    None => prompter.mesh_path().await,
                };
                match path {
                    Some(path) => self.import_mesh(&path).await,
                    None => Ok(Outcome::Cancelled),
                }
            }
            Command::RefreshExplorer => {
                self.resynchronize(ExpandedSet::new(), SelectedSet::new())
                    .await
            }
            Command::PrintObjectTree => self.print_object_tree().await,
            Command::ObjectName(id) => {
                let response = self
                    .service
                    .get_name(&id)
                    .await
                    .map_err(WorkflowError::rpc(WorkflowStep::GetName))?;
                Ok(Outcome::Name(response.name))
            }
        }
    }

    async fn new_project(&self, name: &str) -> Result<Outcome, WorkflowError> {
        info!(name, "creating project");
        let created = self
            .service
            .create_project(name)
            .await
            .map_err(WorkflowError::rpc(WorkflowStep::CreateProject))?;
        info!(ids = ?created.ids, "project created");

        let expanded: ExpandedSet = [EXPLORER_ROOT_ID].into_iter().collect();
        let selected: SelectedSet = created.ids.into_iter().collect();
        self.resynchronize(expanded, selected).await
    }

    async fn import_mesh(&self, path: &str) -> Result<Outcome, WorkflowError> {
        info!(path, "importing mesh");
        let projects = self
            .service
            .get_objects("")
            .await
            .map_err(WorkflowError::rpc(WorkflowStep::ListProjects))?;
        let Some(parent) = projects.first() else {
            return Err(WorkflowError::NoProjects);
        };
        debug!(projects = ?projects.ids, parent, "importing into first project");

        let imported = self
            .service
            .import_mesh(parent, path)
            .await
            .map_err(WorkflowError::rpc(WorkflowStep::ImportMesh))?;
        info!(ids = ?imported.ids, "mesh imported");

        let expanded: ExpandedSet = [EXPLORER_ROOT_ID, parent].into_iter().collect();
        let selected: SelectedSet = imported.ids.into_iter().collect();
        self.resynchronize(expanded, selected).await
    }

    async fn print_object_tree(&self) -> Result<Outcome, WorkflowError> {
        let tree = self.fetch_tree().await?;
        let rendered = tree.to_pretty_json()?;
        debug!("object tree:\n{rendered}");
        if let Some(store) = &self.dump {
            store.save(&tree)?;
            info!(path = %store.path().display(), "object tree written");
        }
        Ok(Outcome::Tree(tree))
    }

    async fn resynchronize(
        &self,
        expanded: ExpandedSet,
        selected: SelectedSet,
    ) -> Result<Outcome, WorkflowError> {
        let tree = self.fetch_tree().await?;
        let reached = self.channel.publish(&tree, &expanded, &selected);
        debug!(nodes = tree.len(), reached, "explorer resynchronized");
        Ok(Outcome::Synchronized {
            tree,
            expanded,
            selected,
            reached,
        })
    }

    async fn fetch_tree(&self) -> Result<ObjectNode, WorkflowError> {
        self.service
            .get_object_tree("")
            .await
            .map_err(WorkflowError::rpc(WorkflowStep::FetchTree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use zinspector_rpc::{BackendFault, IdsResponse, NameResponse, RpcError, RpcErrorKind};

    use crate::collaborators::{CollectedErrors, NoPrompt};

    /// Backend double answering each call from a script and logging it.
    #[derive(Default)]
    struct ScriptedService {
        calls: Mutex<Vec<String>>,
        projects: Vec<String>,
        fail_import: bool,
        tree: Option<ObjectNode>,
        /// Raw backend tree JSON, decoded the way the bridge decodes it.
        tree_payload: Option<&'static str>,
    }

    impl ScriptedService {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ObjectService for ScriptedService {
        async fn create_project(&self, name: &str) -> Result<IdsResponse, RpcError> {
            self.log(format!("createProject({name})"));
            Ok(IdsResponse {
                ids: vec!["p1".into()],
            })
        }

        async fn get_objects(&self, parent_id: &str) -> Result<IdsResponse, RpcError> {
            self.log(format!("getObjects({parent_id})"));
            Ok(IdsResponse {
                ids: self.projects.clone(),
            })
        }

        async fn import_mesh(&self, project_id: &str, path: &str) -> Result<IdsResponse, RpcError> {
            self.log(format!("importMesh({project_id}, {path})"));
            if self.fail_import {
                return Err(RpcError::backend(BackendFault {
                    code: "INVALID_ARGUMENT".into(),
                    message: "unsupported file".into(),
                }));
            }
            Ok(IdsResponse {
                ids: vec!["m1".into()],
            })
        }

        async fn get_object_tree(&self, root_id: &str) -> Result<ObjectNode, RpcError> {
            self.log(format!("getObjectTree({root_id})"));
            if let Some(payload) = self.tree_payload {
                return ObjectNode::decode_backend_tree(root_id, payload)
                    .map_err(|err| RpcError::decode("object tree rejected").with_cause(err));
            }
            Ok(self
                .tree
                .clone()
                .unwrap_or_else(|| ObjectNode::explorer_root(Vec::new())))
        }

        async fn get_name(&self, id: &str) -> Result<NameResponse, RpcError> {
            self.log(format!("getName({id})"));
            Ok(NameResponse {
                name: format!("name of {id}"),
            })
        }
    }

    struct Answers(VecDeque<Option<String>>);

    impl Prompter for Answers {
        async fn project_name(&mut self) -> Option<String> {
            self.0.pop_front().flatten()
        }

        async fn mesh_path(&mut self) -> Option<String> {
            self.0.pop_front().flatten()
        }
    }

    fn dispatcher(service: ScriptedService) -> CommandDispatcher<ScriptedService> {
        CommandDispatcher::new(service, Arc::new(SyncChannel::new()))
    }

    #[tokio::test]
    async fn new_project_expands_root_and_selects_created_ids() {
        let dispatcher = dispatcher(ScriptedService::default());
        let mut answers = Answers(VecDeque::from([Some("Widget".to_string())]));

        let outcome = dispatcher
            .run(Command::NewProject { name: None }, &mut answers)
            .await
            .unwrap();

        match outcome {
            Outcome::Synchronized {
                expanded, selected, ..
            } => {
                assert_eq!(expanded.to_vec(), vec!["#root"]);
                assert_eq!(selected.as_slice(), ["p1"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            dispatcher.service().calls(),
            vec!["createProject(Widget)", "getObjectTree()"]
        );
    }

    #[tokio::test]
    async fn open_project_runs_the_new_project_workflow() {
        let dispatcher = dispatcher(ScriptedService::default());
        dispatcher
            .run(
                Command::OpenProject {
                    name: Some("Gear".into()),
                },
                &mut NoPrompt,
            )
            .await
            .unwrap();
        assert_eq!(dispatcher.service().calls()[0], "createProject(Gear)");
    }

    #[tokio::test]
    async fn dismissed_prompt_cancels_without_backend_calls() {
        let dispatcher = dispatcher(ScriptedService::default());
        let outcome = dispatcher
            .run(Command::ImportMesh { path: None }, &mut NoPrompt)
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
        assert!(dispatcher.service().calls().is_empty());
    }

    #[tokio::test]
    async fn import_uses_first_project_as_parent() {
        let dispatcher = dispatcher(ScriptedService {
            projects: vec!["p1".into(), "p2".into()],
            ..ScriptedService::default()
        });
        let outcome = dispatcher
            .run(
                Command::ImportMesh {
                    path: Some("/data/bolt.stl".into()),
                },
                &mut NoPrompt,
            )
            .await
            .unwrap();

        assert_eq!(
            dispatcher.service().calls(),
            vec![
                "getObjects()",
                "importMesh(p1, /data/bolt.stl)",
                "getObjectTree()"
            ]
        );
        match outcome {
            Outcome::Synchronized {
                expanded, selected, ..
            } => {
                assert_eq!(expanded.to_vec(), vec!["#root", "p1"]);
                assert_eq!(selected.as_slice(), ["m1"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn import_without_projects_reports_once() {
        let dispatcher = dispatcher(ScriptedService::default());
        let surface = CollectedErrors::new();
        let err = dispatcher
            .execute(
                Command::ImportMesh {
                    path: Some("/data/bolt.stl".into()),
                },
                &mut NoPrompt,
                &surface,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::NoProjects));
        assert_eq!(dispatcher.service().calls(), vec!["getObjects()"]);
        assert_eq!(surface.reports(), vec!["import mesh: no projects found"]);
    }

    #[tokio::test]
    async fn failing_step_aborts_the_rest_of_the_workflow() {
        let dispatcher = dispatcher(ScriptedService {
            projects: vec!["p1".into()],
            fail_import: true,
            ..ScriptedService::default()
        });
        let surface = CollectedErrors::new();
        let err = dispatcher
            .execute(
                Command::ImportMesh {
                    path: Some("/tmp/a.txt".into()),
                },
                &mut NoPrompt,
                &surface,
            )
            .await
            .unwrap_err();

        match &err {
            WorkflowError::Rpc { step, source } => {
                assert_eq!(*step, WorkflowStep::ImportMesh);
                assert_eq!(source.message, "unsupported file");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dispatcher
            .service()
            .calls()
            .iter()
            .any(|call| call.starts_with("getObjectTree")));
        assert_eq!(surface.reports().len(), 1);
    }

    #[tokio::test]
    async fn rejected_tree_fails_the_resync_and_publishes_nothing() {
        for payload in [
            r#"[{"id": "p1", "label": "Widget", "children": [{"id": "p1", "label": "again"}]}]"#,
            r#"[{"id": "p1", "label": "Widg"#,
        ] {
            let dispatcher = dispatcher(ScriptedService {
                tree_payload: Some(payload),
                ..ScriptedService::default()
            });
            let (_subscription, messages) = dispatcher.channel().subscribe_messages();
            let surface = CollectedErrors::new();

            let err = dispatcher
                .execute(
                    Command::NewProject {
                        name: Some("Widget".into()),
                    },
                    &mut NoPrompt,
                    &surface,
                )
                .await
                .unwrap_err();

            match &err {
                WorkflowError::Rpc { step, source } => {
                    assert_eq!(*step, WorkflowStep::FetchTree);
                    assert_eq!(source.kind, RpcErrorKind::Decode);
                    assert!(source.cause.is_some());
                }
                other => panic!("unexpected error {other:?}"),
            }
            assert_eq!(
                dispatcher.service().calls(),
                vec!["createProject(Widget)", "getObjectTree()"]
            );
            assert!(messages.try_recv().is_err());
            assert_eq!(surface.reports().len(), 1);
        }
    }

    #[tokio::test]
    async fn refresh_publishes_empty_cursors() {
        let tree = ObjectNode::explorer_root(vec![ObjectNode::new("p1", "Widget")]);
        let dispatcher = dispatcher(ScriptedService {
            tree: Some(tree.clone()),
            ..ScriptedService::default()
        });
        let (_subscription, messages) = dispatcher.channel().subscribe_messages();

        let outcome = dispatcher
            .run(Command::RefreshExplorer, &mut NoPrompt)
            .await
            .unwrap();
        match outcome {
            Outcome::Synchronized {
                expanded,
                selected,
                reached,
                ..
            } => {
                assert!(expanded.is_empty());
                assert!(selected.is_empty());
                assert_eq!(reached, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let received: Vec<_> = messages.try_iter().collect();
        assert_eq!(received.len(), 3);
    }

    #[tokio::test]
    async fn print_tree_does_not_publish() {
        let dispatcher = dispatcher(ScriptedService::default());
        let (_subscription, messages) = dispatcher.channel().subscribe_messages();
        let outcome = dispatcher
            .run(Command::PrintObjectTree, &mut NoPrompt)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Tree(ObjectNode::explorer_root(Vec::new())));
        assert!(messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn object_name_is_returned() {
        let dispatcher = dispatcher(ScriptedService::default());
        let outcome = dispatcher
            .run(Command::ObjectName("p1".into()), &mut NoPrompt)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Name("name of p1".into()));
    }
}
