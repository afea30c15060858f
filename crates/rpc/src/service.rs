use std::future::Future;

use zinspector_explorer::ObjectNode;

use crate::error::RpcError;
use crate::protocol::{IdsResponse, NameResponse};

/// Typed view of the backend object service.
/// （後端物件服務的型別化介面。）
///
/// Calls are independent: nothing orders two outstanding calls, so a caller that needs the
/// result of one call to issue the next must await it first.
pub trait ObjectService: Send + Sync {
    /// Creates a project and returns the ids of the new objects.
    fn create_project(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<IdsResponse, RpcError>> + Send;

    /// Lists the children of `parent_id`; an empty id lists the projects.
    fn get_objects(
        &self,
        parent_id: &str,
    ) -> impl Future<Output = Result<IdsResponse, RpcError>> + Send;

    /// Imports the mesh at `path` into `project_id`.
    fn import_mesh(
        &self,
        project_id: &str,
        path: &str,
    ) -> impl Future<Output = Result<IdsResponse, RpcError>> + Send;

    /// Fetches and decodes the subtree below `root_id`; an empty id yields the explorer root.
    fn get_object_tree(
        &self,
        root_id: &str,
    ) -> impl Future<Output = Result<ObjectNode, RpcError>> + Send;

    fn get_name(&self, id: &str) -> impl Future<Output = Result<NameResponse, RpcError>> + Send;
}
