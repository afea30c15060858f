use std::sync::{Arc, RwLock};

use tracing::info;
use zinspector_explorer::ObjectNode;

use crate::client::RpcBridge;
use crate::error::RpcError;
use crate::protocol::{IdsResponse, NameResponse};
use crate::service::ObjectService;

/// Shared holder of the current bridge.
/// （目前橋接實例的共享持有者。）
///
/// Empty until the backend is confirmed running, and emptied again when the backend exits.
/// Calls made while the slot is empty fail with an `unavailable` error. A call that already
/// holds the bridge keeps it alive until it resolves.
#[derive(Clone, Default)]
pub struct BridgeSlot {
    inner: Arc<RwLock<Option<Arc<RpcBridge>>>>,
}

impl BridgeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `bridge`, replacing any previous one.
    pub fn install(&self, bridge: RpcBridge) -> Arc<RpcBridge> {
        let bridge = Arc::new(bridge);
        let mut guard = self.inner.write().expect("bridge slot poisoned");
        info!(endpoint = %bridge.endpoint(), "backend bridge installed");
        *guard = Some(Arc::clone(&bridge));
        bridge
    }

    /// Drops the current bridge. Returns whether one was installed.
    pub fn invalidate(&self) -> bool {
        let mut guard = self.inner.write().expect("bridge slot poisoned");
        let had_bridge = guard.take().is_some();
        if had_bridge {
            info!("backend bridge invalidated");
        }
        had_bridge
    }

    pub fn is_ready(&self) -> bool {
        let guard = self.inner.read().expect("bridge slot poisoned");
        guard.is_some()
    }

    pub fn current(&self) -> Result<Arc<RpcBridge>, RpcError> {
        let guard = self.inner.read().expect("bridge slot poisoned");
        guard.as_ref().map(Arc::clone).ok_or_else(RpcError::unavailable)
    }
}

impl ObjectService for BridgeSlot {
    async fn create_project(&self, name: &str) -> Result<IdsResponse, RpcError> {
        let bridge = self.current()?;
        bridge.create_project(name).await
    }

    async fn get_objects(&self, parent_id: &str) -> Result<IdsResponse, RpcError> {
        let bridge = self.current()?;
        bridge.get_objects(parent_id).await
    }

    async fn import_mesh(&self, project_id: &str, path: &str) -> Result<IdsResponse, RpcError> {
        let bridge = self.current()?;
        bridge.import_mesh(project_id, path).await
    }

    async fn get_object_tree(&self, root_id: &str) -> Result<ObjectNode, RpcError> {
        let bridge = self.current()?;
        bridge.get_object_tree(root_id).await
    }

    async fn get_name(&self, id: &str) -> Result<NameResponse, RpcError> {
        let bridge = self.current()?;
        bridge.get_name(id).await
    }
}
