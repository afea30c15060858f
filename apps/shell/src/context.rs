use std::sync::Arc;

use zinspector_dispatch::CommandDispatcher;
use zinspector_explorer::{Subscription, SyncChannel, TreeSnapshotStore, TreeStateStore};
use zinspector_rpc::{BridgeSlot, ConnectPolicy, Endpoint, RpcBridge};
use zinspector_settings::ShellConfig;

/// Everything one shell session shares, built once and passed explicitly.
/// （單一殼層工作階段共用的狀態，建立一次後明確傳遞。）
pub struct AppContext {
    pub config: ShellConfig,
    pub channel: Arc<SyncChannel>,
    pub slot: BridgeSlot,
    pub view: TreeStateStore,
    pub dispatcher: CommandDispatcher<BridgeSlot>,
    view_subscription: Subscription,
}

impl AppContext {
    pub fn new(config: ShellConfig) -> Self {
        let channel = Arc::new(SyncChannel::new());
        let slot = BridgeSlot::new();
        let view = TreeStateStore::new();
        let view_subscription = view.attach(&channel);
        let mut dispatcher = CommandDispatcher::new(slot.clone(), Arc::clone(&channel));
        if let Some(path) = &config.explorer.dump_path {
            dispatcher = dispatcher.with_dump(TreeSnapshotStore::new(path));
        }
        Self {
            config,
            channel,
            slot,
            view,
            dispatcher,
            view_subscription,
        }
    }

    /// Makes the backend listening on `port` reachable by the dispatcher.
    pub fn install_bridge(&self, port: u16) -> Arc<RpcBridge> {
        let backend = &self.config.backend;
        self.slot.install(RpcBridge::new(
            Endpoint::new(backend.host.clone(), port),
            ConnectPolicy::new(backend.connect_attempts, backend.connect_delay()),
        ))
    }

    /// Detaches the view and drops the bridge.
    pub fn teardown(&self) {
        self.slot.invalidate();
        self.channel.unsubscribe(self.view_subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_is_only_available_after_install() {
        let context = AppContext::new(ShellConfig::default());
        assert!(!context.slot.is_ready());
        assert_eq!(context.channel.live_subscriptions(), 1);

        let bridge = context.install_bridge(55001);
        assert_eq!(bridge.endpoint().to_string(), "localhost:55001");
        assert!(context.slot.is_ready());

        context.teardown();
        assert!(!context.slot.is_ready());
        assert_eq!(context.channel.live_subscriptions(), 0);
    }
}
