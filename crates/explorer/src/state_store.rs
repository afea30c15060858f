use std::sync::{Arc, RwLock};

use crate::cursors::{ExpandedSet, SelectedSet};
use crate::sync::{Subscription, SyncChannel};
use crate::tree::ObjectNode;

/// Latest explorer state as seen by a view.
/// 檢視端所看到的最新探索器狀態。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeState {
    pub revision: u64,
    pub tree: ObjectNode,
    pub expanded: ExpandedSet,
    pub selected: SelectedSet,
}

impl Default for TreeState {
    fn default() -> Self {
        Self {
            revision: 0,
            tree: ObjectNode::explorer_root(Vec::new()),
            expanded: ExpandedSet::new(),
            selected: SelectedSet::new(),
        }
    }
}

/// Subscriber-side holder of the latest tree snapshot and cursors.
/// 訂閱端保存最新樹狀快照與游標的元件。
///
/// Purely reactive: it only changes when the [`SyncChannel`] pushes to it.
#[derive(Debug, Clone, Default)]
pub struct TreeStateStore {
    state: Arc<RwLock<TreeState>>,
}

impl TreeStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers this store on the channel.
    /// 將此儲存區註冊到同步通道。
    pub fn attach(&self, channel: &SyncChannel) -> Subscription {
        let on_update = Arc::clone(&self.state);
        let on_expand = Arc::clone(&self.state);
        let on_select = Arc::clone(&self.state);
        channel.subscribe(
            move |tree: &ObjectNode| {
                let mut guard = on_update.write().expect("tree state poisoned");
                guard.tree = tree.clone();
                guard.revision = guard.revision.wrapping_add(1);
            },
            move |expanded: &ExpandedSet| {
                on_expand.write().expect("tree state poisoned").expanded = expanded.clone();
            },
            move |selected: &SelectedSet| {
                on_select.write().expect("tree state poisoned").selected = selected.clone();
            },
        )
    }

    pub fn snapshot(&self) -> TreeState {
        self.state.read().expect("tree state poisoned").clone()
    }

    pub fn revision(&self) -> u64 {
        self.state.read().expect("tree state poisoned").revision
    }

    /// True when `id` is both requested expanded and present in the current tree.
    /// 當 `id` 被要求展開且存在於目前的樹中時回傳 true。
    pub fn is_expanded(&self, id: &str) -> bool {
        let guard = self.state.read().expect("tree state poisoned");
        guard.expanded.contains(id) && guard.tree.contains(id)
    }

    pub fn selection(&self) -> SelectedSet {
        self.state.read().expect("tree state poisoned").selected.clone()
    }
}
