//! Explorer data model and its synchronization channel for the ZInspector shell.
//! ZInspector 殼層的探索器資料模型與同步通道。

mod util;

pub mod cursors;
pub mod snapshot_store;
pub mod state_store;
pub mod sync;
pub mod tree;

pub use cursors::{ExpandedSet, SelectedSet, SelectionMode};
pub use snapshot_store::{TreeSnapshotStore, TreeSnapshotStoreError};
pub use state_store::{TreeState, TreeStateStore};
pub use sync::{Subscription, SyncChannel, SyncMessage};
pub use tree::{ObjectNode, ObjectTreeError, EXPLORER_ROOT_ID, EXPLORER_ROOT_LABEL};
