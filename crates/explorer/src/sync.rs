//! Fan-out of explorer state from the supervising side to any number of views.
//! 將探索器狀態由監督端廣播給任意數量的檢視。
//!
//! Every publish cycle delivers three messages to each live subscription, always
//! in the same order: the tree snapshot, the expansion cursor, then the selection
//! cursor. Listeners are keyed by an opaque [`Subscription`] handed out by
//! [`SyncChannel::subscribe`], never by the identity of the callbacks themselves.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::cursors::{ExpandedSet, SelectedSet};
use crate::tree::ObjectNode;

type UpdateFn = Box<dyn Fn(&ObjectNode) + Send + Sync>;
type CursorFn<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Opaque handle identifying one registered listener.
/// 代表一個已註冊監聽者的不透明憑證。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(u64);

/// Push protocol as delivered to message-based subscribers.
/// 以訊息形式提供給訂閱者的推送協定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// Full tree snapshot serialized as JSON.
    Update(String),
    Expand(Vec<String>),
    /// Ordered; the first id is the selection anchor.
    Select(Vec<String>),
}

struct Listener {
    active: AtomicBool,
    on_update: UpdateFn,
    on_expand: CursorFn<ExpandedSet>,
    on_select: CursorFn<SelectedSet>,
}

/// Broadcasts tree snapshots and cursors to registered subscribers.
/// 將樹狀快照與游標廣播給已註冊的訂閱者。
pub struct SyncChannel {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(Subscription, Arc<Listener>)>>,
}

impl SyncChannel {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Registers three callbacks as one subscription.
    /// 以單一訂閱註冊三個回呼函式。
    ///
    /// Calling this twice with equivalent closures yields two distinct subscriptions.
    pub fn subscribe<U, E, S>(&self, on_update: U, on_expand: E, on_select: S) -> Subscription
    where
        U: Fn(&ObjectNode) + Send + Sync + 'static,
        E: Fn(&ExpandedSet) + Send + Sync + 'static,
        S: Fn(&SelectedSet) + Send + Sync + 'static,
    {
        let subscription = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener = Arc::new(Listener {
            active: AtomicBool::new(true),
            on_update: Box::new(on_update),
            on_expand: Box::new(on_expand),
            on_select: Box::new(on_select),
        });
        self.listeners
            .lock()
            .expect("sync channel poisoned")
            .push((subscription, listener));
        debug!(subscription = subscription.0, "explorer subscriber registered");
        subscription
    }

    /// Subscribes with a channel that receives the serialized push protocol.
    /// 以通道訂閱，接收序列化後的推送協定訊息。
    pub fn subscribe_messages(&self) -> (Subscription, Receiver<SyncMessage>) {
        let (tx, rx) = mpsc::channel();
        let expand_tx = tx.clone();
        let select_tx = tx.clone();
        let update_tx = Mutex::new(tx);
        let expand_tx = Mutex::new(expand_tx);
        let select_tx = Mutex::new(select_tx);
        let subscription = self.subscribe(
            move |tree: &ObjectNode| match tree.to_json() {
                Ok(json) => {
                    let _ = update_tx
                        .lock()
                        .expect("sync sender poisoned")
                        .send(SyncMessage::Update(json));
                }
                Err(err) => warn!(error = %err, "failed to serialize tree snapshot"),
            },
            move |expanded: &ExpandedSet| {
                let _ = expand_tx
                    .lock()
                    .expect("sync sender poisoned")
                    .send(SyncMessage::Expand(expanded.to_vec()));
            },
            move |selected: &SelectedSet| {
                let _ = select_tx
                    .lock()
                    .expect("sync sender poisoned")
                    .send(SyncMessage::Select(selected.as_slice().to_vec()));
            },
        );
        (subscription, rx)
    }

    /// Removes exactly the given subscription; unknown handles are ignored.
    /// 僅移除指定的訂閱；未知的憑證會被忽略。
    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut guard = self.listeners.lock().expect("sync channel poisoned");
        if let Some(index) = guard.iter().position(|(id, _)| *id == subscription) {
            let (_, listener) = guard.remove(index);
            listener.active.store(false, Ordering::SeqCst);
            debug!(subscription = subscription.0, "explorer subscriber removed");
        }
    }

    pub fn live_subscriptions(&self) -> usize {
        self.listeners.lock().expect("sync channel poisoned").len()
    }

    /// Delivers one publish cycle to every live subscription; returns how many were reached.
    /// 將一次發布循環送達所有有效訂閱，回傳送達的數量。
    pub fn publish(
        &self,
        tree: &ObjectNode,
        expanded: &ExpandedSet,
        selected: &SelectedSet,
    ) -> usize {
        // Callbacks run without the registry lock so they may unsubscribe themselves.
        let targets: Vec<Arc<Listener>> = self
            .listeners
            .lock()
            .expect("sync channel poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut reached = 0;
        for listener in targets {
            if !listener.active.load(Ordering::SeqCst) {
                continue;
            }
            (listener.on_update)(tree);
            (listener.on_expand)(expanded);
            (listener.on_select)(selected);
            reached += 1;
        }
        debug!(
            reached,
            nodes = tree.len(),
            expanded = expanded.len(),
            selected = selected.len(),
            "explorer state published"
        );
        reached
    }
}

impl Default for SyncChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ObjectNode {
        ObjectNode::explorer_root(vec![ObjectNode::new("p1", "Widget")])
    }

    fn recording(channel: &SyncChannel, log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Subscription {
        let (a, b, c) = (Arc::clone(log), Arc::clone(log), Arc::clone(log));
        let (t1, t2, t3) = (tag.to_string(), tag.to_string(), tag.to_string());
        channel.subscribe(
            move |tree: &ObjectNode| a.lock().unwrap().push(format!("{t1}:update:{}", tree.id)),
            move |ids: &ExpandedSet| b.lock().unwrap().push(format!("{t2}:expand:{}", ids.len())),
            move |ids: &SelectedSet| c.lock().unwrap().push(format!("{t3}:select:{}", ids.len())),
        )
    }

    #[test]
    fn delivers_tree_then_expand_then_select() {
        let channel = SyncChannel::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recording(&channel, &log, "a");

        let expanded: ExpandedSet = ["#root"].into_iter().collect();
        let selected: SelectedSet = ["p1"].into_iter().collect();
        assert_eq!(channel.publish(&sample_tree(), &expanded, &selected), 1);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:update:#root", "a:expand:1", "a:select:1"]
        );
    }

    #[test]
    fn equivalent_closures_are_distinct_subscriptions() {
        let channel = SyncChannel::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recording(&channel, &log, "x");
        let second = recording(&channel, &log, "x");
        assert_ne!(first, second);

        channel.unsubscribe(first);
        assert_eq!(channel.live_subscriptions(), 1);
        channel.publish(&sample_tree(), &ExpandedSet::new(), &SelectedSet::new());
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_stops_delivery() {
        let channel = SyncChannel::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = recording(&channel, &log, "a");

        channel.unsubscribe(handle);
        channel.unsubscribe(handle);
        assert_eq!(channel.live_subscriptions(), 0);
        assert_eq!(
            channel.publish(&sample_tree(), &ExpandedSet::new(), &SelectedSet::new()),
            0
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_its_peer_during_publish() {
        let channel = Arc::new(SyncChannel::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim = Arc::new(Mutex::new(None::<Subscription>));

        let killer_channel = Arc::clone(&channel);
        let killer_target = Arc::clone(&victim);
        channel.subscribe(
            move |_tree: &ObjectNode| {
                if let Some(handle) = killer_target.lock().unwrap().take() {
                    killer_channel.unsubscribe(handle);
                }
            },
            |_ids: &ExpandedSet| {},
            |_ids: &SelectedSet| {},
        );
        let handle = recording(&channel, &log, "victim");
        *victim.lock().unwrap() = Some(handle);

        assert_eq!(
            channel.publish(&sample_tree(), &ExpandedSet::new(), &SelectedSet::new()),
            1
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn message_subscribers_receive_serialized_protocol() {
        let channel = SyncChannel::new();
        let (handle, rx) = channel.subscribe_messages();

        let expanded: ExpandedSet = ["#root"].into_iter().collect();
        let selected: SelectedSet = ["p1"].into_iter().collect();
        channel.publish(&sample_tree(), &expanded, &selected);

        let update = rx.recv().unwrap();
        match update {
            SyncMessage::Update(json) => {
                assert_eq!(ObjectNode::from_json(&json).unwrap(), sample_tree())
            }
            other => panic!("expected tree update first, got {other:?}"),
        }
        assert_eq!(rx.recv().unwrap(), SyncMessage::Expand(vec!["#root".into()]));
        assert_eq!(rx.recv().unwrap(), SyncMessage::Select(vec!["p1".into()]));

        channel.unsubscribe(handle);
        channel.publish(&sample_tree(), &expanded, &selected);
        assert!(rx.try_recv().is_err());
    }
}
