use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use zinspector_explorer::{
    ExpandedSet, ObjectNode, SelectedSet, Subscription, SyncChannel, TreeStateStore,
};

type Log = Arc<Mutex<Vec<(u32, &'static str)>>>;

fn subscribe_tagged(channel: &SyncChannel, log: &Log, tag: u32) -> Subscription {
    let (a, b, c) = (Arc::clone(log), Arc::clone(log), Arc::clone(log));
    channel.subscribe(
        move |_tree: &ObjectNode| a.lock().unwrap().push((tag, "update")),
        move |_ids: &ExpandedSet| b.lock().unwrap().push((tag, "expand")),
        move |_ids: &SelectedSet| c.lock().unwrap().push((tag, "select")),
    )
}

#[test]
fn interleaved_subscribe_unsubscribe_never_reaches_removed_handles() {
    let channel = SyncChannel::new();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let tree = ObjectNode::explorer_root(vec![ObjectNode::new("p1", "Widget")]);
    let expanded: ExpandedSet = ["#root"].into_iter().collect();
    let selected: SelectedSet = ["p1"].into_iter().collect();

    let mut live: HashMap<u32, Subscription> = HashMap::new();
    let mut removed: Vec<(u32, Subscription)> = Vec::new();
    // Small linear congruential sequence keeps the schedule deterministic.
    let mut seed: u32 = 7;
    for step in 0..200u32 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        match seed % 3 {
            0 => {
                live.insert(step, subscribe_tagged(&channel, &log, step));
            }
            1 => {
                if let Some(tag) = live.keys().copied().min() {
                    let handle = live.remove(&tag).unwrap();
                    channel.unsubscribe(handle);
                    removed.push((tag, handle));
                }
            }
            _ => {
                if let Some((_, handle)) = removed.last() {
                    // Tearing down twice must be harmless.
                    channel.unsubscribe(*handle);
                }
            }
        }

        log.lock().unwrap().clear();
        let reached = channel.publish(&tree, &expanded, &selected);
        assert_eq!(reached, live.len());
        assert_eq!(channel.live_subscriptions(), live.len());

        let entries = log.lock().unwrap().clone();
        for (tag, _) in &removed {
            assert!(entries.iter().all(|(seen, _)| seen != tag));
        }
        for tag in live.keys() {
            let kinds: Vec<&str> = entries
                .iter()
                .filter(|(seen, _)| seen == tag)
                .map(|(_, kind)| *kind)
                .collect();
            assert_eq!(kinds, vec!["update", "expand", "select"]);
        }
    }
}

#[test]
fn several_views_share_one_channel() {
    let channel = SyncChannel::new();
    let left = TreeStateStore::new();
    let right = TreeStateStore::new();
    let left_handle = left.attach(&channel);
    right.attach(&channel);

    let tree = ObjectNode::explorer_root(vec![
        ObjectNode::new("p1", "Widget").with_children(vec![ObjectNode::new("m1", "part.stl")])
    ]);
    let expanded: ExpandedSet = ["#root", "p1"].into_iter().collect();
    let selected: SelectedSet = ["m1"].into_iter().collect();
    assert_eq!(channel.publish(&tree, &expanded, &selected), 2);
    assert_eq!(left.snapshot(), right.snapshot());

    channel.unsubscribe(left_handle);
    let next = ObjectNode::explorer_root(Vec::new());
    channel.publish(&next, &ExpandedSet::new(), &SelectedSet::new());
    assert!(left.snapshot().tree.contains("m1"));
    assert!(!right.snapshot().tree.contains("m1"));
    assert_eq!(right.revision(), 2);
}
