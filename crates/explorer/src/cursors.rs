use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::tree::ObjectNode;

/// Ids the explorer should show expanded. Unknown ids are tolerated.
/// 探索器應展開的節點識別碼集合；未知的識別碼會被忽略。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandedSet(BTreeSet<String>);

impl ExpandedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Drops ids that are absent from `tree`.
    /// 移除不存在於 `tree` 中的識別碼。
    pub fn retain_known(&mut self, tree: &ObjectNode) {
        self.0.retain(|id| tree.contains(id));
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ExpandedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// How a single selected id should be applied by a view.
/// 檢視套用單一選取識別碼的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Replace,
    Extend,
}

/// Ordered selection; the first id is the anchor, the rest extend it.
/// 有序的選取清單；第一個識別碼為錨點，其餘為延伸選取。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SelectedSet(Vec<String>);

impl SelectedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an id unless it is already selected.
    pub fn push(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn anchor(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn extension(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    /// Tells whether `id` replaces the selection (anchor) or extends it.
    /// 判斷 `id` 應取代目前選取（錨點）或延伸選取。
    pub fn mode_for(&self, id: &str) -> Option<SelectionMode> {
        let position = self.0.iter().position(|candidate| candidate == id)?;
        Some(if position == 0 {
            SelectionMode::Replace
        } else {
            SelectionMode::Extend
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for SelectedSet {
    fn from(ids: Vec<String>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<SelectedSet> for Vec<String> {
    fn from(selection: SelectedSet) -> Self {
        selection.0
    }
}

impl<S: Into<String>> FromIterator<S> for SelectedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut selection = SelectedSet::new();
        for id in iter {
            selection.push(id);
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_keeps_anchor_and_collapses_duplicates() {
        let selection: SelectedSet = ["m1", "m2", "m1", "m3"].into_iter().collect();
        assert_eq!(selection.anchor(), Some("m1"));
        assert_eq!(selection.extension(), ["m2".to_string(), "m3".to_string()]);
        assert_eq!(selection.mode_for("m1"), Some(SelectionMode::Replace));
        assert_eq!(selection.mode_for("m3"), Some(SelectionMode::Extend));
        assert_eq!(selection.mode_for("zz"), None);
    }

    #[test]
    fn empty_selection_has_no_anchor() {
        let selection = SelectedSet::new();
        assert_eq!(selection.anchor(), None);
        assert!(selection.extension().is_empty());
    }

    #[test]
    fn expanded_set_tolerates_and_prunes_unknown_ids() {
        let tree = ObjectNode::explorer_root(vec![ObjectNode::new("p1", "Widget")]);
        let mut expanded: ExpandedSet = ["#root", "ghost"].into_iter().collect();
        assert!(expanded.contains("ghost"));
        expanded.retain_known(&tree);
        assert_eq!(expanded.to_vec(), vec!["#root".to_string()]);
    }

    #[test]
    fn cursors_serialize_as_plain_lists() {
        let selection: SelectedSet = ["b", "a"].into_iter().collect();
        assert_eq!(serde_json::to_string(&selection).unwrap(), r#"["b","a"]"#);
        let expanded: ExpandedSet = ["b", "a"].into_iter().collect();
        assert_eq!(serde_json::to_string(&expanded).unwrap(), r#"["a","b"]"#);
    }
}
