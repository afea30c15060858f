use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of the synthetic node that parents every project in the explorer.
/// 探索器中作為所有專案父節點的合成根節點識別碼。
pub const EXPLORER_ROOT_ID: &str = "#root";

/// Label shown for the synthetic explorer root.
/// 合成根節點顯示的標籤。
pub const EXPLORER_ROOT_LABEL: &str = "Projects";

/// Immutable snapshot of one backend object and its ordered children.
/// 後端物件及其有序子節點的不可變快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub children: Vec<ObjectNode>,
}

impl ObjectNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: None,
            children: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_children(mut self, children: Vec<ObjectNode>) -> Self {
        self.children = children;
        self
    }

    /// Builds the synthetic explorer root wrapping the given top-level nodes.
    /// 建立包住頂層節點的合成探索器根節點。
    pub fn explorer_root(children: Vec<ObjectNode>) -> Self {
        Self::new(EXPLORER_ROOT_ID, EXPLORER_ROOT_LABEL).with_children(children)
    }

    /// Decodes a backend tree payload (a JSON array of nodes) under a parent node.
    /// 將後端傳回的樹狀 JSON 陣列解碼並掛在父節點之下。
    ///
    /// An empty `root_id` denotes the synthetic explorer root. Ids must be unique
    /// across the whole decoded tree, the parent included.
    pub fn decode_backend_tree(root_id: &str, payload: &str) -> Result<Self, ObjectTreeError> {
        let children: Vec<ObjectNode> = serde_json::from_str(payload)
            .map_err(|err| ObjectTreeError::Malformed(err.to_string()))?;
        let node = if root_id.is_empty() {
            Self::explorer_root(children)
        } else {
            Self::new(root_id, root_id).with_children(children)
        };
        node.validate()?;
        Ok(node)
    }

    /// Decodes a serialized snapshot (a single node object) as pushed to subscribers.
    /// 解碼推送給訂閱者的單一節點快照。
    pub fn from_json(payload: &str) -> Result<Self, ObjectTreeError> {
        let node: ObjectNode = serde_json::from_str(payload)
            .map_err(|err| ObjectTreeError::Malformed(err.to_string()))?;
        node.validate()?;
        Ok(node)
    }

    pub fn to_json(&self) -> Result<String, ObjectTreeError> {
        serde_json::to_string(self).map_err(|err| ObjectTreeError::Malformed(err.to_string()))
    }

    pub fn to_pretty_json(&self) -> Result<String, ObjectTreeError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ObjectTreeError::Malformed(err.to_string()))
    }

    /// Checks that every id in the tree is unique.
    /// 檢查樹中每個識別碼皆唯一。
    pub fn validate(&self) -> Result<(), ObjectTreeError> {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if !seen.insert(node.id.as_str()) {
                return Err(ObjectTreeError::DuplicateId(node.id.clone()));
            }
            stack.extend(node.children.iter());
        }
        Ok(())
    }

    /// Finds a node by identifier.
    /// 依識別碼尋找節點。
    pub fn find(&self, id: &str) -> Option<&ObjectNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Returns all ids in pre-order (presentation order).
    /// 以前序（呈現順序）列出所有識別碼。
    pub fn ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_ids(self, &mut out);
        out
    }

    /// Number of nodes including this one.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(ObjectNode::len).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

fn collect_ids<'a>(node: &'a ObjectNode, out: &mut Vec<&'a str>) {
    out.push(node.id.as_str());
    for child in &node.children {
        collect_ids(child, out);
    }
}

/// Tree decoding and validation errors.
/// 樹狀資料解碼與驗證錯誤。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectTreeError {
    #[error("malformed object tree payload: {0}")]
    Malformed(String),
    #[error("object id '{0}' appears more than once in the tree")]
    DuplicateId(String),
}
