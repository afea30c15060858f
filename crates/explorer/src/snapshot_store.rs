//! Diagnostic dump of the explorer tree.
//!
//! The "print tree" command writes the tree it fetched to a configured file so it can be
//! inspected or diffed outside the shell; loading it back applies the same validation as
//! a backend payload.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::tree::{ObjectNode, ObjectTreeError};
use crate::util::write_atomic;

/// File holding the most recent tree dump.
/// 最近一次物件樹傾印所在的檔案。
#[derive(Debug, Clone)]
pub struct TreeSnapshotStore {
    path: PathBuf,
}

impl TreeSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the dump with `tree` as indented JSON; readers never see a partial file.
    pub fn save(&self, tree: &ObjectNode) -> Result<(), TreeSnapshotStoreError> {
        let payload = tree.to_pretty_json().map_err(|source| self.rejected(source))?;
        write_atomic(&self.path, payload.as_bytes()).map_err(|source| {
            TreeSnapshotStoreError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Reads the dump back; `None` when nothing has been written yet.
    /// 讀回傾印檔；尚未寫入時回傳 `None`。
    pub fn load(&self) -> Result<Option<ObjectNode>, TreeSnapshotStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(TreeSnapshotStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        ObjectNode::from_json(&contents)
            .map(Some)
            .map_err(|source| self.rejected(source))
    }

    fn rejected(&self, source: ObjectTreeError) -> TreeSnapshotStoreError {
        TreeSnapshotStoreError::Tree {
            path: self.path.clone(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum TreeSnapshotStoreError {
    #[error("failed to read tree dump {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write tree dump {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("tree dump {} rejected: {source}", path.display())]
    Tree {
        path: PathBuf,
        #[source]
        source: ObjectTreeError,
    },
}
