use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::codec::LinesCodecError;
use zinspector_explorer::ObjectTreeError;

/// Broad class of an RPC failure.
/// （RPC 失敗的大致分類。）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorKind {
    /// Connection refused, dropped, or unusable.
    Transport,
    /// The backend answered with an error status.
    Backend,
    /// No bridge has been constructed yet, or it was invalidated.
    Unavailable,
    /// The backend answered with a payload that could not be decoded.
    Decode,
}

impl fmt::Display for RpcErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RpcErrorKind::Transport => "transport",
            RpcErrorKind::Backend => "backend",
            RpcErrorKind::Unavailable => "unavailable",
            RpcErrorKind::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// Error status reported by the backend, forwarded verbatim.
/// （後端回報的錯誤狀態，原樣轉送。）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct BackendFault {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Underlying cause attached to an [`RpcError`].
#[derive(Debug, Error)]
pub enum RpcCause {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Backend(#[from] BackendFault),
    #[error(transparent)]
    Tree(#[from] ObjectTreeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Codec(#[from] LinesCodecError),
}

/// Failure of one bridge operation.
/// （單一橋接操作的失敗。）
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct RpcError {
    pub kind: RpcErrorKind,
    pub message: String,
    #[source]
    pub cause: Option<RpcCause>,
}

impl RpcError {
    pub fn new(kind: RpcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<RpcCause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::Transport, message)
    }

    pub fn unavailable() -> Self {
        Self::new(
            RpcErrorKind::Unavailable,
            "backend connection has not been established",
        )
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::Decode, message)
    }

    /// Wraps a backend-reported fault; the message is the backend's own.
    /// （包裝後端回報的錯誤；訊息沿用後端原文。）
    pub fn backend(fault: BackendFault) -> Self {
        Self::new(RpcErrorKind::Backend, fault.message.clone()).with_cause(fault)
    }

    pub fn is_transport(&self) -> bool {
        self.kind == RpcErrorKind::Transport
    }

    /// The backend fault behind a `backend` error, if any.
    pub fn backend_fault(&self) -> Option<&BackendFault> {
        match &self.cause {
            Some(RpcCause::Backend(fault)) => Some(fault),
            _ => None,
        }
    }
}
