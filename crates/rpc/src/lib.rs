//! Client side of the backend object service.
//! （後端物件服務的用戶端。）
//!
//! [`RpcBridge`] speaks the line-delimited JSON protocol in [`protocol`]; [`BridgeSlot`] holds
//! the bridge of the currently supervised backend; both implement [`ObjectService`], the seam
//! the command workflows are written against.

pub mod client;
pub mod error;
pub mod protocol;
pub mod service;
pub mod slot;

pub use client::{ConnectPolicy, Endpoint, RpcBridge};
pub use error::{BackendFault, RpcCause, RpcError, RpcErrorKind};
pub use protocol::{IdsResponse, NameResponse};
pub use service::ObjectService;
pub use slot::BridgeSlot;
