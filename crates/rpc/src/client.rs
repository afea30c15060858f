//! Line-delimited JSON client for the backend object service.
//! （後端物件服務的逐行 JSON 用戶端。）
//!
//! One TCP connection is shared by every call. Each request gets a fresh id and a one-shot
//! completion in the pending table of the live connection; a reader task routes responses
//! back by id, so replies may arrive in any order. When the connection drops, all of its
//! pending calls fail with a transport error and the next call dials again. A reply that
//! cannot be parsed poisons the connection the same way, failing its calls with a decode
//! error, since the call it was meant for can no longer be identified.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, trace, warn};
use zinspector_explorer::ObjectNode;

use crate::error::RpcError;
use crate::protocol::{
    CreateProjectRequest, IdsResponse, ImportMeshRequest, NameResponse, ObjectRequest,
    ParentRequest, RequestEnvelope, ResponseEnvelope, TreeJsonResponse, CREATE_PROJECT,
    GET_ITEMS, GET_NAME, GET_OBJECTS, GET_OBJECT_TREE, IMPORT_MESH,
};
use crate::service::ObjectService;

/// Address of the backend listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn localhost(port: u16) -> Self {
        Self::new("localhost", port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How hard the bridge tries to reach a backend that may still be starting.
/// （連線至可能仍在啟動中的後端時的重試策略。）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl ConnectPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A single attempt without waiting.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self::new(20, Duration::from_millis(250))
    }
}

/// Longest response line accepted from the backend. A serialized object tree of a large
/// scene is the biggest payload the protocol carries.
pub const MAX_RESPONSE_LINE: usize = 64 * 1024 * 1024;

type Completion = oneshot::Sender<Result<Value, RpcError>>;

#[derive(Default)]
struct PendingCalls {
    inner: Mutex<HashMap<u64, Completion>>,
}

impl PendingCalls {
    fn register(&self, id: u64, completion: Completion) {
        let mut guard = self.inner.lock().expect("pending calls poisoned");
        guard.insert(id, completion);
    }

    fn cancel(&self, id: u64) {
        let mut guard = self.inner.lock().expect("pending calls poisoned");
        guard.remove(&id);
    }

    fn complete(&self, id: u64, outcome: Result<Value, RpcError>) -> bool {
        let completion = {
            let mut guard = self.inner.lock().expect("pending calls poisoned");
            guard.remove(&id)
        };
        match completion {
            Some(completion) => {
                // The caller may have given up on the call; nothing to do then.
                let _ = completion.send(outcome);
                true
            }
            None => false,
        }
    }

    fn fail_all<F>(&self, error: F) -> usize
    where
        F: Fn() -> RpcError,
    {
        let drained: Vec<Completion> = {
            let mut guard = self.inner.lock().expect("pending calls poisoned");
            guard.drain().map(|(_, completion)| completion).collect()
        };
        let count = drained.len();
        for completion in drained {
            let _ = completion.send(Err(error()));
        }
        count
    }
}

struct Connection {
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
    pending: Arc<PendingCalls>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    fn start(stream: TcpStream) -> Self {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "could not disable Nagle on backend socket");
        }
        let (read_half, write_half) = stream.into_split();
        let pending = Arc::new(PendingCalls::default());
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(route_responses(
            FramedRead::new(
                read_half,
                LinesCodec::new_with_max_length(MAX_RESPONSE_LINE),
            ),
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));
        Self {
            writer: FramedWrite::new(write_half, LinesCodec::new()),
            pending,
            closed,
            reader,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn register(&self, id: u64) -> Result<oneshot::Receiver<Result<Value, RpcError>>, RpcError> {
        let (completion, receiver) = oneshot::channel();
        self.pending.register(id, completion);
        // The reader marks the connection closed before draining, so a call registered
        // after the drain always observes the flag here.
        if self.is_closed() {
            self.pending.cancel(id);
            return Err(RpcError::transport("backend connection closed"));
        }
        Ok(receiver)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.reader.abort();
        self.pending
            .fail_all(|| RpcError::transport("backend connection discarded"));
    }
}

async fn route_responses(
    mut lines: FramedRead<OwnedReadHalf, LinesCodec>,
    pending: Arc<PendingCalls>,
    closed: Arc<AtomicBool>,
) {
    while let Some(frame) = lines.next().await {
        match frame {
            Ok(line) => {
                if let Err(err) = route_line(&line, &pending) {
                    warn!(error = %err, "unreadable response from backend, dropping connection");
                    closed.store(true, Ordering::SeqCst);
                    let failed = pending.fail_all(|| unreadable_response(&line));
                    debug!(failed, "pending calls failed on unreadable response");
                    return;
                }
            }
            Err(err) => {
                warn!(error = %err, "backend connection read failed");
                break;
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    let failed = pending.fail_all(|| RpcError::transport("backend connection closed"));
    debug!(failed, "backend connection closed");
}

/// Completes the call named by `line`; fails when the line is not a response envelope.
fn route_line(line: &str, pending: &PendingCalls) -> Result<(), serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    let envelope: ResponseEnvelope = serde_json::from_str(line)?;
    let outcome = match envelope.error {
        Some(fault) => Err(RpcError::backend(fault)),
        None => Ok(envelope.result.unwrap_or(Value::Null)),
    };
    if !pending.complete(envelope.id, outcome) {
        warn!(id = envelope.id, "response for unknown request");
    }
    Ok(())
}

/// Decode error for every call left waiting behind `line`, each with its own parse error.
fn unreadable_response(line: &str) -> RpcError {
    let error = RpcError::decode("unreadable response from backend");
    match serde_json::from_str::<ResponseEnvelope>(line.trim()) {
        Err(err) => error.with_cause(err),
        Ok(_) => error,
    }
}

/// Client end of the backend object service.
/// （後端物件服務的用戶端。）
pub struct RpcBridge {
    endpoint: Endpoint,
    policy: ConnectPolicy,
    next_id: AtomicU64,
    connection: AsyncMutex<Option<Connection>>,
}

impl RpcBridge {
    /// Creates a bridge; no connection is made until the first call.
    pub fn new(endpoint: Endpoint, policy: ConnectPolicy) -> Self {
        Self {
            endpoint,
            policy,
            next_id: AtomicU64::new(1),
            connection: AsyncMutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Dials the backend now instead of on the first call.
    pub async fn ensure_connected(&self) -> Result<(), RpcError> {
        let mut guard = self.connection.lock().await;
        if guard.as_ref().map_or(true, Connection::is_closed) {
            *guard = None;
            *guard = Some(self.open().await?);
        }
        Ok(())
    }

    /// Issues `method` and waits for the response carrying the same id.
    /// （送出 `method` 並等待相同 id 的回應。）
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, RpcError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&RequestEnvelope { id, method, params }).map_err(
            |err| RpcError::transport(format!("failed to encode {method} request")).with_cause(err),
        )?;
        let receiver = self.send(id, method, line).await?;
        let value = receiver.await.map_err(|_| {
            RpcError::transport(format!("{method} abandoned: backend connection went away"))
        })??;
        serde_json::from_value(value).map_err(|err| {
            RpcError::decode(format!("unexpected {method} result")).with_cause(err)
        })
    }

    /// Legacy alias of [`ObjectService::get_objects`] kept by older backends.
    pub async fn get_items(&self, parent_id: &str) -> Result<IdsResponse, RpcError> {
        self.call(
            GET_ITEMS,
            &ParentRequest {
                parent: parent_id.to_string(),
            },
        )
        .await
    }

    async fn send(
        &self,
        id: u64,
        method: &str,
        line: String,
    ) -> Result<oneshot::Receiver<Result<Value, RpcError>>, RpcError> {
        let mut guard = self.connection.lock().await;
        if guard.as_ref().map_or(true, Connection::is_closed) {
            *guard = None;
            *guard = Some(self.open().await?);
        }
        let Some(connection) = guard.as_mut() else {
            return Err(RpcError::transport("backend connection unavailable"));
        };
        let receiver = connection.register(id)?;
        if let Err(err) = connection.writer.send(line).await {
            connection.pending.cancel(id);
            connection.closed.store(true, Ordering::SeqCst);
            return Err(
                RpcError::transport(format!("failed to send {method} request")).with_cause(err),
            );
        }
        trace!(id, method, "request sent");
        Ok(receiver)
    }

    async fn open(&self) -> Result<Connection, RpcError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port)).await {
                Ok(stream) => {
                    info!(endpoint = %self.endpoint, attempt, "connected to backend");
                    return Ok(Connection::start(stream));
                }
                Err(err) if attempt < attempts => {
                    debug!(endpoint = %self.endpoint, attempt, error = %err, "backend not reachable yet");
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(err) => {
                    return Err(RpcError::transport(format!(
                        "could not connect to backend at {} after {attempt} attempt(s)",
                        self.endpoint
                    ))
                    .with_cause(err));
                }
            }
        }
    }
}

impl fmt::Debug for RpcBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcBridge")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ObjectService for RpcBridge {
    async fn create_project(&self, name: &str) -> Result<IdsResponse, RpcError> {
        self.call(
            CREATE_PROJECT,
            &CreateProjectRequest {
                name: name.to_string(),
            },
        )
        .await
    }

    async fn get_objects(&self, parent_id: &str) -> Result<IdsResponse, RpcError> {
        self.call(
            GET_OBJECTS,
            &ParentRequest {
                parent: parent_id.to_string(),
            },
        )
        .await
    }

    async fn import_mesh(&self, project_id: &str, path: &str) -> Result<IdsResponse, RpcError> {
        self.call(
            IMPORT_MESH,
            &ImportMeshRequest {
                project: project_id.to_string(),
                path: path.to_string(),
            },
        )
        .await
    }

    async fn get_object_tree(&self, root_id: &str) -> Result<ObjectNode, RpcError> {
        let raw: TreeJsonResponse = self
            .call(
                GET_OBJECT_TREE,
                &ObjectRequest {
                    id: root_id.to_string(),
                },
            )
            .await?;
        ObjectNode::decode_backend_tree(root_id, &raw.json).map_err(|err| {
            RpcError::decode(format!("object tree for {root_id:?} rejected")).with_cause(err)
        })
    }

    async fn get_name(&self, id: &str) -> Result<NameResponse, RpcError> {
        self.call(GET_NAME, &ObjectRequest { id: id.to_string() })
            .await
    }
}
