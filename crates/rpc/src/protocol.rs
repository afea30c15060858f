//! Wire records for the backend object service.
//! （後端物件服務的傳輸紀錄格式。）
//!
//! Each request and response is one JSON object on its own line. Responses carry the id
//! of the request they answer and may arrive in any order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BackendFault;

pub const CREATE_PROJECT: &str = "CreateProject";
pub const GET_OBJECTS: &str = "GetObjects";
pub const GET_ITEMS: &str = "GetItems";
pub const IMPORT_MESH: &str = "ImportMesh";
pub const GET_OBJECT_TREE: &str = "GetObjectTree";
pub const GET_NAME: &str = "GetName";

/// Outgoing request line.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<'a, P> {
    pub id: u64,
    pub method: &'a str,
    pub params: &'a P,
}

/// Incoming response line. Exactly one of `result` and `error` is expected.
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<BackendFault>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// Shared by `GetObjects` and `GetItems`; an empty parent is the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRequest {
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMeshRequest {
    pub project: String,
    pub path: String,
}

/// Shared by `GetObjectTree` and `GetName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRequest {
    pub id: String,
}

/// `{ids: [..]}` answer of the mutating and listing calls.
/// （建立、匯入與列舉呼叫回傳的 id 清單。）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdsResponse {
    #[serde(default)]
    pub ids: Vec<String>,
}

impl IdsResponse {
    pub fn first(&self) -> Option<&str> {
        self.ids.first().map(String::as_str)
    }
}

/// Raw `GetObjectTree` answer: the serialized children of the requested object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeJsonResponse {
    pub json: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameResponse {
    pub name: String,
}
