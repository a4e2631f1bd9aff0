//! JSON bodies exchanged with clients and between replicas.
//!
//! Inbound bodies are decoded permissively: [`lenient_object`] turns an empty,
//! malformed or non-object body into `{}` and leaves required-field checks to
//! the caller, so a bad body surfaces as a specific 400 rather than as a
//! framework rejection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{causal::CausalToken, error::KvsError};

pub const SOCKET_ADDRESS_FIELD: &str = "socket-address";
pub const CAUSAL_METADATA_FIELD: &str = "causal-metadata";

/// Parses a request body, treating anything that is not a JSON object as `{}`.
pub fn lenient_object(bytes: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// `{"result": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub result: String,
}

impl Outcome {
    pub fn new(result: &str) -> Self {
        Self {
            result: result.to_string(),
        }
    }
}

/// `{"view": [...]}`, used both for `GET /view` and `PUT /view/update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewBody {
    pub view: Vec<String>,
}

impl ViewBody {
    pub fn from_object(body: Map<String, Value>) -> Result<Self, KvsError> {
        let view = body.get("view").ok_or(KvsError::MissingField("view"))?;
        let view = serde_json::from_value(view.clone())
            .map_err(|err| KvsError::InvalidBody(err.to_string()))?;
        Ok(Self { view })
    }
}

/// `{"socket-address": "host:port"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBody {
    #[serde(rename = "socket-address")]
    pub socket_address: String,
}

impl MemberBody {
    pub fn from_object(body: &Map<String, Value>) -> Result<Self, KvsError> {
        match body.get(SOCKET_ADDRESS_FIELD).and_then(Value::as_str) {
            Some(addr) if !addr.is_empty() => Ok(Self {
                socket_address: addr.to_string(),
            }),
            _ => Err(KvsError::MissingField(SOCKET_ADDRESS_FIELD)),
        }
    }
}

/// Client body for `/kvs/{key}` after lenient decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRequest {
    /// `Some(Value::Null)` when the client sent `"value": null`.
    pub value: Option<Value>,
    pub causal_metadata: CausalToken,
}

impl KeyRequest {
    pub fn from_object(mut body: Map<String, Value>) -> Self {
        let causal_metadata = body
            .get(CAUSAL_METADATA_FIELD)
            .map(CausalToken::from_json)
            .unwrap_or_default();
        Self {
            value: body.remove("value"),
            causal_metadata,
        }
    }
}

/// Successful reply to a client key operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResponse {
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(rename = "causal-metadata")]
    pub causal_metadata: CausalToken,
}

/// Full store contents, served by `GET /kvs/sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncBody {
    pub kvs: BTreeMap<String, Value>,
    #[serde(rename = "causal-metadata")]
    pub causal_metadata: CausalToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaMethod {
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
}

/// A local mutation forwarded to the other members of the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaMessage {
    pub method: ReplicaMethod,
    pub key: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    pub version: u64,
}

impl ReplicaMessage {
    pub fn put(key: impl Into<String>, value: Value, version: u64) -> Self {
        Self {
            method: ReplicaMethod::Put,
            key: key.into(),
            value,
            version,
        }
    }

    pub fn delete(key: impl Into<String>, version: u64) -> Self {
        Self {
            method: ReplicaMethod::Delete,
            key: key.into(),
            value: Value::Null,
            version,
        }
    }

    pub fn from_object(body: Map<String, Value>) -> Result<Self, KvsError> {
        serde_json::from_value(Value::Object(body))
            .map_err(|err| KvsError::InvalidBody(err.to_string()))
    }
}
