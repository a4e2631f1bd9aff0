//! Error types for client requests and inter-replica calls.
//!
//! [`KvsError`] is what a request handler can fail with; every variant maps to
//! a contractual status code. [`PeerError`] covers outbound calls to other
//! replicas and is never shown to a client: it is logged, and for health
//! probes it decides eviction.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failures a client-facing or peer-facing request can end in.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KvsError {
    #[error("Key is too long")]
    KeyTooLong,

    #[error("PUT request does not specify a value")]
    MissingValue,

    #[error("Missing or empty {0} in request body")]
    MissingField(&'static str),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Causal dependencies not satisfied; try again later")]
    CausalNotSatisfied {
        key: String,
        expected: u64,
        current: u64,
    },

    #[error("Key does not exist")]
    KeyNotFound,

    #[error("View has no such replica")]
    ReplicaNotFound,
}

impl KvsError {
    pub fn status(&self) -> StatusCode {
        match self {
            KvsError::KeyTooLong
            | KvsError::MissingValue
            | KvsError::MissingField(_)
            | KvsError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            KvsError::CausalNotSatisfied { .. } => StatusCode::SERVICE_UNAVAILABLE,
            KvsError::KeyNotFound | KvsError::ReplicaNotFound => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for KvsError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// An outbound call to another replica that did not succeed.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("request to {addr} failed")]
    Request {
        addr: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{addr} answered with status {status}")]
    Status { addr: String, status: StatusCode },

    #[error("could not decode response from {addr}")]
    Decode {
        addr: String,
        #[source]
        source: reqwest::Error,
    },
}
