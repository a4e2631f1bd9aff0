//! HTTP routes for clients and peers.
//!
//! Client key operations go through the causal gate. Peer endpoints
//! (`/replica`, `/view/update`, `/health`, `/kvs/sync`) read or write state
//! directly.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::{
    error::KvsError,
    message::{
        KeyRequest, KeyResponse, MemberBody, Outcome, ReplicaMessage, SyncBody, ViewBody,
        lenient_object,
    },
    node::Node,
    store::validate_key,
    view::JoinOutcome,
};

pub fn router(node: Node) -> Router {
    Router::new()
        .route("/view", get(get_view).put(join_view).delete(leave_view))
        .route("/view/update", put(update_view))
        .route("/kvs/sync", get(sync_store))
        .route("/kvs/:key", get(get_key).put(put_key).delete(delete_key))
        .route("/replica", put(apply_replica))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

async fn get_view(State(node): State<Node>) -> Json<ViewBody> {
    Json(ViewBody {
        view: node.view().snapshot(),
    })
}

async fn join_view(
    State(node): State<Node>,
    body: Bytes,
) -> Result<(StatusCode, Json<Outcome>), KvsError> {
    let member = MemberBody::from_object(&lenient_object(&body))?;
    let reply = match node.join(&member.socket_address) {
        JoinOutcome::Added => (StatusCode::CREATED, Json(Outcome::new("added"))),
        JoinOutcome::AlreadyPresent => (StatusCode::OK, Json(Outcome::new("already present"))),
    };
    Ok(reply)
}

async fn leave_view(State(node): State<Node>, body: Bytes) -> Result<Json<Outcome>, KvsError> {
    let member = MemberBody::from_object(&lenient_object(&body))?;
    node.leave(&member.socket_address)?;
    Ok(Json(Outcome::new("deleted")))
}

async fn update_view(State(node): State<Node>, body: Bytes) -> Result<Json<Outcome>, KvsError> {
    let update = ViewBody::from_object(lenient_object(&body))?;
    node.accept_view(update.view);
    Ok(Json(Outcome::new("view updated")))
}

async fn get_key(
    State(node): State<Node>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<KeyResponse>, KvsError> {
    let request = KeyRequest::from_object(lenient_object(&body));
    let read = node.get(&key, &request.causal_metadata)?;
    Ok(Json(KeyResponse {
        result: "found".to_string(),
        value: Some(read.value),
        causal_metadata: read.token,
    }))
}

async fn put_key(
    State(node): State<Node>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<KeyResponse>), KvsError> {
    validate_key(&key)?;
    let request = KeyRequest::from_object(lenient_object(&body));
    let value = request.value.ok_or(KvsError::MissingValue)?;
    let written = node.put(&key, value, &request.causal_metadata)?;

    let (status, result) = if written.created {
        (StatusCode::CREATED, "created")
    } else {
        (StatusCode::OK, "replaced")
    };
    Ok((
        status,
        Json(KeyResponse {
            result: result.to_string(),
            value: None,
            causal_metadata: written.token,
        }),
    ))
}

async fn delete_key(
    State(node): State<Node>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<KeyResponse>, KvsError> {
    let request = KeyRequest::from_object(lenient_object(&body));
    let deleted = node.delete(&key, &request.causal_metadata)?;
    Ok(Json(KeyResponse {
        result: "deleted".to_string(),
        value: None,
        causal_metadata: deleted.token,
    }))
}

async fn sync_store(State(node): State<Node>) -> Json<SyncBody> {
    Json(node.store().snapshot())
}

async fn apply_replica(State(node): State<Node>, body: Bytes) -> Result<Json<Value>, KvsError> {
    let message = ReplicaMessage::from_object(lenient_object(&body))?;
    node.store().apply_replicated(&message);
    Ok(Json(json!({})))
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::NodeConfig;

    const SELF_ADDR: &str = "127.0.0.1:1";

    fn app() -> (Node, Router) {
        let node = Node::new(NodeConfig::new(SELF_ADDR)).unwrap();
        (node.clone(), router(node))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    #[tokio::test]
    async fn put_creates_then_replaces() {
        let (_, app) = app();
        let (status, body) = call(&app, Method::PUT, "/kvs/x", r#"{"value":1}"#).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"result": "created", "causal-metadata": {"x": 1}}));

        let (status, body) = call(&app, Method::PUT, "/kvs/x", r#"{"value":2}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": "replaced", "causal-metadata": {"x": 2}}));
    }

    #[tokio::test]
    async fn returned_token_round_trips_into_get() {
        let (_, app) = app();
        let (_, body) = call(&app, Method::PUT, "/kvs/x", r#"{"value":"hello"}"#).await;
        let request = json!({"causal-metadata": body["causal-metadata"]}).to_string();

        let (status, body) = call(&app, Method::GET, "/kvs/x", &request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"result": "found", "value": "hello", "causal-metadata": {"x": 1}})
        );
    }

    #[tokio::test]
    async fn write_requires_exact_version() {
        let (node, app) = app();
        call(&app, Method::PUT, "/kvs/x", r#"{"value":1}"#).await;
        call(&app, Method::PUT, "/kvs/x", r#"{"value":2}"#).await;

        for stale in [1, 3] {
            let body = json!({"value": "nope", "causal-metadata": {"x": stale}}).to_string();
            let (status, reply) = call(&app, Method::PUT, "/kvs/x", &body).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(
                reply,
                json!({"error": "Causal dependencies not satisfied; try again later"})
            );

            let body = json!({"causal-metadata": {"x": stale}}).to_string();
            let (status, _) = call(&app, Method::DELETE, "/kvs/x", &body).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        }
        assert_eq!(node.store().get("x").version, 2);

        let body = json!({"causal-metadata": {"x": 2}}).to_string();
        let (status, reply) = call(&app, Method::DELETE, "/kvs/x", &body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, json!({"result": "deleted", "causal-metadata": {"x": 3}}));
    }

    #[tokio::test]
    async fn read_ahead_of_replica_is_unavailable() {
        let (_, app) = app();
        let body = json!({"causal-metadata": {"x": 1}}).to_string();
        let (status, _) = call(&app, Method::GET, "/kvs/x", &body).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn missing_keys_are_404() {
        let (_, app) = app();
        let (status, body) = call(&app, Method::GET, "/kvs/ghost", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Key does not exist"}));

        let (status, _) = call(&app, Method::DELETE, "/kvs/ghost", "{}").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn key_length_boundary() {
        let (node, app) = app();
        let long = format!("/kvs/{}", "k".repeat(51));
        let (status, body) = call(&app, Method::PUT, &long, r#"{"value":1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Key is too long"}));
        assert!(node.store().is_empty());

        let exact = format!("/kvs/{}", "k".repeat(50));
        let (status, _) = call(&app, Method::PUT, &exact, r#"{"value":1}"#).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn put_without_value_is_rejected() {
        let (node, app) = app();
        for body in ["", "not json", "{}", r#"{"causal-metadata":{}}"#] {
            let (status, reply) = call(&app, Method::PUT, "/kvs/x", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(reply, json!({"error": "PUT request does not specify a value"}));
        }
        assert_eq!(node.store().get("x").version, 0);
    }

    #[tokio::test]
    async fn missing_value_wins_over_stale_token() {
        let (node, app) = app();
        let body = json!({"causal-metadata": {"x": 7}}).to_string();
        let (status, reply) = call(&app, Method::PUT, "/kvs/x", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply, json!({"error": "PUT request does not specify a value"}));
        assert_eq!(node.store().get("x").version, 0);
    }

    #[tokio::test]
    async fn key_named_sync_is_shadowed_by_snapshot_route() {
        let (node, app) = app();
        let (status, _) = call(&app, Method::PUT, "/kvs/sync", r#"{"value":1}"#).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = call(&app, Method::DELETE, "/kvs/sync", "{}").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(node.store().is_empty());

        let (status, body) = call(&app, Method::GET, "/kvs/sync", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"kvs": {}, "causal-metadata": {}}));
    }

    #[tokio::test]
    async fn view_join_leave_and_update() {
        let (_, app) = app();
        let join = r#"{"socket-address":"127.0.0.1:2"}"#;

        let (status, body) = call(&app, Method::PUT, "/view", join).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"result": "added"}));

        let (status, body) = call(&app, Method::PUT, "/view", join).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": "already present"}));

        let (_, body) = call(&app, Method::GET, "/view", "").await;
        assert_eq!(body, json!({"view": ["127.0.0.1:1", "127.0.0.1:2"]}));

        let (status, body) = call(&app, Method::DELETE, "/view", join).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": "deleted"}));

        let (status, body) = call(&app, Method::DELETE, "/view", join).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "View has no such replica"}));

        let update = r#"{"view":["127.0.0.1:1","127.0.0.1:5"]}"#;
        let (status, body) = call(&app, Method::PUT, "/view/update", update).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": "view updated"}));
        let (_, body) = call(&app, Method::GET, "/view", "").await;
        assert_eq!(body, json!({"view": ["127.0.0.1:1", "127.0.0.1:5"]}));
    }

    #[tokio::test]
    async fn view_endpoints_reject_missing_fields() {
        let (_, app) = app();
        for body in ["", "garbage", "{}", r#"{"socket-address":""}"#] {
            let (status, _) = call(&app, Method::PUT, "/view", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let (status, _) = call(&app, Method::DELETE, "/view", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        for body in ["", "{}", r#"{"view":"a:1"}"#] {
            let (status, _) = call(&app, Method::PUT, "/view/update", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn replica_and_sync_endpoints() {
        let (_, app) = app();
        let put = r#"{"method":"PUT","key":"r","value":{"n":1},"version":4}"#;
        let (status, body) = call(&app, Method::PUT, "/replica", put).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));

        let (status, body) = call(&app, Method::GET, "/kvs/sync", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"kvs": {"r": {"n": 1}}, "causal-metadata": {"r": 4}})
        );

        // The next client write must build on the replicated version.
        let body = json!({"value": 2, "causal-metadata": {"r": 4}}).to_string();
        let (status, reply) = call(&app, Method::PUT, "/kvs/r", &body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["causal-metadata"], json!({"r": 5}));

        let delete = r#"{"method":"DELETE","key":"r","version":9}"#;
        call(&app, Method::PUT, "/replica", delete).await;
        let (_, body) = call(&app, Method::GET, "/kvs/sync", "").await;
        assert_eq!(body, json!({"kvs": {}, "causal-metadata": {"r": 9}}));

        let (status, _) = call(&app, Method::PUT, "/replica", r#"{"key":"r"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_says_ok() {
        let (_, app) = app();
        let (status, body) = call(&app, Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("OK".to_string()));
    }
}
