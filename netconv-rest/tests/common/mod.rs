//! Mock manager for netconv-rest integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use netconv_core::ObjectKind;
use netconv_core::kinds::{
    ClusterProfile, LogicalRouter, LogicalSwitch, MacPool, NsService, SpoofGuardProfile,
    TransportZone,
};
use netconv_rest::{ManagerClient, ManagerConfig};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Query parameters that steer paging rather than filter objects.
const PAGING_PARAMS: [&str; 3] = ["page_size", "cursor", "include_mark_for_delete_objects"];

/// One request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct MockState {
    /// Objects by id, with the collection they live in.
    pub objects: BTreeMap<String, (String, Value)>,
    pub next_id: u64,
    /// Statuses to answer the next requests with, before any routing.
    pub faults: VecDeque<u16>,
    pub create_status: Option<u16>,
    pub requests: Vec<Recorded>,
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockManager {
    pub addr: SocketAddr,
    pub state: Shared,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockManager {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));
        let router = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ManagerConfig {
        ManagerConfig {
            manager: self.base_url(),
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(10),
            ..Default::default()
        }
    }

    pub fn client(&self) -> Arc<ManagerClient> {
        Arc::new(ManagerClient::new(self.config()).expect("Failed to build client"))
    }

    /// Insert an object directly, as if created by someone else.
    pub fn seed(&self, collection: &str, mut object: Value) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("obj-{:03}", state.next_id);
        object["id"] = json!(id);
        object["_revision"] = json!(0);
        state
            .objects
            .insert(id.clone(), (collection.to_string(), object));
        id
    }

    pub fn object(&self, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.objects.get(id).map(|(_, object)| object.clone())
    }

    pub fn remove(&self, id: &str) {
        self.state.lock().unwrap().objects.remove(id);
    }

    pub fn bump(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some((_, object)) = state.objects.get_mut(id) {
            let revision = object["_revision"].as_i64().unwrap_or(0);
            object["_revision"] = json!(revision + 1);
        }
    }

    pub fn fail_next(&self, status: u16) {
        self.state.lock().unwrap().faults.push_back(status);
    }

    pub fn answer_create_with(&self, status: u16) {
        self.state.lock().unwrap().create_status = Some(status);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_with(&self, method: Method) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

impl Drop for MockManager {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn collections() -> [&'static str; 7] {
    [
        LogicalRouter::COLLECTION,
        LogicalSwitch::COLLECTION,
        ClusterProfile::COLLECTION,
        NsService::COLLECTION,
        TransportZone::COLLECTION,
        MacPool::COLLECTION,
        SpoofGuardProfile::COLLECTION,
    ]
}

/// Split a request path into (policy api?, collection, object id).
fn route(path: &str) -> Option<(bool, String, Option<String>)> {
    let (policy, rest) = match path.strip_prefix("/policy/api/v1/") {
        Some(rest) => (true, rest),
        None => (false, path.strip_prefix("/api/v1/")?),
    };
    for collection in collections() {
        if rest == collection {
            return Some((policy, collection.to_string(), None));
        }
        if let Some(id) = rest.strip_prefix(collection).and_then(|r| r.strip_prefix('/')) {
            if !id.is_empty() && !id.contains('/') {
                return Some((policy, collection.to_string(), Some(id.to_string())));
            }
        }
    }
    None
}

fn error(status: u16, code: i64, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap();
    let body = json!({
        "httpStatus": status.canonical_reason().unwrap_or("UNKNOWN"),
        "error_code": code,
        "error_message": message,
        "module_name": "mock-manager",
    });
    (status, Json(body)).into_response()
}

fn not_found(id: &str) -> Response {
    error(
        404,
        202,
        &format!("The requested object : {} could not be found", id),
    )
}

fn ok(status: u16, body: Value) -> Response {
    (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        query: query.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if let Some(status) = state.faults.pop_front() {
        return error(status, 99, "injected failure");
    }

    let Some((policy, collection, id)) = route(uri.path()) else {
        return error(404, 1, "no such endpoint");
    };
    let payload: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => return error(400, 2, &e.to_string()),
        }
    };

    match (method, id) {
        (Method::GET, None) => list(&state, &collection, &query),
        (Method::POST, None) if !policy => {
            state.next_id += 1;
            let id = format!("obj-{:03}", state.next_id);
            insert(&mut state, &collection, id, payload, 201)
        }
        (Method::GET, Some(id)) => match state.objects.get(&id) {
            Some((_, object)) => ok(200, object.clone()),
            None => not_found(&id),
        },
        (Method::PUT, Some(id)) => {
            if policy && !state.objects.contains_key(&id) {
                return insert(&mut state, &collection, id, payload, 200);
            }
            update(&mut state, &id, payload)
        }
        (Method::DELETE, Some(id)) => match state.objects.remove(&id) {
            Some(_) => ok(200, Value::Null),
            None => not_found(&id),
        },
        _ => error(405, 3, "method not allowed"),
    }
}

fn insert(
    state: &mut MockState,
    collection: &str,
    id: String,
    mut payload: Value,
    status: u16,
) -> Response {
    payload["id"] = json!(id);
    payload["_revision"] = json!(0);
    state
        .objects
        .insert(id, (collection.to_string(), payload.clone()));
    ok(state.create_status.unwrap_or(status), payload)
}

fn update(state: &mut MockState, id: &str, mut payload: Value) -> Response {
    let Some((_, current)) = state.objects.get_mut(id) else {
        return not_found(id);
    };
    let current_revision = current["_revision"].as_i64().unwrap_or(0);
    if payload["_revision"].as_i64() != Some(current_revision) {
        return error(
            412,
            207,
            "The object was modified by somebody else. Please retry.",
        );
    }

    payload["id"] = json!(id);
    payload["_revision"] = json!(current_revision + 1);
    *current = payload.clone();
    ok(200, payload)
}

fn list(state: &MockState, collection: &str, query: &HashMap<String, String>) -> Response {
    let matching: Vec<&Value> = state
        .objects
        .values()
        .filter(|(c, _)| c == collection)
        .map(|(_, object)| object)
        .filter(|object| {
            query
                .iter()
                .filter(|(key, _)| !PAGING_PARAMS.contains(&key.as_str()))
                .all(|(key, value)| object[key.as_str()] == json!(value))
        })
        .collect();

    let page_size: usize = query
        .get("page_size")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);
    let start: usize = query.get("cursor").and_then(|v| v.parse().ok()).unwrap_or(0);
    let end = (start + page_size).min(matching.len());
    let results: Vec<Value> = matching[start.min(end)..end].iter().map(|v| (*v).clone()).collect();

    let mut body = json!({ "results": results, "result_count": matching.len() });
    if end < matching.len() {
        body["cursor"] = json!(end.to_string());
    }
    ok(200, body)
}
