#![allow(dead_code)]

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Runtime;

pub const TOKEN: &str = "tok";

#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub file_len: usize,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub app_queries: Vec<HashMap<String, String>>,
    pub cert_bodies: Vec<Value>,
    pub put_bodies: Vec<Value>,
    pub uploads: Vec<Upload>,
}

/// Knobs for the fake fir.im service.
#[derive(Debug, Clone)]
pub struct Behavior {
    pub app_status: u16,
    pub cert_status: u16,
    pub upload_status: u16,
    pub upload_delay: Duration,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior { app_status: 200, cert_status: 200, upload_status: 200, upload_delay: Duration::ZERO }
    }
}

#[derive(Clone)]
struct FakeFir {
    base: String,
    behavior: Behavior,
    recorded: Arc<Mutex<Recorded>>,
}

/// The fake service, running on its own tokio runtime so blocking clients
/// can call it from the test thread.
pub struct TestServer {
    pub addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    _rt: Runtime,
}

impl TestServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

pub fn spawn(behavior: Behavior) -> TestServer {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let listener = rt.block_on(tokio::net::TcpListener::bind("127.0.0.1:0")).unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let state = FakeFir { base: format!("http://{addr}"), behavior, recorded: recorded.clone() };

    let app = Router::new()
        .route("/apps/:id", get(app_info).put(update_app))
        .route("/apps", post(upload_cert))
        .route("/old/apps/:id", get(moved))
        .route("/upload", post(upload))
        .with_state(state);
    rt.spawn(async move { axum::serve(listener, app).await.unwrap() });

    TestServer { addr, recorded, _rt: rt }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap()
}

async fn app_info(
    State(fake): State<FakeFir>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let token_ok = query.get("api_token").map(String::as_str) == Some(TOKEN);
    fake.recorded.lock().unwrap().app_queries.push(query);
    if fake.behavior.app_status != 200 {
        return (status(fake.behavior.app_status), Json(json!({"error": "not found"})));
    }
    if !token_ok {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api_token"})));
    }
    (StatusCode::OK, Json(json!({"id": id, "short": "abc", "bundle_id": "com.x.y", "bundle": {}})))
}

async fn update_app(
    State(fake): State<FakeFir>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.recorded.lock().unwrap().put_bodies.push(body);
    (StatusCode::OK, Json(json!({"id": id, "short": "abc"})))
}

async fn upload_cert(State(fake): State<FakeFir>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let token_ok = body.get("api_token").and_then(Value::as_str) == Some(TOKEN);
    fake.recorded.lock().unwrap().cert_bodies.push(body);
    if fake.behavior.cert_status != 200 {
        return (status(fake.behavior.cert_status), Json(json!({"error": "cert refused"})));
    }
    if !token_ok {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api_token"})));
    }
    let upload_url = format!("{}/upload", fake.base);
    (StatusCode::OK, Json(json!({"cert": {"binary": {"upload_url": upload_url, "key": "k", "token": "t"}}})))
}

async fn moved(Path(id): Path<String>, Query(query): Query<HashMap<String, String>>) -> Response {
    let token = query.get("api_token").cloned().unwrap_or_default();
    Redirect::temporary(&format!("/apps/{id}?api_token={token}")).into_response()
}

async fn upload(State(fake): State<FakeFir>, mut mp: Multipart) -> (StatusCode, Json<Value>) {
    tokio::time::sleep(fake.behavior.upload_delay).await;
    let mut upload = Upload::default();
    while let Ok(Some(field)) = mp.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            upload.file_name = field.file_name().map(str::to_string);
            upload.content_type = field.content_type().map(str::to_string);
            upload.file_len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        } else if let Ok(text) = field.text().await {
            upload.fields.insert(name, text);
        }
    }
    fake.recorded.lock().unwrap().uploads.push(upload);
    if fake.behavior.upload_status != 200 {
        return (status(fake.behavior.upload_status), Json(json!({"error": "storage full"})));
    }
    (StatusCode::OK, Json(json!({"completed": true})))
}
