#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mpesa_relay::config::AppConfig;
use mpesa_relay::startup::build_router;
use mpesa_relay::AppState;
use serde_json::{json, Value};
use tower::util::ServiceExt;

pub const SHORT_CODE: &str = "174379";
pub const PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";
pub const CONSUMER_KEY: &str = "test-consumer-key";
pub const CONSUMER_SECRET: &str = "test-consumer-secret";
pub const CALLBACK_URL: &str = "https://relay.example.com/api/mpesa/callback";

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ProviderBehaviour {
    pub token_status: StatusCode,
    pub token_body: Value,
    pub push_status: StatusCode,
    pub push_body: Value,
}

impl Default for ProviderBehaviour {
    fn default() -> Self {
        ProviderBehaviour {
            token_status: StatusCode::OK,
            token_body: json!({ "access_token": "T", "expires_in": "3599" }),
            push_status: StatusCode::OK,
            push_body: json!({ "MerchantRequestID": "X" }),
        }
    }
}

#[derive(Clone)]
struct ProviderState {
    behaviour: ProviderBehaviour,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// Stand-in for the M-Pesa API listening on a random local port.
pub struct MockProvider {
    pub base_url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockProvider {
    pub async fn start(behaviour: ProviderBehaviour) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = ProviderState {
            behaviour,
            calls: calls.clone(),
        };

        let app = Router::new()
            .route("/oauth/v1/generate", get(record))
            .route("/mpesa/stkpush/v1/processrequest", post(record))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockProvider {
            base_url: format!("http://{}", addr),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

async fn record(
    State(state): State<ProviderState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = RecordedCall {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).ok(),
    };
    let is_token = call.path.starts_with("/oauth");
    state.calls.lock().unwrap().push(call);

    let behaviour = &state.behaviour;
    if is_token {
        (behaviour.token_status, Json(behaviour.token_body.clone())).into_response()
    } else {
        (behaviour.push_status, Json(behaviour.push_body.clone())).into_response()
    }
}

/// Test configuration pointing at `base_url`. Overrides replace defaults; an
/// empty override unsets the variable.
pub fn config(base_url: &str, overrides: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = [
        ("MPESA_CONSUMER_KEY", CONSUMER_KEY),
        ("MPESA_CONSUMER_SECRET", CONSUMER_SECRET),
        ("MPESA_PASSKEY", PASSKEY),
        ("MPESA_SHORTCODE", SHORT_CODE),
        ("MPESA_CALLBACK_URL", CALLBACK_URL),
        ("MPESA_HTTP_TIMEOUT_SECS", "5"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert("MPESA_API_BASE_URL".to_string(), base_url.to_string());

    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn app(config: AppConfig) -> Router {
    build_router(AppState::new(config).unwrap())
}

pub fn client_addr() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

pub fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    request_from(client_addr(), method, uri, body)
}

pub fn request_from(addr: SocketAddr, method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(addr));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// POST with a body sent as-is under the given content type.
pub fn post_raw(uri: &str, content_type: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .extension(ConnectInfo(client_addr()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    TestResponse {
        status,
        headers,
        body,
    }
}
