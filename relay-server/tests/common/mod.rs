#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use reqwest::Method;
use serde_json::{json, Value};

use idrelay::config::{Config, MergePrecedence};
use idrelay::{router, AppState, MemoryRunStore, ProviderApi, ProviderError};

/// In-process provider returning canned responses.
#[derive(Default)]
pub struct StubProvider {
    pub runs: Mutex<HashMap<String, Result<Value, ProviderError>>>,
    pub applicants: Mutex<HashMap<String, Result<Value, ProviderError>>>,
    pub calls: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn with_run(self, id: &str, run: Value) -> Self {
        self.runs.lock().unwrap().insert(id.to_string(), Ok(run));
        self
    }

    pub fn with_run_error(self, id: &str, err: ProviderError) -> Self {
        self.runs.lock().unwrap().insert(id.to_string(), Err(err));
        self
    }

    pub fn with_applicant(self, id: &str, applicant: Value) -> Self {
        self.applicants
            .lock()
            .unwrap()
            .insert(id.to_string(), Ok(applicant));
        self
    }

    pub fn with_applicant_error(self, id: &str, err: ProviderError) -> Self {
        self.applicants
            .lock()
            .unwrap()
            .insert(id.to_string(), Err(err));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn not_found() -> ProviderError {
    ProviderError::from_response(404, br#"{"error":{"type":"resource_not_found","message":"Resource not found"}}"#)
}

#[async_trait]
impl ProviderApi for StubProvider {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push(format!("{} {}", method, path));

        let segments: Vec<&str> = path.split('/').collect();
        match (method.as_str(), segments.as_slice()) {
            ("GET", ["workflow_runs", id]) => self
                .runs
                .lock()
                .unwrap()
                .get(*id)
                .cloned()
                .unwrap_or_else(|| Err(not_found())),
            ("GET", ["applicants", id]) => self
                .applicants
                .lock()
                .unwrap()
                .get(*id)
                .cloned()
                .unwrap_or_else(|| Err(not_found())),
            ("POST", ["applicants"]) => {
                let mut applicant = body.cloned().unwrap_or_else(|| json!({}));
                applicant["id"] = json!("app_new");
                Ok(applicant)
            }
            ("POST", ["workflow_runs"]) => Ok(json!({
                "id": "run_new",
                "status": "awaiting_input",
                "workflow_id": body.and_then(|b| b.get("workflow_id")).cloned(),
                "sdk_token": "sdk-token-123"
            })),
            _ => Err(not_found()),
        }
    }
}

pub fn test_config() -> Config {
    Config {
        api_base: "http://provider.invalid".to_string(),
        api_version: "v3.6".to_string(),
        api_token: "test-token".to_string(),
        port: 0,
        cors_origins: None,
        cors_trusted_domain: None,
        request_timeout_ms: 1000,
        webhook_token: None,
        store_capacity: 100,
        store_ttl_secs: 0,
        merge_precedence: MergePrecedence::Webhook,
    }
}

pub fn build_app(config: Config, provider: StubProvider) -> (Router, Arc<StubProvider>) {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryRunStore::new(config.store_capacity, config.store_ttl()));
    let state = AppState::new(config, provider.clone(), store);
    (router(state), provider)
}

pub fn workflow_run_webhook(id: &str, status: &str, output: Value) -> Value {
    json!({"payload": {
        "resource_type": "workflow_run",
        "action": "workflow_run.completed",
        "object": {"id": id, "status": status},
        "resource": {"id": id, "status": status, "output": output}
    }})
}

pub fn post_raw(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(body.into())
        .expect("request")
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize")))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_body(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body")
        .to_vec()
}

pub async fn read_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("json")
}
