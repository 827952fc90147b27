#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use cims::config::Config;
use cims::db::patch::UserCreate;
use cims::db::{Db, UserRole};
use cims::error::LlmError;
use cims::llm::{LlmBackend, SharedLlm, TextStream};
use cims::server::router::{CimsState, cims_router};
use cims::service::ExtractorHandle;
use cims::utils::password::hash_password;
use cims_schema::ExtractionPayload;
use futures::stream;
use serde_json::Value;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@cims.local";
pub const ADMIN_PASSWORD: &str = "admin-pass";
pub const USER_EMAIL: &str = "engineer@cims.local";
pub const USER_PASSWORD: &str = "engineer-pass";

/// Scripted model: canned extraction, canned reply chunks, or a failure on every call.
#[derive(Default)]
pub struct FakeLlm {
    pub payload: Option<ExtractionPayload>,
    pub reply_chunks: Vec<String>,
    pub fail_with: Option<String>,
    /// Prompts seen by `complete` and `stream`.
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn replying(chunks: &[&str]) -> Self {
        Self {
            reply_chunks: chunks.iter().map(|c| (*c).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn extracting(payload: ExtractionPayload) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn failure(&self) -> Option<LlmError> {
        self.fail_with
            .as_ref()
            .map(|m| LlmError::Unexpected(m.clone()))
    }
}

#[async_trait]
impl LlmBackend for FakeLlm {
    async fn extract_metrics(
        &self,
        _image: &[u8],
        _mime_type: &str,
    ) -> Result<ExtractionPayload, LlmError> {
        if let Some(e) = self.failure() {
            return Err(e);
        }
        Ok(self
            .payload
            .clone()
            .unwrap_or_else(|| ExtractionPayload::failed("no payload scripted", None)))
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(e) = self.failure() {
            return Err(e);
        }
        Ok(self.reply_chunks.concat())
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(e) = self.failure() {
            return Err(e);
        }
        let chunks: Vec<Result<String, LlmError>> =
            self.reply_chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Db,
    pub cfg: Config,
    pub llm: Arc<FakeLlm>,
    pub root: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn unique_root(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut root = std::env::temp_dir();
    root.push(format!("cims-{tag}-{}-{}", std::process::id(), nanos));
    std::fs::create_dir_all(&root).expect("failed to create test dir");
    root
}

/// Fresh database, upload dir and router, with an admin and a regular user seeded.
pub async fn spawn_app(tag: &str, llm: FakeLlm) -> TestApp {
    let root = unique_root(tag);

    let mut cfg = Config::default();
    cfg.basic.database_url = format!("sqlite:{}", root.join("cims.sqlite").display());
    cfg.basic.insecure_cookie = true;
    cfg.admin.email = ADMIN_EMAIL.to_string();
    cfg.admin.password = ADMIN_PASSWORD.to_string();
    cfg.storage.upload_dir = root.join("uploads");

    let db = Db::connect(&cfg.basic.database_url)
        .await
        .expect("failed to open test database");
    db.seed_admin(&cfg.admin).await.expect("admin seed failed");
    db.create_user(UserCreate {
        email: USER_EMAIL.to_string(),
        password_hash: hash_password(USER_PASSWORD),
        name: "Engineer".to_string(),
        role: UserRole::User,
    })
    .await
    .expect("user seed failed");

    let llm = Arc::new(llm);
    let shared: SharedLlm = llm.clone();
    let extractor = ExtractorHandle::spawn(db.clone(), shared.clone(), 50)
        .await
        .expect("extractor spawn failed");
    let state = CimsState::new(db.clone(), shared, extractor, cfg.clone());

    TestApp {
        app: cims_router(state),
        db,
        cfg,
        llm,
        root,
    }
}

impl TestApp {
    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("request failed")
    }

    /// JSON request; returns status and parsed body (`Null` when empty or not JSON).
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let resp = self.request(req).await;
        let status = resp.status();
        (status, read_json(resp).await)
    }

    /// Log in and return the `Cookie` header value carrying the session.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "email": email, "password": password }).to_string(),
            ))
            .expect("failed to build request");
        let resp = self.request(req).await;
        assert_eq!(resp.status(), StatusCode::OK, "login failed for {email}");
        session_cookie(&resp).expect("login response carried no session cookie")
    }

    pub async fn login_admin(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn login_user(&self) -> String {
        self.login(USER_EMAIL, USER_PASSWORD).await
    }

    pub async fn multipart(
        &self,
        uri: &str,
        cookie: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> (StatusCode, Value) {
        let (content_type, body) = multipart_body(fields, file);
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .expect("failed to build request");
        let resp = self.request(req).await;
        let status = resp.status();
        (status, read_json(resp).await)
    }
}

/// `token=...` pair from the response's `Set-Cookie`.
pub fn session_cookie(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("token="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn read_body(resp: Response<Body>) -> Vec<u8> {
    to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body")
        .to_vec()
}

pub async fn read_json(resp: Response<Body>) -> Value {
    let bytes = read_body(resp).await;
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

const BOUNDARY: &str = "cims-test-boundary";

/// Hand-built `multipart/form-data` body.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
