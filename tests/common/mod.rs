//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds an in-memory database, a config pointing media and
//! activity paths into a temp directory, and the full [`AppContext`]. The
//! `with_server*` constructors start Axum on a random port for HTTP-level
//! testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use mq_core::config::Config;
use mq_db::pool::{init_memory_pool, DbPool};
use mq_server::context::AppContext;
use mq_server::router::build_router;
use reqwest::{Method, Response, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const PASSWORD: &str = "correct-horse-battery";

/// Config suitable for tests: cheap bcrypt, generous rate limit, all paths
/// inside `dir`.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.auth.bcrypt_cost = 4;
    config.auth.api_rate_per_minute = 10_000;
    config.media.video_dir = dir.path().join("videos");
    config.media.upload_dir = dir.path().join("uploads");
    config.activity.path = dir.path().join("activity.log");
    config
}

pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub dir: TempDir,
}

impl TestHarness {
    /// Start a server with the default test configuration.
    pub async fn with_server() -> Self {
        Self::with_server_config(|_| {}).await
    }

    /// Start a server after letting the caller adjust the test configuration.
    pub async fn with_server_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = test_config(&dir);
        adjust(&mut config);

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = AppContext::new(db.clone(), config);
        let app = build_router(ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            ctx,
            db,
            addr,
            client: reqwest::Client::new(),
            dir,
        }
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> mq_db::pool::PooledConnection {
        mq_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Send a request with an optional bearer token and JSON body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        req.send().await.expect("request failed")
    }

    pub async fn get(&self, path: &str, token: &str) -> Response {
        self.send(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Response {
        self.send(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Response {
        self.send(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.send(Method::DELETE, path, Some(token), None).await
    }

    /// Register an account; returns the response body.
    pub async fn register(&self, username: &str) -> Value {
        let resp = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED, "register {username}");
        resp.json().await.expect("register body")
    }

    /// Log in and return the session token.
    pub async fn login(&self, username: &str) -> String {
        let resp = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "login": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK, "login {username}");
        let body: Value = resp.json().await.expect("login body");
        body["token"].as_str().expect("token").to_string()
    }

    /// Register and log in. The first account of a harness is the admin.
    pub async fn signup(&self, username: &str) -> String {
        self.register(username).await;
        self.login(username).await
    }

    /// Create a title as `admin_token` and return its id.
    pub async fn create_title(&self, admin_token: &str, body: Value) -> String {
        let resp = self.post("/api/titles", admin_token, body).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.expect("title body");
        body["id"].as_str().expect("title id").to_string()
    }

    pub async fn create_movie(&self, admin_token: &str, name: &str) -> String {
        self.create_title(admin_token, json!({ "kind": "movie", "name": name }))
            .await
    }

    /// Read every line of the activity log as JSON.
    pub fn activity_lines(&self) -> Vec<Value> {
        let path = self.dir.path().join("activity.log");
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).expect("activity line is JSON"))
            .collect()
    }
}
