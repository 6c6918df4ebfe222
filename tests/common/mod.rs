#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};

use foundit_api::config::AppConfig;
use foundit_api::database::MemoryStore;
use foundit_api::media::MemoryMediaStore;
use foundit_api::{app, AppState};

/// An in-process server on its own port, backed by the in-memory store and media store.
pub struct TestServer {
    pub base_url: String,
    pub media: Arc<MemoryMediaStore>,
    pub client: Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(AppConfig::development()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;

        let media = Arc::new(MemoryMediaStore::new());
        let state = AppState::new(config, Arc::new(MemoryStore::new()), media.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            media,
            client: Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<Response> {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Result<Response> {
        Ok(self.client.put(self.url(path)).bearer_auth(token).json(&body).send().await?)
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.client.delete(self.url(path)).bearer_auth(token).send().await?)
    }

    /// Registers a user and returns `(user id, session token)`.
    pub async fn register(&self, name: &str, email: &str) -> Result<(String, String)> {
        let res = self
            .post(
                "/api/auth/register",
                None,
                json!({ "name": name, "email": email, "password": "secret1" }),
            )
            .await?;
        let res = expect_status(res, StatusCode::CREATED).await?;
        let id = res["user"]["id"].as_str().context("missing user id")?.to_string();
        let token = res["token"].as_str().context("missing token")?.to_string();
        Ok((id, token))
    }

    /// Reports a found item with a JSON body and returns its id.
    pub async fn report_item(&self, token: &str, title: &str) -> Result<String> {
        let res = self.post("/api/items", Some(token), item_body(title)).await?;
        let res = expect_status(res, StatusCode::CREATED).await?;
        Ok(res["item"]["id"].as_str().context("missing item id")?.to_string())
    }
}

pub fn item_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": format!("{} left near the library entrance", title),
        "type": "found",
        "category": "electronics",
        "location": { "name": "Main Library" },
        "dateOccurred": "2024-03-01"
    })
}

/// Asserts the status and returns the JSON body.
pub async fn expect_status(res: Response, status: StatusCode) -> Result<Value> {
    let actual = res.status();
    let body: Value = res.json().await.context("response was not JSON")?;
    anyhow::ensure!(actual == status, "expected {}, got {}: {}", status, actual, body);
    Ok(body)
}
