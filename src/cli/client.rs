use anyhow::{anyhow, Context};
use serde_json::Value;
use std::time::Duration;

/// Thin JSON client for the Portal API envelope
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let request = self.http.get(format!("{}{}", self.base_url, path));
        self.send(request).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let request = self.http.post(format!("{}{}", self.base_url, path)).json(body);
        self.send(request).await
    }

    /// Send and unwrap `{"success": true, "data": ...}`; API errors become
    /// `anyhow` errors carrying the server's message.
    async fn send(&self, mut request: reqwest::RequestBuilder) -> anyhow::Result<Value> {
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;
        let status = response.status();
        let body: Value = response.json().await.context("response was not JSON")?;

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed");
            return Err(anyhow!("{} ({})", message, status));
        }

        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}
