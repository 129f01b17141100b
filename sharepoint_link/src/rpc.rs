//! Minimal aria2 JSON-RPC client for queueing downloads.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::client::REQUEST_TIMEOUT;
use crate::error::{Result, ShareError};

/// Default aria2 RPC server.
pub const DEFAULT_RPC_URL: &str = "http://[::1]:6800";

/// Client for an aria2 instance started with `--enable-rpc`.
///
/// Only JSON-RPC over HTTP is supported.
pub struct Aria2Client {
    endpoint: String,
    secret: String,
    seq: AtomicU64,
    http: Client,
}

impl Aria2Client {
    /// Create a client for `url` of the form `http://<server>:<port>`.
    pub fn new(url: &str, secret: &str) -> Result<Self> {
        let endpoint = format!("{}/jsonrpc", url.trim_end_matches('/'));
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ShareError::transport(&endpoint, e))?;

        Ok(Self {
            endpoint,
            secret: format!("token:{}", secret),
            seq: AtomicU64::new(0),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check that the server answers (`aria2.getGlobalStat`).
    pub async fn ping(&self) -> Result<()> {
        self.call("aria2.getGlobalStat", vec![json!(self.secret)])
            .await?
            .map(|_| ())
            .ok_or_else(|| ShareError::RpcError(format!("not reachable: {}", self.endpoint)))
    }

    /// Queue a download. Returns the GID, or `None` if aria2 refused it.
    ///
    /// Every cookie is sent as its own `Cookie: name=value` header.
    pub async fn add_uri(
        &self,
        uri: &str,
        filename: Option<&str>,
        dir: Option<&str>,
        cookies: &[(String, String)],
    ) -> Result<Option<String>> {
        let mut options = Map::new();
        if let Some(filename) = filename {
            options.insert("out".to_string(), json!(filename));
        }
        if let Some(dir) = dir {
            options.insert("dir".to_string(), json!(dir));
        }
        if !cookies.is_empty() {
            let headers: Vec<String> = cookies
                .iter()
                .map(|(name, value)| format!("Cookie: {}={}", name, value))
                .collect();
            options.insert("header".to_string(), json!(headers));
        }

        let mut params = vec![json!(self.secret), json!([uri])];
        if !options.is_empty() {
            params.push(Value::Object(options));
        }

        let Some(response) = self.call("aria2.addUri", params).await? else {
            return Ok(None);
        };
        match response.get("result").and_then(Value::as_str) {
            Some(gid) if !gid.is_empty() => Ok(Some(gid.to_string())),
            _ => {
                warn!("unexpected aria2 response {}", response);
                Ok(None)
            }
        }
    }

    /// Send one request. `None` when the server answers with a non-success status.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Option<Value>> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "id": self.seq.fetch_add(1, Ordering::Relaxed),
            "params": params,
        });
        debug!(method, "aria2 request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ShareError::transport(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("aria2 {} failed ({}): {}", method, status, body);
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ShareError::transport(&self.endpoint, e))?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ShareError::RpcError(format!("{}: {}", e, body)))
    }
}
