//! Meta Graph API client shared by the Facebook and Instagram adapters

use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::GraphConfig;
use crate::error::PlatformError;
use crate::platforms::facebook::FacebookPlatform;
use crate::platforms::instagram::InstagramPlatform;
use crate::platforms::{AdapterFactory, Platform, PlatformResult};
use crate::types::{PlatformKind, SocialAccount};

/// Thin wrapper over `reqwest` that speaks the Graph API's conventions
///
/// Every call carries the access token as a query parameter, and answers are
/// normalised by [`normalize_response`].
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    api_base: String,
    poll_interval: Duration,
}

impl GraphClient {
    pub fn new(config: &GraphConfig) -> PlatformResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PlatformError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(config.container_poll_interval_ms),
        })
    }

    /// Delay between media container status checks
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn get(&self, path: &str, token: &str, params: &[(&str, &str)]) -> PlatformResult<Value> {
        self.request(Method::GET, path, token, params).await
    }

    pub async fn post(&self, path: &str, token: &str, params: &[(&str, &str)]) -> PlatformResult<Value> {
        self.request(Method::POST, path, token, params).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> PlatformResult<Value> {
        self.request(Method::DELETE, path, token, &[]).await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        token: &str,
        params: &[(&str, &str)],
    ) -> PlatformResult<Value> {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        debug!("Graph API {} {}", method, url);

        let response = self
            .http
            .request(method, &url)
            .query(&[("access_token", token)])
            .query(params)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        let value: Value = serde_json::from_str(&body).map_err(|_| {
            PlatformError::Transport(format!("HTTP {}: response body is not JSON", status.as_u16()))
        })?;

        normalize_response(value)
    }
}

/// Apply the Graph API's response conventions
///
/// A bare JSON boolean becomes `{"success": <bool>}`; an object carrying an
/// `error` member becomes `RemoteApi` regardless of the HTTP status.
pub fn normalize_response(value: Value) -> PlatformResult<Value> {
    if let Value::Bool(success) = value {
        return Ok(json!({ "success": success }));
    }

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        return Err(PlatformError::RemoteApi {
            message,
            code: error.get("code").and_then(Value::as_i64),
            subcode: error.get("error_subcode").and_then(Value::as_i64),
        });
    }

    Ok(value)
}

/// Pull a string id out of a Graph answer, trying `keys` in order
pub(crate) fn extract_id(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Production adapter factory backed by the Graph API
#[derive(Clone)]
pub struct GraphAdapterFactory {
    client: GraphClient,
}

impl GraphAdapterFactory {
    pub fn new(config: &GraphConfig) -> PlatformResult<Self> {
        Ok(Self {
            client: GraphClient::new(config)?,
        })
    }
}

impl AdapterFactory for GraphAdapterFactory {
    fn build(&self, kind: PlatformKind, account: &SocialAccount) -> PlatformResult<Box<dyn Platform>> {
        match kind {
            PlatformKind::Facebook => Ok(Box::new(FacebookPlatform::from_account(
                self.client.clone(),
                account,
            )?)),
            PlatformKind::Instagram => Ok(Box::new(InstagramPlatform::from_account(
                self.client.clone(),
                account,
            )?)),
        }
    }
}
