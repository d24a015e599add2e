//! HTTP client for the Jeedom core API.
//!
//! Commands are executed over JSON-RPC (`cmd::execCmd`), with an optional
//! fallback to the legacy `jeeApi.php` GET endpoint when the RPC call
//! fails. Both paths carry the API key.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::JeedomConfig;
use crate::hub::CommandSink;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jsonrpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct JeedomApi {
    http: reqwest::Client,
    config: JeedomConfig,
}

impl JeedomApi {
    pub fn new(mut config: JeedomConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        while config.base_url.ends_with('/') {
            config.base_url.pop();
        }
        Ok(Self { http, config })
    }

    fn jsonrpc_url(&self) -> String {
        self.config
            .jsonrpc_url
            .clone()
            .unwrap_or_else(|| format!("{}/core/api/jeeApi.php", self.config.base_url))
    }

    fn http_api_url(&self) -> String {
        format!("{}/core/api/jeeApi.php", self.config.base_url)
    }

    /// Execute a Jeedom command, optionally with a value.
    pub async fn exec_cmd(&self, cmd_id: i64, value: Option<&str>) -> Result<(), ApiError> {
        if self.config.use_jsonrpc {
            match self.exec_cmd_jsonrpc(cmd_id, value).await {
                Ok(()) => return Ok(()),
                Err(e) if self.config.jsonrpc_fallback => {
                    warn!(cmd_id, "jsonrpc exec failed, falling back to http api: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        self.exec_cmd_http(cmd_id, value).await
    }

    async fn exec_cmd_jsonrpc(&self, cmd_id: i64, value: Option<&str>) -> Result<(), ApiError> {
        let mut params = json!({
            "apikey": self.config.api_key,
            "id": cmd_id,
        });
        if let Some(value) = value {
            params["value"] = rpc_value(value);
        }
        let body = json!({
            "jsonrpc": "2.0",
            "method": "cmd::execCmd",
            "params": params,
            "id": 1,
        });
        debug!(cmd_id, ?value, "executing command over jsonrpc");
        let response = self
            .http
            .post(self.jsonrpc_url())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: RpcResponse = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(ApiError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(())
    }

    async fn exec_cmd_http(&self, cmd_id: i64, value: Option<&str>) -> Result<(), ApiError> {
        let mut query: Vec<(&str, String)> = vec![
            ("apikey", self.config.api_key.clone()),
            ("type", "cmd".to_string()),
            ("id", cmd_id.to_string()),
        ];
        if let Some(value) = value {
            query.push(("value", value.to_string()));
        }
        debug!(cmd_id, ?value, "executing command over http api");
        self.http
            .get(self.http_api_url())
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Jeedom expects sliders as numbers; pass everything else as a string.
fn rpc_value(value: &str) -> serde_json::Value {
    if let Ok(n) = value.parse::<i64>() {
        return json!(n);
    }
    if let Ok(n) = value.parse::<f64>() {
        return json!(n);
    }
    json!(value)
}

#[async_trait]
impl CommandSink for JeedomApi {
    async fn exec_cmd(&self, cmd_id: i64, value: Option<&str>) -> anyhow::Result<()> {
        JeedomApi::exec_cmd(self, cmd_id, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_become_numbers() {
        assert_eq!(rpc_value("42"), json!(42));
        assert_eq!(rpc_value("21.5"), json!(21.5));
        assert_eq!(rpc_value("on"), json!("on"));
    }

    #[test]
    fn jsonrpc_url_defaults_to_jeeapi() {
        let api = JeedomApi::new(JeedomConfig {
            base_url: "http://jeedom.local".to_string(),
            api_key: "key".to_string(),
            jsonrpc_url: None,
            use_jsonrpc: true,
            jsonrpc_fallback: true,
        })
        .unwrap();
        assert_eq!(api.jsonrpc_url(), "http://jeedom.local/core/api/jeeApi.php");
        assert_eq!(api.http_api_url(), "http://jeedom.local/core/api/jeeApi.php");
    }
}
