//! Remote agent backend over HTTP.
//!
//! The gateway exposes two endpoints:
//!
//! ```text
//! POST {base}/agent   {"message","thinking","sessionKey","deliver","to"}
//!                  -> {"ok":bool,"text"?:string,"error"?:string}
//! GET  {base}/status
//!                  -> {"ok":bool,"error"?:string}
//! ```
//!
//! Every failure (connect, timeout, HTTP status, unparseable body) becomes an
//! `ok: false` reply carrying the error text; nothing here returns `Err`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AgentMessage, AgentReply, AgentStatus, RemoteAgent};

/// Request body for `POST /agent`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentRequestBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<&'static str>,
    session_key: &'a str,
    deliver: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a str>,
}

/// Reply body shared by both endpoints.
#[derive(Debug, Default, Deserialize)]
struct GatewayReply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the agent gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Client for the gateway at `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build gateway HTTP client")?;
        Ok(Self::with_client(client, base_url))
    }

    /// Client with a pre-configured HTTP client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turn an HTTP response into a gateway reply.
    ///
    /// Non-2xx responses still have their body inspected for an `error`.
    async fn read_reply(response: reqwest::Response) -> GatewayReply {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return failure(format!("gateway read failed: {e}")),
        };

        match serde_json::from_str::<GatewayReply>(&body) {
            Ok(mut reply) => {
                if !status.is_success() {
                    reply.ok = false;
                    if reply.error.is_none() {
                        reply.error = Some(format!("gateway returned HTTP {}", status.as_u16()));
                    }
                }
                reply
            }
            Err(_) if !status.is_success() => {
                failure(format!("gateway returned HTTP {}", status.as_u16()))
            }
            Err(e) => failure(format!("invalid gateway reply: {e}")),
        }
    }
}

fn failure(error: String) -> GatewayReply {
    GatewayReply {
        ok: false,
        text: None,
        error: Some(error),
    }
}

#[async_trait]
impl RemoteAgent for GatewayClient {
    async fn send(&self, message: AgentMessage) -> AgentReply {
        let url = format!("{}/agent", self.base_url);
        let body = AgentRequestBody {
            message: &message.text,
            thinking: message.thinking.map(|t| t.as_str()),
            session_key: &message.session_key,
            deliver: message.deliver,
            to: message.to.as_deref(),
        };
        log::debug!("[Gateway] POST {} session={}", url, message.session_key);

        let reply = match self.client.post(&url).json(&body).send().await {
            Ok(response) => Self::read_reply(response).await,
            Err(e) => {
                log::warn!("[Gateway] POST {} failed: {e}", url);
                failure(format!("gateway unreachable: {e}"))
            }
        };
        AgentReply {
            ok: reply.ok,
            text: reply.text,
            error: reply.error,
        }
    }

    async fn status(&self) -> AgentStatus {
        let url = format!("{}/status", self.base_url);
        let reply = match self.client.get(&url).send().await {
            Ok(response) => Self::read_reply(response).await,
            Err(e) => {
                log::debug!("[Gateway] GET {} failed: {e}", url);
                failure(format!("gateway unreachable: {e}"))
            }
        };
        AgentStatus {
            ok: reply.ok,
            error: reply.error,
        }
    }
}
