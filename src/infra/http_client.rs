use crate::app::ports::{HttpClientPort, HttpReply};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

/// reqwest-backed client for Orion partial updates.
#[derive(Clone, Default)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn patch(
        &self,
        url: &str,
        body: &Value,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<HttpReply, String> {
        let resp = self
            .client
            .patch(url)
            .headers(headers.clone())
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        Ok(reply_with_body(status, resp.text().await))
    }
}

/// A status was received, so a failed body read still counts as a reply.
fn reply_with_body<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> HttpReply {
    let body = body.unwrap_or_else(|e| format!("failed to read response body: {e}"));
    HttpReply { status, body }
}
