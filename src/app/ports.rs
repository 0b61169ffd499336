use crate::app::instruction_use_case::Instruction;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

// Forward-side ports
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Send one partial-update request. `Err` means no HTTP response was
    /// received (connect failure, timeout, broken body).
    async fn patch(
        &self,
        url: &str,
        body: &Value,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<HttpReply, String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

// Control-side ports
#[async_trait]
pub trait InstructionStorePort: Send + Sync {
    async fn get(&self) -> Instruction;
    async fn set(&self, instruction: Instruction);
}
