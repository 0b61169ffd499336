use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field validation failures, keyed by field name.
pub type FieldErrors = BTreeMap<String, String>;

/// Failures while turning an envelope into a plaintext record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("server misconfigured: shared secret is not set")]
    ServerMisconfigured,

    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(i64),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("malformed plaintext: {0}")]
    MalformedPlaintext(String),
}

impl DecryptError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DecryptError::ServerMisconfigured => "server_misconfigured",
            DecryptError::UnsupportedVersion(_) => "unsupported_version",
            DecryptError::MalformedEnvelope(_) => "malformed_envelope",
            DecryptError::AuthenticationFailed => "authentication_failed",
            DecryptError::MalformedPlaintext(_) => "malformed_plaintext",
        }
    }

    /// Detail safe to hand back to the caller.
    ///
    /// Missing secret, bad tag and unreadable plaintext all collapse into the
    /// same message so a node cannot probe which one happened.
    pub fn public_detail(&self) -> String {
        match self {
            DecryptError::UnsupportedVersion(_) => "unsupported version".to_string(),
            DecryptError::MalformedEnvelope(detail) => format!("malformed envelope: {detail}"),
            DecryptError::ServerMisconfigured
            | DecryptError::AuthenticationFailed
            | DecryptError::MalformedPlaintext(_) => "envelope could not be decrypted".to_string(),
        }
    }
}

/// Terminal failures of a single ingest request.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("decryption failed: {0}")]
    Decrypt(#[from] DecryptError),

    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstructionError {
    #[error("Invalid instruction")]
    InvalidInstruction(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Errors that stop the server itself.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("server error: {0}")]
    Server(#[from] hyper::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
