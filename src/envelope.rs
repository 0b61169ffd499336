use crate::error::DecryptError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope as it travels over HTTP: `{"v":1,"iv":"...","tag":"...","ct":"..."}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WireEnvelope {
    pub v: i64,
    pub iv: String,
    pub tag: String,
    pub ct: String,
}

/// Decoded envelope with raw nonce, tag and ciphertext bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub version: i64,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Parse a request body into an envelope.
    pub fn from_json(body: &Value) -> Result<Self, DecryptError> {
        if !body.is_object() {
            return Err(DecryptError::MalformedEnvelope(
                "request body must be a JSON object".to_string(),
            ));
        }
        let wire: WireEnvelope = serde_json::from_value(body.clone())
            .map_err(|e| DecryptError::MalformedEnvelope(e.to_string()))?;
        Self::try_from(wire)
    }

    pub fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            v: self.version,
            iv: STANDARD.encode(&self.iv),
            tag: STANDARD.encode(&self.tag),
            ct: STANDARD.encode(&self.ciphertext),
        }
    }
}

impl TryFrom<WireEnvelope> for EncryptedEnvelope {
    type Error = DecryptError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        Ok(Self {
            version: wire.v,
            iv: decode_field("iv", &wire.iv)?,
            tag: decode_field("tag", &wire.tag)?,
            ciphertext: decode_field("ct", &wire.ct)?,
        })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, DecryptError> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| DecryptError::MalformedEnvelope(format!("field '{name}' is not base64: {e}")))
}
