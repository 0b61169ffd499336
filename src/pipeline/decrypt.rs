use crate::config::SharedSecret;
use crate::constants::{NONCE_LEN, SUPPORTED_ENVELOPE_VERSION, TAG_LEN};
use crate::envelope::EncryptedEnvelope;
use crate::error::DecryptError;
use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Plaintext telemetry record, still untyped.
pub type PlaintextRecord = Map<String, Value>;

/// Envelope key: SHA-256 of the shared secret, never the secret itself.
fn derive_key(secret: &SharedSecret) -> [u8; 32] {
    Sha256::digest(secret.expose().as_bytes()).into()
}

fn cipher_for(secret: &SharedSecret) -> Result<Aes256Gcm, DecryptError> {
    Aes256Gcm::new_from_slice(&derive_key(secret))
        .map_err(|_| DecryptError::ServerMisconfigured)
}

/// Decrypt and authenticate an envelope into a JSON object.
///
/// The tag is verified over the whole ciphertext before any plaintext is
/// parsed, so nothing unauthenticated ever leaves this function.
pub fn decrypt(
    envelope: &EncryptedEnvelope,
    secret: Option<&SharedSecret>,
) -> Result<PlaintextRecord, DecryptError> {
    if envelope.version != SUPPORTED_ENVELOPE_VERSION {
        return Err(DecryptError::UnsupportedVersion(envelope.version));
    }

    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(DecryptError::ServerMisconfigured)?;

    if envelope.iv.len() != NONCE_LEN {
        return Err(DecryptError::MalformedEnvelope(format!(
            "iv must be {NONCE_LEN} bytes, got {}",
            envelope.iv.len()
        )));
    }
    if envelope.tag.len() != TAG_LEN {
        return Err(DecryptError::AuthenticationFailed);
    }

    let cipher = cipher_for(secret)?;
    let mut buffer = envelope.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&envelope.iv),
            b"",
            &mut buffer,
            Tag::from_slice(&envelope.tag),
        )
        .map_err(|_| DecryptError::AuthenticationFailed)?;

    match serde_json::from_slice::<Value>(&buffer) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(DecryptError::MalformedPlaintext(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(DecryptError::MalformedPlaintext(e.to_string())),
    }
}

/// Seal a record the way a field node does. Used by tooling and tests.
pub fn seal(
    record: &Value,
    secret: &SharedSecret,
    iv: [u8; NONCE_LEN],
) -> Result<EncryptedEnvelope, DecryptError> {
    let cipher = cipher_for(secret)?;
    let mut buffer = serde_json::to_vec(record)
        .map_err(|e| DecryptError::MalformedPlaintext(e.to_string()))?;
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| DecryptError::AuthenticationFailed)?;

    Ok(EncryptedEnvelope {
        version: SUPPORTED_ENVELOPE_VERSION,
        iv: iv.to_vec(),
        tag: tag.to_vec(),
        ciphertext: buffer,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
