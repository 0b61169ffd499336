//! Envelope and record constants shared across the ingest pipeline.

/// The only envelope version field nodes are allowed to send.
pub const SUPPORTED_ENVELOPE_VERSION: i64 = 1;

/// AES-GCM nonce and tag sizes used by the field nodes.
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Fields every decrypted telemetry record must carry, in report order.
pub const REQUIRED_FIELDS: [&str; 12] = [
    "node",
    "ts_ms",
    "lat",
    "lon",
    "alt_m",
    "speed_mps",
    "course_deg",
    "hdop",
    "sats",
    "fix_age_ms",
    "temp_c",
    "hum_pct",
];

// Validation reasons reported back to the node
pub const REASON_MISSING: &str = "missing";
pub const REASON_NULL: &str = "null";
pub const REASON_EMPTY: &str = "empty";
pub const REASON_NEGATIVE: &str = "negative";
pub const REASON_OUT_OF_RANGE: &str = "out_of_range";
pub const REASON_INVALID_CAST: &str = "invalid_type_or_cast";

/// Error map key used when coercion aborts the second validation phase.
pub const CAST_ERROR_FIELD: &str = "type";

// Orion target names (keys in the ingest outcome)
pub const TARGET_GPS: &str = "gps";
pub const TARGET_TEMP: &str = "temp";
pub const TARGET_HUM: &str = "hum";

/// Movement commands accepted by the instruction endpoint.
pub const INSTRUCTIONS: [&str; 5] = ["forward", "backward", "left", "right", "stop"];
