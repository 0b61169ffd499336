use crate::constants::{
    CAST_ERROR_FIELD, REASON_EMPTY, REASON_INVALID_CAST, REASON_MISSING, REASON_NEGATIVE,
    REASON_NULL, REASON_OUT_OF_RANGE, REQUIRED_FIELDS,
};
use crate::error::FieldErrors;
use crate::pipeline::decrypt::PlaintextRecord;
use serde::Serialize;
use serde_json::Value;
use std::num::IntErrorKind;
use std::ops::RangeInclusive;

/// A telemetry reading that passed every presence, type and range check.
///
/// Only [`validate`] can build one; there is no partially valid measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub node: String,
    pub ts_ms: u64,
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
    pub speed_mps: f64,
    pub course_deg: f64,
    pub hdop: f64,
    pub sats: u8,
    pub fix_age_ms: u64,
    pub temp_c: f64,
    pub hum_pct: f64,
    #[serde(skip)]
    _validated: (),
}

const LAT: RangeInclusive<f64> = -90.0..=90.0;
const LON: RangeInclusive<f64> = -180.0..=180.0;
const ALT_M: RangeInclusive<f64> = -500.0..=10000.0;
const SPEED_MPS: RangeInclusive<f64> = 0.0..=100.0;
const SATS: RangeInclusive<i128> = 0..=64;
const TEMP_C: RangeInclusive<f64> = -50.0..=85.0;
const HUM_PCT: RangeInclusive<f64> = 0.0..=100.0;

/// Coercion failure; aborts the range-check phase.
#[derive(Debug)]
struct CastError(String);

/// Validate a decrypted record into a [`Measurement`].
///
/// Presence problems are reported alone. Otherwise every field is range
/// checked and all failures are returned together. If a value cannot be
/// coerced at all, checking stops and a single `type` entry is added next to
/// whatever was already found.
pub fn validate(record: &PlaintextRecord) -> Result<Measurement, FieldErrors> {
    let mut errors = FieldErrors::new();

    for name in REQUIRED_FIELDS {
        match record.get(name) {
            None => reject(&mut errors, name, REASON_MISSING),
            Some(Value::Null) => reject(&mut errors, name, REASON_NULL),
            Some(_) => {}
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    match coerce_and_check(record, &mut errors) {
        Ok(measurement) if errors.is_empty() => Ok(measurement),
        Ok(_) => Err(errors),
        Err(CastError(detail)) => {
            errors.insert(
                CAST_ERROR_FIELD.to_string(),
                format!("{REASON_INVALID_CAST}: {detail}"),
            );
            Err(errors)
        }
    }
}

fn coerce_and_check(
    record: &PlaintextRecord,
    errors: &mut FieldErrors,
) -> Result<Measurement, CastError> {
    let node = as_text("node", field(record, "node"))?;
    if node.is_empty() {
        reject(errors, "node", REASON_EMPTY);
    }

    let ts_ms = as_int("ts_ms", field(record, "ts_ms"))?;
    check_non_negative(errors, "ts_ms", ts_ms);

    let lat = as_float("lat", field(record, "lat"))?;
    check_range(errors, "lat", lat, &LAT);

    let lon = as_float("lon", field(record, "lon"))?;
    check_range(errors, "lon", lon, &LON);

    let alt_m = as_float("alt_m", field(record, "alt_m"))?;
    check_range(errors, "alt_m", alt_m, &ALT_M);

    let speed_mps = as_float("speed_mps", field(record, "speed_mps"))?;
    check_range(errors, "speed_mps", speed_mps, &SPEED_MPS);

    // Half-open: 360 wraps to 0 and must be sent as such
    let course_deg = as_float("course_deg", field(record, "course_deg"))?;
    if !(0.0..360.0).contains(&course_deg) {
        reject(errors, "course_deg", REASON_OUT_OF_RANGE);
    }

    // hdop of zero means no fix quality was computed
    let hdop = as_float("hdop", field(record, "hdop"))?;
    if !(hdop > 0.0 && hdop <= 50.0) {
        reject(errors, "hdop", REASON_OUT_OF_RANGE);
    }

    let sats = as_int("sats", field(record, "sats"))?;
    if !SATS.contains(&sats) {
        reject(errors, "sats", REASON_OUT_OF_RANGE);
    }

    let fix_age_ms = as_int("fix_age_ms", field(record, "fix_age_ms"))?;
    check_non_negative(errors, "fix_age_ms", fix_age_ms);

    let temp_c = as_float("temp_c", field(record, "temp_c"))?;
    check_range(errors, "temp_c", temp_c, &TEMP_C);

    let hum_pct = as_float("hum_pct", field(record, "hum_pct"))?;
    check_range(errors, "hum_pct", hum_pct, &HUM_PCT);

    // Values below are only kept when `errors` stays empty
    Ok(Measurement {
        node,
        ts_ms: u64::try_from(ts_ms).unwrap_or_default(),
        lat,
        lon,
        alt_m,
        speed_mps,
        course_deg,
        hdop,
        sats: u8::try_from(sats).unwrap_or_default(),
        fix_age_ms: u64::try_from(fix_age_ms).unwrap_or_default(),
        temp_c,
        hum_pct,
        _validated: (),
    })
}

fn field<'a>(record: &'a PlaintextRecord, name: &str) -> &'a Value {
    record.get(name).unwrap_or(&Value::Null)
}

fn reject(errors: &mut FieldErrors, name: &str, reason: &str) {
    errors.insert(name.to_string(), reason.to_string());
}

/// Millisecond counters must be non-negative and fit in a `u64`.
fn check_non_negative(errors: &mut FieldErrors, name: &str, value: i128) {
    if value < 0 {
        reject(errors, name, REASON_NEGATIVE);
    } else if value > i128::from(u64::MAX) {
        reject(errors, name, REASON_OUT_OF_RANGE);
    }
}

fn check_range(errors: &mut FieldErrors, name: &str, value: f64, range: &RangeInclusive<f64>) {
    // NaN is never contained, so it lands here too
    if !range.contains(&value) {
        reject(errors, name, REASON_OUT_OF_RANGE);
    }
}

fn as_text(name: &str, value: &Value) -> Result<String, CastError> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(CastError(format!("{name}: cannot convert {other} to text"))),
    }
}

/// Integers are widened to `i128` and saturate instead of overflowing, so an
/// oversized but integral value reaches the range checks.
fn as_int(name: &str, value: &Value) -> Result<i128, CastError> {
    let cast_err = || CastError(format!("{name}: cannot convert {value} to integer"));
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i128::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(i128::from(u))
            } else {
                // Floats truncate toward zero, as the nodes' firmware expects
                let f = n.as_f64().ok_or_else(cast_err)?;
                if f.is_finite() {
                    Ok(f.trunc() as i128)
                } else {
                    Err(cast_err())
                }
            }
        }
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::String(s) => s.trim().parse::<i128>().or_else(|e| match e.kind() {
            IntErrorKind::PosOverflow => Ok(i128::MAX),
            IntErrorKind::NegOverflow => Ok(i128::MIN),
            _ => Err(cast_err()),
        }),
        _ => Err(cast_err()),
    }
}

fn as_float(name: &str, value: &Value) -> Result<f64, CastError> {
    let cast_err = || CastError(format!("{name}: cannot convert {value} to float"));
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(cast_err),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| cast_err()),
        _ => Err(cast_err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(overrides: Value) -> PlaintextRecord {
        let mut base = json!({
            "node": "oruga-01", "ts_ms": 1_700_000_000_000u64,
            "lat": 4.625, "lon": -74.0625, "alt_m": 2640.0,
            "speed_mps": 1.25, "course_deg": 90.0, "hdop": 0.875,
            "sats": 9, "fix_age_ms": 120, "temp_c": 18.5, "hum_pct": 62.0
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut base, overrides) {
            base.extend(extra);
        }
        match base {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn errors_of(record: &PlaintextRecord) -> FieldErrors {
        validate(record).unwrap_err()
    }

    #[test]
    fn accepts_in_range_record() {
        let m = validate(&record(json!({}))).unwrap();
        assert_eq!(m.node, "oruga-01");
        assert_eq!(m.ts_ms, 1_700_000_000_000);
        assert_eq!(m.sats, 9);
        assert_eq!(m.hum_pct, 62.0);
    }

    #[test]
    fn missing_fields_are_reported_without_range_checks() {
        let mut rec = record(json!({"hum_pct": 500.0, "lat": 1000.0}));
        rec.remove("lat");
        rec.remove("temp_c");

        let errors = errors_of(&rec);
        let expected: FieldErrors = [("lat", "missing"), ("temp_c", "missing")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(errors, expected);
    }

    #[test]
    fn every_field_missing_yields_every_key() {
        let errors = errors_of(&PlaintextRecord::new());
        assert_eq!(errors.len(), REQUIRED_FIELDS.len());
        assert!(errors.values().all(|reason| reason == "missing"));
    }

    #[test]
    fn null_is_distinct_from_missing() {
        let mut rec = record(json!({"sats": null}));
        rec.remove("node");
        let errors = errors_of(&rec);
        assert_eq!(errors.get("sats").map(String::as_str), Some("null"));
        assert_eq!(errors.get("node").map(String::as_str), Some("missing"));
    }

    #[test]
    fn latitude_bounds_are_inclusive() {
        assert!(validate(&record(json!({"lat": 90.0}))).is_ok());
        assert!(validate(&record(json!({"lat": -90.0}))).is_ok());
        let errors = errors_of(&record(json!({"lat": 90.0001})));
        assert_eq!(errors.get("lat").map(String::as_str), Some("out_of_range"));
    }

    #[test]
    fn course_is_half_open() {
        assert!(validate(&record(json!({"course_deg": 0.0}))).is_ok());
        assert!(validate(&record(json!({"course_deg": 359.999}))).is_ok());
        let errors = errors_of(&record(json!({"course_deg": 360.0})));
        assert_eq!(errors.get("course_deg").map(String::as_str), Some("out_of_range"));
    }

    #[test]
    fn hdop_excludes_zero() {
        assert!(validate(&record(json!({"hdop": 50.0}))).is_ok());
        let errors = errors_of(&record(json!({"hdop": 0.0})));
        assert_eq!(errors.get("hdop").map(String::as_str), Some("out_of_range"));
    }

    #[test]
    fn collects_all_range_errors_in_one_pass() {
        let errors = errors_of(&record(json!({
            "node": "   ", "ts_ms": -5, "lon": -181.0,
            "sats": 65, "fix_age_ms": -1, "hum_pct": 100.5
        })));
        assert_eq!(errors.len(), 6);
        assert_eq!(errors["node"], "empty");
        assert_eq!(errors["ts_ms"], "negative");
        assert_eq!(errors["lon"], "out_of_range");
        assert_eq!(errors["sats"], "out_of_range");
        assert_eq!(errors["fix_age_ms"], "negative");
        assert_eq!(errors["hum_pct"], "out_of_range");
    }

    #[test]
    fn cast_failure_degrades_to_single_type_entry() {
        let errors = errors_of(&record(json!({
            "lat": 95.0, "lon": "east", "temp_c": 99.0
        })));
        // lat was checked before the cast failure, temp_c never was
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["lat"], "out_of_range");
        assert!(errors["type"].starts_with("invalid_type_or_cast: lon"));
        assert!(!errors.contains_key("temp_c"));
    }

    #[test]
    fn structured_node_is_a_cast_failure() {
        let errors = errors_of(&record(json!({"node": {"id": 1}})));
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("type"));
    }

    #[test]
    fn numeric_strings_and_floats_are_coerced() {
        let m = validate(&record(json!({
            "ts_ms": "1700", "lat": " 4.5 ", "sats": 7.9, "fix_age_ms": true, "node": 42
        })))
        .unwrap();
        assert_eq!(m.ts_ms, 1700);
        assert_eq!(m.lat, 4.5);
        assert_eq!(m.sats, 7);
        assert_eq!(m.fix_age_ms, 1);
        assert_eq!(m.node, "42");
    }

    #[test]
    fn decimal_string_is_not_an_integer() {
        let errors = errors_of(&record(json!({"sats": "7.5"})));
        assert!(errors["type"].contains("sats"));
    }

    #[test]
    fn oversized_integers_are_range_checked_not_cast_errors() {
        let errors = errors_of(&record(json!({
            "sats": 1e300,
            "fix_age_ms": "100000000000000000000000000000000000000000",
            "ts_ms": -1e30
        })));
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["sats"], "out_of_range");
        assert_eq!(errors["fix_age_ms"], "out_of_range");
        assert_eq!(errors["ts_ms"], "negative");
    }

    #[test]
    fn timestamp_above_i64_is_accepted() {
        let m = validate(&record(json!({"ts_ms": 9_223_372_036_854_775_808u64}))).unwrap();
        assert_eq!(m.ts_ms, 9_223_372_036_854_775_808);
    }

    #[test]
    fn nan_string_is_out_of_range() {
        let errors = errors_of(&record(json!({"temp_c": "NaN"})));
        assert_eq!(errors["temp_c"], "out_of_range");
    }
}
