use crate::constants::{TARGET_GPS, TARGET_HUM, TARGET_TEMP};
use crate::pipeline::validate::Measurement;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Orion attribute groups a measurement is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Position,
    Temperature,
    Humidity,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Position, Target::Temperature, Target::Humidity];

    /// Name used in outcome maps, logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            Target::Position => TARGET_GPS,
            Target::Temperature => TARGET_TEMP,
            Target::Humidity => TARGET_HUM,
        }
    }
}

/// Partial-update body: `{attr: {value: <typed>}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TargetPayload(Map<String, Value>);

impl TargetPayload {
    fn new(measurement: &Measurement) -> Self {
        // Every group carries the node and event time so each entity stands alone
        Self(Map::new())
            .attr("node", json!(measurement.node))
            .attr("ts_ms", json!(measurement.ts_ms))
    }

    fn attr(mut self, name: &str, value: Value) -> Self {
        self.0.insert(name.to_string(), json!({ "value": value }));
        self
    }

    pub fn as_json(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetPayloads {
    pub position: TargetPayload,
    pub temperature: TargetPayload,
    pub humidity: TargetPayload,
}

impl TargetPayloads {
    pub fn get(&self, target: Target) -> &TargetPayload {
        match target {
            Target::Position => &self.position,
            Target::Temperature => &self.temperature,
            Target::Humidity => &self.humidity,
        }
    }
}

/// Split a measurement into its three Orion updates.
pub fn build(m: &Measurement) -> TargetPayloads {
    let position = TargetPayload::new(m)
        .attr("lat", json!(m.lat))
        .attr("lon", json!(m.lon))
        .attr("alt_m", json!(m.alt_m))
        .attr("speed_mps", json!(m.speed_mps))
        .attr("course_deg", json!(m.course_deg))
        .attr("hdop", json!(m.hdop))
        .attr("sats", json!(m.sats))
        .attr("fix_age_ms", json!(m.fix_age_ms));

    let temperature = TargetPayload::new(m).attr("temp", json!(m.temp_c));
    let humidity = TargetPayload::new(m).attr("hum", json!(m.hum_pct));

    TargetPayloads {
        position,
        temperature,
        humidity,
    }
}
