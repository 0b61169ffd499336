use crate::config::{AgentConfig, SharedSecret};
use crate::envelope::EncryptedEnvelope;
use crate::error::{DecryptError, IngestError};
use crate::metrics::IngestMetrics;
use crate::pipeline::decrypt::decrypt;
use crate::pipeline::forward::{ForwardResult, Forwarder};
use crate::pipeline::payload::{build, Target, TargetPayloads};
use crate::pipeline::validate::{validate, Measurement};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Orion attrs URL for each attribute group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEndpoints {
    pub gps: String,
    pub temp: String,
    pub hum: String,
}

impl TargetEndpoints {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            gps: config.attrs_url(&config.gps_entity_id),
            temp: config.attrs_url(&config.temp_entity_id),
            hum: config.attrs_url(&config.hum_entity_id),
        }
    }

    pub fn url(&self, target: Target) -> &str {
        match target {
            Target::Position => &self.gps,
            Target::Temperature => &self.temp,
            Target::Humidity => &self.hum,
        }
    }
}

/// How much of a forwarded measurement reached Orion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    Full,
    Partial,
    Failed,
}

impl OutcomeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeClass::Full => "ok",
            OutcomeClass::Partial => "partial",
            OutcomeClass::Failed => "error",
        }
    }
}

/// Aggregated result of one forwarded measurement. Request-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub node: String,
    pub ts_ms: u64,
    pub per_target: BTreeMap<&'static str, ForwardResult>,
    pub success_count: usize,
    pub all_ok: bool,
    pub any_ok: bool,
}

impl IngestOutcome {
    fn aggregate(measurement: &Measurement, results: Vec<(Target, ForwardResult)>) -> Self {
        let per_target: BTreeMap<&'static str, ForwardResult> = results
            .into_iter()
            .map(|(target, result)| (target.name(), result))
            .collect();
        let success_count = per_target.values().filter(|r| r.ok).count();

        Self {
            node: measurement.node.clone(),
            ts_ms: measurement.ts_ms,
            all_ok: success_count == Target::ALL.len(),
            any_ok: success_count > 0,
            success_count,
            per_target,
        }
    }

    pub fn class(&self) -> OutcomeClass {
        if self.all_ok {
            OutcomeClass::Full
        } else if self.any_ok {
            OutcomeClass::Partial
        } else {
            OutcomeClass::Failed
        }
    }
}

/// Decrypt, validate, split and forward one field-node report.
pub struct IngestUseCase {
    secret: Option<SharedSecret>,
    endpoints: TargetEndpoints,
    forwarder: Forwarder,
}

impl IngestUseCase {
    pub fn new(
        secret: Option<SharedSecret>,
        endpoints: TargetEndpoints,
        forwarder: Forwarder,
    ) -> Self {
        Self {
            secret,
            endpoints,
            forwarder,
        }
    }

    pub async fn process(&self, body: &Value) -> Result<IngestOutcome, IngestError> {
        let span = info_span!("ingest", request_id = %Uuid::new_v4());
        self.process_inner(body).instrument(span).await
    }

    async fn process_inner(&self, body: &Value) -> Result<IngestOutcome, IngestError> {
        IngestMetrics::record_request();
        let started = Instant::now();
        debug!("Processing ingest request");

        let record = EncryptedEnvelope::from_json(body)
            .and_then(|envelope| decrypt(&envelope, self.secret.as_ref()))
            .map_err(reject_decrypt)?;

        let measurement = validate(&record).map_err(|errors| {
            let fields: Vec<&String> = errors.keys().collect();
            warn!(?fields, "record failed validation");
            IngestMetrics::record_validation_rejected(errors.len());
            IngestError::Validation(errors)
        })?;

        let payloads = build(&measurement);
        let (gps, temp, hum) = tokio::join!(
            self.forward(Target::Position, &payloads),
            self.forward(Target::Temperature, &payloads),
            self.forward(Target::Humidity, &payloads),
        );

        let outcome = IngestOutcome::aggregate(&measurement, vec![gps, temp, hum]);
        let class = outcome.class();
        IngestMetrics::record_outcome(class.as_str(), started.elapsed().as_secs_f64());
        info!(
            node = %outcome.node,
            ts_ms = outcome.ts_ms,
            success_count = outcome.success_count,
            outcome = class.as_str(),
            "ingest forwarded"
        );
        Ok(outcome)
    }

    async fn forward(&self, target: Target, payloads: &TargetPayloads) -> (Target, ForwardResult) {
        let body = payloads.get(target).as_json();
        let result = self.forwarder.send(self.endpoints.url(target), &body).await;

        IngestMetrics::record_forward(target, result.ok, result.attempts);
        if result.ok {
            info!(group = target.name(), status = result.status, "Orion PATCH ok");
        } else {
            warn!(
                group = target.name(),
                status = result.status,
                attempts = result.attempts,
                "Orion PATCH failed"
            );
        }
        (target, result)
    }
}

fn reject_decrypt(err: DecryptError) -> IngestError {
    match &err {
        DecryptError::ServerMisconfigured => {
            error!("AGENT_TOKEN is not configured; rejecting envelope");
        }
        other => warn!(reason = other.kind(), error = %other, "envelope rejected"),
    }
    IngestMetrics::record_decrypt_rejected(err.kind());
    IngestError::Decrypt(err)
}
