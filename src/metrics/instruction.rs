//! Instruction Phase Metrics

use crate::app::instruction_use_case::Instruction;
use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct InstructionMetrics;

impl InstructionMetrics {
    pub fn record_update(instruction: Instruction) {
        ::metrics::counter!(
            phase_metric!(counter, "instruction", "updates"),
            "instruction" => instruction.as_str()
        )
        .increment(1);
    }
}

impl PhaseMetrics for InstructionMetrics {
    fn register_metrics() {
        metrics::describe_counter!(
            phase_metric!(counter, "instruction", "updates"),
            "Accepted movement instruction changes"
        );
    }

    fn phase_name() -> &'static str {
        "instruction"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![MetricDoc {
            name: phase_metric!(counter, "instruction", "updates"),
            metric_type: MetricType::Counter,
            help: "Accepted movement instruction changes",
            labels: vec!["instruction"],
        }]
    }
}
