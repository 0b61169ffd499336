use crate::app::ports::InstructionStorePort;
use crate::error::InstructionError;
use crate::metrics::InstructionMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Movement command relayed to the rover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instruction {
    Forward,
    Backward,
    Left,
    Right,
    #[default]
    Stop,
}

impl Instruction {
    pub fn as_str(self) -> &'static str {
        match self {
            Instruction::Forward => "forward",
            Instruction::Backward => "backward",
            Instruction::Left => "left",
            Instruction::Right => "right",
            Instruction::Stop => "stop",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Instruction {
    type Err = InstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Instruction::Forward),
            "backward" => Ok(Instruction::Backward),
            "left" => Ok(Instruction::Left),
            "right" => Ok(Instruction::Right),
            "stop" => Ok(Instruction::Stop),
            other => Err(InstructionError::InvalidInstruction(other.to_string())),
        }
    }
}

/// Holds the single current movement instruction.
pub struct InstructionUseCase {
    store: Arc<dyn InstructionStorePort>,
}

impl InstructionUseCase {
    pub fn new(store: Arc<dyn InstructionStorePort>) -> Self {
        Self { store }
    }

    pub async fn current(&self) -> Instruction {
        self.store.get().await
    }

    /// Replace the current instruction; unknown commands leave it untouched.
    pub async fn set_from_str(&self, raw: &str) -> Result<Instruction, InstructionError> {
        let instruction: Instruction = raw.parse()?;
        self.store.set(instruction).await;
        InstructionMetrics::record_update(instruction);
        info!(%instruction, "instruction updated");
        Ok(instruction)
    }
}
