use crate::app::instruction_use_case::Instruction;
use crate::app::ports::InstructionStorePort;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-local instruction cell. Lost on restart.
#[derive(Default)]
pub struct InMemoryInstructionStore {
    current: RwLock<Instruction>,
}

impl InMemoryInstructionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstructionStorePort for InMemoryInstructionStore {
    async fn get(&self) -> Instruction {
        *self.current.read().await
    }

    async fn set(&self, instruction: Instruction) {
        *self.current.write().await = instruction;
    }
}
