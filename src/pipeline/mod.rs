// Ingest pipeline stages: decrypt -> validate -> build payloads -> forward

pub mod decrypt;
pub mod forward;
pub mod payload;
pub mod validate;

pub use decrypt::{decrypt, seal, PlaintextRecord};
pub use forward::{ForwardResult, Forwarder, RetryPolicy};
pub use payload::{build, Target, TargetPayload, TargetPayloads};
pub use validate::{validate, Measurement};
