pub mod ports;
pub mod ingest_use_case;
pub mod instruction_use_case;
