pub mod http_client;
pub mod instruction_store;
