pub mod compression;
pub mod discovery;
pub mod ndjson;
