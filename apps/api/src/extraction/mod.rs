// Extraction pipeline: page document → field/skill extraction → request/reply channel
// → bounded polling until the record is usable.

pub mod channel;
pub mod document;
pub mod field_extractor;
pub mod handlers;
pub mod loader;
pub mod orchestrator;
pub mod skill_miner;
