// Outreach message generation.
// All model calls go through llm_client; nothing here talks to the upstream API directly.

pub mod fallback;
pub mod handlers;
pub mod prompts;
pub mod service;
