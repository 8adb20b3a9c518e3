use std::sync::Arc;

use crate::config::Config;
use crate::extraction::field_extractor::FieldExtractor;
use crate::generation::service::GenerationService;
use crate::settings::SettingsStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub generation: GenerationService,
    /// Shared by every extraction session; holds compiled selectors and patterns.
    pub extractor: Arc<FieldExtractor>,
    /// Page fetches for extraction requests that carry no markup.
    pub http: reqwest::Client,
    /// Pluggable settings store. Default: JsonFileSettings at SETTINGS_PATH.
    pub settings: Arc<dyn SettingsStore>,
}
