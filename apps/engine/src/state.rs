use std::sync::Arc;

use crate::config::Config;
use crate::reconstruction::ReconstructionEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Reconstruction engine built from `config.engine`; owns the page worker settings.
    pub engine: Arc<ReconstructionEngine>,
}

impl AppState {
    pub fn new(config: Config, engine: ReconstructionEngine) -> Self {
        Self {
            config,
            engine: Arc::new(engine),
        }
    }
}
