use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::document::RegionId;

/// Translated text for one region, as returned by the translation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedText {
    pub text: String,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl TranslatedText {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Region id → translation. Regions absent from the map pass through untranslated.
pub type TranslationMap = HashMap<RegionId, TranslatedText>;
