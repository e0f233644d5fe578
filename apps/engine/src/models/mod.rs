pub mod document;
pub mod translation;

pub use document::{
    DocumentFormat, DocumentStructure, PageDimensions, PageStructure, RegionId, TextAlignment,
    TextFormatting, TextRegion, VisualElement, VisualElementType,
};
pub use translation::{TranslatedText, TranslationMap};
