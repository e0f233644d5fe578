//! Extracted document structure exchanged with the parser and writer collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::GeometryError;
use crate::layout::geometry::BoundingBox;

/// Region and element identity. Unique within a page.
pub type RegionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Epub,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub format: DocumentFormat,
    pub pages: Vec<PageStructure>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl DocumentStructure {
    pub fn text_regions(&self) -> impl Iterator<Item = &TextRegion> {
        self.pages.iter().flat_map(|p| p.text_regions.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStructure {
    pub page_number: u32,
    pub dimensions: PageDimensions,
    #[serde(default)]
    pub text_regions: Vec<TextRegion>,
    #[serde(default)]
    pub visual_elements: Vec<VisualElement>,
}

impl PageStructure {
    /// The page rectangle anchored at the origin.
    pub fn bounds(&self) -> Result<BoundingBox, GeometryError> {
        BoundingBox::new(0.0, 0.0, self.dimensions.width, self.dimensions.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

fn default_line_spacing() -> f32 {
    1.2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFormatting {
    pub font_family: String,
    /// Font size in page units.
    pub font_size: f32,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub is_italic: bool,
    /// Line height as a multiple of the font size.
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f32,
    #[serde(default)]
    pub alignment: TextAlignment,
}

impl TextFormatting {
    pub fn new(font_family: impl Into<String>, font_size: f32) -> Self {
        Self {
            font_family: font_family.into(),
            font_size,
            is_bold: false,
            is_italic: false,
            line_spacing: default_line_spacing(),
            alignment: TextAlignment::Left,
        }
    }

    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }
}

fn default_language() -> String {
    "und".to_string()
}

fn default_confidence() -> f32 {
    1.0
}

fn unit_scale() -> f32 {
    1.0
}

/// A block of text on a page.
///
/// Produced by the parser with `translated_text = None` and `font_scale = 1.0`; the
/// reconstruction engine returns copies carrying the translation, the final scale and the
/// final box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub id: RegionId,
    pub bounding_box: BoundingBox,
    pub text_content: String,
    pub formatting: TextFormatting,
    #[serde(default = "default_language")]
    pub language: String,
    /// Extraction confidence reported by the parser.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub translated_text: Option<String>,
    #[serde(default = "unit_scale")]
    pub font_scale: f32,
}

impl TextRegion {
    pub fn new(
        id: impl Into<RegionId>,
        bounding_box: BoundingBox,
        text_content: impl Into<String>,
        formatting: TextFormatting,
    ) -> Self {
        Self {
            id: id.into(),
            bounding_box,
            text_content: text_content.into(),
            formatting,
            language: default_language(),
            confidence: default_confidence(),
            translated_text: None,
            font_scale: unit_scale(),
        }
    }

    /// The text a writer should render: the translation when present.
    pub fn display_text(&self) -> &str {
        self.translated_text.as_deref().unwrap_or(&self.text_content)
    }

    pub fn effective_font_size(&self) -> f32 {
        self.formatting.font_size * self.font_scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualElementType {
    Image,
    Chart,
    Table,
    Other,
}

/// A non-text element. Never resized or moved by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualElement {
    pub id: RegionId,
    pub element_type: VisualElementType,
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub content: Vec<u8>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl VisualElement {
    pub fn new(
        id: impl Into<RegionId>,
        element_type: VisualElementType,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            id: id.into(),
            element_type,
            bounding_box,
            content: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_defaults_from_minimal_json() {
        let json = r#"{
            "id": "r1",
            "bounding_box": {"x": 0, "y": 0, "width": 100, "height": 20},
            "text_content": "Hello",
            "formatting": {"font_family": "Helvetica", "font_size": 10}
        }"#;
        let region: TextRegion = serde_json::from_str(json).unwrap();
        assert_eq!(region.language, "und");
        assert_eq!(region.font_scale, 1.0);
        assert!((region.formatting.line_spacing - 1.2).abs() < 1e-6);
        assert_eq!(region.translated_text, None);
        assert_eq!(region.display_text(), "Hello");
    }

    #[test]
    fn test_invalid_box_rejected_at_decode() {
        let json = r#"{
            "id": "img",
            "element_type": "image",
            "bounding_box": {"x": 0, "y": 0, "width": -1, "height": 20}
        }"#;
        assert!(serde_json::from_str::<VisualElement>(json).is_err());
    }

    #[test]
    fn test_effective_font_size_applies_scale() {
        let mut region = TextRegion::new(
            "r1",
            BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap(),
            "x",
            TextFormatting::new("Times", 12.0),
        );
        region.font_scale = 0.75;
        assert!((region.effective_font_size() - 9.0).abs() < 1e-5);
    }

    #[test]
    fn test_document_format_lowercase() {
        let json = serde_json::to_string(&DocumentFormat::Epub).unwrap();
        assert_eq!(json, "\"epub\"");
    }
}
