//! Capability traits at the engine's collaborator boundaries.
//!
//! The engine only depends on these contracts: something that produces a
//! `DocumentStructure`, something that turns a finalized page into bytes, and something
//! that maps region ids to translated text. Format-specific readers and writers and real
//! translation backends live outside this crate.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::CollaboratorError;
use crate::models::{DocumentFormat, DocumentStructure, PageStructure, TextRegion, TranslationMap};

// ────────────────────────────────────────────────────────────────────────────
// Trait definitions
// ────────────────────────────────────────────────────────────────────────────

/// Produces an extracted `DocumentStructure` from raw document bytes.
pub trait DocumentParser: Send + Sync {
    fn format(&self) -> DocumentFormat;

    fn parse(&self, bytes: &[u8]) -> Result<DocumentStructure, CollaboratorError>;
}

/// Serializes one finalized page.
pub trait FormatWriter: Send + Sync {
    fn format(&self) -> DocumentFormat;

    fn write_page(&self, page: &PageStructure) -> Result<Bytes, CollaboratorError>;
}

/// Maps region ids to translated text. Regions left out of the result pass through
/// untranslated.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(
        &self,
        regions: &[TextRegion],
        target_language: &str,
    ) -> Result<TranslationMap, CollaboratorError>;
}

// ────────────────────────────────────────────────────────────────────────────
// StaticTranslations: translations supplied up front by the caller
// ────────────────────────────────────────────────────────────────────────────

/// Provider backed by a fixed map, used when the caller already holds the translations.
#[derive(Debug, Clone, Default)]
pub struct StaticTranslations {
    translations: TranslationMap,
}

impl StaticTranslations {
    pub fn new(translations: TranslationMap) -> Self {
        Self { translations }
    }
}

#[async_trait]
impl TranslationProvider for StaticTranslations {
    async fn translate(
        &self,
        regions: &[TextRegion],
        _target_language: &str,
    ) -> Result<TranslationMap, CollaboratorError> {
        Ok(regions
            .iter()
            .filter_map(|r| {
                self.translations
                    .get(&r.id)
                    .map(|t| (r.id.clone(), t.clone()))
            })
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON page interchange
// ────────────────────────────────────────────────────────────────────────────

/// Reads a `DocumentStructure` that an upstream extractor already serialized as JSON.
#[derive(Debug, Clone, Copy)]
pub struct JsonDocumentParser {
    format: DocumentFormat,
}

impl JsonDocumentParser {
    pub fn new(format: DocumentFormat) -> Self {
        Self { format }
    }
}

impl DocumentParser for JsonDocumentParser {
    fn format(&self) -> DocumentFormat {
        self.format
    }

    fn parse(&self, bytes: &[u8]) -> Result<DocumentStructure, CollaboratorError> {
        let document: DocumentStructure = serde_json::from_slice(bytes)?;
        if document.format != self.format {
            return Err(CollaboratorError::Parse(format!(
                "expected a {:?} document, got {:?}",
                self.format, document.format
            )));
        }
        if document.pages.is_empty() {
            return Err(CollaboratorError::Parse("document has no pages".to_string()));
        }
        Ok(document)
    }
}

/// Writes each page as a JSON object, for writers that run out of process.
#[derive(Debug, Clone, Copy)]
pub struct JsonPageWriter {
    format: DocumentFormat,
}

impl JsonPageWriter {
    pub fn new(format: DocumentFormat) -> Self {
        Self { format }
    }
}

impl FormatWriter for JsonPageWriter {
    fn format(&self) -> DocumentFormat {
        self.format
    }

    fn write_page(&self, page: &PageStructure) -> Result<Bytes, CollaboratorError> {
        Ok(Bytes::from(serde_json::to_vec(page)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::geometry::BoundingBox;
    use crate::models::{PageDimensions, TextFormatting, TranslatedText};

    fn make_region(id: &str) -> TextRegion {
        TextRegion::new(
            id,
            BoundingBox::new(0.0, 0.0, 100.0, 20.0).unwrap(),
            "Hello",
            TextFormatting::new("Helvetica", 10.0),
        )
    }

    #[tokio::test]
    async fn test_static_translations_only_returns_requested_regions() {
        let mut map = TranslationMap::new();
        map.insert("a".into(), TranslatedText::new("Hallo", 0.9));
        map.insert("z".into(), TranslatedText::new("Welt", 0.8));
        let provider = StaticTranslations::new(map);

        let out = provider
            .translate(&[make_region("a"), make_region("b")], "de")
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["a"].text, "Hallo");
    }

    #[test]
    fn test_json_parser_checks_format_and_pages() {
        let parser = JsonDocumentParser::new(DocumentFormat::Pdf);
        assert_eq!(parser.format(), DocumentFormat::Pdf);

        let err = parser.parse(br#"{"format": "pdf", "pages": []}"#).unwrap_err();
        assert!(matches!(err, CollaboratorError::Parse(_)));

        let err = parser
            .parse(br#"{"format": "epub", "pages": [{"page_number": 1, "dimensions": {"width": 1, "height": 1}}]}"#)
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Parse(_)));

        let err = parser.parse(b"not json").unwrap_err();
        assert!(matches!(err, CollaboratorError::Serialization(_)));

        let doc = parser
            .parse(br#"{"format": "pdf", "pages": [{"page_number": 1, "dimensions": {"width": 612, "height": 792}}]}"#)
            .unwrap();
        assert_eq!(doc.pages.len(), 1);
    }

    #[test]
    fn test_json_writer_round_trips_page() {
        let page = PageStructure {
            page_number: 4,
            dimensions: PageDimensions {
                width: 612.0,
                height: 792.0,
            },
            text_regions: vec![make_region("a")],
            visual_elements: vec![],
        };
        let writer = JsonPageWriter::new(DocumentFormat::Docx);
        assert_eq!(writer.format(), DocumentFormat::Docx);
        let bytes = writer.write_page(&page).unwrap();
        let back: PageStructure = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, page);
    }
}
