//! Per-page state machine: `Pending → Analyzed → Fitted → Resolved → Finalized`, or
//! `Failed` from any stage.
//!
//! Every transition is a synchronous call on data the page owns outright, so a page can be
//! abandoned at any point without leaving partial geometry visible elsewhere. The engine
//! drives one pipeline per page inside `spawn_blocking`.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::errors::ReconstructionError;
use crate::layout::analyzer::{analyze, page_entries, LayoutAnalysis};
use crate::layout::config::FittingConfig;
use crate::layout::fitting::{fit_translation, AdjustedRegion};
use crate::layout::resolver::{ConflictStatus, Resolver, ResolverOutcome, PAGE_EDGE};
use crate::layout::spatial_map::{EntryKind, SpatialMap};
use crate::models::{PageStructure, TranslationMap};

/// Scale and area comparisons tolerate this much float drift.
const INVARIANT_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Validation,
    Analysis,
    Resolution,
    Assembly,
    /// Worker-pool failures: timeouts, panics.
    Scheduling,
}

/// A page that made it through every stage.
#[derive(Debug, Clone)]
pub struct FinalizedPage {
    /// The page as handed to the format writer.
    pub page: PageStructure,
    pub analysis: LayoutAnalysis,
    pub outcome: ResolverOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageFailure {
    pub page_number: u32,
    pub stage: PipelineStage,
    pub error: ReconstructionError,
}

impl PageFailure {
    pub fn new(page_number: u32, stage: PipelineStage, error: ReconstructionError) -> Self {
        Self {
            page_number,
            stage,
            error,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PageState {
    Pending {
        page: PageStructure,
    },
    Analyzed {
        page: PageStructure,
        analysis: LayoutAnalysis,
    },
    Fitted {
        page: PageStructure,
        analysis: LayoutAnalysis,
        adjusted: Vec<AdjustedRegion>,
    },
    Resolved {
        page: PageStructure,
        analysis: LayoutAnalysis,
        outcome: ResolverOutcome,
    },
    Finalized(FinalizedPage),
    Failed(PageFailure),
}

/// Inputs shared by every transition of one page.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub translations: &'a TranslationMap,
    pub config: &'a FittingConfig,
    /// Wall-clock ceiling, checked by the resolver before every pass.
    pub deadline: Option<Instant>,
}

impl PageState {
    pub fn new(page: PageStructure) -> Self {
        PageState::Pending { page }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Finalized(_) | PageState::Failed(_))
    }

    /// Performs one transition. Terminal states return themselves.
    pub fn step(self, ctx: &PageContext<'_>) -> PageState {
        match self {
            PageState::Pending { page } => {
                let page_number = page.page_number;
                if let Err(error) = check_unique_ids(&page) {
                    return fail(page_number, PipelineStage::Validation, error);
                }
                match analyze(&page, ctx.config) {
                    Ok(analysis) => {
                        debug!(
                            page = page_number,
                            complexity = analysis.layout_complexity,
                            "page analyzed"
                        );
                        PageState::Analyzed { page, analysis }
                    }
                    Err(e) => fail(page_number, PipelineStage::Analysis, e.into()),
                }
            }

            PageState::Analyzed { page, analysis } => {
                // Each region is solved independently of every other.
                let adjusted = page
                    .text_regions
                    .iter()
                    .map(|region| match ctx.translations.get(&region.id) {
                        Some(translation) => fit_translation(region, translation, ctx.config),
                        None => AdjustedRegion::untranslated(region),
                    })
                    .collect();
                PageState::Fitted {
                    page,
                    analysis,
                    adjusted,
                }
            }

            PageState::Fitted {
                page,
                analysis,
                adjusted,
            } => {
                let mut resolver = Resolver::new(ctx.config);
                if let Some(deadline) = ctx.deadline {
                    resolver = resolver.with_deadline(deadline);
                }
                match resolver.resolve(&analysis, adjusted, &page.visual_elements) {
                    Ok(outcome) => PageState::Resolved {
                        page,
                        analysis,
                        outcome,
                    },
                    Err(e) => fail(page.page_number, PipelineStage::Resolution, e.into()),
                }
            }

            PageState::Resolved {
                page,
                analysis,
                outcome,
            } => {
                let assembled = PageStructure {
                    page_number: page.page_number,
                    dimensions: page.dimensions,
                    text_regions: outcome.regions.iter().map(|r| r.to_text_region()).collect(),
                    visual_elements: page.visual_elements,
                };
                match check_invariants(&assembled, &analysis, &outcome, ctx.config) {
                    Ok(()) => PageState::Finalized(FinalizedPage {
                        page: assembled,
                        analysis,
                        outcome,
                    }),
                    Err(e) => fail(page.page_number, PipelineStage::Assembly, e),
                }
            }

            terminal => terminal,
        }
    }
}

fn fail(page_number: u32, stage: PipelineStage, error: ReconstructionError) -> PageState {
    PageState::Failed(PageFailure::new(page_number, stage, error))
}

/// Drives a page to a terminal state.
pub fn run_page(
    page: PageStructure,
    translations: &TranslationMap,
    config: &FittingConfig,
    deadline: Option<Instant>,
) -> Result<FinalizedPage, PageFailure> {
    let ctx = PageContext {
        translations,
        config,
        deadline,
    };
    let mut state = PageState::new(page);
    loop {
        state = match state.step(&ctx) {
            PageState::Finalized(finalized) => return Ok(finalized),
            PageState::Failed(failure) => return Err(failure),
            next => next,
        };
    }
}

fn check_unique_ids(page: &PageStructure) -> Result<(), ReconstructionError> {
    let mut seen = HashSet::new();
    let ids = page
        .text_regions
        .iter()
        .map(|r| &r.id)
        .chain(page.visual_elements.iter().map(|e| &e.id));
    for id in ids {
        if !seen.insert(id) {
            return Err(ReconstructionError::DuplicateId { id: id.clone() });
        }
    }
    Ok(())
}

/// Post-assembly checks: ids unique, scales in bounds, non-overflow regions within the
/// area budget, every region on the page unless reported unresolved, and every overlap
/// either pre-existing or reported unresolved.
fn check_invariants(
    page: &PageStructure,
    analysis: &LayoutAnalysis,
    outcome: &ResolverOutcome,
    config: &FittingConfig,
) -> Result<(), ReconstructionError> {
    check_unique_ids(page)?;

    let unresolved: HashSet<(&str, &str)> = outcome
        .conflicts
        .iter()
        .filter(|c| c.resolution == ConflictStatus::Unresolved)
        .map(|c| (c.first.as_str(), c.second.as_str()))
        .collect();

    for region in &outcome.regions {
        if region.font_scale < config.min_font_scale - INVARIANT_EPSILON
            || region.font_scale > 1.0 + INVARIANT_EPSILON
        {
            return Err(ReconstructionError::InvariantViolated {
                id: region.id().to_string(),
                detail: format!("font scale {} out of bounds", region.font_scale),
            });
        }
        let final_box = region.final_box();
        let budget = config.area_budget(region.original_box().area()) * (1.0 + INVARIANT_EPSILON);
        if !region.overflow && final_box.area() > budget {
            return Err(ReconstructionError::InvariantViolated {
                id: region.id().to_string(),
                detail: format!("area ratio {:.4} exceeds budget", region.area_ratio()),
            });
        }
        if !analysis
            .page_bounds
            .contains_within(&final_box, config.bounds_tolerance)
            && !unresolved.contains(&(region.id(), PAGE_EDGE))
        {
            return Err(ReconstructionError::InvariantViolated {
                id: region.id().to_string(),
                detail: "unreported extent past the page edge".to_string(),
            });
        }
    }

    let map = SpatialMap::build(page_entries(page));
    for overlap in map.overlapping_pairs(config.overlap_epsilon) {
        let (Some(a), Some(b)) = (map.get(&overlap.first), map.get(&overlap.second)) else {
            continue;
        };
        if a.kind == EntryKind::Visual && b.kind == EntryKind::Visual {
            continue;
        }
        let preexisting = analysis.preexisting_magnitude(&overlap.first, &overlap.second);
        let listed = unresolved.contains(&(overlap.first.as_str(), overlap.second.as_str()));
        if !listed && overlap.magnitude > preexisting + INVARIANT_EPSILON * 10.0 {
            return Err(ReconstructionError::InvariantViolated {
                id: overlap.first.clone(),
                detail: format!("unreported overlap with '{}'", overlap.second),
            });
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AnalysisError;
    use crate::layout::fitting::FitStrategy;
    use crate::layout::resolver::ConflictKind;
    use crate::layout::geometry::BoundingBox;
    use crate::models::{
        PageDimensions, TextFormatting, TextRegion, TranslatedText, VisualElement,
        VisualElementType,
    };

    fn make_page(regions: Vec<TextRegion>, elements: Vec<VisualElement>) -> PageStructure {
        PageStructure {
            page_number: 3,
            dimensions: PageDimensions {
                width: 220.0,
                height: 200.0,
            },
            text_regions: regions,
            visual_elements: elements,
        }
    }

    fn make_region(id: &str, x: f32, y: f32) -> TextRegion {
        TextRegion::new(
            id,
            BoundingBox::new(x, y, 100.0, 20.0).unwrap(),
            "aaaaaaaaaa",
            TextFormatting::new("Courier", 10.0),
        )
    }

    fn make_translations(pairs: &[(&str, &str)]) -> TranslationMap {
        pairs
            .iter()
            .map(|(id, text)| (id.to_string(), TranslatedText::new(*text, 0.9)))
            .collect()
    }

    #[test]
    fn test_states_advance_in_order() {
        let page = make_page(vec![make_region("r", 0.0, 0.0)], vec![]);
        let translations = make_translations(&[("r", "aaaaaaaaaa bbbbbbbbbb")]);
        let config = FittingConfig::default();
        let ctx = PageContext {
            translations: &translations,
            config: &config,
            deadline: None,
        };

        let state = PageState::new(page);
        let state = state.step(&ctx);
        assert!(matches!(state, PageState::Analyzed { .. }));
        let state = state.step(&ctx);
        assert!(matches!(state, PageState::Fitted { .. }));
        let state = state.step(&ctx);
        assert!(matches!(state, PageState::Resolved { .. }));
        let state = state.step(&ctx);
        assert!(matches!(state, PageState::Finalized(_)));
        // Terminal states are fixed points.
        let state = state.step(&ctx);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_finalized_regions_carry_translation_and_scale() {
        let page = make_page(
            vec![make_region("r", 0.0, 0.0), make_region("untouched", 0.0, 100.0)],
            vec![],
        );
        let translations = make_translations(&[("r", "aaaaaaaaaa bbbbbbbbbb")]);
        let finalized = run_page(page, &translations, &FittingConfig::default(), None).unwrap();

        let r = &finalized.page.text_regions[0];
        assert_eq!(r.translated_text.as_deref(), Some("aaaaaaaaaa bbbbbbbbbb"));
        assert!(r.font_scale < 1.0);
        assert!(r.bounding_box.height() <= 22.0 + 1e-3);
        assert!((r.effective_font_size() - 10.0 * r.font_scale).abs() < 1e-5);

        let untouched = &finalized.page.text_regions[1];
        assert_eq!(untouched.translated_text, None);
        assert_eq!(untouched.font_scale, 1.0);
        assert_eq!(
            finalized.outcome.regions[1].strategy,
            FitStrategy::Untranslated
        );
    }

    #[test]
    fn test_duplicate_ids_fail_validation() {
        let page = make_page(
            vec![make_region("dup", 0.0, 0.0)],
            vec![VisualElement::new(
                "dup",
                VisualElementType::Chart,
                BoundingBox::new(0.0, 100.0, 50.0, 50.0).unwrap(),
            )],
        );
        let failure = run_page(page, &TranslationMap::new(), &FittingConfig::default(), None)
            .unwrap_err();
        assert_eq!(failure.page_number, 3);
        assert_eq!(failure.stage, PipelineStage::Validation);
        assert_eq!(failure.error, ReconstructionError::DuplicateId { id: "dup".into() });
    }

    #[test]
    fn test_degenerate_page_fails_analysis() {
        let mut region = make_region("flat", 0.0, 0.0);
        region.bounding_box = BoundingBox::new(0.0, 0.0, 100.0, 0.0).unwrap();
        let failure = run_page(
            make_page(vec![region], vec![]),
            &TranslationMap::new(),
            &FittingConfig::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(failure.stage, PipelineStage::Analysis);
        assert_eq!(
            failure.error,
            ReconstructionError::Analysis(AnalysisError::DegenerateRegion { id: "flat".into() })
        );
    }

    #[test]
    fn test_expired_deadline_fails_resolution() {
        let page = make_page(
            vec![make_region("r", 0.0, 40.0)],
            vec![VisualElement::new(
                "img",
                VisualElementType::Image,
                BoundingBox::new(0.0, 60.0, 210.0, 60.0).unwrap(),
            )],
        );
        let translations = make_translations(&[("r", "aaaaaaaaaa bbbbbbbbbb")]);
        let failure = run_page(
            page,
            &translations,
            &FittingConfig::default(),
            Some(Instant::now()),
        )
        .unwrap_err();
        assert_eq!(failure.stage, PipelineStage::Resolution);
        assert!(matches!(failure.error, ReconstructionError::Resolver(_)));
    }

    #[test]
    fn test_unresolved_overlap_passes_invariant_check() {
        // Unresolvable overlap is reported, so assembly still succeeds.
        let page = make_page(
            vec![make_region("r", 0.0, 0.0)],
            vec![VisualElement::new(
                "img",
                VisualElementType::Image,
                BoundingBox::new(0.0, 5.0, 100.0, 16.0).unwrap(),
            )],
        );
        let translations = make_translations(&[("r", "aaaaaaaaaa bbbbbbbbbb")]);
        let finalized = run_page(page, &translations, &FittingConfig::default(), None).unwrap();
        assert_eq!(finalized.outcome.unresolved().count(), 1);
    }

    #[test]
    fn test_growth_past_page_bottom_is_pulled_back() {
        // Reflow alone would end at y = 202 on a 200-high page.
        let region = TextRegion::new(
            "footer",
            BoundingBox::new(0.0, 178.0, 100.0, 22.0).unwrap(),
            "aaaaaaaaaa",
            TextFormatting::new("Courier", 10.0),
        );
        let page = make_page(vec![region], vec![]);
        let translations = make_translations(&[("footer", "aaaaaaaaaa bbbbbbbbbb")]);
        let config = FittingConfig::default();
        let finalized = run_page(page, &translations, &config, None).unwrap();

        let footer = &finalized.page.text_regions[0];
        assert!(footer.bounding_box.bottom() <= 200.0 + config.bounds_tolerance);
        assert!(footer.font_scale < 1.0);

        let conflicts = &finalized.outcome.conflicts;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::PageEdge);
        assert_eq!(conflicts[0].first, "footer");
        assert_eq!(conflicts[0].second, PAGE_EDGE);
        assert_eq!(conflicts[0].resolution, ConflictStatus::Resolved);
    }

    #[test]
    fn test_unreported_region_off_page_fails_invariant_check() {
        let region = make_region("r", 0.0, 170.0);
        let page = make_page(vec![region.clone()], vec![]);
        let config = FittingConfig::default();
        let analysis = analyze(&page, &config).unwrap();

        let mut moved = AdjustedRegion::untranslated(&region);
        let plan = moved.wrap_plan.clone();
        moved.apply_geometry(1.0, BoundingBox::new(0.0, 185.0, 100.0, 20.0).unwrap(), plan);
        let assembled = PageStructure {
            text_regions: vec![moved.to_text_region()],
            ..page
        };
        let outcome = ResolverOutcome {
            regions: vec![moved],
            conflicts: Vec::new(),
            resolutions: Vec::new(),
            spacing: Vec::new(),
            passes: 0,
        };

        let err = check_invariants(&assembled, &analysis, &outcome, &config).unwrap_err();
        assert!(matches!(err, ReconstructionError::InvariantViolated { ref id, .. } if id == "r"));
    }
}
