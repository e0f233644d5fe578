//! Layout report: the per-page record of conflicts, overflows and adjustments handed to
//! the quality collaborator, plus an aggregate layout-preservation score.
//!
//! # Preservation score (per page)
//! - 0.4 × box stability: `1 - mean |area_ratio - 1|` over the page's text regions
//! - 0.3 × conflict term: `1 - unresolved / conflicts`
//! - 0.3 × overflow term: `1 - overflow_regions / regions`
//!
//! Failed pages score 0. The document score is the mean over pages. Spacing notices are
//! reported but do not affect the score.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::layout::fitting::{BoxDelta, FitStrategy, Offset};
use crate::layout::resolver::{ConflictStatus, LayoutConflict, Resolution, SpacingNotice};
use crate::layout::spatial_map::Overlap;
use crate::models::RegionId;
use crate::reconstruction::pipeline::{FinalizedPage, PageFailure, PipelineStage};

const BOX_STABILITY_WEIGHT: f32 = 0.4;
const CONFLICT_WEIGHT: f32 = 0.3;
const OVERFLOW_WEIGHT: f32 = 0.3;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Finalized,
    /// Returned unmodified: original layout, untranslated.
    Failed,
}

/// What fitting and resolution did to one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionAdjustment {
    pub region_id: RegionId,
    pub strategy: FitStrategy,
    pub font_scale: f32,
    pub box_delta: BoxDelta,
    pub offset: Offset,
    pub overflow: bool,
    pub area_ratio: f32,
    pub length_ratio: f32,
    pub translation_confidence: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub page_number: u32,
    pub status: PageStatus,
    pub failed_stage: Option<PipelineStage>,
    pub error: Option<String>,
    pub conflicts: Vec<LayoutConflict>,
    pub overflow_regions: Vec<RegionId>,
    pub adjustments: Vec<RegionAdjustment>,
    pub resolutions: Vec<Resolution>,
    /// Neighbours pushed closer than the minimum gap. Not conflicts.
    pub spacing: Vec<SpacingNotice>,
    pub preexisting_overlaps: Vec<Overlap>,
    pub resolver_passes: u32,
    pub reading_order: Vec<RegionId>,
    pub layout_complexity: f32,
    pub preservation: f32,
}

/// Layout-preservation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutVerdict {
    /// preservation ≥ 0.9
    Preserved,
    /// 0.7 ≤ preservation < 0.9
    MinorDistortion,
    /// preservation < 0.7
    Degraded,
}

impl LayoutVerdict {
    pub fn from_preservation(preservation: f32) -> Self {
        if preservation >= 0.9 {
            LayoutVerdict::Preserved
        } else if preservation >= 0.7 {
            LayoutVerdict::MinorDistortion
        } else {
            LayoutVerdict::Degraded
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutScore {
    pub preservation: f32,
    pub resolved_conflicts: usize,
    pub unresolved_conflicts: usize,
    pub overflow_regions: usize,
    pub failed_pages: usize,
    pub verdict: LayoutVerdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutReport {
    pub job_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub pages: Vec<PageReport>,
    pub score: LayoutScore,
}

// ────────────────────────────────────────────────────────────────────────────
// Construction
// ────────────────────────────────────────────────────────────────────────────

impl PageReport {
    pub fn finalized(page: &FinalizedPage) -> Self {
        let outcome = &page.outcome;
        let adjustments: Vec<RegionAdjustment> = outcome
            .regions
            .iter()
            .map(|r| RegionAdjustment {
                region_id: r.id().to_string(),
                strategy: r.strategy,
                font_scale: r.font_scale,
                box_delta: r.box_delta,
                offset: r.offset,
                overflow: r.overflow,
                area_ratio: r.area_ratio(),
                length_ratio: r.length_ratio,
                translation_confidence: r.translation_confidence,
            })
            .collect();
        let overflow_regions: Vec<RegionId> = adjustments
            .iter()
            .filter(|a| a.overflow)
            .map(|a| a.region_id.clone())
            .collect();

        let preservation = page_preservation(&adjustments, &outcome.conflicts);

        Self {
            page_number: page.page.page_number,
            status: PageStatus::Finalized,
            failed_stage: None,
            error: None,
            conflicts: outcome.conflicts.clone(),
            overflow_regions,
            adjustments,
            resolutions: outcome.resolutions.clone(),
            spacing: outcome.spacing.clone(),
            preexisting_overlaps: page.analysis.preexisting_overlaps.clone(),
            resolver_passes: outcome.passes,
            reading_order: page.analysis.reading_order.clone(),
            layout_complexity: page.analysis.layout_complexity,
            preservation,
        }
    }

    pub fn failed(failure: &PageFailure) -> Self {
        Self {
            page_number: failure.page_number,
            status: PageStatus::Failed,
            failed_stage: Some(failure.stage),
            error: Some(failure.error.to_string()),
            conflicts: Vec::new(),
            overflow_regions: Vec::new(),
            adjustments: Vec::new(),
            resolutions: Vec::new(),
            spacing: Vec::new(),
            preexisting_overlaps: Vec::new(),
            resolver_passes: 0,
            reading_order: Vec::new(),
            layout_complexity: 0.0,
            preservation: 0.0,
        }
    }

    pub fn unresolved_count(&self) -> usize {
        self.conflicts
            .iter()
            .filter(|c| c.resolution == ConflictStatus::Unresolved)
            .count()
    }
}

fn page_preservation(adjustments: &[RegionAdjustment], conflicts: &[LayoutConflict]) -> f32 {
    let box_stability = if adjustments.is_empty() {
        1.0
    } else {
        let drift: f32 = adjustments
            .iter()
            .map(|a| (a.area_ratio - 1.0).abs())
            .sum::<f32>()
            / adjustments.len() as f32;
        (1.0 - drift).clamp(0.0, 1.0)
    };

    let conflict_term = if conflicts.is_empty() {
        1.0
    } else {
        let unresolved = conflicts
            .iter()
            .filter(|c| c.resolution == ConflictStatus::Unresolved)
            .count();
        1.0 - unresolved as f32 / conflicts.len() as f32
    };

    let overflow_term = if adjustments.is_empty() {
        1.0
    } else {
        let overflowed = adjustments.iter().filter(|a| a.overflow).count();
        1.0 - overflowed as f32 / adjustments.len() as f32
    };

    BOX_STABILITY_WEIGHT * box_stability
        + CONFLICT_WEIGHT * conflict_term
        + OVERFLOW_WEIGHT * overflow_term
}

impl LayoutReport {
    pub fn new(pages: Vec<PageReport>) -> Self {
        let score = LayoutScore::from_pages(&pages);
        Self {
            job_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            pages,
            score,
        }
    }

    pub fn unresolved_conflicts(&self) -> usize {
        self.score.unresolved_conflicts
    }

    pub fn failed_pages(&self) -> usize {
        self.score.failed_pages
    }
}

impl LayoutScore {
    fn from_pages(pages: &[PageReport]) -> Self {
        let preservation = if pages.is_empty() {
            1.0
        } else {
            pages.iter().map(|p| p.preservation).sum::<f32>() / pages.len() as f32
        };
        let unresolved_conflicts: usize = pages.iter().map(PageReport::unresolved_count).sum();
        let total_conflicts: usize = pages.iter().map(|p| p.conflicts.len()).sum();

        Self {
            preservation,
            resolved_conflicts: total_conflicts - unresolved_conflicts,
            unresolved_conflicts,
            overflow_regions: pages.iter().map(|p| p.overflow_regions.len()).sum(),
            failed_pages: pages
                .iter()
                .filter(|p| p.status == PageStatus::Failed)
                .count(),
            verdict: LayoutVerdict::from_preservation(preservation),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReconstructionError;
    use crate::layout::config::FittingConfig;
    use crate::layout::geometry::BoundingBox;
    use crate::layout::resolver::ConflictKind;
    use crate::models::{PageDimensions, PageStructure, TextFormatting, TextRegion, TranslationMap};
    use crate::reconstruction::pipeline::run_page;

    fn make_adjustment(area_ratio: f32, overflow: bool) -> RegionAdjustment {
        RegionAdjustment {
            region_id: "r".into(),
            strategy: FitStrategy::Unchanged,
            font_scale: 1.0,
            box_delta: BoxDelta::default(),
            offset: Offset::default(),
            overflow,
            area_ratio,
            length_ratio: 1.0,
            translation_confidence: None,
        }
    }

    fn make_conflict(resolution: ConflictStatus) -> LayoutConflict {
        LayoutConflict {
            first: "a".into(),
            second: "b".into(),
            kind: ConflictKind::TextText,
            magnitude: 10.0,
            resolution,
            note: String::new(),
        }
    }

    #[test]
    fn test_untouched_page_is_fully_preserved() {
        let adjustments = vec![make_adjustment(1.0, false); 3];
        assert!((page_preservation(&adjustments, &[]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preservation_weights() {
        // drift 0.1 -> 0.4 * 0.9; half unresolved -> 0.3 * 0.5; half overflow -> 0.3 * 0.5
        let adjustments = vec![make_adjustment(1.1, true), make_adjustment(0.9, false)];
        let conflicts = vec![
            make_conflict(ConflictStatus::Resolved),
            make_conflict(ConflictStatus::Unresolved),
        ];
        let score = page_preservation(&adjustments, &conflicts);
        assert!((score - (0.36 + 0.15 + 0.15)).abs() < 1e-5, "got {score}");
    }

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(LayoutVerdict::from_preservation(0.95), LayoutVerdict::Preserved);
        assert_eq!(LayoutVerdict::from_preservation(0.9), LayoutVerdict::Preserved);
        assert_eq!(LayoutVerdict::from_preservation(0.75), LayoutVerdict::MinorDistortion);
        assert_eq!(LayoutVerdict::from_preservation(0.2), LayoutVerdict::Degraded);
    }

    #[test]
    fn test_failed_pages_score_zero() {
        let failure = PageFailure::new(
            2,
            PipelineStage::Scheduling,
            ReconstructionError::Timeout { millis: 50 },
        );
        let report = LayoutReport::new(vec![PageReport::failed(&failure)]);
        assert_eq!(report.failed_pages(), 1);
        assert_eq!(report.score.preservation, 0.0);
        assert_eq!(report.score.verdict, LayoutVerdict::Degraded);
        assert_eq!(report.pages[0].error.as_deref(), Some("page abandoned after 50 ms"));
    }

    #[test]
    fn test_empty_report_is_preserved() {
        let report = LayoutReport::new(Vec::new());
        assert_eq!(report.score.verdict, LayoutVerdict::Preserved);
        assert_eq!(report.unresolved_conflicts(), 0);
    }

    #[test]
    fn test_finalized_page_report() {
        let page = PageStructure {
            page_number: 1,
            dimensions: PageDimensions {
                width: 200.0,
                height: 200.0,
            },
            text_regions: vec![TextRegion::new(
                "title",
                BoundingBox::new(10.0, 10.0, 100.0, 20.0).unwrap(),
                "Title",
                TextFormatting::new("Helvetica", 12.0),
            )],
            visual_elements: vec![],
        };
        let finalized =
            run_page(page, &TranslationMap::new(), &FittingConfig::default(), None).unwrap();
        let report = PageReport::finalized(&finalized);
        assert_eq!(report.status, PageStatus::Finalized);
        assert_eq!(report.reading_order, vec!["title"]);
        assert_eq!(report.adjustments[0].strategy, FitStrategy::Untranslated);
        assert!((report.preservation - 1.0).abs() < 1e-6);
    }
}
