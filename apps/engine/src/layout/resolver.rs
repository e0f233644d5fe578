//! Conflict Resolver: removes overlaps introduced by text fitting.
//!
//! # Priority
//! Visual elements never move, so in a text/visual conflict the text region yields. In a
//! text/text conflict the region later in reading order yields. Conflicts are handled in
//! the order (text/visual first, yielder's reading rank, obstacle id).
//!
//! # Actions (first that fits wins)
//! 1. Shrink into the larger free band of the yielder's current box above or below the
//!    obstacle.
//! 2. Reflow into the free band left or right of the obstacle at a narrower width, within
//!    the original height budget.
//! 3. Reposition next to the obstacle, with minimal displacement, inside the original box
//!    grown by `max_layout_adjustment` on each side and clipped to the page.
//!
//! A region that fitting pushed past the page edge is a conflict with the page itself. It
//! is handled before any overlap: shrink into the part of the box still on the page, or
//! slide back inside by the excess.
//!
//! Neighbours that end up closer than `min_region_gap` without overlapping are reported as
//! spacing notices. They are informational and never count as conflicts.
//!
//! Resolution runs in at most `max_resolution_passes` passes and stops early as soon as a
//! pass fails to reduce either the number of conflicts or their total magnitude. Whatever
//! is still overlapping afterwards is reported `Unresolved`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::ResolverError;
use crate::layout::analyzer::LayoutAnalysis;
use crate::layout::config::FittingConfig;
use crate::layout::fitting::{largest_fitting_scale, AdjustedRegion, WrapPlan};
use crate::layout::geometry::BoundingBox;
use crate::layout::spatial_map::{EntryKind, SpatialEntry, SpatialMap};
use crate::models::{RegionId, VisualElement};

/// Overlap growth below this many square units does not count as widening.
const MAGNITUDE_EPSILON: f32 = 1e-3;
/// Containment slack for repositioned boxes.
const POSITION_EPSILON: f32 = 1e-3;

/// Stands in for the obstacle id of a page-edge conflict.
pub const PAGE_EDGE: &str = "@page";

// ────────────────────────────────────────────────────────────────────────────
// Result types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// A text region grew past the page bounds.
    PageEdge,
    TextVisual,
    TextText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Resolved,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutConflict {
    /// Lexicographically smaller id of the pair. For page-edge conflicts, the region.
    pub first: RegionId,
    /// `PAGE_EDGE` for page-edge conflicts.
    pub second: RegionId,
    pub kind: ConflictKind,
    /// Intersection area when last detected.
    pub magnitude: f32,
    pub resolution: ConflictStatus,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionAction {
    Shrink {
        from_scale: f32,
        to_scale: f32,
    },
    Reflow {
        from_width: f32,
        to_width: f32,
        to_scale: f32,
    },
    Reposition {
        dx: f32,
        dy: f32,
    },
    AcceptedUnresolved,
}

impl ResolutionAction {
    fn describe(&self) -> String {
        match self {
            ResolutionAction::Shrink {
                from_scale,
                to_scale,
            } => format!("shrunk font scale {from_scale:.3} -> {to_scale:.3}"),
            ResolutionAction::Reflow {
                from_width,
                to_width,
                to_scale,
            } => format!("reflowed width {from_width:.1} -> {to_width:.1} at scale {to_scale:.3}"),
            ResolutionAction::Reposition { dx, dy } => format!("moved by ({dx:.1}, {dy:.1})"),
            ResolutionAction::AcceptedUnresolved => "accepted unresolved".to_string(),
        }
    }
}

/// Two neighbours that fitting moved closer than `min_region_gap`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpacingNotice {
    pub first: RegionId,
    pub second: RegionId,
    pub gap: f32,
    pub original_gap: f32,
    /// `1 - gap / min_region_gap`, floored at 0.1.
    pub severity: f32,
}

/// One geometric change applied to a yielding region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub region_id: RegionId,
    pub obstacle_id: RegionId,
    pub action: ResolutionAction,
    pub before: BoundingBox,
    pub after: BoundingBox,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolverOutcome {
    /// Regions in input order with their final geometry.
    pub regions: Vec<AdjustedRegion>,
    /// Every conflict seen, sorted by `(first, second)`.
    pub conflicts: Vec<LayoutConflict>,
    pub resolutions: Vec<Resolution>,
    /// Near misses, sorted by `(first, second)`. Not part of `conflicts`.
    pub spacing: Vec<SpacingNotice>,
    pub passes: u32,
}

impl ResolverOutcome {
    pub fn unresolved(&self) -> impl Iterator<Item = &LayoutConflict> {
        self.conflicts
            .iter()
            .filter(|c| c.resolution == ConflictStatus::Unresolved)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scene: current page geometry plus its spatial index
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Candidate {
    first: RegionId,
    second: RegionId,
    kind: ConflictKind,
    magnitude: f32,
    yielder: RegionId,
    yielder_rank: usize,
    obstacle: RegionId,
}

struct Scene<'a> {
    analysis: &'a LayoutAnalysis,
    elements: &'a [VisualElement],
    regions: Vec<AdjustedRegion>,
    index: HashMap<RegionId, usize>,
    map: SpatialMap,
}

impl<'a> Scene<'a> {
    fn new(
        analysis: &'a LayoutAnalysis,
        regions: Vec<AdjustedRegion>,
        elements: &'a [VisualElement],
    ) -> Self {
        let index = regions
            .iter()
            .enumerate()
            .map(|(i, r)| (r.region.id.clone(), i))
            .collect();
        let map = Self::index_geometry(&regions, elements);
        Self {
            analysis,
            elements,
            regions,
            index,
            map,
        }
    }

    fn index_geometry(regions: &[AdjustedRegion], elements: &[VisualElement]) -> SpatialMap {
        let text = regions.iter().map(|r| SpatialEntry {
            id: r.region.id.clone(),
            kind: EntryKind::Text,
            bbox: r.final_box(),
        });
        let visual = elements.iter().map(|e| SpatialEntry {
            id: e.id.clone(),
            kind: EntryKind::Visual,
            bbox: e.bounding_box,
        });
        SpatialMap::build(text.chain(visual))
    }

    fn rebuild(&mut self) {
        self.map = Self::index_geometry(&self.regions, self.elements);
    }

    fn rank(&self, id: &str) -> usize {
        self.analysis.reading_rank(id).unwrap_or(usize::MAX)
    }

    /// Page-edge excursions plus overlaps introduced or widened since the original page,
    /// in priority order.
    fn detect(&self, epsilon: f32, bounds_tolerance: f32) -> Vec<Candidate> {
        let mut found: Vec<Candidate> = self
            .map
            .overlapping_pairs(epsilon)
            .into_iter()
            .filter_map(|overlap| {
                let preexisting = self
                    .analysis
                    .preexisting_magnitude(&overlap.first, &overlap.second);
                if overlap.magnitude <= preexisting + MAGNITUDE_EPSILON {
                    return None;
                }
                let a = self.map.get(&overlap.first)?;
                let b = self.map.get(&overlap.second)?;
                let (kind, yielder, obstacle) = match (a.kind, b.kind) {
                    (EntryKind::Visual, EntryKind::Visual) => return None,
                    (EntryKind::Text, EntryKind::Visual) => (ConflictKind::TextVisual, a, b),
                    (EntryKind::Visual, EntryKind::Text) => (ConflictKind::TextVisual, b, a),
                    (EntryKind::Text, EntryKind::Text) => {
                        // `a.id < b.id`, so on equal rank `b` yields.
                        if self.rank(&a.id) > self.rank(&b.id) {
                            (ConflictKind::TextText, a, b)
                        } else {
                            (ConflictKind::TextText, b, a)
                        }
                    }
                };
                Some(Candidate {
                    first: overlap.first.clone(),
                    second: overlap.second.clone(),
                    kind,
                    magnitude: overlap.magnitude,
                    yielder: yielder.id.clone(),
                    yielder_rank: self.rank(&yielder.id),
                    obstacle: obstacle.id.clone(),
                })
            })
            .collect();

        let page = &self.analysis.page_bounds;
        found.extend(self.regions.iter().filter_map(|region| {
            let bbox = region.final_box();
            if page.contains_within(&bbox, bounds_tolerance) {
                return None;
            }
            Some(Candidate {
                first: region.region.id.clone(),
                second: PAGE_EDGE.to_string(),
                kind: ConflictKind::PageEdge,
                magnitude: bbox.area() - bbox.intersection_area(page),
                yielder: region.region.id.clone(),
                yielder_rank: self.rank(region.id()),
                obstacle: PAGE_EDGE.to_string(),
            })
        }));

        found.sort_by(|x, y| {
            x.kind
                .cmp(&y.kind)
                .then(x.yielder_rank.cmp(&y.yielder_rank))
                .then_with(|| x.obstacle.cmp(&y.obstacle))
                .then_with(|| x.yielder.cmp(&y.yielder))
        });
        found
    }

    /// True when `bbox` would not overlap anything beyond what `yielder` already
    /// overlapped in the original page.
    fn clears(&self, bbox: &BoundingBox, yielder: &str, epsilon: f32) -> bool {
        self.map.query(bbox, epsilon).into_iter().all(|entry| {
            entry.id == yielder
                || bbox.intersection_area(&entry.bbox)
                    <= self.analysis.preexisting_magnitude(yielder, &entry.id) + MAGNITUDE_EPSILON
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resolver
// ────────────────────────────────────────────────────────────────────────────

/// A change the resolver is about to apply to one region.
struct Plan {
    action: ResolutionAction,
    font_scale: f32,
    bbox: BoundingBox,
    wrap_plan: WrapPlan,
}

pub struct Resolver<'a> {
    config: &'a FittingConfig,
    deadline: Option<Instant>,
}

/// Resolves conflicts with no wall-clock deadline.
pub fn resolve(
    analysis: &LayoutAnalysis,
    adjusted: Vec<AdjustedRegion>,
    elements: &[VisualElement],
    config: &FittingConfig,
) -> Result<ResolverOutcome, ResolverError> {
    Resolver::new(config).resolve(analysis, adjusted, elements)
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a FittingConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    /// Checked before every pass; an expired deadline abandons the page.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn resolve(
        &self,
        analysis: &LayoutAnalysis,
        adjusted: Vec<AdjustedRegion>,
        elements: &[VisualElement],
    ) -> Result<ResolverOutcome, ResolverError> {
        let epsilon = self.config.overlap_epsilon;
        let tolerance = self.config.bounds_tolerance;
        let mut scene = Scene::new(analysis, adjusted, elements);
        let mut ledger: BTreeMap<(RegionId, RegionId), LayoutConflict> = BTreeMap::new();
        let mut resolutions = Vec::new();
        let mut passes = 0u32;

        let mut pending = scene.detect(epsilon, tolerance);
        record(&mut ledger, &pending);

        while !pending.is_empty() && passes < self.config.max_resolution_passes {
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(ResolverError::DeadlineExceeded { passes });
            }
            passes += 1;
            let before = (pending.len(), total_magnitude(&pending));

            for candidate in &pending {
                let Some(&idx) = scene.index.get(&candidate.yielder) else {
                    continue;
                };
                let current = scene.regions[idx].final_box();

                let plan = if candidate.kind == ConflictKind::PageEdge {
                    if analysis.page_bounds.contains_within(&current, tolerance) {
                        continue;
                    }
                    self.pull_onto_page(&scene, idx, &current)
                } else {
                    let Some(obstacle) = scene.map.get(&candidate.obstacle).map(|e| e.bbox) else {
                        continue;
                    };
                    // An earlier action this pass may already have cleared it.
                    let preexisting =
                        analysis.preexisting_magnitude(&candidate.first, &candidate.second);
                    if !current.overlaps(&obstacle, epsilon)
                        || current.intersection_area(&obstacle) <= preexisting + MAGNITUDE_EPSILON
                    {
                        continue;
                    }
                    self.plan_for(&scene, idx, &current, &obstacle)
                };
                let Some(plan) = plan else {
                    continue;
                };
                debug!(
                    page = analysis.page_number,
                    region = %candidate.yielder,
                    obstacle = %candidate.obstacle,
                    action = %plan.action.describe(),
                    "conflict resolved"
                );
                if let Some(entry) = ledger.get_mut(&(candidate.first.clone(), candidate.second.clone())) {
                    entry.note = plan.action.describe();
                }
                resolutions.push(Resolution {
                    region_id: candidate.yielder.clone(),
                    obstacle_id: candidate.obstacle.clone(),
                    action: plan.action,
                    before: current,
                    after: plan.bbox,
                });
                scene.regions[idx].apply_geometry(plan.font_scale, plan.bbox, plan.wrap_plan);
                scene.rebuild();
            }

            pending = scene.detect(epsilon, tolerance);
            record(&mut ledger, &pending);

            let after = (pending.len(), total_magnitude(&pending));
            let improved = after.0 < before.0 || after.1 < before.1 - MAGNITUDE_EPSILON;
            if !improved {
                debug!(page = analysis.page_number, passes, "resolution pass made no progress");
                break;
            }
        }

        let remaining: BTreeSet<(RegionId, RegionId)> = pending
            .iter()
            .map(|c| (c.first.clone(), c.second.clone()))
            .collect();

        for candidate in &pending {
            if let Some(&idx) = scene.index.get(&candidate.yielder) {
                let bbox = scene.regions[idx].final_box();
                resolutions.push(Resolution {
                    region_id: candidate.yielder.clone(),
                    obstacle_id: candidate.obstacle.clone(),
                    action: ResolutionAction::AcceptedUnresolved,
                    before: bbox,
                    after: bbox,
                });
            }
            warn!(
                page = analysis.page_number,
                region = %candidate.yielder,
                obstacle = %candidate.obstacle,
                magnitude = candidate.magnitude,
                "layout conflict left unresolved"
            );
        }

        let conflicts = ledger
            .into_iter()
            .map(|(key, mut conflict)| {
                if remaining.contains(&key) {
                    conflict.resolution = ConflictStatus::Unresolved;
                    let capped = passes >= self.config.max_resolution_passes;
                    conflict.note = match (conflict.kind, capped) {
                        (ConflictKind::PageEdge, true) => {
                            format!("still past the page edge after {passes} resolution passes")
                        }
                        (ConflictKind::PageEdge, false) => {
                            "no shrink or reposition keeps the region on the page".to_string()
                        }
                        (_, true) => format!("still overlapping after {passes} resolution passes"),
                        (_, false) => {
                            "no shrink, reflow or reposition fits the layout budget".to_string()
                        }
                    };
                } else {
                    conflict.resolution = ConflictStatus::Resolved;
                    if conflict.note.is_empty() {
                        conflict.note = "cleared by adjusting another region".to_string();
                    }
                }
                conflict
            })
            .collect();

        let spacing = spacing_notices(analysis, &scene.map, self.config.min_region_gap);
        if !spacing.is_empty() {
            debug!(
                page = analysis.page_number,
                notices = spacing.len(),
                "regions closer than minimum gap"
            );
        }

        Ok(ResolverOutcome {
            regions: scene.regions,
            conflicts,
            resolutions,
            spacing,
            passes,
        })
    }

    fn plan_for(
        &self,
        scene: &Scene<'_>,
        idx: usize,
        current: &BoundingBox,
        obstacle: &BoundingBox,
    ) -> Option<Plan> {
        let region = &scene.regions[idx];
        self.shrink_into_band(region, current, obstacle)
            .or_else(|| self.reflow_beside(scene, region, current, obstacle))
            .or_else(|| self.reposition(scene, region, current, obstacle))
    }

    /// Keeps the width and fits the text into the free band above or below the obstacle.
    fn shrink_into_band(
        &self,
        region: &AdjustedRegion,
        current: &BoundingBox,
        obstacle: &BoundingBox,
    ) -> Option<Plan> {
        let mut bands: Vec<(f32, f32)> = Vec::with_capacity(2);
        if obstacle.y() > current.y() {
            bands.push((current.y(), obstacle.y().min(current.bottom()) - current.y()));
        }
        if obstacle.bottom() < current.bottom() {
            let top = obstacle.bottom().max(current.y());
            bands.push((top, current.bottom() - top));
        }
        // Stable sort: the band above wins ties.
        bands.sort_by(|a, b| b.1.total_cmp(&a.1));

        let text = region.layout_text();
        let formatting = &region.region.formatting;
        for (top, height) in bands {
            if height <= 0.0 {
                continue;
            }
            let Some(scale) = largest_fitting_scale(
                text,
                formatting,
                current.width(),
                height,
                self.config.min_font_scale,
                region.font_scale,
                self.config.scale_tolerance,
            ) else {
                continue;
            };
            let wrap_plan = WrapPlan::compute(text, formatting, scale, current.width());
            let box_height = wrap_plan
                .estimated_height
                .max(wrap_plan.line_height)
                .min(height);
            let Ok(bbox) = BoundingBox::new(current.x(), top, current.width(), box_height) else {
                continue;
            };
            return Some(Plan {
                action: ResolutionAction::Shrink {
                    from_scale: region.font_scale,
                    to_scale: scale,
                },
                font_scale: scale,
                bbox,
                wrap_plan,
            });
        }
        None
    }

    /// Rewraps at a narrower width into the free band left or right of the obstacle.
    fn reflow_beside(
        &self,
        scene: &Scene<'_>,
        region: &AdjustedRegion,
        current: &BoundingBox,
        obstacle: &BoundingBox,
    ) -> Option<Plan> {
        let mut bands: Vec<(f32, f32)> = Vec::with_capacity(2);
        if obstacle.x() > current.x() {
            bands.push((current.x(), obstacle.x().min(current.right()) - current.x()));
        }
        if obstacle.right() < current.right() {
            let left = obstacle.right().max(current.x());
            bands.push((left, current.right() - left));
        }
        bands.sort_by(|a, b| b.1.total_cmp(&a.1));

        let text = region.layout_text();
        let formatting = &region.region.formatting;
        let height_budget = self.config.height_budget(region.original_box().height());
        for (left, width) in bands {
            if width <= 0.0 {
                continue;
            }
            let Some(scale) = largest_fitting_scale(
                text,
                formatting,
                width,
                height_budget,
                self.config.min_font_scale,
                region.font_scale,
                self.config.scale_tolerance,
            ) else {
                continue;
            };
            let wrap_plan = WrapPlan::compute(text, formatting, scale, width);
            let box_height = wrap_plan.estimated_height.max(wrap_plan.line_height);
            let Ok(bbox) = BoundingBox::new(left, current.y(), width, box_height) else {
                continue;
            };
            if !scene
                .analysis
                .page_bounds
                .contains_within(&bbox, self.config.bounds_tolerance)
                || !scene.clears(&bbox, region.id(), self.config.overlap_epsilon)
            {
                continue;
            }
            return Some(Plan {
                action: ResolutionAction::Reflow {
                    from_width: current.width(),
                    to_width: width,
                    to_scale: scale,
                },
                font_scale: scale,
                bbox,
                wrap_plan,
            });
        }
        None
    }

    /// Where a region may be moved to: its original box grown by `max_layout_adjustment`
    /// on each side, clipped to the page.
    fn envelope(&self, scene: &Scene<'_>, region: &AdjustedRegion) -> BoundingBox {
        let original = region.original_box();
        let m = self.config.max_layout_adjustment;
        original
            .expanded(m * original.width(), m * original.height())
            .clamped_within(&scene.analysis.page_bounds)
    }

    /// Brings a region that grew past the page edge back inside: shrink into the part of
    /// its box still on the page, else slide it back by the excess.
    fn pull_onto_page(&self, scene: &Scene<'_>, idx: usize, current: &BoundingBox) -> Option<Plan> {
        let region = &scene.regions[idx];
        let page = &scene.analysis.page_bounds;
        let visible = current.clamped_within(page);
        let text = region.layout_text();
        let formatting = &region.region.formatting;

        if visible.area() > 0.0 {
            let scale = largest_fitting_scale(
                text,
                formatting,
                visible.width(),
                visible.height(),
                self.config.min_font_scale,
                region.font_scale,
                self.config.scale_tolerance,
            );
            if let Some(scale) = scale {
                let wrap_plan = WrapPlan::compute(text, formatting, scale, visible.width());
                let box_height = wrap_plan
                    .estimated_height
                    .max(wrap_plan.line_height)
                    .min(visible.height());
                if let Ok(bbox) =
                    BoundingBox::new(visible.x(), visible.y(), visible.width(), box_height)
                {
                    return Some(Plan {
                        action: ResolutionAction::Shrink {
                            from_scale: region.font_scale,
                            to_scale: scale,
                        },
                        font_scale: scale,
                        bbox,
                        wrap_plan,
                    });
                }
            }
        }

        let dx = (page.x() - current.x()).max(0.0) + (page.right() - current.right()).min(0.0);
        let dy = (page.y() - current.y()).max(0.0) + (page.bottom() - current.bottom()).min(0.0);
        let bbox = current.translated(dx, dy);
        if !self.envelope(scene, region).contains_within(&bbox, POSITION_EPSILON)
            || !scene.clears(&bbox, region.id(), self.config.overlap_epsilon)
        {
            return None;
        }
        Some(Plan {
            action: ResolutionAction::Reposition { dx, dy },
            font_scale: region.font_scale,
            bbox,
            wrap_plan: region.wrap_plan.clone(),
        })
    }

    /// Moves the unchanged box flush against one side of the obstacle.
    fn reposition(
        &self,
        scene: &Scene<'_>,
        region: &AdjustedRegion,
        current: &BoundingBox,
        obstacle: &BoundingBox,
    ) -> Option<Plan> {
        let envelope = self.envelope(scene, region);

        // above, below, left, right
        let targets = [
            (current.x(), obstacle.y() - current.height()),
            (current.x(), obstacle.bottom()),
            (obstacle.x() - current.width(), current.y()),
            (obstacle.right(), current.y()),
        ];

        let mut best: Option<(f32, BoundingBox)> = None;
        for (x, y) in targets {
            let bbox = current.translated(x - current.x(), y - current.y());
            if !envelope.contains_within(&bbox, POSITION_EPSILON)
                || !scene.clears(&bbox, region.id(), self.config.overlap_epsilon)
            {
                continue;
            }
            let displacement = (bbox.x() - current.x()).abs() + (bbox.y() - current.y()).abs();
            if best.map_or(true, |(d, _)| displacement < d) {
                best = Some((displacement, bbox));
            }
        }

        best.map(|(_, bbox)| Plan {
            action: ResolutionAction::Reposition {
                dx: bbox.x() - current.x(),
                dy: bbox.y() - current.y(),
            },
            font_scale: region.font_scale,
            bbox,
            wrap_plan: region.wrap_plan.clone(),
        })
    }
}

fn record(ledger: &mut BTreeMap<(RegionId, RegionId), LayoutConflict>, found: &[Candidate]) {
    for candidate in found {
        let key = (candidate.first.clone(), candidate.second.clone());
        ledger
            .entry(key)
            .and_modify(|c| c.magnitude = candidate.magnitude)
            .or_insert_with(|| LayoutConflict {
                first: candidate.first.clone(),
                second: candidate.second.clone(),
                kind: candidate.kind,
                magnitude: candidate.magnitude,
                resolution: ConflictStatus::Unresolved,
                note: String::new(),
            });
    }
}

fn total_magnitude(found: &[Candidate]) -> f32 {
    found.iter().map(|c| c.magnitude).sum()
}

/// Non-overlapping pairs closer than `min_gap` whose gap shrank since the original page.
fn spacing_notices(analysis: &LayoutAnalysis, map: &SpatialMap, min_gap: f32) -> Vec<SpacingNotice> {
    if min_gap <= 0.0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for entry in map.iter() {
        for other in map.query_within(&entry.bbox, min_gap) {
            if other.id <= entry.id
                || (entry.kind == EntryKind::Visual && other.kind == EntryKind::Visual)
                || entry.bbox.intersection_area(&other.bbox) > 0.0
            {
                continue;
            }
            let gap = entry.bbox.gap(&other.bbox);
            let (Some(a), Some(b)) = (
                analysis.spatial_map.get(&entry.id),
                analysis.spatial_map.get(&other.id),
            ) else {
                continue;
            };
            let original_gap = a.bbox.gap(&b.bbox);
            if gap >= min_gap || gap >= original_gap - POSITION_EPSILON {
                continue;
            }
            out.push(SpacingNotice {
                first: entry.id.clone(),
                second: other.id.clone(),
                gap,
                original_gap,
                severity: (1.0 - gap / min_gap).max(0.1),
            });
        }
    }
    out.sort_by(|a, b| a.first.cmp(&b.first).then_with(|| a.second.cmp(&b.second)));
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
