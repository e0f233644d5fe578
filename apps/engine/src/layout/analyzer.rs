//! Layout Analyzer: reading order, columns, adjacency and the page's overlap index.
//!
//! Reading order groups text regions into columns (x-ranges that overlap beyond
//! `overlap_epsilon` of the narrower width merge), orders columns left to right, and orders
//! each column top to bottom. Regions whose top edges are within `row_tolerance` share a
//! row and are ordered by x, then id.

use std::collections::HashMap;

use serde::Serialize;

use crate::errors::AnalysisError;
use crate::layout::config::FittingConfig;
use crate::layout::geometry::BoundingBox;
use crate::layout::spatial_map::{EntryKind, Overlap, SpatialEntry, SpatialMap};
use crate::models::{PageStructure, RegionId, TextRegion};

const COMPLEXITY_ELEMENT_WEIGHT: f32 = 0.4;
const COMPLEXITY_RELATION_WEIGHT: f32 = 0.3;
const COMPLEXITY_OVERLAP_WEIGHT: f32 = 0.3;

/// Direction of `second` relative to `first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Above,
    Below,
    Left,
    Right,
    /// The boxes share an edge or overlap.
    Touching,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adjacency {
    pub first: RegionId,
    pub second: RegionId,
    pub relation: Relation,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutAnalysis {
    pub page_number: u32,
    pub page_bounds: BoundingBox,
    pub reading_order: Vec<RegionId>,
    pub column_structure: Vec<Vec<RegionId>>,
    pub spatial_map: SpatialMap,
    pub adjacency: Vec<Adjacency>,
    /// Overlaps already present in the extracted page. Informational only.
    pub preexisting_overlaps: Vec<Overlap>,
    pub layout_complexity: f32,
    #[serde(skip)]
    ranks: HashMap<RegionId, usize>,
}

impl LayoutAnalysis {
    /// Position of a text region in reading order.
    pub fn reading_rank(&self, id: &str) -> Option<usize> {
        self.ranks.get(id).copied()
    }

    /// Intersection area of the pair in the original page, 0 when they did not overlap.
    pub fn preexisting_magnitude(&self, a: &str, b: &str) -> f32 {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        self.preexisting_overlaps
            .binary_search_by(|o| {
                o.first
                    .as_str()
                    .cmp(first)
                    .then_with(|| o.second.as_str().cmp(second))
            })
            .map(|i| self.preexisting_overlaps[i].magnitude)
            .unwrap_or(0.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis
// ────────────────────────────────────────────────────────────────────────────

pub fn analyze(page: &PageStructure, config: &FittingConfig) -> Result<LayoutAnalysis, AnalysisError> {
    let page_bounds = validate_page(page, config)?;

    let columns = column_structure(&page.text_regions, config);
    let reading_order: Vec<RegionId> = columns.iter().flatten().cloned().collect();
    let ranks = reading_order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();

    let spatial_map = SpatialMap::build(page_entries(page));
    let preexisting_overlaps = spatial_map.overlapping_pairs(config.overlap_epsilon);
    let adjacency = adjacency(&spatial_map, config.adjacency_threshold);

    let element_count = spatial_map.len();
    let layout_complexity = COMPLEXITY_ELEMENT_WEIGHT * (element_count as f32 / 50.0).min(1.0)
        + COMPLEXITY_RELATION_WEIGHT * (adjacency.len() as f32 / 100.0).min(1.0)
        + COMPLEXITY_OVERLAP_WEIGHT * (preexisting_overlaps.len() as f32 / 10.0).min(1.0);

    Ok(LayoutAnalysis {
        page_number: page.page_number,
        page_bounds,
        reading_order,
        column_structure: columns,
        spatial_map,
        adjacency,
        preexisting_overlaps,
        layout_complexity,
        ranks,
    })
}

/// Spatial-map entries for every text region and visual element on the page.
pub fn page_entries(page: &PageStructure) -> impl Iterator<Item = SpatialEntry> + '_ {
    let text = page.text_regions.iter().map(|r| SpatialEntry {
        id: r.id.clone(),
        kind: EntryKind::Text,
        bbox: r.bounding_box,
    });
    let visual = page.visual_elements.iter().map(|e| SpatialEntry {
        id: e.id.clone(),
        kind: EntryKind::Visual,
        bbox: e.bounding_box,
    });
    text.chain(visual)
}

fn validate_page(page: &PageStructure, config: &FittingConfig) -> Result<BoundingBox, AnalysisError> {
    let dims = page.dimensions;
    if !(dims.width.is_finite() && dims.height.is_finite() && dims.width > 0.0 && dims.height > 0.0)
    {
        return Err(AnalysisError::InvalidPage {
            page_number: page.page_number,
            width: dims.width,
            height: dims.height,
        });
    }
    let bounds = page.bounds()?;

    for region in &page.text_regions {
        if region.bounding_box.area() <= 0.0 {
            return Err(AnalysisError::DegenerateRegion {
                id: region.id.clone(),
            });
        }
        let fmt = &region.formatting;
        if !(fmt.font_size.is_finite() && fmt.font_size > 0.0 && fmt.line_spacing > 0.0) {
            return Err(AnalysisError::InvalidFormatting {
                id: region.id.clone(),
            });
        }
        if !bounds.contains_within(&region.bounding_box, config.bounds_tolerance) {
            return Err(AnalysisError::OutOfBounds {
                id: region.id.clone(),
            });
        }
    }
    for element in &page.visual_elements {
        if !bounds.contains_within(&element.bounding_box, config.bounds_tolerance) {
            return Err(AnalysisError::OutOfBounds {
                id: element.id.clone(),
            });
        }
    }
    Ok(bounds)
}

/// Columns in reading order, each listing its regions top to bottom.
fn column_structure(regions: &[TextRegion], config: &FittingConfig) -> Vec<Vec<RegionId>> {
    let mut sorted: Vec<&TextRegion> = regions.iter().collect();
    sorted.sort_by(|a, b| {
        a.bounding_box
            .x()
            .total_cmp(&b.bounding_box.x())
            .then(a.bounding_box.y().total_cmp(&b.bounding_box.y()))
            .then_with(|| a.id.cmp(&b.id))
    });

    // Sweep by left edge, merging into the open column while x-ranges overlap.
    let mut columns: Vec<(f32, f32, Vec<&TextRegion>)> = Vec::new();
    for region in sorted {
        let bbox = &region.bounding_box;
        if let Some((x0, x1, members)) = columns.last_mut() {
            let shared = x1.min(bbox.right()) - x0.max(bbox.x());
            let narrower = (*x1 - *x0).min(bbox.width());
            if shared > 0.0 && shared > config.overlap_epsilon * narrower {
                *x1 = x1.max(bbox.right());
                members.push(region);
                continue;
            }
        }
        columns.push((bbox.x(), bbox.right(), vec![region]));
    }

    columns
        .into_iter()
        .map(|(_, _, members)| order_column(members, config.row_tolerance))
        .collect()
}

/// Top to bottom; regions whose tops are within `row_tolerance` of the row's first
/// region form a row ordered by x, then id.
fn order_column(mut members: Vec<&TextRegion>, row_tolerance: f32) -> Vec<RegionId> {
    members.sort_by(|a, b| {
        a.bounding_box
            .y()
            .total_cmp(&b.bounding_box.y())
            .then(a.bounding_box.x().total_cmp(&b.bounding_box.x()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut ordered = Vec::with_capacity(members.len());
    let mut row: Vec<&TextRegion> = Vec::new();
    for region in members {
        if let Some(first) = row.first() {
            if region.bounding_box.y() - first.bounding_box.y() > row_tolerance {
                flush_row(&mut row, &mut ordered);
            }
        }
        row.push(region);
    }
    flush_row(&mut row, &mut ordered);
    ordered
}

fn flush_row(row: &mut Vec<&TextRegion>, ordered: &mut Vec<RegionId>) {
    row.sort_by(|a, b| {
        a.bounding_box
            .x()
            .total_cmp(&b.bounding_box.x())
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered.extend(row.drain(..).map(|r| r.id.clone()));
}

/// Pairs within `threshold` units of each other, sorted by `(first, second)`.
fn adjacency(map: &SpatialMap, threshold: f32) -> Vec<Adjacency> {
    let mut out = Vec::new();
    for entry in map.iter() {
        for other in map.query_within(&entry.bbox, threshold) {
            if other.id <= entry.id {
                continue;
            }
            out.push(Adjacency {
                first: entry.id.clone(),
                second: other.id.clone(),
                relation: relation(&entry.bbox, &other.bbox),
                distance: entry.bbox.gap(&other.bbox),
            });
        }
    }
    out.sort_by(|a, b| a.first.cmp(&b.first).then_with(|| a.second.cmp(&b.second)));
    out
}

fn relation(first: &BoundingBox, second: &BoundingBox) -> Relation {
    if first.gap(second) == 0.0 {
        return Relation::Touching;
    }
    let horizontal_gap = (second.x() - first.right()).max(first.x() - second.right());
    let vertical_gap = (second.y() - first.bottom()).max(first.y() - second.bottom());
    if vertical_gap >= horizontal_gap {
        if second.y() >= first.bottom() {
            Relation::Below
        } else {
            Relation::Above
        }
    } else if second.x() >= first.right() {
        Relation::Right
    } else {
        Relation::Left
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PageDimensions, TextFormatting, VisualElement, VisualElementType};

    fn make_region(id: &str, x: f32, y: f32, w: f32, h: f32) -> TextRegion {
        TextRegion::new(
            id,
            BoundingBox::new(x, y, w, h).unwrap(),
            "text",
            TextFormatting::new("Helvetica", 10.0),
        )
    }

    fn make_page(regions: Vec<TextRegion>, elements: Vec<VisualElement>) -> PageStructure {
        PageStructure {
            page_number: 1,
            dimensions: PageDimensions {
                width: 600.0,
                height: 800.0,
            },
            text_regions: regions,
            visual_elements: elements,
        }
    }

    fn make_image(id: &str, x: f32, y: f32, w: f32, h: f32) -> VisualElement {
        VisualElement::new(id, VisualElementType::Image, BoundingBox::new(x, y, w, h).unwrap())
    }

    #[test]
    fn test_two_column_reading_order() {
        let page = make_page(
            vec![
                make_region("right-top", 320.0, 50.0, 250.0, 40.0),
                make_region("left-bottom", 30.0, 120.0, 250.0, 40.0),
                make_region("left-top", 30.0, 50.0, 250.0, 40.0),
                make_region("right-bottom", 320.0, 120.0, 250.0, 40.0),
            ],
            vec![],
        );
        let analysis = analyze(&page, &FittingConfig::default()).unwrap();
        assert_eq!(
            analysis.reading_order,
            vec!["left-top", "left-bottom", "right-top", "right-bottom"]
        );
        assert_eq!(analysis.column_structure.len(), 2);
        assert_eq!(analysis.reading_rank("right-top"), Some(2));
    }

    #[test]
    fn test_row_ties_break_by_x_then_id() {
        // Same column (overlapping x-ranges), tops within row tolerance.
        let page = make_page(
            vec![
                make_region("b", 40.0, 101.0, 200.0, 20.0),
                make_region("a", 40.0, 100.0, 200.0, 20.0),
                make_region("c", 20.0, 100.5, 200.0, 20.0),
            ],
            vec![],
        );
        let analysis = analyze(&page, &FittingConfig::default()).unwrap();
        assert_eq!(analysis.reading_order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_reading_order_is_deterministic() {
        let regions: Vec<TextRegion> = (0..12)
            .map(|i| {
                make_region(
                    &format!("r{i}"),
                    (i % 3) as f32 * 190.0 + 10.0,
                    (i / 3) as f32 * 60.0 + 10.0,
                    150.0,
                    40.0,
                )
            })
            .collect();
        let mut reversed = regions.clone();
        reversed.reverse();
        let config = FittingConfig::default();
        let a = analyze(&make_page(regions, vec![]), &config).unwrap();
        let b = analyze(&make_page(reversed, vec![]), &config).unwrap();
        assert_eq!(a.reading_order, b.reading_order);
        assert_eq!(a.column_structure.len(), 3);
    }

    #[test]
    fn test_zero_area_region_rejected() {
        let page = make_page(vec![make_region("flat", 10.0, 10.0, 100.0, 0.0)], vec![]);
        assert_eq!(
            analyze(&page, &FittingConfig::default()).unwrap_err(),
            AnalysisError::DegenerateRegion { id: "flat".into() }
        );
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let page = make_page(vec![make_region("off", 550.0, 10.0, 100.0, 20.0)], vec![]);
        assert!(matches!(
            analyze(&page, &FittingConfig::default()),
            Err(AnalysisError::OutOfBounds { .. })
        ));

        let page = make_page(vec![], vec![make_image("img", 0.0, 790.0, 100.0, 20.0)]);
        assert!(matches!(
            analyze(&page, &FittingConfig::default()),
            Err(AnalysisError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_invalid_page_dimensions_rejected() {
        let mut page = make_page(vec![], vec![]);
        page.dimensions.width = 0.0;
        assert!(matches!(
            analyze(&page, &FittingConfig::default()),
            Err(AnalysisError::InvalidPage { .. })
        ));
    }

    #[test]
    fn test_invalid_font_size_rejected() {
        let mut region = make_region("r", 10.0, 10.0, 100.0, 20.0);
        region.formatting.font_size = 0.0;
        let page = make_page(vec![region], vec![]);
        assert!(matches!(
            analyze(&page, &FittingConfig::default()),
            Err(AnalysisError::InvalidFormatting { .. })
        ));
    }

    #[test]
    fn test_preexisting_overlaps_recorded() {
        let page = make_page(
            vec![make_region("caption", 10.0, 90.0, 100.0, 20.0)],
            vec![make_image("figure", 10.0, 10.0, 100.0, 90.0)],
        );
        let analysis = analyze(&page, &FittingConfig::default()).unwrap();
        assert_eq!(analysis.preexisting_overlaps.len(), 1);
        assert!((analysis.preexisting_magnitude("figure", "caption") - 1000.0).abs() < 1e-3);
        assert_eq!(analysis.preexisting_magnitude("caption", "other"), 0.0);
    }

    #[test]
    fn test_adjacency_relations() {
        let page = make_page(
            vec![
                make_region("a", 10.0, 10.0, 100.0, 20.0),
                make_region("b", 10.0, 35.0, 100.0, 20.0),
                make_region("c", 115.0, 10.0, 100.0, 20.0),
                make_region("far", 400.0, 400.0, 100.0, 20.0),
            ],
            vec![],
        );
        let analysis = analyze(&page, &FittingConfig::default()).unwrap();
        let find = |f: &str, s: &str| {
            analysis
                .adjacency
                .iter()
                .find(|a| a.first == f && a.second == s)
                .map(|a| a.relation)
        };
        assert_eq!(find("a", "b"), Some(Relation::Below));
        assert_eq!(find("a", "c"), Some(Relation::Right));
        assert!(analysis.adjacency.iter().all(|a| a.first != "far" && a.second != "far"));
    }

    #[test]
    fn test_layout_complexity_bounds() {
        let empty = analyze(&make_page(vec![], vec![]), &FittingConfig::default()).unwrap();
        assert_eq!(empty.layout_complexity, 0.0);

        let regions: Vec<TextRegion> = (0..60)
            .map(|i| make_region(&format!("r{i:02}"), 10.0, i as f32 * 12.0, 100.0, 11.0))
            .collect();
        let dense = analyze(&make_page(regions, vec![]), &FittingConfig::default()).unwrap();
        assert!(dense.layout_complexity > 0.4);
        assert!(dense.layout_complexity <= 1.0);
    }
}
