//! Per-page overlap index over text-region and visual-element boxes.
//!
//! A static augmented interval tree: entries are sorted by left edge and laid out as an
//! implicit balanced binary tree (the midpoint of every index range is that range's root).
//! `max_right[i]` holds the largest right edge in the subtree rooted at `i`, so a query
//! prunes every subtree that ends before the query window and stops descending right once
//! entries start after it. Queries cost O(log n + k).
//!
//! The map is rebuilt whenever geometry changes; it is never mutated in place.

use std::collections::HashMap;

use serde::Serialize;

use crate::layout::geometry::BoundingBox;
use crate::models::RegionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Text,
    Visual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialEntry {
    pub id: RegionId,
    pub kind: EntryKind,
    pub bbox: BoundingBox,
}

/// An overlapping pair. `first < second` by id; `magnitude` is the intersection area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlap {
    pub first: RegionId,
    pub second: RegionId,
    pub magnitude: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpatialMap {
    entries: Vec<SpatialEntry>,
    #[serde(skip)]
    max_right: Vec<f32>,
    #[serde(skip)]
    by_id: HashMap<RegionId, usize>,
}

impl SpatialMap {
    pub fn build(entries: impl IntoIterator<Item = SpatialEntry>) -> Self {
        let mut entries: Vec<SpatialEntry> = entries.into_iter().collect();
        entries.sort_by(|a, b| {
            a.bbox
                .x()
                .total_cmp(&b.bbox.x())
                .then(a.kind.cmp(&b.kind))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut max_right = vec![f32::NEG_INFINITY; entries.len()];
        fill_max_right(&entries, &mut max_right, 0, entries.len());

        let mut by_id = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            by_id.entry(entry.id.clone()).or_insert(i);
        }

        Self {
            entries,
            max_right,
            by_id,
        }
    }

    /// Entries overlapping `bbox` beyond `epsilon` of the smaller area, in index order.
    pub fn query(&self, bbox: &BoundingBox, epsilon: f32) -> Vec<&SpatialEntry> {
        self.window(bbox.x(), bbox.right())
            .into_iter()
            .map(|i| &self.entries[i])
            .filter(|e| e.bbox.overlaps(bbox, epsilon))
            .collect()
    }

    /// Entries whose gap to `bbox` is at most `distance`, in index order.
    pub fn query_within(&self, bbox: &BoundingBox, distance: f32) -> Vec<&SpatialEntry> {
        self.window(bbox.x() - distance, bbox.right() + distance)
            .into_iter()
            .map(|i| &self.entries[i])
            .filter(|e| e.bbox.gap(bbox) <= distance)
            .collect()
    }

    /// Every overlapping pair on the page, sorted by `(first, second)`.
    pub fn overlapping_pairs(&self, epsilon: f32) -> Vec<Overlap> {
        let mut pairs = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            for j in self.window(entry.bbox.x(), entry.bbox.right()) {
                if j <= i {
                    continue;
                }
                let other = &self.entries[j];
                if !entry.bbox.overlaps(&other.bbox, epsilon) {
                    continue;
                }
                let (first, second) = if entry.id <= other.id {
                    (&entry.id, &other.id)
                } else {
                    (&other.id, &entry.id)
                };
                pairs.push(Overlap {
                    first: first.clone(),
                    second: second.clone(),
                    magnitude: entry.bbox.intersection_area(&other.bbox),
                });
            }
        }
        pairs.sort_by(|a, b| a.first.cmp(&b.first).then_with(|| a.second.cmp(&b.second)));
        pairs
    }

    pub fn get(&self, id: &str) -> Option<&SpatialEntry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order (left edge, then kind, then id).
    pub fn iter(&self) -> impl Iterator<Item = &SpatialEntry> {
        self.entries.iter()
    }

    /// Indices of entries whose x-interval intersects `[x0, x1]`, ascending.
    fn window(&self, x0: f32, x1: f32) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect(0, self.entries.len(), x0, x1, &mut out);
        out
    }

    fn collect(&self, lo: usize, hi: usize, x0: f32, x1: f32, out: &mut Vec<usize>) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        if self.max_right[mid] < x0 {
            return;
        }
        self.collect(lo, mid, x0, x1, out);

        let bbox = &self.entries[mid].bbox;
        if bbox.x() > x1 {
            // Everything to the right starts even later.
            return;
        }
        if bbox.right() >= x0 {
            out.push(mid);
        }
        self.collect(mid + 1, hi, x0, x1, out);
    }
}

fn fill_max_right(entries: &[SpatialEntry], max_right: &mut [f32], lo: usize, hi: usize) -> f32 {
    if lo >= hi {
        return f32::NEG_INFINITY;
    }
    let mid = lo + (hi - lo) / 2;
    let left = fill_max_right(entries, max_right, lo, mid);
    let right = fill_max_right(entries, max_right, mid + 1, hi);
    let m = entries[mid].bbox.right().max(left).max(right);
    max_right[mid] = m;
    m
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
