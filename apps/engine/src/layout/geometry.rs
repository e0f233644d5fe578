//! Spatial model primitives: axis-aligned page-local rectangles.
//!
//! `BoundingBox` is an immutable value type. The only public way to obtain one is the
//! validating constructor (or deserialization, which routes through it), so every box in
//! the engine has finite coordinates and non-negative size. Derived boxes produced by the
//! arithmetic helpers below preserve that property.

use serde::{Deserialize, Serialize};

use crate::errors::GeometryError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = GeometryError;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        BoundingBox::new(raw.x, raw.y, raw.width, raw.height)
    }
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Result<Self, GeometryError> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return Err(GeometryError::NonFinite);
        }
        if width < 0.0 || height < 0.0 {
            return Err(GeometryError::NegativeSize { width, height });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Internal constructor for boxes derived from already-valid boxes.
    fn derived(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Length of the shared x-range (0 when disjoint).
    pub fn x_overlap(&self, other: &BoundingBox) -> f32 {
        (self.right().min(other.right()) - self.x.max(other.x)).max(0.0)
    }

    /// Length of the shared y-range (0 when disjoint).
    pub fn y_overlap(&self, other: &BoundingBox) -> f32 {
        (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0)
    }

    /// The shared rectangle, or `None` when the boxes only touch or are disjoint.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self::derived(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        self.x_overlap(other) * self.y_overlap(other)
    }

    /// Intersection area as a fraction of the smaller box's area.
    pub fn overlap_fraction(&self, other: &BoundingBox) -> f32 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / smaller
    }

    /// True when the intersection exceeds `epsilon` of the smaller box's area.
    pub fn overlaps(&self, other: &BoundingBox, epsilon: f32) -> bool {
        let inter = self.intersection_area(other);
        inter > 0.0 && inter > epsilon * self.area().min(other.area())
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.contains_within(other, 0.0)
    }

    /// Containment test allowing `other` to stick out by up to `tolerance` on any side.
    pub fn contains_within(&self, other: &BoundingBox, tolerance: f32) -> bool {
        other.x >= self.x - tolerance
            && other.y >= self.y - tolerance
            && other.right() <= self.right() + tolerance
            && other.bottom() <= self.bottom() + tolerance
    }

    /// Euclidean gap between the two boxes (0 when they touch or overlap).
    pub fn gap(&self, other: &BoundingBox) -> f32 {
        let dx = (other.x - self.right()).max(self.x - other.right()).max(0.0);
        let dy = (other.y - self.bottom()).max(self.y - other.bottom()).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn translated(&self, dx: f32, dy: f32) -> BoundingBox {
        Self::derived(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn with_size(&self, width: f32, height: f32) -> BoundingBox {
        Self::derived(self.x, self.y, width, height)
    }

    /// Grows the box by `dx` on the left and right and `dy` on the top and bottom.
    pub fn expanded(&self, dx: f32, dy: f32) -> BoundingBox {
        Self::derived(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    /// Clips the box to `bounds`. A box entirely outside collapses to zero size on the edge.
    pub fn clamped_within(&self, bounds: &BoundingBox) -> BoundingBox {
        let x0 = self.x.clamp(bounds.x, bounds.right());
        let y0 = self.y.clamp(bounds.y, bounds.bottom());
        let x1 = self.right().clamp(bounds.x, bounds.right());
        let y1 = self.bottom().clamp(bounds.y, bounds.bottom());
        Self::derived(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Self::derived(x0, y0, x1 - x0, y1 - y0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox::new(x, y, w, h).unwrap()
    }

    #[test]
    fn test_new_rejects_negative_size() {
        assert!(matches!(
            BoundingBox::new(0.0, 0.0, -1.0, 5.0),
            Err(GeometryError::NegativeSize { .. })
        ));
    }

    #[test]
    fn test_new_rejects_non_finite() {
        assert_eq!(
            BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0),
            Err(GeometryError::NonFinite)
        );
        assert_eq!(
            BoundingBox::new(0.0, 0.0, f32::INFINITY, 1.0),
            Err(GeometryError::NonFinite)
        );
    }

    #[test]
    fn test_deserialize_routes_through_validation() {
        let ok: Result<BoundingBox, _> =
            serde_json::from_str(r#"{"x":1,"y":2,"width":3,"height":4}"#);
        assert_eq!(ok.unwrap(), bbox(1.0, 2.0, 3.0, 4.0));

        let bad: Result<BoundingBox, _> =
            serde_json::from_str(r#"{"x":1,"y":2,"width":-3,"height":4}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_intersection_area() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 5.0, 10.0, 10.0);
        assert!((a.intersection_area(&b) - 25.0).abs() < 1e-4);
        let inter = a.intersection(&b).unwrap();
        assert_eq!(inter, bbox(5.0, 5.0, 5.0, 5.0));
    }

    #[test]
    fn test_touching_boxes_do_not_overlap() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(10.0, 0.0, 10.0, 10.0);
        assert!(a.intersection(&b).is_none());
        assert!(!a.overlaps(&b, 0.0));
        assert_eq!(a.gap(&b), 0.0);
    }

    #[test]
    fn test_overlap_epsilon_uses_smaller_area() {
        let big = bbox(0.0, 0.0, 100.0, 100.0);
        // 1x10 sliver inside a 10x10 box: 10% of the smaller box.
        let small = bbox(99.0, 0.0, 10.0, 10.0);
        assert!((big.overlap_fraction(&small) - 0.1).abs() < 1e-4);
        assert!(big.overlaps(&small, 0.05));
        assert!(!big.overlaps(&small, 0.2));
    }

    #[test]
    fn test_contains_within_tolerance() {
        let page = bbox(0.0, 0.0, 100.0, 100.0);
        assert!(page.contains(&bbox(10.0, 10.0, 20.0, 20.0)));
        assert!(!page.contains(&bbox(90.0, 90.0, 10.4, 10.0)));
        assert!(page.contains_within(&bbox(90.0, 90.0, 10.4, 10.0), 0.5));
    }

    #[test]
    fn test_gap_diagonal() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(13.0, 14.0, 5.0, 5.0);
        assert!((a.gap(&b) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_expanded_and_clamped() {
        let page = bbox(0.0, 0.0, 100.0, 100.0);
        let grown = bbox(0.0, 0.0, 100.0, 20.0).expanded(10.0, 2.0);
        assert_eq!(grown, bbox(-10.0, -2.0, 120.0, 24.0));
        assert_eq!(grown.clamped_within(&page), bbox(0.0, 0.0, 100.0, 22.0));
    }

    #[test]
    fn test_with_size_never_negative() {
        let b = bbox(5.0, 5.0, 10.0, 10.0).with_size(-3.0, 4.0);
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 4.0);
    }

    #[test]
    fn test_union() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 5.0, 10.0, 10.0);
        assert_eq!(a.union(&b), bbox(0.0, 0.0, 30.0, 15.0));
    }
}
