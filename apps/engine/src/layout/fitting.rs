//! Text Fitting Solver: fits one region's translated text into its original geometry.
//!
//! # Strategy ladder
//! 1. `Unchanged`: the translation is at most `1 + length_ratio_slack` times as wide as
//!    the original, or it already wraps inside the original box.
//! 2. `Reflow`: at full scale and original width the wrapped height stays within
//!    `height × (1 + max_layout_adjustment)`; the box grows in height only.
//! 3. `Shrink`: binary search for the largest `font_scale` in `[min_font_scale, 1.0)` whose
//!    wrapped height fits that budget.
//! 4. `Overflow`: nothing fits even at `min_font_scale`; the text is cut after the last
//!    line that fits and the last kept line is ellipsized.
//!
//! Solving is a pure function of (region, translated text, config). It reads no other
//! region and never mutates shared state, so regions may be solved in any order.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::layout::config::FittingConfig;
use crate::layout::font_metrics::{line_height, rendered_width};
use crate::layout::geometry::BoundingBox;
use crate::layout::wrap::{widest_line, wrap_text};
use crate::models::{TextFormatting, TextRegion, TranslatedText};

pub const ELLIPSIS: char = '…';

/// Float slack for height-budget comparisons.
const HEIGHT_EPSILON: f32 = 1e-4;

// ────────────────────────────────────────────────────────────────────────────
// Result types
// ────────────────────────────────────────────────────────────────────────────

/// Growth (or shrink, when negative) of the box size relative to the original.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxDelta {
    pub width: f32,
    pub height: f32,
}

impl BoxDelta {
    pub fn is_zero(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }
}

/// Position change applied by conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrapPlan {
    pub line_count: usize,
    /// Height of one line in page units at the planned scale.
    pub line_height: f32,
    pub estimated_height: f32,
    /// Widest wrapped line in page units.
    pub effective_width: f32,
    pub lines: Vec<String>,
}

impl WrapPlan {
    /// Wraps `text` at `scale` into lines no wider than `max_width`.
    pub fn compute(text: &str, formatting: &TextFormatting, scale: f32, max_width: f32) -> Self {
        let wrapped = wrap_text(text, formatting, scale, max_width);
        let line_height = line_height(formatting, scale);
        Self {
            line_count: wrapped.len(),
            line_height,
            estimated_height: wrapped.len() as f32 * line_height,
            effective_width: widest_line(&wrapped),
            lines: wrapped.into_iter().map(|l| l.text).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStrategy {
    /// No translation was supplied; the region passes through.
    Untranslated,
    Unchanged,
    Reflow,
    Shrink,
    Overflow,
}

/// A text region with its translation fitted into (adjusted) geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedRegion {
    /// The region as extracted; never modified.
    pub region: TextRegion,
    /// Text to render. Ellipsized when `overflow` is set.
    pub translated_text: Option<String>,
    /// Text cut off by overflow clipping.
    pub clipped_text: Option<String>,
    pub translation_confidence: Option<f32>,
    pub font_scale: f32,
    pub box_delta: BoxDelta,
    pub offset: Offset,
    pub wrap_plan: WrapPlan,
    pub overflow: bool,
    pub strategy: FitStrategy,
    /// Rendered width of the translation over that of the original text.
    pub length_ratio: f32,
}

impl AdjustedRegion {
    /// Pass-through for a region with no translation.
    pub fn untranslated(region: &TextRegion) -> Self {
        let wrap_plan = WrapPlan::compute(
            &region.text_content,
            &region.formatting,
            1.0,
            region.bounding_box.width(),
        );
        Self {
            region: region.clone(),
            translated_text: None,
            clipped_text: None,
            translation_confidence: None,
            font_scale: 1.0,
            box_delta: BoxDelta::default(),
            offset: Offset::default(),
            wrap_plan,
            overflow: false,
            strategy: FitStrategy::Untranslated,
            length_ratio: 1.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.region.id
    }

    pub fn original_box(&self) -> &BoundingBox {
        &self.region.bounding_box
    }

    /// Original position moved by `offset`, original size grown by `box_delta`.
    pub fn final_box(&self) -> BoundingBox {
        let original = &self.region.bounding_box;
        original
            .translated(self.offset.dx, self.offset.dy)
            .with_size(
                original.width() + self.box_delta.width,
                original.height() + self.box_delta.height,
            )
    }

    /// Final area over original area. 1.0 for zero-area originals.
    pub fn area_ratio(&self) -> f32 {
        let original = self.region.bounding_box.area();
        if original <= 0.0 {
            return 1.0;
        }
        self.final_box().area() / original
    }

    /// The text the wrap plan was computed from.
    pub fn layout_text(&self) -> &str {
        self.translated_text
            .as_deref()
            .unwrap_or(&self.region.text_content)
    }

    /// Replaces scale, box and wrap plan with a resolver-chosen geometry.
    pub fn apply_geometry(&mut self, font_scale: f32, bbox: BoundingBox, wrap_plan: WrapPlan) {
        let original = &self.region.bounding_box;
        self.font_scale = font_scale;
        self.box_delta = BoxDelta {
            width: bbox.width() - original.width(),
            height: bbox.height() - original.height(),
        };
        self.offset = Offset {
            dx: bbox.x() - original.x(),
            dy: bbox.y() - original.y(),
        };
        self.wrap_plan = wrap_plan;
    }

    /// The finalized region handed to the format writer.
    pub fn to_text_region(&self) -> TextRegion {
        let mut region = self.region.clone();
        region.bounding_box = self.final_box();
        region.translated_text = self.translated_text.clone();
        region.font_scale = self.font_scale;
        region
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Solver
// ────────────────────────────────────────────────────────────────────────────

/// Fits a translation from the translation collaborator, keeping its confidence.
pub fn fit_translation(
    region: &TextRegion,
    translation: &TranslatedText,
    config: &FittingConfig,
) -> AdjustedRegion {
    let mut adjusted = fit(region, &translation.text, config);
    adjusted.translation_confidence = Some(translation.confidence);
    adjusted
}

/// Computes font scale, box delta and wrap plan for `translated_text` in `region`.
pub fn fit(region: &TextRegion, translated_text: &str, config: &FittingConfig) -> AdjustedRegion {
    let formatting = &region.formatting;
    let bbox = &region.bounding_box;
    let width = bbox.width();
    let height = bbox.height();
    let budget = config.height_budget(height);

    let length_ratio = length_ratio(&region.text_content, translated_text, formatting, width);

    let mut adjusted = AdjustedRegion {
        region: region.clone(),
        translated_text: Some(translated_text.to_string()),
        clipped_text: None,
        translation_confidence: None,
        font_scale: 1.0,
        box_delta: BoxDelta::default(),
        offset: Offset::default(),
        wrap_plan: WrapPlan::compute(translated_text, formatting, 1.0, width),
        overflow: false,
        strategy: FitStrategy::Unchanged,
        length_ratio,
    };

    if length_ratio <= 1.0 + config.length_ratio_slack {
        debug!(region = %region.id, length_ratio, "translation within slack");
        return adjusted;
    }

    // Reflow at full scale. The plan computed above is exactly that.
    let reflow_height = adjusted.wrap_plan.estimated_height;
    if reflow_height <= budget + HEIGHT_EPSILON {
        let growth = (reflow_height - height).max(0.0);
        if growth > 0.0 {
            adjusted.box_delta.height = growth;
            adjusted.strategy = FitStrategy::Reflow;
        }
        debug!(region = %region.id, length_ratio, growth, "reflowed at full scale");
        return adjusted;
    }

    if let Some(scale) = largest_fitting_scale(
        translated_text,
        formatting,
        width,
        budget,
        config.min_font_scale,
        1.0,
        config.scale_tolerance,
    ) {
        let plan = WrapPlan::compute(translated_text, formatting, scale, width);
        adjusted.box_delta.height = (plan.estimated_height - height).max(0.0);
        adjusted.font_scale = scale;
        adjusted.wrap_plan = plan;
        adjusted.strategy = FitStrategy::Shrink;
        debug!(region = %region.id, length_ratio, scale, "shrunk to fit");
        return adjusted;
    }

    overflow(adjusted, translated_text, budget, config)
}

/// Clips the text at `min_font_scale` to the lines that fit `budget`.
fn overflow(
    mut adjusted: AdjustedRegion,
    translated_text: &str,
    budget: f32,
    config: &FittingConfig,
) -> AdjustedRegion {
    let formatting = &adjusted.region.formatting;
    let width = adjusted.region.bounding_box.width();
    let height = adjusted.region.bounding_box.height();
    let scale = config.min_font_scale;

    let full = WrapPlan::compute(translated_text, formatting, scale, width);
    let keep = ((budget + HEIGHT_EPSILON) / full.line_height).floor().max(1.0) as usize;
    let keep = keep.min(full.lines.len());

    let mut kept: Vec<String> = full.lines[..keep].to_vec();
    let mut clipped: Vec<String> = full.lines[keep..].to_vec();

    // A single line taller than the budget is kept whole; only a real cut gets the ellipsis.
    if keep < full.lines.len() {
        if let Some(last) = kept.last_mut() {
            let removed = ellipsize(last, formatting, scale, width);
            if !removed.is_empty() {
                clipped.insert(0, removed);
            }
        }
    }

    let rendered = kept.join("\n");
    let plan = WrapPlan::compute(&rendered, formatting, scale, width);
    warn!(
        region = %adjusted.region.id,
        kept_lines = plan.line_count,
        clipped_lines = clipped.len(),
        "translation overflows region even at minimum scale"
    );

    adjusted.box_delta.height = (plan.estimated_height - height).max(0.0);
    adjusted.font_scale = scale;
    adjusted.wrap_plan = plan;
    adjusted.translated_text = Some(rendered);
    adjusted.clipped_text = (!clipped.is_empty()).then(|| clipped.join("\n"));
    adjusted.overflow = true;
    adjusted.strategy = FitStrategy::Overflow;
    adjusted
}

/// Appends the ellipsis to `line`, dropping trailing characters until it fits `max_width`.
/// Returns the dropped characters.
fn ellipsize(line: &mut String, formatting: &TextFormatting, scale: f32, max_width: f32) -> String {
    let mut removed = Vec::new();
    loop {
        let candidate = format!("{}{ELLIPSIS}", line.trim_end());
        if rendered_width(&candidate, formatting, scale) <= max_width + HEIGHT_EPSILON {
            *line = candidate;
            break;
        }
        match line.pop() {
            Some(c) => removed.push(c),
            None => {
                line.push(ELLIPSIS);
                break;
            }
        }
    }
    removed.iter().rev().collect::<String>().trim().to_string()
}

/// Rendered width of the translation relative to the original text.
///
/// When the original measures zero (empty text) the box width is the reference.
pub fn length_ratio(
    original: &str,
    translated: &str,
    formatting: &TextFormatting,
    box_width: f32,
) -> f32 {
    let translated_w = rendered_width(translated, formatting, 1.0);
    let original_w = rendered_width(original, formatting, 1.0);
    let reference = if original_w > 0.0 {
        original_w
    } else {
        box_width
    };
    if reference <= 0.0 {
        return if translated_w > 0.0 { f32::MAX } else { 1.0 };
    }
    translated_w / reference
}

/// Largest scale in `[min_scale, max_scale]` whose wrap at `width` is at most `max_height`
/// tall, or `None` when even `min_scale` does not fit.
///
/// Binary search stops once the window is narrower than `tolerance`, so the result may
/// undershoot the true maximum by up to `tolerance`.
pub fn largest_fitting_scale(
    text: &str,
    formatting: &TextFormatting,
    width: f32,
    max_height: f32,
    min_scale: f32,
    max_scale: f32,
    tolerance: f32,
) -> Option<f32> {
    let fits = |scale: f32| {
        WrapPlan::compute(text, formatting, scale, width).estimated_height
            <= max_height + HEIGHT_EPSILON
    };

    if max_scale < min_scale {
        return None;
    }
    if fits(max_scale) {
        return Some(max_scale);
    }
    if !fits(min_scale) {
        return None;
    }

    let (mut lo, mut hi) = (min_scale, max_scale);
    while hi - lo > tolerance {
        let mid = (lo + hi) / 2.0;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some(lo)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
