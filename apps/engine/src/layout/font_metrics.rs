//! Static font-metric tables used to estimate rendered text width.
//!
//! Character widths are in em units (relative to font size). This is an intentional
//! approximation: real renderers use the embedded font's glyph advances, kerning and
//! shaping, while these tables only distinguish three font classes. The error is within a
//! few percent for Latin text, which is absorbed by `length_ratio_slack` and the layout
//! adjustment budget. Fitting thresholds and test expectations are all derived from this
//! one model, so it must stay consistent rather than precise.
//!
//! Tables cover ASCII 0x20..=0x7E (95 printable characters), index = (char as usize) - 32.
//! East Asian wide characters measure 1.0 em. Any other character falls back to the
//! table's `average_char_width`. Bold text is widened by `BOLD_WIDTH_FACTOR`.

use serde::{Deserialize, Serialize};

use crate::models::TextFormatting;

const BOLD_WIDTH_FACTOR: f32 = 1.05;
const WIDE_CHAR_WIDTH: f32 = 1.0;

// ────────────────────────────────────────────────────────────────────────────
// Font class
// ────────────────────────────────────────────────────────────────────────────

/// Width class a font family is measured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontClass {
    /// Helvetica / Arial metrics. Also the fallback for unknown families.
    SansSerif,
    /// Times metrics.
    Serif,
    /// Courier metrics (uniform 0.6 em).
    Monospace,
}

impl FontClass {
    /// Classifies a font family name by case-insensitive keywords.
    pub fn classify(family: &str) -> FontClass {
        let name = family.to_ascii_lowercase();
        const MONO: [&str; 6] = ["mono", "courier", "consol", "code", "menlo", "typewriter"];
        const SERIF: [&str; 10] = [
            "times", "serif", "garamond", "georgia", "roman", "cambria", "minion", "palatino",
            "mincho", "song",
        ];

        if MONO.iter().any(|k| name.contains(k)) {
            FontClass::Monospace
        } else if name.contains("sans") || name.contains("gothic") {
            FontClass::SansSerif
        } else if SERIF.iter().any(|k| name.contains(k)) {
            FontClass::Serif
        } else {
            FontClass::SansSerif
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Static character-width table for a font class.
///
/// Width array slot layout:
/// ```text
/// [0]=sp  [1]=!   [2]="   [3]=#   [4]=$   [5]=%   [6]=&   [7]='
/// [8]=(   [9]=)   [10]=*  [11]=+  [12]=,  [13]=-  [14]=.  [15]=/
/// [16..25]=0-9
/// [26]=:  [27]=;  [28]=<  [29]==  [30]=>  [31]=?  [32]=@
/// [33..58]=A-Z
/// [59]=[  [60]=\  [61]=]  [62]=^  [63]=_  [64]=`
/// [65..90]=a-z
/// [91]={  [92]=|  [93]=}  [94]=~
/// ```
pub struct FontMetricTable {
    pub class: FontClass,
    widths: [f32; 95],
    /// Fallback width for non-ASCII characters that are not East Asian wide.
    pub average_char_width: f32,
    pub space_width: f32,
}

impl FontMetricTable {
    pub fn char_width(&self, c: char) -> f32 {
        let code = c as usize;
        if (32..=126).contains(&code) {
            self.widths[code - 32]
        } else if is_wide(c) {
            WIDE_CHAR_WIDTH
        } else if c.is_whitespace() {
            self.space_width
        } else {
            self.average_char_width
        }
    }

    /// Measures the width of a string in em units.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars().map(|c| self.char_width(c)).sum()
    }
}

/// True for characters that occupy a full em and may break a line anywhere
/// (CJK ideographs, kana, hangul, fullwidth forms).
pub fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x20000..=0x3FFFD
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Static width tables  (95 ASCII printable characters each)
// ────────────────────────────────────────────────────────────────────────────

/// Helvetica / Arial.
static SANS_SERIF_TABLE: FontMetricTable = FontMetricTable {
    class: FontClass::SansSerif,
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.28, 0.28, 0.36, 0.56, 0.56, 0.89, 0.67, 0.19, 0.33, 0.33, 0.39, 0.58, 0.28, 0.33, 0.28, 0.28,
        // 0     1     2     3     4     5     6     7     8     9
        0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56,
        // :     ;     <     =     >     ?     @
        0.28, 0.28, 0.58, 0.58, 0.58, 0.56, 1.02,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.67, 0.67, 0.72, 0.72, 0.67, 0.61, 0.78, 0.72, 0.28, 0.50, 0.67, 0.56, 0.83,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.72, 0.78, 0.67, 0.78, 0.72, 0.67, 0.61, 0.72, 0.67, 0.94, 0.67, 0.67, 0.61,
        // [     \     ]     ^     _     `
        0.28, 0.28, 0.28, 0.47, 0.56, 0.33,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.56, 0.56, 0.50, 0.56, 0.56, 0.28, 0.56, 0.56, 0.22, 0.22, 0.50, 0.22, 0.83,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.56, 0.56, 0.56, 0.56, 0.33, 0.50, 0.28, 0.56, 0.50, 0.72, 0.50, 0.50, 0.50,
        // {     |     }     ~
        0.33, 0.26, 0.33, 0.58,
    ],
    average_char_width: 0.55,
    space_width: 0.28,
};

/// Times Roman.
static SERIF_TABLE: FontMetricTable = FontMetricTable {
    class: FontClass::Serif,
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.25, 0.33, 0.41, 0.50, 0.50, 0.83, 0.78, 0.18, 0.33, 0.33, 0.50, 0.56, 0.25, 0.33, 0.25, 0.28,
        // 0     1     2     3     4     5     6     7     8     9
        0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50,
        // :     ;     <     =     >     ?     @
        0.28, 0.28, 0.56, 0.56, 0.56, 0.44, 0.92,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.72, 0.67, 0.67, 0.72, 0.61, 0.56, 0.72, 0.72, 0.33, 0.39, 0.72, 0.61, 0.89,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.72, 0.72, 0.56, 0.72, 0.67, 0.56, 0.61, 0.72, 0.72, 0.94, 0.72, 0.72, 0.61,
        // [     \     ]     ^     _     `
        0.33, 0.28, 0.33, 0.47, 0.50, 0.33,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.44, 0.50, 0.44, 0.50, 0.44, 0.33, 0.50, 0.50, 0.28, 0.28, 0.50, 0.28, 0.78,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.50, 0.50, 0.50, 0.50, 0.33, 0.39, 0.28, 0.50, 0.50, 0.72, 0.50, 0.50, 0.44,
        // {     |     }     ~
        0.48, 0.20, 0.48, 0.54,
    ],
    average_char_width: 0.48,
    space_width: 0.25,
};

/// Courier. Every glyph advances 0.6 em.
static MONOSPACE_TABLE: FontMetricTable = FontMetricTable {
    class: FontClass::Monospace,
    widths: [0.60; 95],
    average_char_width: 0.60,
    space_width: 0.60,
};

/// Returns the static metric table for a font class.
pub fn get_metrics(class: FontClass) -> &'static FontMetricTable {
    match class {
        FontClass::SansSerif => &SANS_SERIF_TABLE,
        FontClass::Serif => &SERIF_TABLE,
        FontClass::Monospace => &MONOSPACE_TABLE,
    }
}

pub fn metrics_for(formatting: &TextFormatting) -> &'static FontMetricTable {
    get_metrics(FontClass::classify(&formatting.font_family))
}

/// Page units per em at the given scale, including the bold widening.
pub fn em_size(formatting: &TextFormatting, scale: f32) -> f32 {
    let weight = if formatting.is_bold {
        BOLD_WIDTH_FACTOR
    } else {
        1.0
    };
    formatting.font_size * scale * weight
}

/// Estimated single-line width of `text` in page units.
pub fn rendered_width(text: &str, formatting: &TextFormatting, scale: f32) -> f32 {
    metrics_for(formatting).measure_str(text) * em_size(formatting, scale)
}

/// Height of one line in page units.
pub fn line_height(formatting: &TextFormatting, scale: f32) -> f32 {
    formatting.font_size * scale * formatting.line_spacing
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
