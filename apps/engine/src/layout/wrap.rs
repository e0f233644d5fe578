//! Greedy line-wrap simulation over the font-metric width model.
//!
//! Widths here are page units (em width × em size), so results can be compared directly
//! with bounding-box dimensions.

use serde::{Deserialize, Serialize};

use crate::layout::font_metrics::{em_size, is_wide, metrics_for};
use crate::models::TextFormatting;

/// Float slack for "fits on this line" comparisons.
const WIDTH_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedLine {
    pub text: String,
    /// Rendered width in page units.
    pub width: f32,
}

/// Smallest unit the wrapper will not split unless it is wider than the line.
#[derive(Debug, PartialEq)]
struct Atom<'a> {
    text: &'a str,
    /// A space separates this atom from the previous one.
    space_before: bool,
}

/// Splits a paragraph into atoms: whitespace-separated words, with every East Asian wide
/// character as its own atom so CJK runs can break between characters.
fn atoms(paragraph: &str) -> Vec<Atom<'_>> {
    let mut out = Vec::new();
    for (word_index, word) in paragraph.split_whitespace().enumerate() {
        let mut first_in_word = true;
        let mut run_start: Option<usize> = None;

        for (i, c) in word.char_indices() {
            if is_wide(c) {
                if let Some(start) = run_start.take() {
                    out.push(Atom {
                        text: &word[start..i],
                        space_before: first_in_word && word_index > 0,
                    });
                    first_in_word = false;
                }
                out.push(Atom {
                    text: &word[i..i + c.len_utf8()],
                    space_before: first_in_word && word_index > 0,
                });
                first_in_word = false;
            } else if run_start.is_none() {
                run_start = Some(i);
            }
        }
        if let Some(start) = run_start {
            out.push(Atom {
                text: &word[start..],
                space_before: first_in_word && word_index > 0,
            });
        }
    }
    out
}

#[derive(Default)]
struct LineBuilder {
    text: String,
    width: f32,
}

impl LineBuilder {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn push_str(&mut self, s: &str, width: f32) {
        self.text.push_str(s);
        self.width += width;
    }

    fn finish(&mut self) -> WrappedLine {
        let line = std::mem::take(self);
        WrappedLine {
            text: line.text,
            width: line.width,
        }
    }
}

/// Wraps `text` into lines no wider than `max_width` page units at `scale`.
///
/// Explicit `\n` starts a new paragraph; blank paragraphs produce an empty line. Text that
/// is empty or whitespace-only yields no lines.
pub fn wrap_text(
    text: &str,
    formatting: &TextFormatting,
    scale: f32,
    max_width: f32,
) -> Vec<WrappedLine> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let metrics = metrics_for(formatting);
    let em = em_size(formatting, scale);
    let space_w = metrics.space_width * em;
    let limit = max_width + WIDTH_EPSILON;

    let mut lines = Vec::new();
    let mut current = LineBuilder::default();

    for paragraph in text.split('\n') {
        let paragraph_atoms = atoms(paragraph);
        if paragraph_atoms.is_empty() {
            lines.push(current.finish());
            continue;
        }

        for atom in paragraph_atoms {
            let atom_w = metrics.measure_str(atom.text) * em;
            let sep_w = if atom.space_before && !current.is_empty() {
                space_w
            } else {
                0.0
            };

            if !current.is_empty() && current.width + sep_w + atom_w > limit {
                lines.push(current.finish());
            } else if !current.is_empty() {
                if sep_w > 0.0 {
                    current.push_str(" ", sep_w);
                }
                current.push_str(atom.text, atom_w);
                continue;
            }

            // Fresh line: either the atom fits, or it must be hard-broken.
            if atom_w <= limit {
                current.push_str(atom.text, atom_w);
                continue;
            }
            for c in atom.text.chars() {
                let char_w = metrics.char_width(c) * em;
                if !current.is_empty() && current.width + char_w > limit {
                    lines.push(current.finish());
                }
                let mut buf = [0u8; 4];
                current.push_str(c.encode_utf8(&mut buf), char_w);
            }
        }
        lines.push(current.finish());
    }

    // Trailing blank paragraphs carry no rendered content.
    while lines.last().is_some_and(|l| l.text.is_empty()) {
        lines.pop();
    }
    lines
}

/// Widest line in a wrap result, 0 when empty.
pub fn widest_line(lines: &[WrappedLine]) -> f32 {
    lines.iter().map(|l| l.width).fold(0.0, f32::max)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_courier() -> TextFormatting {
        TextFormatting::new("Courier", 10.0)
    }

    #[test]
    fn test_empty_text_has_no_lines() {
        assert!(wrap_text("", &make_courier(), 1.0, 100.0).is_empty());
        assert!(wrap_text("   \n ", &make_courier(), 1.0, 100.0).is_empty());
    }

    #[test]
    fn test_single_line_fits() {
        // 5 chars * 6 units = 30
        let lines = wrap_text("hello", &make_courier(), 1.0, 100.0);
        assert_eq!(lines.len(), 1);
        assert!((lines[0].width - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_wraps_at_word_boundary() {
        // 60 + 6 + 60 = 126 > 100
        let lines = wrap_text("aaaaaaaaaa bbbbbbbbbb", &make_courier(), 1.0, 100.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "aaaaaaaaaa");
        assert_eq!(lines[1].text, "bbbbbbbbbb");
    }

    #[test]
    fn test_smaller_scale_fits_more_per_line() {
        let lines = wrap_text("aaaaaaaaaa bbbbbbbbbb", &make_courier(), 0.75, 100.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "aaaaaaaaaa bbbbbbbbbb");
    }

    #[test]
    fn test_long_word_is_hard_broken() {
        // 20 chars * 6 = 120 wide, 16 chars per 100-unit line
        let lines = wrap_text("abcdefghijklmnopqrst", &make_courier(), 1.0, 100.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text.chars().count(), 16);
        assert_eq!(lines[1].text, "qrst");
    }

    #[test]
    fn test_cjk_breaks_between_characters() {
        // each ideograph is 10 units; 25 units holds two per line
        let lines = wrap_text("翻訳文書", &make_courier(), 1.0, 25.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "翻訳");
        assert_eq!(lines[1].text, "文書");
    }

    #[test]
    fn test_cjk_after_latin_has_no_space() {
        let found = atoms("PDF翻訳 done");
        assert_eq!(
            found,
            vec![
                Atom { text: "PDF", space_before: false },
                Atom { text: "翻", space_before: false },
                Atom { text: "訳", space_before: false },
                Atom { text: "done", space_before: true },
            ]
        );
    }

    #[test]
    fn test_explicit_newline_starts_new_line() {
        let lines = wrap_text("one\n\ntwo", &make_courier(), 1.0, 100.0);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "", "two"]);
    }

    #[test]
    fn test_widest_line() {
        let lines = wrap_text("aaaaaaaaaa bb", &make_courier(), 1.0, 70.0);
        assert!((widest_line(&lines) - 60.0).abs() < 1e-3);
    }
}
