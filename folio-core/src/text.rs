//! Line / word / character geometry extracted from document text.
//!
//! Every node carries two rectangles: `native` in PDF units with a top-left
//! origin, and `view` in page-slot pixels at zoom 1 (the page's cross-axis
//! centering offset included). View rectangles are recomputed by
//! [`TextGeometryModel::relayout`] whenever page sizes change.

use tracing::warn;

use crate::engine::RawPageText;
use crate::error::ViewerError;
use crate::geometry::{PointF, RectF, SizeF};
use crate::layout::DocumentLayout;

/// Fraction of a glyph's height added above and below it for hit testing.
const CHAR_PADDING_RATIO: f32 = 0.40;

#[derive(Debug, Clone, PartialEq)]
pub struct TextChar {
    pub id: u64,
    pub line_id: u64,
    pub word_id: u64,
    /// Pagination index of the owning page.
    pub page: usize,
    pub ch: char,
    pub native: RectF,
    pub view: RectF,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextWord {
    pub id: u64,
    pub line_id: u64,
    pub text: String,
    pub native: RectF,
    pub view: RectF,
    pub chars: Vec<TextChar>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub id: u64,
    pub text: String,
    pub native: RectF,
    pub view: RectF,
    pub words: Vec<TextWord>,
}

impl TextLine {
    pub fn chars(&self) -> impl Iterator<Item = &TextChar> {
        self.words.iter().flat_map(|word| word.chars.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub native_size: SizeF,
    pub lines: Vec<TextLine>,
}

impl PageText {
    pub fn chars(&self) -> impl Iterator<Item = &TextChar> {
        self.lines.iter().flat_map(|line| line.chars())
    }

    /// First word whose view rectangle contains `point`.
    pub fn word_at(&self, point: PointF) -> Option<&TextWord> {
        self.lines
            .iter()
            .flat_map(|line| line.words.iter())
            .find(|word| word.view.contains(point))
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn apply_ratio(&mut self, view_size: SizeF, offset: PointF) {
        if self.native_size.is_empty() {
            return;
        }
        let x_ratio = view_size.width / self.native_size.width;
        let y_ratio = view_size.height / self.native_size.height;
        let map = |rect: &RectF| RectF {
            left: rect.left * x_ratio + offset.x,
            top: rect.top * y_ratio + offset.y,
            right: rect.right * x_ratio + offset.x,
            bottom: rect.bottom * y_ratio + offset.y,
        };
        for line in &mut self.lines {
            line.view = map(&line.native);
            for word in &mut line.words {
                word.view = map(&word.native);
                for ch in &mut word.chars {
                    ch.view = map(&ch.native);
                }
            }
        }
    }
}

/// Text geometry for every page of the layout, indexed like the layout.
#[derive(Debug, Default)]
pub struct TextGeometryModel {
    pages: Vec<Option<PageText>>,
    next_line_id: u64,
    next_word_id: u64,
    next_char_id: u64,
}

impl TextGeometryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, page: usize) -> Option<&PageText> {
        self.pages.get(page).and_then(Option::as_ref)
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Builds geometry for a chunk's pages. Pages whose extraction failed keep
    /// no geometry and are logged.
    pub fn build_chunk(
        &mut self,
        pagination_start: usize,
        pages: Vec<Result<RawPageText, ViewerError>>,
    ) -> Vec<Option<PageText>> {
        pages
            .into_iter()
            .enumerate()
            .map(|(index, raw)| match raw {
                Ok(raw) => Some(self.build_page(pagination_start + index, raw)),
                Err(err) => {
                    warn!(page = pagination_start + index, %err, "page has no selectable text");
                    None
                }
            })
            .collect()
    }

    pub fn prepend(&mut self, mut pages: Vec<Option<PageText>>) {
        pages.append(&mut self.pages);
        self.pages = pages;
    }

    pub fn append(&mut self, pages: Vec<Option<PageText>>) {
        self.pages.extend(pages);
    }

    pub fn build_page(&mut self, pagination: usize, raw: RawPageText) -> PageText {
        let mut lines = Vec::new();
        for raw_line in raw.lines {
            let line_text: String = raw_line.chars.iter().map(|c| c.ch).collect();
            if line_text.trim().is_empty() {
                continue;
            }
            self.next_line_id += 1;
            let line_id = self.next_line_id;

            let mut words = Vec::new();
            let mut pending: Vec<TextChar> = Vec::new();
            let mut word_text = String::new();
            for raw_char in raw_line.chars {
                let padding = raw_char.bounds.height() * CHAR_PADDING_RATIO;
                let native = RectF::new(
                    raw_char.bounds.left,
                    raw_char.bounds.top - padding,
                    raw_char.bounds.right,
                    raw_char.bounds.bottom + padding,
                );
                pending.push(TextChar {
                    id: self.next_char_id,
                    line_id,
                    word_id: self.next_word_id,
                    page: pagination,
                    ch: raw_char.ch,
                    native,
                    view: native,
                });
                self.next_char_id += 1;
                word_text.push(raw_char.ch);
                if raw_char.ch.is_whitespace() {
                    words.push(self.finish_word(line_id, &mut word_text, &mut pending));
                }
            }
            if !pending.is_empty() {
                words.push(self.finish_word(line_id, &mut word_text, &mut pending));
            }

            let native = words
                .iter()
                .map(|word| word.native)
                .reduce(|acc, rect| acc.union(&rect))
                .unwrap_or_default();
            lines.push(TextLine {
                id: line_id,
                text: line_text,
                native,
                view: native,
                words,
            });
        }
        PageText {
            native_size: raw.size,
            lines,
        }
    }

    fn finish_word(
        &mut self,
        line_id: u64,
        text: &mut String,
        chars: &mut Vec<TextChar>,
    ) -> TextWord {
        let chars = std::mem::take(chars);
        let native = chars
            .iter()
            .map(|ch| ch.native)
            .reduce(|acc, rect| acc.union(&rect))
            .unwrap_or_default();
        let word = TextWord {
            id: self.next_word_id,
            line_id,
            text: std::mem::take(text),
            native,
            view: native,
            chars,
        };
        self.next_word_id += 1;
        word
    }

    /// Recomputes every page's view rectangles from the layout's page sizes.
    pub fn relayout(&mut self, layout: &DocumentLayout) {
        let vertical = layout.is_vertical();
        for (index, page) in self.pages.iter_mut().enumerate() {
            let Some(page) = page else {
                continue;
            };
            let size = layout.page_size(index);
            let cross = layout.secondary_page_offset(index, 1.0).max(0.0);
            let offset = if vertical {
                PointF::new(cross, 0.0)
            } else {
                PointF::new(0.0, cross)
            };
            page.apply_ratio(size, offset);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Orientation;
    use crate::engine::{DocumentHandle, RawChar, RawLine};
    use crate::layout::{ChunkPages, FitPolicy, LayoutOptions};

    /// One line of ten-unit wide glyphs starting at `x`, `top`.
    pub(crate) fn raw_line(text: &str, x: f32, top: f32) -> RawLine {
        RawLine {
            chars: text
                .chars()
                .enumerate()
                .map(|(i, ch)| RawChar {
                    ch,
                    bounds: RectF::new(
                        x + i as f32 * 10.0,
                        top,
                        x + i as f32 * 10.0 + 8.0,
                        top + 10.0,
                    ),
                })
                .collect(),
        }
    }

    #[test]
    fn words_split_on_blank_characters() {
        let mut model = TextGeometryModel::new();
        let page = model.build_page(
            3,
            RawPageText {
                size: SizeF::new(200.0, 100.0),
                lines: vec![raw_line("ab cd", 0.0, 10.0)],
            },
        );
        let line = &page.lines[0];
        assert_eq!(line.words.len(), 2);
        assert_eq!(line.words[0].text, "ab ");
        assert_eq!(line.words[1].text, "cd");
        assert!(line.chars().all(|ch| ch.page == 3 && ch.line_id == line.id));
        assert_eq!(line.native.left, 0.0);
        assert_eq!(line.native.right, 48.0);
    }

    #[test]
    fn chars_are_padded_vertically() {
        let mut model = TextGeometryModel::new();
        let page = model.build_page(
            0,
            RawPageText {
                size: SizeF::new(100.0, 100.0),
                lines: vec![raw_line("x", 0.0, 20.0)],
            },
        );
        let ch = page.chars().next().unwrap();
        assert_eq!(ch.native.top, 16.0);
        assert_eq!(ch.native.bottom, 34.0);
    }

    #[test]
    fn ids_keep_increasing_across_pages() {
        let mut model = TextGeometryModel::new();
        let pages = model.build_chunk(
            0,
            vec![
                Ok(RawPageText {
                    size: SizeF::new(100.0, 100.0),
                    lines: vec![raw_line("a b", 0.0, 0.0)],
                }),
                Err(ViewerError::text_extraction(1, "broken stream")),
                Ok(RawPageText {
                    size: SizeF::new(100.0, 100.0),
                    lines: vec![raw_line("c", 0.0, 0.0), raw_line("   ", 0.0, 20.0)],
                }),
            ],
        );
        assert!(pages[1].is_none());
        let first = pages[0].as_ref().unwrap();
        let last = pages[2].as_ref().unwrap();
        assert_eq!(last.lines.len(), 1);
        let max_first = first.chars().map(|c| c.id).max().unwrap();
        assert!(last.chars().all(|c| c.id > max_first));
        assert!(last.lines[0].id > first.lines[0].id);
    }

    #[test]
    fn relayout_scales_and_centers_narrow_pages() {
        let layout = DocumentLayout::new(
            LayoutOptions {
                fit_policy: FitPolicy::Width,
                fit_each_page: false,
                orientation: Orientation::Vertical,
                spacing: 0.0,
                auto_spacing: false,
            },
            SizeF::new(400.0, 800.0),
            ChunkPages {
                doc: DocumentHandle(1),
                pagination_start: 0,
                sizes: vec![SizeF::new(200.0, 200.0), SizeF::new(100.0, 100.0)],
            },
        );
        let mut model = TextGeometryModel::new();
        let pages = model.build_chunk(
            0,
            vec![
                Ok(RawPageText {
                    size: SizeF::new(200.0, 200.0),
                    lines: vec![raw_line("a", 10.0, 10.0)],
                }),
                Ok(RawPageText {
                    size: SizeF::new(100.0, 100.0),
                    lines: vec![raw_line("b", 10.0, 10.0)],
                }),
            ],
        );
        model.append(pages);
        model.relayout(&layout);

        let a = model.page(0).unwrap().chars().next().unwrap();
        assert_eq!(a.view.left, 20.0);
        let b = model.page(1).unwrap().chars().next().unwrap();
        // page 1 is 200 wide inside a 400 wide column
        assert_eq!(b.view.left, 10.0 * 2.0 + 100.0);
    }

    #[test]
    fn word_lookup_uses_view_rects() {
        let mut model = TextGeometryModel::new();
        let page = model.build_page(
            0,
            RawPageText {
                size: SizeF::new(100.0, 100.0),
                lines: vec![raw_line("hi yo", 0.0, 0.0)],
            },
        );
        assert_eq!(
            page.word_at(PointF::new(35.0, 5.0)).map(|w| w.text.as_str()),
            Some("yo")
        );
        assert!(page.word_at(PointF::new(90.0, 5.0)).is_none());
    }
}
