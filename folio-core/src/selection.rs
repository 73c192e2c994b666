use std::collections::HashSet;

use tracing::debug;

use crate::geometry::{circles_collide, PointF, RectF};
use crate::layout::DocumentLayout;
use crate::text::{PageText, TextChar, TextGeometryModel, TextLine};

/// Coordinate space a range is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSpace {
    /// Page-slot pixels at zoom 1; characters are matched by their left edge.
    View,
    /// PDF units, top-left origin; characters are matched by their horizontal center.
    Native,
}

impl CoordSpace {
    fn line_rect(self, line: &TextLine) -> RectF {
        match self {
            CoordSpace::View => line.view,
            CoordSpace::Native => line.native,
        }
    }

    fn char_x(self, ch: &TextChar) -> f32 {
        match self {
            CoordSpace::View => ch.view.left,
            CoordSpace::Native => ch.native.center_x(),
        }
    }
}

/// Contiguous characters of one line plus the rectangle covering them.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSegment {
    pub line_id: u64,
    pub chars: Vec<TextChar>,
    pub rect: RectF,
}

impl DrawSegment {
    fn new(line_id: u64, chars: Vec<TextChar>) -> Option<Self> {
        let rect = chars
            .iter()
            .map(|ch| ch.view)
            .reduce(|acc, rect| acc.union(&rect))?;
        Some(Self {
            line_id,
            chars,
            rect,
        })
    }

    pub fn text(&self) -> String {
        self.chars.iter().map(|ch| ch.ch).collect()
    }

    /// Rebuilds the segment from `page` after its view rectangles moved.
    fn refreshed(&self, page: &PageText) -> Option<Self> {
        let ids: HashSet<u64> = self.chars.iter().map(|ch| ch.id).collect();
        let chars: Vec<TextChar> = page
            .chars()
            .filter(|ch| ids.contains(&ch.id))
            .cloned()
            .collect();
        DrawSegment::new(self.line_id, chars)
    }
}

/// Resolves the characters between `start` and `end` on one page.
///
/// Lines fully between the points contribute every character; the line
/// holding `start` keeps characters right of it, the line holding `end`
/// keeps characters left of it, and a line holding both keeps the span.
pub fn resolve_range(
    page: &PageText,
    start: PointF,
    end: PointF,
    space: CoordSpace,
) -> Vec<DrawSegment> {
    let mut segments = Vec::new();
    for line in &page.lines {
        let rect = space.line_rect(line);
        if rect.bottom < start.y || rect.top > end.y {
            continue;
        }
        let start_inside = start.y >= rect.top && start.y <= rect.bottom;
        let end_inside = end.y >= rect.top && end.y <= rect.bottom;
        let chars: Vec<TextChar> = line
            .chars()
            .filter(|ch| {
                let x = space.char_x(ch);
                match (start_inside, end_inside) {
                    (true, true) => x >= start.x && x <= end.x,
                    (true, false) => x >= start.x,
                    (false, true) => x <= end.x,
                    (false, false) => true,
                }
            })
            .cloned()
            .collect();
        if let Some(segment) = DrawSegment::new(line.id, chars) {
            segments.push(segment);
        }
    }
    segments
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRange {
    /// Layout page index the range currently lives on.
    pub page: usize,
    pub pagination: usize,
    pub segments: Vec<DrawSegment>,
}

impl SelectionRange {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(DrawSegment::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn first_char(&self) -> Option<&TextChar> {
        self.segments.first().and_then(|segment| segment.chars.first())
    }

    fn last_char(&self) -> Option<&TextChar> {
        self.segments.last().and_then(|segment| segment.chars.last())
    }

    /// Start and end anchors in PDF user space (bottom-left origin), suitable
    /// for persisting an annotation over this range.
    pub fn native_anchors(&self, page_height: f32) -> Option<(PointF, PointF)> {
        let first = self.first_char()?;
        let last = self.last_char()?;
        Some((
            PointF::new(first.native.left, page_height - first.native.center_y()),
            PointF::new(last.native.right, page_height - last.native.center_y()),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchState {
    #[default]
    Idle,
    StartHandle,
    EndHandle,
}

#[derive(Debug)]
pub struct SelectionEngine {
    handle_radius: f32,
    touch: TouchState,
    range: Option<SelectionRange>,
    start_point: PointF,
    end_point: PointF,
    start_char_height: f32,
    end_char_height: f32,
}

impl SelectionEngine {
    pub fn new(handle_radius: f32) -> Self {
        Self {
            handle_radius,
            touch: TouchState::Idle,
            range: None,
            start_point: PointF::default(),
            end_point: PointF::default(),
            start_char_height: 0.0,
            end_char_height: 0.0,
        }
    }

    pub fn range(&self) -> Option<&SelectionRange> {
        self.range.as_ref()
    }

    pub fn has_selection(&self) -> bool {
        self.range.as_ref().is_some_and(|range| !range.is_empty())
    }

    pub fn touch_state(&self) -> TouchState {
        self.touch
    }

    pub fn handle_radius(&self) -> f32 {
        self.handle_radius
    }

    pub fn selected_text(&self) -> Option<String> {
        self.range.as_ref().map(SelectionRange::text)
    }

    pub fn clear(&mut self) {
        self.range = None;
        self.touch = TouchState::Idle;
        self.start_point = PointF::default();
        self.end_point = PointF::default();
    }

    /// Selects the word under `point` (page-local view coordinates).
    pub fn select_word(
        &mut self,
        page: usize,
        pagination: usize,
        text: &PageText,
        point: PointF,
    ) -> bool {
        self.clear();
        let Some(word) = text.word_at(point) else {
            return false;
        };
        let Some(segment) = DrawSegment::new(word.line_id, word.chars.clone()) else {
            return false;
        };
        self.set_range(SelectionRange {
            page,
            pagination,
            segments: vec![segment],
        });
        true
    }

    fn set_range(&mut self, range: SelectionRange) {
        if let Some(first) = range.first_char() {
            self.start_point = PointF::new(first.view.left, first.view.center_y());
            self.start_char_height = first.view.height();
        }
        if let Some(last) = range.last_char() {
            self.end_point = PointF::new(last.view.left, last.view.center_y());
            self.end_char_height = last.view.height();
        }
        self.range = Some(range);
    }

    /// Handle centers in page-local view coordinates, hanging below the text.
    pub fn handle_positions(&self) -> Option<(PointF, PointF)> {
        let range = self.range.as_ref()?;
        let first = range.first_char()?;
        let last = range.last_char()?;
        Some((
            PointF::new(first.view.left, first.view.bottom + self.handle_radius),
            PointF::new(last.view.right, last.view.bottom + self.handle_radius),
        ))
    }

    /// Starts a handle drag if `point` hits a handle. Returns whether the
    /// pointer stream now belongs to the selection.
    pub fn press(&mut self, point: PointF) -> bool {
        let Some((start, end)) = self.handle_positions() else {
            return false;
        };
        let r = self.handle_radius;
        self.touch = if circles_collide(point, r, start, r) {
            TouchState::StartHandle
        } else if circles_collide(point, r, end, r) {
            TouchState::EndHandle
        } else {
            TouchState::Idle
        };
        self.touch != TouchState::Idle
    }

    /// Moves the pressed handle to `point`. Returns whether the drag is consumed.
    pub fn drag(&mut self, point: PointF, text: &PageText) -> bool {
        if self.touch == TouchState::Idle {
            return false;
        }
        let target = PointF::new(point.x, point.y - self.handle_radius * 2.0);
        let (mut start, mut end) = match self.touch {
            TouchState::StartHandle => (target, self.end_point),
            TouchState::EndHandle => (self.start_point, target),
            TouchState::Idle => return false,
        };
        if self.rearrange(start, end) {
            std::mem::swap(&mut start, &mut end);
        }
        let Some(current) = self.range.as_ref() else {
            return true;
        };
        let segments = resolve_range(text, start, end, CoordSpace::View);
        if !segments.is_empty() {
            let range = SelectionRange {
                page: current.page,
                pagination: current.pagination,
                segments,
            };
            self.set_range(range);
        }
        true
    }

    pub fn release(&mut self, point: PointF, text: &PageText) -> bool {
        if self.touch == TouchState::Idle {
            return false;
        }
        self.drag(point, text);
        self.touch = TouchState::Idle;
        true
    }

    /// Swaps handle roles once the dragged handle crosses the other one.
    fn rearrange(&mut self, start: PointF, end: PointF) -> bool {
        match self.touch {
            TouchState::StartHandle => {
                let half = self.end_char_height / 2.0;
                let below = start.y > end.y + half;
                let same_line_past = (start.y - end.y).abs() <= half && start.x > end.x;
                if below || same_line_past {
                    debug!("start handle crossed end handle");
                    self.touch = TouchState::EndHandle;
                    return true;
                }
            }
            TouchState::EndHandle => {
                let half = self.start_char_height / 2.0;
                let above = end.y < start.y - half;
                let same_line_past = (end.y - start.y).abs() <= half && start.x > end.x;
                if above || same_line_past {
                    debug!("end handle crossed start handle");
                    self.touch = TouchState::StartHandle;
                    return true;
                }
            }
            TouchState::Idle => {}
        }
        false
    }

    /// Re-derives the selection page from its pagination index and refreshes
    /// its rectangles. Clears the selection if its page left the layout.
    pub fn rederive(&mut self, layout: &DocumentLayout, text: &TextGeometryModel) {
        let Some(range) = self.range.take() else {
            return;
        };
        let Some(page) = layout.page_index_from_pagination(range.pagination) else {
            self.clear();
            return;
        };
        let Some(page_text) = text.page(page) else {
            self.clear();
            return;
        };
        let segments: Vec<DrawSegment> = range
            .segments
            .iter()
            .filter_map(|segment| segment.refreshed(page_text))
            .collect();
        if segments.is_empty() {
            self.clear();
            return;
        }
        self.set_range(SelectionRange {
            page,
            pagination: range.pagination,
            segments,
        });
    }
}
