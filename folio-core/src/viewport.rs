//! Scroll offset and zoom state.
//!
//! The offset is the position of the document origin relative to the
//! viewport's top-left corner, so it is zero or negative while scrolled into
//! the document. Edges are reported along the scroll axis: `Top` is the
//! document start (top or left), `Bottom` its end.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::animation::{Animation, AnimationStep, FlingBounds};
use crate::config::{ViewerConfig, ZoomConfig};
use crate::geometry::{PageProjection, PointF, SizeF};
use crate::layout::{DocumentLayout, SnapEdge};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Top,
    Bottom,
}

/// Result of advancing a running animation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    pub moved: bool,
    pub edge: Option<Edge>,
    pub finished: bool,
    pub was_fling: bool,
}

#[derive(Debug)]
pub struct ViewportController {
    offset: PointF,
    zoom: f32,
    levels: ZoomConfig,
    view_size: SizeF,
    top_reached: bool,
    bottom_reached: bool,
    current_page: usize,
    page_snap: bool,
    animation_ms: u64,
    animation: Option<Animation>,
}

impl ViewportController {
    pub fn new(config: &ViewerConfig, view_size: SizeF) -> Self {
        Self {
            offset: PointF::default(),
            zoom: config.zoom.min,
            levels: config.zoom.clone(),
            view_size,
            top_reached: false,
            bottom_reached: false,
            current_page: 0,
            page_snap: config.page_snap,
            animation_ms: config.animation_ms,
            animation: None,
        }
    }

    pub fn offset(&self) -> PointF {
        self.offset
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn levels(&self) -> &ZoomConfig {
        &self.levels
    }

    pub fn view_size(&self) -> SizeF {
        self.view_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn set_current_page(&mut self, page: usize) {
        self.current_page = page;
    }

    pub fn is_zooming(&self) -> bool {
        self.zoom != self.levels.min
    }

    pub fn to_real_scale(&self, size: f32) -> f32 {
        size / self.zoom
    }

    pub fn to_current_scale(&self, size: f32) -> f32 {
        size * self.zoom
    }

    /// Viewport length along the scroll axis.
    pub fn viewport_len(&self, layout: &DocumentLayout) -> f32 {
        if layout.is_vertical() {
            self.view_size.height
        } else {
            self.view_size.width
        }
    }

    fn main_offset(&self, layout: &DocumentLayout) -> f32 {
        if layout.is_vertical() {
            self.offset.y
        } else {
            self.offset.x
        }
    }

    fn with_main(&self, layout: &DocumentLayout, main: f32) -> PointF {
        if layout.is_vertical() {
            PointF::new(self.offset.x, main)
        } else {
            PointF::new(main, self.offset.y)
        }
    }

    /// Moves to `(x, y)` clamped to the document, centering content smaller
    /// than the viewport. Returns the edge reached by this move, reported only
    /// once until the viewport leaves that edge again.
    pub fn move_to(&mut self, layout: &DocumentLayout, x: f32, y: f32) -> Option<Edge> {
        let vertical = layout.is_vertical();
        let (mut main, mut cross) = if vertical { (y, x) } else { (x, y) };
        let (view_main, view_cross) = if vertical {
            (self.view_size.height, self.view_size.width)
        } else {
            (self.view_size.width, self.view_size.height)
        };

        let content_cross = self.to_current_scale(if vertical {
            layout.max_page_width()
        } else {
            layout.max_page_height()
        });
        if content_cross < view_cross {
            cross = view_cross / 2.0 - content_cross / 2.0;
        } else if cross > 0.0 {
            cross = 0.0;
        } else if cross + content_cross < view_cross {
            cross = view_cross - content_cross;
        }

        let mut reached = None;
        let content_main = layout.doc_len(self.zoom);
        if content_main < view_main {
            main = (view_main - content_main) / 2.0;
        } else if main > 0.0 {
            main = 0.0;
            if !self.top_reached {
                reached = Some(Edge::Top);
            }
            self.top_reached = true;
        } else if main + content_main < view_main {
            main = view_main - content_main;
            if !self.bottom_reached {
                reached = Some(Edge::Bottom);
            }
            self.bottom_reached = true;
        } else {
            self.top_reached = false;
            self.bottom_reached = false;
        }

        self.offset = if vertical {
            PointF::new(cross, main)
        } else {
            PointF::new(main, cross)
        };
        if let Some(edge) = reached {
            debug!(?edge, "viewport reached document edge");
        }
        reached
    }

    pub fn move_relative(&mut self, layout: &DocumentLayout, dx: f32, dy: f32) -> Option<Edge> {
        self.move_to(layout, self.offset.x + dx, self.offset.y + dy)
    }

    /// Re-applies clamping at the current offset.
    pub fn reclamp(&mut self, layout: &DocumentLayout) -> Option<Edge> {
        self.move_to(layout, self.offset.x, self.offset.y)
    }

    /// Sets the zoom without touching the offset.
    pub fn zoom_to(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(self.levels.min, self.levels.max);
    }

    /// Zooms keeping the screen point `pivot` visually fixed.
    pub fn zoom_centered_to(
        &mut self,
        layout: &DocumentLayout,
        zoom: f32,
        pivot: PointF,
    ) -> Option<Edge> {
        let previous = self.zoom;
        self.zoom_to(zoom);
        let ratio = self.zoom / previous;
        let x = self.offset.x * ratio + (pivot.x - pivot.x * ratio);
        let y = self.offset.y * ratio + (pivot.y - pivot.y * ratio);
        self.move_to(layout, x, y)
    }

    /// Multiplies the zoom by `factor`, limiting the factor so the result
    /// stays within the configured zoom range.
    pub fn zoom_centered_relative_to(
        &mut self,
        layout: &DocumentLayout,
        factor: f32,
        pivot: PointF,
    ) -> Option<Edge> {
        let wanted = self.zoom * factor;
        let factor = if wanted < self.levels.min {
            self.levels.min / self.zoom
        } else if wanted > self.levels.max {
            self.levels.max / self.zoom
        } else {
            factor
        };
        self.zoom_centered_to(layout, self.zoom * factor, pivot)
    }

    /// Next zoom level of the double-tap cycle min -> mid -> max -> min.
    pub fn next_zoom_level(&self) -> f32 {
        if self.zoom < self.levels.mid {
            self.levels.mid
        } else if self.zoom < self.levels.max {
            self.levels.max
        } else {
            self.levels.min
        }
    }

    /// Moves by `delta` along the scroll axis without clamping or edge
    /// reporting and clears the edge latches.
    pub fn shift_main_axis(&mut self, layout: &DocumentLayout, delta: f32) {
        let main = self.main_offset(layout) + delta;
        self.offset = self.with_main(layout, main);
        self.top_reached = false;
        self.bottom_reached = false;
    }

    /// Scroll progress within the document, `0` at the start and `1` at the end.
    pub fn position_offset(&self, layout: &DocumentLayout) -> f32 {
        let scrollable = layout.doc_len(self.zoom) - self.viewport_len(layout);
        if scrollable <= 0.0 {
            return 0.0;
        }
        (-self.main_offset(layout) / scrollable).clamp(0.0, 1.0)
    }

    pub fn set_position_offset(&mut self, layout: &DocumentLayout, progress: f32) -> Option<Edge> {
        let main = (-layout.doc_len(self.zoom) + self.viewport_len(layout)) * progress;
        let target = self.with_main(layout, main);
        self.move_to(layout, target.x, target.y)
    }

    /// Page under the viewport center for the given offset. The first and
    /// last page win when the viewport touches the document ends.
    pub fn find_focus_page(&self, layout: &DocumentLayout, offset: PointF) -> usize {
        let current = if layout.is_vertical() {
            offset.y
        } else {
            offset.x
        };
        let length = self.viewport_len(layout);
        if current > -1.0 {
            return 0;
        }
        if current < -layout.doc_len(self.zoom) + length + 1.0 {
            return layout.pages_count().saturating_sub(1);
        }
        layout.page_at_offset(-(current - length / 2.0), self.zoom)
    }

    pub fn focus_page(&self, layout: &DocumentLayout) -> usize {
        self.find_focus_page(layout, self.offset)
    }

    /// Page whose slot contains the viewport center.
    pub fn page_by_offset(&self, layout: &DocumentLayout) -> usize {
        let center = self.viewport_len(layout) / 2.0;
        layout.page_at_offset(-(self.main_offset(layout) - center), self.zoom)
    }

    /// Whether the current page is longer than the viewport and covers it
    /// entirely along the scroll axis.
    pub fn page_fills_screen(&self, layout: &DocumentLayout) -> bool {
        let start = -layout.page_offset(self.current_page, self.zoom);
        let end = start - layout.page_length(self.current_page, self.zoom);
        let current = self.main_offset(layout);
        start > current && end < current - self.viewport_len(layout)
    }

    pub fn find_snap_edge(&self, layout: &DocumentLayout, page: usize) -> SnapEdge {
        if !self.page_snap {
            return SnapEdge::None;
        }
        layout.snap_edge(
            page,
            self.zoom,
            self.main_offset(layout),
            self.viewport_len(layout),
        )
    }

    /// Main-axis offset that aligns `page` per the snap policy.
    pub fn snap_target(&self, layout: &DocumentLayout, page: usize) -> f32 {
        let edge = self.find_snap_edge(layout, page);
        -layout.snap_offset(page, edge, self.zoom, self.viewport_len(layout))
    }

    /// Starts the page-snap animation after a gesture, if snapping applies.
    pub fn perform_page_snap(&mut self, layout: &DocumentLayout, now: u64) -> bool {
        if !self.page_snap || layout.pages_count() == 0 {
            return false;
        }
        let page = self.focus_page(layout);
        let edge = self.find_snap_edge(layout, page);
        if edge == SnapEdge::None {
            return false;
        }
        let target = -layout.snap_offset(page, edge, self.zoom, self.viewport_len(layout));
        self.start_main_axis_scroll(layout, target, now);
        true
    }

    /// Main-axis offset that shows `page` from its start.
    pub fn jump_offset(&self, layout: &DocumentLayout, page: usize) -> f32 {
        if page == 0 {
            0.0
        } else {
            -layout.page_offset(page, self.zoom)
        }
    }

    /// Target of a single-page fling: the page after (or before) the one
    /// focused when the drag started, aligned per the snap policy.
    pub fn page_fling_target(&self, layout: &DocumentLayout, drag: PointF, velocity: PointF) -> Option<f32> {
        let vertical = layout.is_vertical();
        let dominant = if vertical {
            velocity.y.abs() > velocity.x.abs()
        } else {
            velocity.x.abs() > velocity.y.abs()
        };
        if !dominant {
            return None;
        }
        let main_velocity = if vertical { velocity.y } else { velocity.x };
        let direction: isize = if main_velocity > 0.0 { -1 } else { 1 };
        let main_drag = if vertical { drag.y } else { drag.x };
        let start = self.with_main(layout, self.main_offset(layout) - main_drag);
        let starting_page = self.find_focus_page(layout, start) as isize;
        let target = layout.determine_valid_page_number(starting_page + direction);
        Some(self.snap_target(layout, target))
    }

    pub fn page_projection(&self, layout: &DocumentLayout, page: usize) -> PageProjection {
        let origin = layout.page_origin(page, self.zoom);
        PageProjection {
            origin: PointF::new(origin.x + self.offset.x, origin.y + self.offset.y),
            zoom: self.zoom,
        }
    }

    /// Page whose slot lies under the screen point `screen`.
    pub fn page_at_screen(&self, layout: &DocumentLayout, screen: PointF) -> usize {
        let main = if layout.is_vertical() {
            screen.y - self.offset.y
        } else {
            screen.x - self.offset.x
        };
        layout.page_at_offset(main, self.zoom)
    }

    /// Applies a new view size, keeping the point at the viewport center fixed
    /// relative to the document.
    pub fn resize(&mut self, layout: &mut DocumentLayout, view_size: SizeF) -> Option<Edge> {
        self.stop_animation();
        let old = self.view_size;
        let center_x = -self.offset.x + old.width * 0.5;
        let center_y = -self.offset.y + old.height * 0.5;
        let vertical = layout.is_vertical();
        let (relative_x, relative_y) = if vertical {
            (
                ratio(center_x, layout.max_page_width()),
                ratio(center_y, layout.doc_len(self.zoom)),
            )
        } else {
            (
                ratio(center_x, layout.doc_len(self.zoom)),
                ratio(center_y, layout.max_page_height()),
            )
        };

        layout.recalculate(view_size);
        self.view_size = view_size;
        let (x, y) = if vertical {
            (
                -relative_x * layout.max_page_width() + view_size.width * 0.5,
                -relative_y * layout.doc_len(self.zoom) + view_size.height * 0.5,
            )
        } else {
            (
                -relative_x * layout.doc_len(self.zoom) + view_size.width * 0.5,
                -relative_y * layout.max_page_height() + view_size.height * 0.5,
            )
        };
        self.move_to(layout, x, y)
    }

    /// Whole-document fling bounds.
    pub fn fling_bounds(&self, layout: &DocumentLayout) -> FlingBounds {
        if layout.is_vertical() {
            FlingBounds {
                min_x: -(self.to_current_scale(layout.max_page_width()) - self.view_size.width),
                max_x: 0.0,
                min_y: -(layout.doc_len(self.zoom) - self.view_size.height),
                max_y: 0.0,
            }
        } else {
            FlingBounds {
                min_x: -(layout.doc_len(self.zoom) - self.view_size.width),
                max_x: 0.0,
                min_y: -(self.to_current_scale(layout.max_page_height()) - self.view_size.height),
                max_y: 0.0,
            }
        }
    }

    /// Fling bounds limited to the current page.
    pub fn page_fling_bounds(&self, layout: &DocumentLayout) -> FlingBounds {
        let page_start = -layout.page_offset(self.current_page, self.zoom);
        let page_end = page_start - layout.page_length(self.current_page, self.zoom);
        let document = self.fling_bounds(layout);
        if layout.is_vertical() {
            FlingBounds {
                min_y: page_end + self.view_size.height,
                max_y: page_start,
                ..document
            }
        } else {
            FlingBounds {
                min_x: page_end + self.view_size.width,
                max_x: page_start,
                ..document
            }
        }
    }

    pub fn start_scroll(&mut self, to: PointF, now: u64) {
        self.animation = Some(Animation::Scroll {
            from: self.offset,
            to,
            started_at: now,
            duration: self.animation_ms,
        });
    }

    pub fn start_main_axis_scroll(&mut self, layout: &DocumentLayout, target: f32, now: u64) {
        let to = self.with_main(layout, target);
        self.start_scroll(to, now);
    }

    pub fn start_zoom(&mut self, pivot: PointF, target: f32, now: u64) {
        self.animation = Some(Animation::Zoom {
            pivot,
            from: self.zoom,
            to: target.clamp(self.levels.min, self.levels.max),
            started_at: now,
            duration: self.animation_ms,
        });
    }

    pub fn start_fling(&mut self, velocity: PointF, bounds: FlingBounds, now: u64) {
        self.animation = Some(Animation::Fling {
            origin: self.offset,
            velocity,
            bounds,
            started_at: now,
        });
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn is_flinging(&self) -> bool {
        self.animation.as_ref().is_some_and(Animation::is_fling)
    }

    pub fn stop_animation(&mut self) {
        self.animation = None;
    }

    pub fn stop_fling(&mut self) {
        if self.is_flinging() {
            self.animation = None;
        }
    }

    /// Advances the running animation to `now`.
    pub fn tick(&mut self, layout: &DocumentLayout, now: u64) -> TickOutcome {
        let Some(animation) = self.animation.clone() else {
            return TickOutcome::default();
        };
        let frame = animation.sample(now);
        let edge = match frame.step {
            AnimationStep::Offset(offset) => self.move_to(layout, offset.x, offset.y),
            AnimationStep::Zoom { zoom, pivot } => self.zoom_centered_to(layout, zoom, pivot),
        };
        if frame.finished {
            self.animation = None;
        }
        TickOutcome {
            moved: true,
            edge,
            finished: frame.finished,
            was_fling: animation.is_fling(),
        }
    }
}

fn ratio(value: f32, total: f32) -> f32 {
    if total > 0.0 {
        value / total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Orientation;
    use crate::engine::DocumentHandle;
    use crate::layout::{ChunkPages, FitPolicy, LayoutOptions};

    fn config() -> ViewerConfig {
        ViewerConfig::default()
    }

    /// Ten 100x200 pages in a 100x300 view: document length 2000.
    fn layout(orientation: Orientation) -> DocumentLayout {
        let view = match orientation {
            Orientation::Vertical => SizeF::new(100.0, 300.0),
            Orientation::Horizontal => SizeF::new(300.0, 200.0),
        };
        DocumentLayout::new(
            LayoutOptions {
                fit_policy: if orientation.is_vertical() {
                    FitPolicy::Width
                } else {
                    FitPolicy::Height
                },
                fit_each_page: false,
                orientation,
                spacing: 0.0,
                auto_spacing: false,
            },
            view,
            ChunkPages {
                doc: DocumentHandle(1),
                pagination_start: 0,
                sizes: vec![SizeF::new(100.0, 200.0); 10],
            },
        )
    }

    fn viewport(layout: &DocumentLayout) -> ViewportController {
        ViewportController::new(&config(), layout.view_size())
    }

    #[test]
    fn edges_fire_once_per_approach() {
        let layout = layout(Orientation::Vertical);
        let mut viewport = viewport(&layout);
        assert_eq!(viewport.move_to(&layout, 0.0, 50.0), Some(Edge::Top));
        assert_eq!(viewport.offset().y, 0.0);
        assert_eq!(viewport.move_to(&layout, 0.0, 10.0), None);
        assert_eq!(viewport.move_to(&layout, 0.0, -500.0), None);
        assert_eq!(viewport.move_to(&layout, 0.0, 5.0), Some(Edge::Top));

        assert_eq!(viewport.move_to(&layout, 0.0, -5_000.0), Some(Edge::Bottom));
        assert_eq!(viewport.offset().y, -1_700.0);
        assert_eq!(viewport.move_to(&layout, 0.0, -5_000.0), None);
    }

    #[test]
    fn short_content_is_centered_without_edges() {
        let layout = DocumentLayout::new(
            LayoutOptions::default(),
            SizeF::new(200.0, 600.0),
            ChunkPages {
                doc: DocumentHandle(1),
                pagination_start: 0,
                sizes: vec![SizeF::new(100.0, 100.0)],
            },
        );
        let mut viewport = ViewportController::new(&config(), layout.view_size());
        assert_eq!(viewport.move_to(&layout, 0.0, 40.0), None);
        assert_eq!(viewport.offset(), PointF::new(0.0, 200.0));
    }

    #[test]
    fn zoom_keeps_pivot_fixed() {
        let layout = layout(Orientation::Vertical);
        let mut viewport = viewport(&layout);
        viewport.move_to(&layout, 0.0, -400.0);
        let pivot = PointF::new(50.0, 150.0);
        let doc_point_before = (pivot.y - viewport.offset().y) / viewport.zoom();
        viewport.zoom_centered_to(&layout, 2.0, pivot);
        let doc_point_after = (pivot.y - viewport.offset().y) / viewport.zoom();
        assert!((doc_point_before - doc_point_after).abs() < 1e-3);
        assert_eq!(viewport.offset().x, -50.0);
    }

    #[test]
    fn relative_zoom_never_leaves_bounds() {
        let layout = layout(Orientation::Vertical);
        let mut viewport = viewport(&layout);
        let pivot = PointF::new(10.0, 10.0);
        for factor in [0.01_f32, 3.0, 100.0, 0.5, 1e6, 1e-6, 7.5] {
            viewport.zoom_centered_relative_to(&layout, factor, pivot);
            assert!(viewport.zoom() >= 1.0 && viewport.zoom() <= 5.0);
        }
        viewport.zoom_centered_relative_to(&layout, 100.0, pivot);
        assert_eq!(viewport.zoom(), 5.0);
        viewport.zoom_centered_to(&layout, 0.2, pivot);
        assert_eq!(viewport.zoom(), 1.0);
    }

    #[test]
    fn double_tap_cycles_levels() {
        let layout = layout(Orientation::Vertical);
        let mut viewport = viewport(&layout);
        assert_eq!(viewport.next_zoom_level(), 1.75);
        viewport.zoom_to(1.75);
        assert_eq!(viewport.next_zoom_level(), 5.0);
        viewport.zoom_to(5.0);
        assert_eq!(viewport.next_zoom_level(), 1.0);
    }

    #[test]
    fn position_offset_round_trips() {
        let layout = layout(Orientation::Vertical);
        let mut viewport = viewport(&layout);
        viewport.set_position_offset(&layout, 0.5);
        assert_eq!(viewport.offset().y, -850.0);
        assert_eq!(viewport.position_offset(&layout), 0.5);
    }

    #[test]
    fn focus_page_prefers_document_ends() {
        let layout = layout(Orientation::Vertical);
        let mut viewport = viewport(&layout);
        assert_eq!(viewport.focus_page(&layout), 0);
        viewport.move_to(&layout, 0.0, -1_700.0);
        assert_eq!(viewport.focus_page(&layout), 9);
        viewport.move_to(&layout, 0.0, -850.0);
        // center at 1000 -> page 5
        assert_eq!(viewport.focus_page(&layout), 5);
        assert_eq!(viewport.page_by_offset(&layout), 5);
    }

    #[test]
    fn horizontal_mode_scrolls_along_x() {
        let layout = layout(Orientation::Horizontal);
        let mut viewport = viewport(&layout);
        assert_eq!(viewport.move_to(&layout, 10.0, 0.0), Some(Edge::Top));
        assert_eq!(viewport.move_to(&layout, -10_000.0, 0.0), Some(Edge::Bottom));
        assert_eq!(viewport.offset().x, -(1_000.0 - 300.0));
        assert_eq!(viewport.page_at_screen(&layout, PointF::new(299.0, 10.0)), 9);
    }

    #[test]
    fn page_snap_aligns_the_focus_page() {
        let layout = layout(Orientation::Vertical);
        let mut config = config();
        config.page_snap = true;
        let mut viewport = ViewportController::new(&config, layout.view_size());
        viewport.move_to(&layout, 0.0, -390.0);
        assert!(viewport.perform_page_snap(&layout, 0));
        let outcome = viewport.tick(&layout, 1_000);
        assert!(outcome.finished);
        // page 2 starts at 400 and is shorter than the view: centered
        assert_eq!(viewport.offset().y, -(400.0 - 150.0 + 100.0));
    }

    #[test]
    fn page_fill_detection_uses_current_page() {
        let layout = DocumentLayout::new(
            LayoutOptions::default(),
            SizeF::new(100.0, 100.0),
            ChunkPages {
                doc: DocumentHandle(1),
                pagination_start: 0,
                sizes: vec![SizeF::new(100.0, 400.0); 3],
            },
        );
        let mut viewport = ViewportController::new(&config(), layout.view_size());
        viewport.move_to(&layout, 0.0, -450.0);
        viewport.set_current_page(1);
        assert!(viewport.page_fills_screen(&layout));
        viewport.move_to(&layout, 0.0, -350.0);
        assert!(!viewport.page_fills_screen(&layout));
    }

    #[test]
    fn resize_keeps_relative_center() {
        let mut layout = layout(Orientation::Vertical);
        let mut viewport = viewport(&layout);
        viewport.move_to(&layout, 0.0, -850.0);
        viewport.resize(&mut layout, SizeF::new(200.0, 300.0));
        // pages doubled in size; the center keeps its relative document position
        assert_eq!(layout.doc_len(1.0), 4_000.0);
        assert_eq!(viewport.offset(), PointF::new(0.0, -1_850.0));
        let center = (-viewport.offset().y + 150.0) / layout.doc_len(1.0);
        assert!((center - 0.5).abs() < 1e-4);
    }

    #[test]
    fn page_fling_moves_exactly_one_page() {
        let layout = layout(Orientation::Vertical);
        let mut viewport = viewport(&layout);
        viewport.move_to(&layout, 0.0, -850.0);
        let forward = viewport
            .page_fling_target(&layout, PointF::new(0.0, 0.0), PointF::new(0.0, -900.0))
            .unwrap();
        assert_eq!(forward, -1_200.0);
        let backward = viewport
            .page_fling_target(&layout, PointF::new(0.0, 0.0), PointF::new(0.0, 900.0))
            .unwrap();
        assert_eq!(backward, -800.0);
        assert!(viewport
            .page_fling_target(&layout, PointF::default(), PointF::new(900.0, 10.0))
            .is_none());
    }
}
