//! User annotations drawn over the document: translucent highlights and
//! underlined comments with a stamp in the right margin.
//!
//! Annotations are anchored by pagination index and a pair of points in PDF
//! user space (bottom-left origin), so they survive chunk merges untouched.
//! Their draw segments are cached and only re-resolved after
//! [`AnnotationOverlay::invalidate`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canvas::RasterSurface;
use crate::geometry::{circles_collide, PageProjection, PointF, RectF};
use crate::layout::DocumentLayout;
use crate::selection::{resolve_range, CoordSpace, DrawSegment};
use crate::text::TextGeometryModel;

const HIGHLIGHT_ALPHA: u8 = 50;
const COMMENT_COLOR: [u8; 4] = [255, 179, 0, 255];
const BADGE_COLOR: [u8; 4] = [211, 47, 47, 255];
const UNDERLINE_THICKNESS: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    Highlight { color: [u8; 3] },
    Comment { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    pub pagination: usize,
    pub start: PointF,
    pub end: PointF,
    #[serde(flatten)]
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, AnnotationKind::Comment { .. })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    annotation: Annotation,
    /// Layout page the segments were resolved on.
    page: Option<usize>,
    segments: Vec<DrawSegment>,
}

/// Comments of one page sharing a vertical anchor, drawn as a single stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StampGroup {
    pub page: usize,
    /// Page-local view y of the stamp center.
    pub y: f32,
    pub ids: Vec<u64>,
}

impl StampGroup {
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

/// Annotations under a tapped point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationHit {
    pub ids: Vec<u64>,
    /// The tap landed on a comment stamp rather than on text.
    pub stamp: bool,
}

#[derive(Debug)]
pub struct AnnotationOverlay {
    entries: BTreeMap<u64, Entry>,
    stamp_size: f32,
    dirty: bool,
}

impl AnnotationOverlay {
    pub fn new(stamp_size: f32) -> Self {
        Self {
            entries: BTreeMap::new(),
            stamp_size,
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Annotation> {
        self.entries.get(&id).map(|entry| &entry.annotation)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.entries.values().map(|entry| &entry.annotation)
    }

    /// Cached segments of `id` and the layout page they sit on.
    pub fn segments(&self, id: u64) -> Option<(usize, &[DrawSegment])> {
        let entry = self.entries.get(&id)?;
        Some((entry.page?, entry.segments.as_slice()))
    }

    pub fn needs_resolve(&self) -> bool {
        self.dirty
    }

    /// Inserts or replaces an annotation, resolving it immediately.
    pub fn add(
        &mut self,
        annotation: Annotation,
        layout: &DocumentLayout,
        text: &TextGeometryModel,
    ) {
        let mut entry = Entry {
            annotation,
            page: None,
            segments: Vec::new(),
        };
        resolve_entry(&mut entry, layout, text);
        self.entries.insert(entry.annotation.id, entry);
    }

    /// Replaces every annotation. Segments are resolved lazily.
    pub fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        self.entries = annotations
            .into_iter()
            .map(|annotation| {
                (
                    annotation.id,
                    Entry {
                        annotation,
                        page: None,
                        segments: Vec::new(),
                    },
                )
            })
            .collect();
        self.dirty = true;
    }

    pub fn remove(&mut self, ids: &[u64]) -> usize {
        ids.iter()
            .filter(|id| self.entries.remove(id).is_some())
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = false;
    }

    /// Marks every cached segment stale after page geometry changed.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn resolve_all(
        &mut self,
        layout: &DocumentLayout,
        text: &TextGeometryModel,
    ) {
        if !self.dirty {
            return;
        }
        for entry in self.entries.values_mut() {
            resolve_entry(entry, layout, text);
        }
        self.dirty = false;
        debug!(count = self.entries.len(), "annotation segments resolved");
    }

    fn on_page(&self, page: usize) -> impl Iterator<Item = &Entry> {
        self.entries
            .values()
            .filter(move |entry| entry.page == Some(page) && !entry.segments.is_empty())
    }

    /// Comment stamps of `page`, one per distinct anchor line.
    pub fn stamp_groups(&self, page: usize) -> Vec<StampGroup> {
        let mut groups: Vec<StampGroup> = Vec::new();
        for entry in self.on_page(page).filter(|entry| entry.annotation.is_comment()) {
            let Some(first) = entry.segments.first() else {
                continue;
            };
            let y = first.rect.center_y();
            match groups.iter_mut().find(|group| group.y == y) {
                Some(group) => group.ids.push(entry.annotation.id),
                None => groups.push(StampGroup {
                    page,
                    y,
                    ids: vec![entry.annotation.id],
                }),
            }
        }
        groups
    }

    fn stamp_center(&self, group: &StampGroup, projection: &PageProjection, canvas_width: f32) -> PointF {
        let x = canvas_width - self.stamp_size * 1.5 + self.stamp_size / 2.0;
        let y = projection.to_screen(PointF::new(0.0, group.y)).y;
        PointF::new(x, y)
    }

    /// Every annotation of `page` under `screen`. A stamp hit takes precedence
    /// over segment hits and reports all comments sharing that stamp.
    pub fn hit_test(
        &self,
        page: usize,
        projection: &PageProjection,
        canvas_width: f32,
        screen: PointF,
    ) -> AnnotationHit {
        let radius = self.stamp_size / 2.0;
        for group in self.stamp_groups(page) {
            let center = self.stamp_center(&group, projection, canvas_width);
            if circles_collide(screen, 0.0, center, radius) {
                return AnnotationHit {
                    ids: group.ids,
                    stamp: true,
                };
            }
        }
        let ids = self
            .on_page(page)
            .filter(|entry| {
                entry
                    .segments
                    .iter()
                    .any(|segment| projection.rect_to_screen(&segment.rect).contains(screen))
            })
            .map(|entry| entry.annotation.id)
            .collect();
        AnnotationHit { ids, stamp: false }
    }

    pub fn draw(
        &self,
        page: usize,
        projection: &PageProjection,
        surface: &mut dyn RasterSurface,
    ) {
        for entry in self.on_page(page) {
            for segment in &entry.segments {
                let rect = projection.rect_to_screen(&segment.rect);
                match &entry.annotation.kind {
                    AnnotationKind::Highlight { color } => {
                        surface.fill_rect(rect, [color[0], color[1], color[2], HIGHLIGHT_ALPHA]);
                    }
                    AnnotationKind::Comment { .. } => {
                        let underline = RectF::new(
                            rect.left,
                            rect.bottom - UNDERLINE_THICKNESS,
                            rect.right,
                            rect.bottom,
                        );
                        surface.fill_rect(underline, COMMENT_COLOR);
                    }
                }
            }
        }
        let canvas_width = surface.width() as f32;
        let radius = self.stamp_size / 2.0;
        for group in self.stamp_groups(page) {
            let center = self.stamp_center(&group, projection, canvas_width);
            surface.fill_circle(center, radius, COMMENT_COLOR);
            if group.count() > 1 {
                let badge = PointF::new(center.x + radius * 0.7, center.y - radius * 0.7);
                surface.fill_circle(badge, radius * 0.45, BADGE_COLOR);
            }
        }
    }
}

fn resolve_entry(entry: &mut Entry, layout: &DocumentLayout, text: &TextGeometryModel) {
    entry.page = None;
    entry.segments.clear();
    let Some(page) = layout.page_index_from_pagination(entry.annotation.pagination) else {
        return;
    };
    let Some(page_text) = text.page(page) else {
        return;
    };
    let height = page_text.native_size.height;
    let mut start = PointF::new(entry.annotation.start.x, height - entry.annotation.start.y);
    let mut end = PointF::new(entry.annotation.end.x, height - entry.annotation.end.y);
    if start.y > end.y {
        std::mem::swap(&mut start, &mut end);
    }
    entry.page = Some(page);
    entry.segments = resolve_range(page_text, start, end, CoordSpace::Native);
}
