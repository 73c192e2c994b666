//! Decides which tiles the visible area needs.
//!
//! Each pass walks the pages intersecting the viewport (plus a preload
//! margin), asks for one low resolution thumbnail per page, then covers the
//! visible part of every page with a grid of fixed-size tiles. Tiles already
//! cached only get their eviction priority refreshed.

use tracing::trace;

use crate::config::RenderConfig;
use crate::geometry::{NormalizedRect, RectF};
use crate::layout::DocumentLayout;
use crate::renderer::RenderRequest;
use crate::tiles::TileCache;
use crate::viewport::ViewportController;

#[derive(Debug, Default)]
pub struct PagesLoader {
    cache_order: u64,
}

impl PagesLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_order(&mut self) -> u64 {
        self.cache_order += 1;
        self.cache_order
    }

    /// Visible page range, inclusive.
    pub fn visible_pages(
        layout: &DocumentLayout,
        viewport: &ViewportController,
        margin: f32,
    ) -> Option<(usize, usize)> {
        if layout.pages_count() == 0 {
            return None;
        }
        let zoom = viewport.zoom();
        let offset = viewport.offset();
        let main = if layout.is_vertical() {
            offset.y
        } else {
            offset.x
        };
        let start = (-main - margin).max(0.0);
        let end = -main + viewport.viewport_len(layout) + margin;
        let first = layout.page_at_offset(start, zoom);
        let last = layout.page_at_offset(end, zoom);
        Some((first, last.max(first)))
    }

    /// Screen rectangle of a page slot's content at the current zoom.
    pub fn page_screen_rect(
        layout: &DocumentLayout,
        viewport: &ViewportController,
        page: usize,
    ) -> RectF {
        let zoom = viewport.zoom();
        let size = layout.scaled_page_size(page, zoom);
        let origin = viewport.page_projection(layout, page).origin;
        let cross = layout.secondary_page_offset(page, zoom);
        let (left, top) = if layout.is_vertical() {
            (origin.x + cross, origin.y)
        } else {
            (origin.x, origin.y + cross)
        };
        RectF::new(left, top, left + size.width, top + size.height)
    }

    pub fn plan(
        &mut self,
        layout: &DocumentLayout,
        viewport: &ViewportController,
        cache: &mut TileCache,
        config: &RenderConfig,
        annotations: bool,
    ) -> Vec<RenderRequest> {
        let Some((first, last)) = Self::visible_pages(layout, viewport, config.preload_offset)
        else {
            return Vec::new();
        };
        let generation = cache.generation();
        let view = viewport.view_size();
        let margin = config.preload_offset;
        let visible = RectF::new(-margin, -margin, view.width + margin, view.height + margin);
        let mut requests = Vec::new();

        for page in first..=last {
            let Some(target) = layout.resolve(page) else {
                continue;
            };

            let base = layout.page_size(page);
            let thumb_width = (base.width * config.thumbnail_ratio).round().max(1.0) as u32;
            let thumb_height = (base.height * config.thumbnail_ratio).round().max(1.0) as u32;
            let thumbnail = RenderRequest {
                target,
                width: thumb_width,
                height: thumb_height,
                crop: NormalizedRect::FULL,
                thumbnail: true,
                best_quality: config.best_quality,
                annotations,
                cache_order: self.next_order(),
                generation,
            };
            if !cache.touch(&thumbnail.key(), thumbnail.cache_order) {
                requests.push(thumbnail);
            }

            let page_rect = Self::page_screen_rect(layout, viewport, page);
            if !page_rect.intersects(&visible) || page_rect.width() <= 0.0 {
                continue;
            }
            let local = RectF::new(
                visible.left.max(page_rect.left) - page_rect.left,
                visible.top.max(page_rect.top) - page_rect.top,
                visible.right.min(page_rect.right) - page_rect.left,
                visible.bottom.min(page_rect.bottom) - page_rect.top,
            );
            for rect in tile_grid(page_rect.width(), page_rect.height(), config.tile_size, &local) {
                let width = rect.width().round() as u32;
                let height = rect.height().round() as u32;
                if width == 0 || height == 0 {
                    continue;
                }
                let request = RenderRequest {
                    target,
                    width,
                    height,
                    crop: NormalizedRect {
                        left: rect.left / page_rect.width(),
                        top: rect.top / page_rect.height(),
                        right: rect.right / page_rect.width(),
                        bottom: rect.bottom / page_rect.height(),
                    }
                    .clamp(),
                    thumbnail: false,
                    best_quality: config.best_quality,
                    annotations,
                    cache_order: self.next_order(),
                    generation,
                };
                if !cache.touch(&request.key(), request.cache_order) {
                    requests.push(request);
                }
            }
        }
        trace!(first, last, queued = requests.len(), "planned visible pages");
        requests
    }
}

/// Tiles of a `width` x `height` page grid that intersect `visible`, row by row.
fn tile_grid(width: f32, height: f32, tile: f32, visible: &RectF) -> Vec<RectF> {
    if tile <= 0.0 || visible.width() <= 0.0 || visible.height() <= 0.0 {
        return Vec::new();
    }
    let first_col = (visible.left / tile).floor().max(0.0) as usize;
    let last_col = ((visible.right / tile).ceil() as usize).min((width / tile).ceil() as usize);
    let first_row = (visible.top / tile).floor().max(0.0) as usize;
    let last_row = ((visible.bottom / tile).ceil() as usize).min((height / tile).ceil() as usize);
    let mut tiles = Vec::new();
    for row in first_row..last_row {
        for col in first_col..last_col {
            let left = col as f32 * tile;
            let top = row as f32 * tile;
            tiles.push(RectF::new(
                left,
                top,
                (left + tile).min(width),
                (top + tile).min(height),
            ));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::engine::DocumentHandle;
    use crate::geometry::SizeF;
    use crate::layout::{ChunkPages, LayoutOptions};
    use crate::tiles::Tile;
    use std::sync::Arc;

    use crate::engine::PixelBuffer;

    fn setup() -> (DocumentLayout, ViewportController, RenderConfig) {
        let layout = DocumentLayout::new(
            LayoutOptions::default(),
            SizeF::new(500.0, 400.0),
            ChunkPages {
                doc: DocumentHandle(1),
                pagination_start: 20,
                sizes: vec![SizeF::new(500.0, 600.0); 5],
            },
        );
        let viewport = ViewportController::new(&ViewerConfig::default(), layout.view_size());
        let config = RenderConfig {
            preload_offset: 0.0,
            ..RenderConfig::default()
        };
        (layout, viewport, config)
    }

    #[test]
    fn grid_covers_only_visible_cells() {
        let cells = tile_grid(500.0, 600.0, 256.0, &RectF::new(0.0, 0.0, 500.0, 400.0));
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[1], RectF::new(256.0, 0.0, 500.0, 256.0));
        assert_eq!(cells[3].bottom, 512.0);
    }

    #[test]
    fn first_pass_requests_thumbnail_and_tiles() {
        let (layout, viewport, config) = setup();
        let mut cache = TileCache::new(100, 10);
        let mut loader = PagesLoader::new();
        let requests = loader.plan(&layout, &viewport, &mut cache, &config, false);

        assert_eq!(PagesLoader::visible_pages(&layout, &viewport, 0.0), Some((0, 0)));
        let thumbnails: Vec<_> = requests.iter().filter(|r| r.thumbnail).collect();
        assert_eq!(thumbnails.len(), 1);
        assert_eq!(thumbnails[0].width, 150);
        assert_eq!(thumbnails[0].target.pagination, 20);
        assert_eq!(requests.iter().filter(|r| !r.thumbnail).count(), 4);

        let orders: Vec<u64> = requests.iter().map(|r| r.cache_order).collect();
        assert!(orders.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn cached_tiles_are_not_requested_again() {
        let (layout, viewport, config) = setup();
        let mut cache = TileCache::new(100, 10);
        let mut loader = PagesLoader::new();
        for request in loader.plan(&layout, &viewport, &mut cache, &config, false) {
            cache.insert(Tile {
                pagination: request.target.pagination,
                crop: request.crop,
                bitmap: Arc::new(PixelBuffer::new(request.width, request.height)),
                thumbnail: request.thumbnail,
                best_quality: request.best_quality,
                cache_order: request.cache_order,
                generation: request.generation,
            });
        }
        assert!(loader
            .plan(&layout, &viewport, &mut cache, &config, false)
            .is_empty());
    }

    #[test]
    fn scrolling_reaches_following_pages() {
        let (layout, mut viewport, config) = setup();
        viewport.move_to(&layout, 0.0, -500.0);
        let mut cache = TileCache::new(100, 10);
        let requests = PagesLoader::new().plan(&layout, &viewport, &mut cache, &config, true);
        let pages: Vec<usize> = requests.iter().map(|r| r.target.pagination).collect();
        assert!(pages.contains(&20) && pages.contains(&21));
        assert!(requests.iter().all(|r| r.annotations));
        // page 20 only shows rows 500..600, which straddle two tile rows
        let page_20_tiles = requests
            .iter()
            .filter(|r| r.target.pagination == 20 && !r.thumbnail)
            .count();
        assert_eq!(page_20_tiles, 4);
    }
}
