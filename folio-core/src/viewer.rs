//! The host-facing viewer: owns layout, viewport, text geometry, tile
//! pipeline, selection, annotations and the merge protocol, and keeps them
//! consistent with each other.
//!
//! All methods run on the host's consumer thread. Decoding happens off-thread
//! through a [`ChunkDecoder`]; results come back through [`Viewer::complete_load`]
//! and [`Viewer::complete_merge`], or through the async helpers that wrap both
//! halves.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::annotation::{Annotation, AnnotationKind, AnnotationOverlay};
use crate::canvas::RasterSurface;
use crate::config::ViewerConfig;
use crate::decode::{ChunkDecoder, DecodedChunk, EngineDecoder};
use crate::engine::{DocumentSource, LinkAction, PdfEngine};
use crate::error::{ViewerError, ViewerResult};
use crate::events::{EventQueue, ViewerEvent};
use crate::geometry::{PageProjection, PointF, RectF, SizeF};
use crate::gesture::{Gesture, GestureInterpreter, PointerEvent, PointerKind, TouchSink};
use crate::layout::{DocumentLayout, LayoutOptions};
use crate::merge::{ChunkMerge, MergeState, MergeTicket};
use crate::planner::PagesLoader;
use crate::renderer::{RenderOutcome, TileRenderer};
use crate::selection::{SelectionEngine, SelectionRange, TouchState};
use crate::text::TextGeometryModel;
use crate::tiles::{TileCache, TileKey};
use crate::viewport::{Edge, ViewportController};

const SELECTION_COLOR: [u8; 4] = [0, 120, 215, 60];
const HANDLE_COLOR: [u8; 4] = [0, 120, 215, 255];
const ERROR_PAGE_COLOR: [u8; 4] = [220, 220, 220, 255];

/// Identifies one load attempt; results for older attempts are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// State that only exists while a document is loaded.
struct Loaded {
    layout: DocumentLayout,
    viewport: ViewportController,
    text: TextGeometryModel,
    cache: TileCache,
    renderer: TileRenderer,
    /// Keys submitted to the worker and not yet answered.
    requested: HashSet<TileKey>,
}

impl Loaded {
    fn projection(&self, page: usize) -> PageProjection {
        self.viewport.page_projection(&self.layout, page)
    }

    fn invalidate_tiles(&mut self) {
        let generation = self.cache.invalidate();
        self.renderer.set_generation(generation);
        self.requested.clear();
    }

    fn absorb(&mut self, outcome: RenderOutcome, events: &EventQueue) {
        match outcome {
            RenderOutcome::Tile(tile) => {
                // a stale tile must not release the key re-requested for the current generation
                if tile.generation == self.cache.generation() {
                    self.requested.remove(&tile.key());
                }
                self.cache.insert(tile);
            }
            RenderOutcome::PageError { pagination, error } => {
                self.requested.retain(|key| key.pagination() != pagination);
                events.push(ViewerEvent::PageError { pagination, error });
            }
        }
    }

    /// Updates the current page from the viewport center.
    fn track_page(&mut self, events: &EventQueue) {
        let page = self.viewport.page_by_offset(&self.layout);
        self.show_page(page, events);
    }

    fn show_page(&mut self, page: usize, events: &EventQueue) {
        if page == self.viewport.current_page() {
            return;
        }
        self.viewport.set_current_page(page);
        if let Some(pagination) = self.layout.pagination_index(page) {
            events.push(ViewerEvent::PageChanged { page, pagination });
        }
    }
}

fn report_edge(edge: Option<Edge>, events: &EventQueue) {
    if let Some(edge) = edge {
        events.push(ViewerEvent::EdgeReached(edge));
    }
}

/// Link under `position`, with the pagination of its page. `GoTo` targets
/// are rebased from the owning document onto pagination indices.
fn link_at(
    loaded: &Loaded,
    engine: &dyn PdfEngine,
    position: PointF,
) -> Option<(usize, LinkAction)> {
    let page = loaded.viewport.page_at_screen(&loaded.layout, position);
    let target = loaded.layout.resolve(page)?;
    let links = match engine.page_links(target.doc, target.local_page) {
        Ok(links) => links,
        Err(err) => {
            debug!(pagination = target.pagination, %err, "page links unavailable");
            return None;
        }
    };
    let size = loaded.layout.page_size(page);
    let cross = loaded.layout.secondary_page_offset(page, 1.0).max(0.0);
    let (dx, dy) = if loaded.layout.is_vertical() {
        (cross, 0.0)
    } else {
        (0.0, cross)
    };
    let local = loaded.projection(page).to_local(position);
    let link = links
        .into_iter()
        .find(|link| link.bounds.to_rect(size).offset(dx, dy).contains(local))?;
    let action = match link.action {
        LinkAction::GoTo { page } => LinkAction::GoTo {
            page: target.pagination - target.local_page + page,
        },
        uri => uri,
    };
    Some((target.pagination, action))
}

fn text_selected(selection: &SelectionEngine, loaded: &Loaded) -> Option<ViewerEvent> {
    let range = selection.range().filter(|range| !range.is_empty())?;
    let (_, end) = selection.handle_positions()?;
    let anchor = loaded.projection(range.page).to_screen(end);
    Some(ViewerEvent::TextSelected {
        text: range.text(),
        pagination: range.pagination,
        anchor,
    })
}

/// First look at every pointer event: selection handles and comment stamps
/// claim the stream before it can turn into a pan.
struct ViewerTouchSink<'a> {
    loaded: Option<&'a Loaded>,
    selection: &'a mut SelectionEngine,
    overlay: &'a AnnotationOverlay,
    events: &'a EventQueue,
    view_width: f32,
}

impl TouchSink for ViewerTouchSink<'_> {
    fn on_touch(&mut self, event: &PointerEvent) -> bool {
        let Some(loaded) = self.loaded else {
            return false;
        };
        match event.kind {
            PointerKind::Down => {
                if let Some(page) = self.selection.range().map(|range| range.page) {
                    let local = loaded.projection(page).to_local(event.position);
                    if self.selection.press(local) {
                        return true;
                    }
                }
                let page = loaded.viewport.page_at_screen(&loaded.layout, event.position);
                let hit = self.overlay.hit_test(
                    page,
                    &loaded.projection(page),
                    self.view_width,
                    event.position,
                );
                if hit.stamp {
                    self.events.push(ViewerEvent::AnnotationTapped(hit));
                    return true;
                }
                false
            }
            PointerKind::Move | PointerKind::Up | PointerKind::Cancel => {
                if self.selection.touch_state() == TouchState::Idle {
                    return false;
                }
                let Some(page) = self.selection.range().map(|range| range.page) else {
                    return false;
                };
                let Some(text) = loaded.text.page(page) else {
                    return false;
                };
                let local = loaded.projection(page).to_local(event.position);
                if event.kind == PointerKind::Move {
                    return self.selection.drag(local, text);
                }
                let consumed = self.selection.release(local, text);
                if let Some(selected) = text_selected(self.selection, loaded) {
                    self.events.push(selected);
                }
                consumed
            }
        }
    }
}

pub struct Viewer {
    config: ViewerConfig,
    engine: Arc<dyn PdfEngine>,
    decoder: Arc<dyn ChunkDecoder>,
    events: EventQueue,
    view_size: SizeF,
    session: u64,
    loaded: Option<Loaded>,
    gestures: GestureInterpreter,
    selection: SelectionEngine,
    overlay: AnnotationOverlay,
    merge: ChunkMerge,
    loader: PagesLoader,
}

impl Viewer {
    pub fn new(config: ViewerConfig, engine: Arc<dyn PdfEngine>, view_size: SizeF) -> Self {
        let decoder: Arc<dyn ChunkDecoder> = Arc::new(EngineDecoder::new(Arc::clone(&engine)));
        Self {
            gestures: GestureInterpreter::new(config.gestures.clone()),
            selection: SelectionEngine::new(config.handle_radius),
            overlay: AnnotationOverlay::new(config.stamp_size),
            config,
            engine,
            decoder,
            events: EventQueue::new(),
            view_size,
            session: 0,
            loaded: None,
            merge: ChunkMerge::new(),
            loader: PagesLoader::new(),
        }
    }

    /// Replaces the decoder used by [`Viewer::load`] and [`Viewer::merge_with`].
    pub fn with_decoder(mut self, decoder: Arc<dyn ChunkDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn events(&self) -> EventQueue {
        self.events.clone()
    }

    pub fn drain_events(&self) -> Vec<ViewerEvent> {
        self.events.drain()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn layout(&self) -> Option<&DocumentLayout> {
        self.loaded.as_ref().map(|loaded| &loaded.layout)
    }

    pub fn viewport(&self) -> Option<&ViewportController> {
        self.loaded.as_ref().map(|loaded| &loaded.viewport)
    }

    pub fn text(&self) -> Option<&TextGeometryModel> {
        self.loaded.as_ref().map(|loaded| &loaded.text)
    }

    pub fn tile_cache(&self) -> Option<&TileCache> {
        self.loaded.as_ref().map(|loaded| &loaded.cache)
    }

    pub fn pages_count(&self) -> usize {
        self.layout().map_or(0, DocumentLayout::pages_count)
    }

    pub fn current_page(&self) -> usize {
        self.viewport().map_or(0, ViewportController::current_page)
    }

    pub fn offset(&self) -> PointF {
        self.viewport()
            .map_or_else(PointF::default, ViewportController::offset)
    }

    /// Pagination indices of pages that failed to render.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.loaded
            .as_ref()
            .map_or_else(Vec::new, |loaded| loaded.renderer.failed_pages())
    }

    // Loading

    /// Starts a new load, dropping the current document. Only the result
    /// passed back with the returned token will be accepted.
    pub fn begin_load(&mut self) -> LoadToken {
        self.session += 1;
        self.teardown();
        self.overlay.invalidate();
        self.events.push(ViewerEvent::PreparationStarted);
        LoadToken(self.session)
    }

    /// Finishes a load started with [`Viewer::begin_load`]. Returns `Ok(false)`
    /// when the token is stale and the result was discarded.
    pub fn complete_load(
        &mut self,
        token: LoadToken,
        result: ViewerResult<DecodedChunk>,
    ) -> ViewerResult<bool> {
        if token.0 != self.session {
            debug!("dropping result of a cancelled load");
            if let Ok(chunk) = result {
                self.decoder.discard(chunk);
            }
            return Ok(false);
        }
        match result.and_then(|chunk| self.attach(chunk)) {
            Ok(pages) => {
                info!(pages, "document ready");
                self.events.push(ViewerEvent::PreparationSucceeded { pages });
                if let Some(pagination) = self
                    .layout()
                    .and_then(|layout| layout.pagination_index(0))
                {
                    self.events
                        .push(ViewerEvent::PageChanged { page: 0, pagination });
                }
                Ok(true)
            }
            Err(err) => {
                warn!(%err, "document load failed");
                self.events.push(ViewerEvent::PreparationFailed(err.clone()));
                self.recycle();
                Err(err)
            }
        }
    }

    /// Decodes `source` as the start of the document and shows it.
    pub async fn load(
        &mut self,
        source: DocumentSource,
        password: Option<String>,
    ) -> ViewerResult<bool> {
        self.load_at(source, password, 0).await
    }

    /// Like [`Viewer::load`] for a chunk whose first page has absolute index
    /// `pagination_start`.
    pub async fn load_at(
        &mut self,
        source: DocumentSource,
        password: Option<String>,
        pagination_start: usize,
    ) -> ViewerResult<bool> {
        let decoder = Arc::clone(&self.decoder);
        self.open_with(decoder.as_ref(), source, password, pagination_start)
            .await
    }

    /// Loads through a host-supplied decoder instead of the viewer's own.
    #[instrument(skip(self, decoder, password))]
    pub async fn open_with<D: ChunkDecoder + ?Sized>(
        &mut self,
        decoder: &D,
        source: DocumentSource,
        password: Option<String>,
        pagination_start: usize,
    ) -> ViewerResult<bool> {
        let token = self.begin_load();
        let result = decoder.decode(source, password, pagination_start).await;
        self.complete_load(token, result)
    }

    fn attach(&mut self, chunk: DecodedChunk) -> ViewerResult<usize> {
        let renderer = match TileRenderer::spawn(Arc::clone(&self.engine), 0) {
            Ok(renderer) => renderer,
            Err(err) => {
                self.decoder.discard(chunk);
                return Err(err);
            }
        };
        let pages = chunk.pages();
        let layout = DocumentLayout::new(LayoutOptions::from(&self.config), self.view_size, pages);
        let mut text = TextGeometryModel::new();
        let geometry = text.build_chunk(chunk.pagination_start, chunk.text);
        text.append(geometry);
        text.relayout(&layout);

        let mut viewport = ViewportController::new(&self.config, self.view_size);
        viewport.move_to(&layout, 0.0, 0.0);
        let cache = TileCache::new(
            self.config.render.cache_capacity,
            self.config.render.thumbnail_capacity,
        );

        self.overlay.invalidate();
        self.overlay.resolve_all(&layout, &text);
        let count = layout.pages_count();
        self.loaded = Some(Loaded {
            layout,
            viewport,
            text,
            cache,
            renderer,
            requested: HashSet::new(),
        });
        Ok(count)
    }

    /// Stops the worker, cancels pending decodes and merges, and forgets the
    /// document, its geometry and every annotation.
    pub fn recycle(&mut self) {
        self.session += 1;
        self.teardown();
        self.overlay.clear();
        info!("viewer recycled");
    }

    fn teardown(&mut self) {
        if let Some(mut loaded) = self.loaded.take() {
            loaded.renderer.shutdown();
            for segment in loaded.layout.segments() {
                self.engine.close_document(segment.doc);
            }
        }
        self.selection.clear();
        self.merge.reset();
        self.gestures = GestureInterpreter::new(self.config.gestures.clone());
    }

    // Chunk merging

    pub fn merge_state(&self) -> MergeState {
        self.merge.state()
    }

    /// Page count of the whole document, once the host knows it.
    pub fn set_total_pages(&mut self, total: Option<usize>) {
        self.merge.set_total_pages(total);
    }

    /// Starts a merge at `edge`. Refusals leave every piece of state as it was.
    pub fn request_merge(&mut self, edge: Edge) -> ViewerResult<MergeTicket> {
        let ticket = self
            .merge
            .request(edge, self.loaded.as_ref().map(|loaded| &loaded.layout))
            .map_err(ViewerError::MergeRefused)?;
        self.events.push(ViewerEvent::MergeStarted {
            edge,
            page_to_load: ticket.page_to_load,
        });
        Ok(ticket)
    }

    /// Applies the decoded chunk for merge `id`. Returns `Ok(false)` when the
    /// merge was cancelled in the meantime.
    #[instrument(skip(self, result))]
    pub fn complete_merge(
        &mut self,
        id: u64,
        result: ViewerResult<DecodedChunk>,
    ) -> ViewerResult<bool> {
        let Some(ticket) = self.merge.finish(id) else {
            if let Ok(chunk) = result {
                self.decoder.discard(chunk);
            }
            return Ok(false);
        };
        match result.and_then(|chunk| self.splice(&ticket, chunk)) {
            Ok(pages) => {
                self.events.push(ViewerEvent::MergeEnded {
                    edge: ticket.edge,
                    pages,
                });
                Ok(true)
            }
            Err(err) => {
                let err = match err {
                    ViewerError::Merge(_) => err,
                    other => ViewerError::Merge(other.to_string()),
                };
                warn!(%err, edge = ?ticket.edge, "merge failed");
                self.events.push(ViewerEvent::MergeFailed {
                    edge: ticket.edge,
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    /// Requests a merge at `edge`, decodes `source` and splices it in.
    #[instrument(skip(self, password))]
    pub async fn merge_with(
        &mut self,
        edge: Edge,
        source: DocumentSource,
        password: Option<String>,
    ) -> ViewerResult<bool> {
        let ticket = self.request_merge(edge)?;
        let start = match edge {
            Edge::Bottom => ticket.page_to_load,
            Edge::Top => 0,
        };
        let decoder = Arc::clone(&self.decoder);
        let result = decoder
            .decode(source, password, start)
            .await
            .map(|mut chunk| {
                if edge == Edge::Top {
                    // a top chunk ends right before the loaded range
                    chunk.pagination_start =
                        (ticket.page_to_load + 1).saturating_sub(chunk.page_count());
                }
                chunk
            });
        self.complete_merge(ticket.id, result)
    }

    fn splice(&mut self, ticket: &MergeTicket, chunk: DecodedChunk) -> ViewerResult<usize> {
        let Some(loaded) = self.loaded.as_mut() else {
            self.decoder.discard(chunk);
            return Err(ViewerError::NotLoaded);
        };
        if let Err(err) = ChunkMerge::check_contiguous(
            ticket,
            &loaded.layout,
            chunk.pagination_start,
            chunk.page_count(),
        ) {
            self.decoder.discard(chunk);
            return Err(err);
        }

        let pages = chunk.pages();
        let count = pages.sizes.len();
        let current = loaded
            .layout
            .pagination_index(loaded.viewport.current_page());
        let geometry = loaded.text.build_chunk(chunk.pagination_start, chunk.text);
        match ticket.edge {
            Edge::Top => {
                let delta = loaded.layout.merge_at_top(pages)?;
                loaded.text.prepend(geometry);
                let shift = delta * loaded.viewport.zoom();
                loaded.viewport.shift_main_axis(&loaded.layout, -shift);
                loaded.invalidate_tiles();
            }
            Edge::Bottom => {
                let before = (loaded.layout.max_page_width(), loaded.layout.max_page_height());
                loaded.layout.merge_at_bottom(pages)?;
                loaded.text.append(geometry);
                let after = (loaded.layout.max_page_width(), loaded.layout.max_page_height());
                if before != after {
                    loaded.invalidate_tiles();
                }
            }
        }
        loaded.text.relayout(&loaded.layout);
        if let Some(page) = current.and_then(|p| loaded.layout.page_index_from_pagination(p)) {
            loaded.viewport.set_current_page(page);
        }
        self.selection.rederive(&loaded.layout, &loaded.text);
        self.overlay.invalidate();
        self.overlay.resolve_all(&loaded.layout, &loaded.text);
        info!(
            edge = ?ticket.edge,
            pages = count,
            total = loaded.layout.pages_count(),
            "chunk merged"
        );
        Ok(count)
    }

    // Navigation

    pub fn move_to(&mut self, x: f32, y: f32) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        report_edge(loaded.viewport.move_to(&loaded.layout, x, y), &self.events);
        loaded.track_page(&self.events);
    }

    pub fn move_relative(&mut self, dx: f32, dy: f32) {
        let offset = self.offset();
        self.move_to(offset.x + dx, offset.y + dy);
    }

    /// Scrolls to the start of `page` (clamped), aligned per the snap policy.
    #[instrument(skip(self))]
    pub fn jump_to(&mut self, page: usize, animate: bool, now: u64) -> ViewerResult<usize> {
        let loaded = self.loaded.as_mut().ok_or(ViewerError::NotLoaded)?;
        let page = loaded
            .layout
            .determine_valid_page_number(isize::try_from(page).unwrap_or(isize::MAX));
        let mut target = loaded.viewport.jump_offset(&loaded.layout, page);
        if self.config.page_snap {
            let len = loaded.viewport.viewport_len(&loaded.layout);
            let zoom = loaded.viewport.zoom();
            let edge = loaded.layout.snap_edge(page, zoom, target, len);
            target = -loaded.layout.snap_offset(page, edge, zoom, len);
        }
        loaded.viewport.stop_animation();
        if animate {
            loaded
                .viewport
                .start_main_axis_scroll(&loaded.layout, target, now);
        } else {
            let offset = loaded.viewport.offset();
            let (x, y) = if loaded.layout.is_vertical() {
                (offset.x, target)
            } else {
                (target, offset.y)
            };
            report_edge(loaded.viewport.move_to(&loaded.layout, x, y), &self.events);
        }
        loaded.show_page(page, &self.events);
        Ok(page)
    }

    /// Jumps to an absolute page. Returns `Ok(None)` when that page is not
    /// part of the loaded range.
    pub fn jump_to_pagination(
        &mut self,
        pagination: usize,
        animate: bool,
        now: u64,
    ) -> ViewerResult<Option<usize>> {
        let layout = self.layout().ok_or(ViewerError::NotLoaded)?;
        match layout.page_index_from_pagination(pagination) {
            Some(page) => self.jump_to(page, animate, now).map(Some),
            None => Ok(None),
        }
    }

    pub fn position_offset(&self) -> f32 {
        self.loaded.as_ref().map_or(0.0, |loaded| {
            loaded.viewport.position_offset(&loaded.layout)
        })
    }

    pub fn set_position_offset(&mut self, progress: f32) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let edge = loaded
            .viewport
            .set_position_offset(&loaded.layout, progress.clamp(0.0, 1.0));
        report_edge(edge, &self.events);
        loaded.track_page(&self.events);
    }

    pub fn is_animating(&self) -> bool {
        self.viewport().is_some_and(ViewportController::is_animating)
    }

    pub fn stop_animation(&mut self) {
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.viewport.stop_animation();
        }
    }

    // Zoom

    pub fn zoom(&self) -> f32 {
        self.viewport()
            .map_or(self.config.zoom.min, ViewportController::zoom)
    }

    pub fn is_zooming(&self) -> bool {
        self.viewport().is_some_and(ViewportController::is_zooming)
    }

    pub fn to_real_scale(&self, size: f32) -> f32 {
        size / self.zoom()
    }

    pub fn to_current_scale(&self, size: f32) -> f32 {
        size * self.zoom()
    }

    /// Sets the zoom around the top-left corner.
    pub fn zoom_to(&mut self, zoom: f32) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        loaded.viewport.zoom_to(zoom);
        report_edge(loaded.viewport.reclamp(&loaded.layout), &self.events);
        loaded.track_page(&self.events);
    }

    pub fn zoom_centered_to(&mut self, zoom: f32, pivot: PointF) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let edge = loaded.viewport.zoom_centered_to(&loaded.layout, zoom, pivot);
        report_edge(edge, &self.events);
        loaded.track_page(&self.events);
    }

    pub fn zoom_centered_relative_to(&mut self, factor: f32, pivot: PointF) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let edge = loaded
            .viewport
            .zoom_centered_relative_to(&loaded.layout, factor, pivot);
        report_edge(edge, &self.events);
        loaded.track_page(&self.events);
    }

    pub fn zoom_with_animation(&mut self, zoom: f32, pivot: PointF, now: u64) {
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.viewport.start_zoom(pivot, zoom, now);
        }
    }

    pub fn reset_zoom(&mut self) {
        self.zoom_to(self.config.zoom.min);
    }

    pub fn reset_zoom_with_animation(&mut self, now: u64) {
        let center = PointF::new(self.view_size.width / 2.0, self.view_size.height / 2.0);
        self.zoom_with_animation(self.config.zoom.min, center, now);
    }

    /// Applies a new view size: layout, text geometry and annotation segments
    /// are recomputed and every tile is invalidated.
    pub fn on_size_changed(&mut self, width: f32, height: f32) {
        self.view_size = SizeF::new(width, height);
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let edge = loaded.viewport.resize(&mut loaded.layout, self.view_size);
        loaded.text.relayout(&loaded.layout);
        loaded.invalidate_tiles();
        self.selection.rederive(&loaded.layout, &loaded.text);
        self.overlay.invalidate();
        self.overlay.resolve_all(&loaded.layout, &loaded.text);
        report_edge(edge, &self.events);
        loaded.track_page(&self.events);
        debug!(width, height, "view resized");
    }

    // Input

    pub fn on_pointer(&mut self, event: PointerEvent) {
        self.resolve_annotations();
        let gestures = {
            let mut sink = ViewerTouchSink {
                loaded: self.loaded.as_ref(),
                selection: &mut self.selection,
                overlay: &self.overlay,
                events: &self.events,
                view_width: self.view_size.width,
            };
            self.gestures.on_pointer(&event, &mut sink)
        };
        for gesture in gestures {
            self.apply_gesture(gesture, event.time_ms);
        }
    }

    fn apply_gesture(&mut self, gesture: Gesture, now: u64) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let events = &self.events;
        match gesture {
            Gesture::Down { .. } => loaded.viewport.stop_fling(),
            Gesture::Tap { position } => {
                if let Some((pagination, action)) =
                    link_at(loaded, self.engine.as_ref(), position)
                {
                    let destination = match &action {
                        LinkAction::GoTo { page } => loaded.layout.page_index_from_pagination(*page),
                        LinkAction::Uri { .. } => None,
                    };
                    events.push(ViewerEvent::LinkTapped { pagination, action });
                    if let Some(page) = destination {
                        if let Err(err) = self.jump_to(page, false, now) {
                            debug!(%err, "link destination not reachable");
                        }
                    }
                    return;
                }
                if self.selection.has_selection() {
                    self.selection.clear();
                    events.push(ViewerEvent::SelectionCleared);
                    return;
                }
                let page = loaded.viewport.page_at_screen(&loaded.layout, position);
                let hit = self.overlay.hit_test(
                    page,
                    &loaded.projection(page),
                    self.view_size.width,
                    position,
                );
                if !hit.ids.is_empty() {
                    events.push(ViewerEvent::AnnotationTapped(hit));
                }
            }
            Gesture::DoubleTap { position } => {
                let next = loaded.viewport.next_zoom_level();
                loaded.viewport.start_zoom(position, next, now);
            }
            Gesture::LongPress { position } => {
                let page = loaded.viewport.page_at_screen(&loaded.layout, position);
                let (Some(text), Some(pagination)) =
                    (loaded.text.page(page), loaded.layout.pagination_index(page))
                else {
                    return;
                };
                let local = loaded.projection(page).to_local(position);
                if self.selection.select_word(page, pagination, text, local) {
                    if let Some(selected) = text_selected(&self.selection, loaded) {
                        events.push(selected);
                    }
                }
            }
            Gesture::Pan { dx, dy } => {
                let edge = loaded.viewport.move_relative(&loaded.layout, dx, dy);
                report_edge(edge, events);
                loaded.track_page(events);
            }
            Gesture::Fling { velocity, drag } => {
                if self.config.page_fling {
                    if loaded.viewport.page_fills_screen(&loaded.layout) {
                        let bounds = loaded.viewport.page_fling_bounds(&loaded.layout);
                        loaded.viewport.start_fling(velocity, bounds, now);
                    } else if let Some(target) =
                        loaded
                            .viewport
                            .page_fling_target(&loaded.layout, drag, velocity)
                    {
                        loaded
                            .viewport
                            .start_main_axis_scroll(&loaded.layout, target, now);
                    }
                } else {
                    let bounds = loaded.viewport.fling_bounds(&loaded.layout);
                    loaded.viewport.start_fling(velocity, bounds, now);
                }
            }
            Gesture::ScrollEnd { flung } => {
                if !flung {
                    loaded.viewport.perform_page_snap(&loaded.layout, now);
                }
            }
            Gesture::Pinch { factor, focus } => {
                let edge = loaded
                    .viewport
                    .zoom_centered_relative_to(&loaded.layout, factor, focus);
                report_edge(edge, events);
                loaded.track_page(events);
            }
            Gesture::PinchEnd => {
                loaded.viewport.perform_page_snap(&loaded.layout, now);
            }
        }
    }

    /// Advances timers and animations to `now`, collects finished tiles and
    /// queues the ones the new viewport needs. Returns whether the frame
    /// changed.
    pub fn tick(&mut self, now: u64) -> bool {
        for gesture in self.gestures.poll(now) {
            self.apply_gesture(gesture, now);
        }
        let moved = match self.loaded.as_mut() {
            Some(loaded) => {
                let outcome = loaded.viewport.tick(&loaded.layout, now);
                report_edge(outcome.edge, &self.events);
                if outcome.finished && outcome.was_fling {
                    loaded.viewport.perform_page_snap(&loaded.layout, now);
                }
                if outcome.moved {
                    loaded.track_page(&self.events);
                }
                outcome.moved
            }
            None => false,
        };
        let tiles = self.pump_tiles();
        moved || tiles
    }

    /// Collects finished tiles and submits what the viewport still misses.
    /// Returns whether any completion arrived.
    pub fn pump_tiles(&mut self) -> bool {
        let Some(loaded) = self.loaded.as_mut() else {
            return false;
        };
        let outcomes = loaded.renderer.try_completions();
        let arrived = !outcomes.is_empty();
        for outcome in outcomes {
            loaded.absorb(outcome, &self.events);
        }
        let requests = self.loader.plan(
            &loaded.layout,
            &loaded.viewport,
            &mut loaded.cache,
            &self.config.render,
            self.config.render.annotation_rendering,
        );
        for request in requests {
            if loaded.renderer.has_failed(request.target.pagination) {
                continue;
            }
            if loaded.requested.insert(request.key()) {
                loaded.renderer.submit(request);
            }
        }
        arrived
    }

    /// Blocks until every tile the viewport needs has been rendered, or
    /// `timeout` elapses. Returns whether the pipeline went idle.
    pub fn render_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump_tiles();
            let Some(loaded) = self.loaded.as_mut() else {
                return false;
            };
            if loaded.renderer.is_idle() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            if let Some(outcome) = loaded.renderer.recv_timeout(remaining) {
                loaded.absorb(outcome, &self.events);
            }
        }
    }

    /// Draws the visible part of the document: thumbnails, then tiles, then
    /// the selection and annotations.
    pub fn compose_frame(&mut self, surface: &mut dyn RasterSurface) {
        self.resolve_annotations();
        let Some(loaded) = self.loaded.as_ref() else {
            return;
        };
        let Some((first, last)) = PagesLoader::visible_pages(&loaded.layout, &loaded.viewport, 0.0)
        else {
            return;
        };
        for page in first..=last {
            let Some(pagination) = loaded.layout.pagination_index(page) else {
                continue;
            };
            let rect = PagesLoader::page_screen_rect(&loaded.layout, &loaded.viewport, page);
            if loaded.renderer.has_failed(pagination) {
                surface.fill_rect(rect, ERROR_PAGE_COLOR);
                continue;
            }
            if let Some(thumbnail) = loaded.cache.thumbnail(pagination) {
                surface.draw_bitmap(&thumbnail.bitmap, rect);
            }
            for tile in loaded.cache.tiles_for_page(pagination) {
                let dest = RectF::new(
                    rect.left + tile.crop.left * rect.width(),
                    rect.top + tile.crop.top * rect.height(),
                    rect.left + tile.crop.right * rect.width(),
                    rect.top + tile.crop.bottom * rect.height(),
                );
                surface.draw_bitmap(&tile.bitmap, dest);
            }

            let projection = loaded.projection(page);
            if let Some(range) = self.selection.range().filter(|range| range.page == page) {
                for segment in &range.segments {
                    surface.fill_rect(projection.rect_to_screen(&segment.rect), SELECTION_COLOR);
                }
                if let Some((start, end)) = self.selection.handle_positions() {
                    let radius = self.selection.handle_radius() * projection.zoom;
                    surface.fill_circle(projection.to_screen(start), radius, HANDLE_COLOR);
                    surface.fill_circle(projection.to_screen(end), radius, HANDLE_COLOR);
                }
            }
            self.overlay.draw(page, &projection, surface);
        }
    }

    // Selection

    pub fn has_selection(&self) -> bool {
        self.selection.has_selection()
    }

    pub fn selection(&self) -> Option<&SelectionRange> {
        self.selection.range()
    }

    pub fn selected_text(&self) -> Option<String> {
        self.selection.selected_text()
    }

    pub fn clear_selection(&mut self) {
        if self.selection.has_selection() {
            self.selection.clear();
            self.events.push(ViewerEvent::SelectionCleared);
        }
    }

    /// Turns the current selection into an annotation, adds it and clears
    /// the selection.
    pub fn selection_to_annotation(&mut self, id: u64, kind: AnnotationKind) -> Option<Annotation> {
        let loaded = self.loaded.as_ref()?;
        let range = self.selection.range()?;
        let height = loaded.text.page(range.page)?.native_size.height;
        let (start, end) = range.native_anchors(height)?;
        let annotation = Annotation {
            id,
            pagination: range.pagination,
            start,
            end,
            kind,
        };
        self.overlay
            .add(annotation.clone(), &loaded.layout, &loaded.text);
        self.clear_selection();
        Some(annotation)
    }

    // Annotations

    pub fn annotation(&self, id: u64) -> Option<&Annotation> {
        self.overlay.get(id)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.overlay.annotations()
    }

    pub fn overlay(&self) -> &AnnotationOverlay {
        &self.overlay
    }

    /// Adds or replaces an annotation.
    pub fn add_annotation(&mut self, annotation: Annotation) {
        match self.loaded.as_ref() {
            Some(loaded) => self.overlay.add(annotation, &loaded.layout, &loaded.text),
            None => {
                let mut all: Vec<Annotation> = self
                    .overlay
                    .annotations()
                    .filter(|existing| existing.id != annotation.id)
                    .cloned()
                    .collect();
                all.push(annotation);
                self.overlay.set_annotations(all);
            }
        }
    }

    pub fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        self.overlay.set_annotations(annotations);
        self.resolve_annotations();
    }

    pub fn remove_annotations(&mut self, ids: &[u64]) -> usize {
        self.overlay.remove(ids)
    }

    fn resolve_annotations(&mut self) {
        if let Some(loaded) = self.loaded.as_ref() {
            self.overlay.resolve_all(&loaded.layout, &loaded.text);
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RgbaCanvas;
    use crate::decode::decode_blocking;
    use crate::engine::PixelBuffer;
    use crate::geometry::NormalizedRect;
    use crate::merge::MergeRefusal;
    use crate::testing::FakeEngine;
    use std::path::PathBuf;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn file() -> DocumentSource {
        DocumentSource::File(PathBuf::from("book.pdf"))
    }

    /// Five 400x500 pages in a 400x600 view, plus a two-page chunk for merges.
    fn engine() -> Arc<FakeEngine> {
        Arc::new(
            FakeEngine::with_pages(&[(400.0, 500.0); 5])
                .with_chunk(b"before", &[(400.0, 500.0); 2])
                .with_chunk(b"after", &[(400.0, 500.0); 3]),
        )
    }

    fn viewer(engine: Arc<FakeEngine>) -> Viewer {
        Viewer::new(ViewerConfig::default(), engine, SizeF::new(400.0, 600.0))
    }

    fn pointer(kind: PointerKind, x: f32, y: f32, t: u64) -> PointerEvent {
        PointerEvent::new(0, kind, x, y, t)
    }

    fn comment(id: u64, pagination: usize) -> Annotation {
        // covers "page" on the fake text line, expressed bottom-up
        Annotation {
            id,
            pagination,
            start: PointF::new(10.0, 475.0),
            end: PointF::new(45.0, 475.0),
            kind: AnnotationKind::Comment {
                text: "note".into(),
            },
        }
    }

    #[tokio::test]
    async fn load_reports_preparation_and_first_page() {
        let mut viewer = viewer(engine());
        assert!(viewer.load_at(file(), None, 10).await.unwrap());
        assert_eq!(viewer.pages_count(), 5);
        assert_eq!(
            viewer.drain_events(),
            vec![
                ViewerEvent::PreparationStarted,
                ViewerEvent::PreparationSucceeded { pages: 5 },
                ViewerEvent::PageChanged {
                    page: 0,
                    pagination: 10
                },
            ]
        );
    }

    #[tokio::test]
    async fn decode_failure_is_reported_once_and_recycles() {
        let engine = Arc::new(FakeEngine::with_pages(&[(400.0, 500.0)]).with_password("pw"));
        let mut viewer = viewer(engine.clone());
        let err = viewer.load(file(), None).await.unwrap_err();
        assert!(matches!(err, ViewerError::Decode(_)));
        let events = viewer.drain_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ViewerEvent::PreparationFailed(_)))
                .count(),
            1
        );
        assert!(!viewer.is_loaded());
        assert_eq!(engine.open_documents(), 0);
    }

    struct InlineDecoder {
        engine: Arc<FakeEngine>,
    }

    #[async_trait::async_trait]
    impl ChunkDecoder for InlineDecoder {
        async fn decode(
            &self,
            source: DocumentSource,
            password: Option<String>,
            pagination_start: usize,
        ) -> ViewerResult<DecodedChunk> {
            decode_blocking(
                self.engine.as_ref(),
                &source,
                password.as_deref(),
                pagination_start,
            )
        }

        fn discard(&self, chunk: DecodedChunk) {
            self.engine.close_document(chunk.doc);
        }
    }

    #[tokio::test]
    async fn open_with_uses_the_host_decoder() {
        let engine = engine();
        let mut viewer = viewer(engine.clone());
        let decoder = InlineDecoder {
            engine: engine.clone(),
        };
        assert!(viewer
            .open_with(&decoder, DocumentSource::bytes(b"after".to_vec()), None, 5)
            .await
            .unwrap());
        assert_eq!(viewer.pages_count(), 3);
        assert_eq!(viewer.layout().unwrap().pagination_end(), 7);
        assert_eq!(engine.open_documents(), 1);
    }

    #[test]
    fn stale_load_results_are_discarded() {
        let engine = engine();
        let mut viewer = viewer(engine.clone());
        let first = viewer.begin_load();
        let second = viewer.begin_load();
        let stale = decode_blocking(engine.as_ref(), &file(), None, 0);
        let stale_doc = stale.as_ref().map(|chunk| chunk.doc).unwrap();
        assert!(!viewer.complete_load(first, stale).unwrap());
        assert!(!viewer.is_loaded());
        assert_eq!(engine.closed_documents(), vec![stale_doc]);

        let fresh = decode_blocking(engine.as_ref(), &file(), None, 0);
        assert!(viewer.complete_load(second, fresh).unwrap());
        assert!(viewer.is_loaded());
    }

    #[tokio::test]
    async fn visible_pages_render_into_the_frame() {
        let mut viewer = viewer(engine());
        viewer.load(file(), None).await.unwrap();
        assert!(viewer.render_until_idle(TIMEOUT));

        let mut canvas = RgbaCanvas::new(400, 600, [0, 0, 0, 255]);
        viewer.compose_frame(&mut canvas);
        let frame: PixelBuffer = canvas.into_buffer();
        assert_eq!(frame.pixel(200, 250), Some(FakeEngine::page_color(0)));
        assert_eq!(frame.pixel(200, 550), Some(FakeEngine::page_color(1)));
        assert!(viewer.tile_cache().unwrap().thumbnail(1).is_some());
    }

    #[tokio::test]
    async fn broken_page_is_reported_without_blocking_others() {
        let engine = Arc::new(FakeEngine::with_pages(&[(400.0, 500.0); 3]).failing_page(1));
        let mut viewer = viewer(engine.clone());
        viewer.load(file(), None).await.unwrap();
        viewer.drain_events();
        assert!(viewer.render_until_idle(TIMEOUT));

        let errors: Vec<usize> = viewer
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                ViewerEvent::PageError { pagination, .. } => Some(pagination),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec![1]);
        assert_eq!(viewer.failed_pages(), vec![1]);
        assert_eq!(engine.open_attempts(1), 1);

        let mut canvas = RgbaCanvas::new(400, 600, [0, 0, 0, 255]);
        viewer.compose_frame(&mut canvas);
        let frame = canvas.into_buffer();
        assert_eq!(frame.pixel(200, 100), Some(FakeEngine::page_color(0)));
        assert_eq!(frame.pixel(200, 550), Some(ERROR_PAGE_COLOR));
    }

    #[tokio::test]
    async fn panning_past_the_start_reports_the_edge_once() {
        let mut viewer = viewer(engine());
        viewer.load_at(file(), None, 10).await.unwrap();
        viewer.drain_events();

        viewer.on_pointer(pointer(PointerKind::Down, 100.0, 100.0, 0));
        viewer.on_pointer(pointer(PointerKind::Move, 100.0, 150.0, 20));
        viewer.on_pointer(pointer(PointerKind::Move, 100.0, 200.0, 40));
        let edges: Vec<ViewerEvent> = viewer
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, ViewerEvent::EdgeReached(_)))
            .collect();
        assert_eq!(edges, vec![ViewerEvent::EdgeReached(Edge::Top)]);
        assert_eq!(viewer.offset().y, 0.0);
    }

    #[tokio::test]
    async fn top_merge_keeps_content_stationary() {
        let mut viewer = viewer(engine());
        viewer.load_at(file(), None, 10).await.unwrap();
        viewer.add_annotation(comment(7, 11));
        viewer.move_to(0.0, -700.0);
        assert_eq!(viewer.current_page(), 2);
        let generation = viewer.tile_cache().unwrap().generation();
        viewer.drain_events();

        let merged = viewer
            .merge_with(Edge::Top, DocumentSource::bytes(b"before".to_vec()), None)
            .await
            .unwrap();
        assert!(merged);
        assert_eq!(viewer.offset().y, -1_700.0);
        assert_eq!(viewer.pages_count(), 7);
        assert_eq!(viewer.layout().unwrap().pagination_start(), 8);
        assert_eq!(viewer.current_page(), 4);
        assert!(viewer.tile_cache().unwrap().generation() > generation);

        assert_eq!(viewer.annotation(7).unwrap().pagination, 11);
        let (page, segments) = viewer.overlay().segments(7).unwrap();
        assert_eq!(page, 3);
        assert!(!segments.is_empty());
        assert_eq!(
            viewer.drain_events(),
            vec![
                ViewerEvent::MergeStarted {
                    edge: Edge::Top,
                    page_to_load: 9
                },
                ViewerEvent::MergeEnded {
                    edge: Edge::Top,
                    pages: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn bottom_merge_appends_without_moving() {
        let mut viewer = viewer(engine());
        viewer.load(file(), None).await.unwrap();
        viewer.set_total_pages(Some(8));
        viewer.move_to(0.0, -1_900.0);
        let offset = viewer.offset();
        let generation = viewer.tile_cache().unwrap().generation();

        assert!(viewer
            .merge_with(Edge::Bottom, DocumentSource::bytes(b"after".to_vec()), None)
            .await
            .unwrap());
        assert_eq!(viewer.offset(), offset);
        assert_eq!(viewer.pages_count(), 8);
        assert_eq!(viewer.layout().unwrap().pagination_end(), 7);
        assert_eq!(viewer.tile_cache().unwrap().generation(), generation);

        let refused = viewer.request_merge(Edge::Bottom).unwrap_err();
        assert_eq!(
            refused,
            ViewerError::MergeRefused(MergeRefusal::LastPageReached)
        );
    }

    #[tokio::test]
    async fn merge_request_while_busy_changes_nothing() {
        let mut viewer = viewer(engine());
        viewer.load_at(file(), None, 10).await.unwrap();
        viewer.move_to(0.0, -300.0);
        let ticket = viewer.request_merge(Edge::Top).unwrap();
        let offset = viewer.offset();
        let generation = viewer.tile_cache().unwrap().generation();
        viewer.drain_events();

        let refused = viewer.request_merge(Edge::Top).unwrap_err();
        assert_eq!(refused, ViewerError::MergeRefused(MergeRefusal::Busy));
        assert_eq!(viewer.offset(), offset);
        assert_eq!(viewer.pages_count(), 5);
        assert_eq!(viewer.tile_cache().unwrap().generation(), generation);
        assert!(viewer.drain_events().is_empty());
        assert_eq!(viewer.merge_state(), MergeState::MergingAtTop);

        let err = viewer
            .complete_merge(ticket.id, Err(ViewerError::decode("truncated chunk")))
            .unwrap_err();
        assert!(matches!(err, ViewerError::Merge(_)));
        assert_eq!(viewer.merge_state(), MergeState::Idle);
        assert_eq!(viewer.offset(), offset);
        assert_eq!(viewer.pages_count(), 5);
        assert!(matches!(
            viewer.drain_events().as_slice(),
            [ViewerEvent::MergeFailed { edge: Edge::Top, .. }]
        ));
        // the edge can be approached again
        assert!(viewer.request_merge(Edge::Top).is_ok());
    }

    #[tokio::test]
    async fn recycle_discards_inflight_merge() {
        let engine = engine();
        let mut viewer = viewer(engine.clone());
        viewer.load_at(file(), None, 10).await.unwrap();
        viewer.add_annotation(comment(1, 10));
        let ticket = viewer.request_merge(Edge::Top).unwrap();
        viewer.recycle();

        assert!(!viewer.is_loaded());
        assert_eq!(viewer.annotations().count(), 0);
        assert_eq!(engine.open_documents(), 0);

        let late = decode_blocking(
            engine.as_ref(),
            &DocumentSource::bytes(b"before".to_vec()),
            None,
            8,
        );
        assert!(!viewer.complete_merge(ticket.id, late).unwrap());
        assert_eq!(engine.open_documents(), 0);
    }

    #[tokio::test]
    async fn long_press_selects_and_tap_clears() {
        let mut viewer = viewer(engine());
        viewer.load(file(), None).await.unwrap();
        viewer.drain_events();

        viewer.on_pointer(pointer(PointerKind::Down, 25.0, 25.0, 0));
        viewer.tick(600);
        viewer.on_pointer(pointer(PointerKind::Up, 25.0, 25.0, 650));
        assert!(viewer.has_selection());
        assert_eq!(viewer.selected_text().unwrap().trim(), "page");
        match viewer.drain_events().as_slice() {
            [ViewerEvent::TextSelected {
                text, pagination, ..
            }] => {
                assert_eq!(text.trim(), "page");
                assert_eq!(*pagination, 0);
            }
            other => panic!("unexpected events: {:?}", other),
        }

        viewer.on_pointer(pointer(PointerKind::Down, 200.0, 300.0, 1_000));
        viewer.on_pointer(pointer(PointerKind::Up, 200.0, 300.0, 1_050));
        viewer.tick(1_500);
        assert!(!viewer.has_selection());
        assert!(viewer
            .drain_events()
            .contains(&ViewerEvent::SelectionCleared));
    }

    #[tokio::test]
    async fn selection_becomes_an_annotation() {
        let mut viewer = viewer(engine());
        viewer.load_at(file(), None, 3).await.unwrap();
        viewer.on_pointer(pointer(PointerKind::Down, 25.0, 25.0, 0));
        viewer.tick(600);
        viewer.on_pointer(pointer(PointerKind::Up, 25.0, 25.0, 650));

        let annotation = viewer
            .selection_to_annotation(
                42,
                AnnotationKind::Highlight {
                    color: [255, 235, 59],
                },
            )
            .unwrap();
        assert_eq!(annotation.pagination, 3);
        assert!(!viewer.has_selection());
        let (page, segments) = viewer.overlay().segments(42).unwrap();
        assert_eq!(page, 0);
        assert!(!segments.is_empty());
    }

    #[tokio::test]
    async fn underline_tap_reports_annotation() {
        let mut viewer = viewer(engine());
        viewer.load(file(), None).await.unwrap();
        viewer.set_annotations(vec![comment(5, 0)]);
        viewer.drain_events();

        viewer.on_pointer(pointer(PointerKind::Down, 25.0, 25.0, 0));
        viewer.on_pointer(pointer(PointerKind::Up, 25.0, 25.0, 40));
        viewer.tick(500);
        assert!(viewer.drain_events().contains(&ViewerEvent::AnnotationTapped(
            crate::annotation::AnnotationHit {
                ids: vec![5],
                stamp: false,
            }
        )));
    }

    #[tokio::test]
    async fn double_tap_zooms_to_mid_level() {
        let mut viewer = viewer(engine());
        viewer.load(file(), None).await.unwrap();
        viewer.on_pointer(pointer(PointerKind::Down, 200.0, 300.0, 0));
        viewer.on_pointer(pointer(PointerKind::Up, 200.0, 300.0, 50));
        viewer.on_pointer(pointer(PointerKind::Down, 200.0, 300.0, 120));
        viewer.on_pointer(pointer(PointerKind::Up, 200.0, 300.0, 160));
        assert!(viewer.is_animating());
        viewer.tick(2_000);
        assert_eq!(viewer.zoom(), 1.75);
        assert!(viewer.is_zooming());
    }

    #[tokio::test]
    async fn jump_to_pagination_moves_to_the_page_start() {
        let mut viewer = viewer(engine());
        viewer.load_at(file(), None, 20).await.unwrap();
        viewer.drain_events();
        assert_eq!(viewer.jump_to_pagination(22, false, 0).unwrap(), Some(2));
        assert_eq!(viewer.offset().y, -1_000.0);
        assert_eq!(
            viewer.drain_events(),
            vec![ViewerEvent::PageChanged {
                page: 2,
                pagination: 22
            }]
        );
        assert_eq!(viewer.jump_to_pagination(3, false, 0).unwrap(), None);
        assert_eq!(viewer.jump_to(99, false, 0).unwrap(), 4);
    }

    #[tokio::test]
    async fn resize_invalidates_tiles_and_keeps_position() {
        let mut viewer = viewer(engine());
        viewer.load(file(), None).await.unwrap();
        viewer.set_position_offset(0.5);
        let position = viewer.position_offset();
        let generation = viewer.tile_cache().unwrap().generation();

        viewer.on_size_changed(800.0, 1_200.0);
        assert_eq!(viewer.layout().unwrap().page_size(0), SizeF::new(800.0, 1_000.0));
        assert!(viewer.tile_cache().unwrap().generation() > generation);
        assert!((viewer.position_offset() - position).abs() < 0.01);
    }

    #[tokio::test]
    async fn pinch_zoom_stays_within_bounds() {
        let mut viewer = viewer(engine());
        viewer.load(file(), None).await.unwrap();
        viewer.zoom_centered_relative_to(100.0, PointF::new(200.0, 300.0));
        assert_eq!(viewer.zoom(), 5.0);
        viewer.zoom_centered_relative_to(0.001, PointF::new(200.0, 300.0));
        assert_eq!(viewer.zoom(), 1.0);
        assert!(!viewer.is_zooming());
    }

    #[tokio::test]
    async fn selection_follows_its_page_through_a_top_merge() {
        let mut viewer = viewer(engine());
        viewer.load_at(file(), None, 10).await.unwrap();
        viewer.on_pointer(pointer(PointerKind::Down, 25.0, 25.0, 0));
        viewer.tick(600);
        viewer.on_pointer(pointer(PointerKind::Up, 25.0, 25.0, 650));
        let before = viewer.selection().unwrap().clone();
        assert_eq!((before.page, before.pagination), (0, 10));

        assert!(viewer
            .merge_with(Edge::Top, DocumentSource::bytes(b"before".to_vec()), None)
            .await
            .unwrap());

        let after = viewer.selection().unwrap();
        assert_eq!(after.page, 2);
        assert_eq!(after.pagination, 10);
        assert_eq!(viewer.selected_text().unwrap().trim(), "page");
        assert_eq!(after.segments.len(), before.segments.len());
    }

    #[tokio::test]
    async fn stale_tile_keeps_the_rerequested_key_pending() {
        let mut viewer = viewer(engine());
        viewer.load(file(), None).await.unwrap();
        assert!(viewer.render_until_idle(TIMEOUT));
        let old = viewer.tile_cache().unwrap().tiles_for_page(0)[0].clone();

        viewer.loaded.as_mut().unwrap().invalidate_tiles();
        viewer.pump_tiles();
        let loaded = viewer.loaded.as_mut().unwrap();
        assert!(loaded.requested.contains(&old.key()));

        loaded.absorb(RenderOutcome::Tile(old.clone()), &viewer.events);
        assert!(loaded.requested.contains(&old.key()));
        assert!(!loaded.cache.contains(&old.key()));

        assert!(viewer.render_until_idle(TIMEOUT));
        assert!(viewer.tile_cache().unwrap().contains(&old.key()));
    }

    #[tokio::test]
    async fn taps_on_links_report_them_and_follow_internal_ones() {
        let engine = Arc::new(
            FakeEngine::with_pages(&[(400.0, 500.0); 5])
                .with_link(
                    0,
                    NormalizedRect {
                        left: 0.0,
                        top: 0.0,
                        right: 0.5,
                        bottom: 0.2,
                    },
                    LinkAction::Uri {
                        uri: "https://example.org".into(),
                    },
                )
                .with_link(
                    0,
                    NormalizedRect {
                        left: 0.5,
                        top: 0.6,
                        right: 1.0,
                        bottom: 1.0,
                    },
                    LinkAction::GoTo { page: 3 },
                ),
        );
        let mut viewer = viewer(engine);
        viewer.load_at(file(), None, 10).await.unwrap();
        viewer.drain_events();

        viewer.on_pointer(pointer(PointerKind::Down, 100.0, 50.0, 0));
        viewer.on_pointer(pointer(PointerKind::Up, 100.0, 50.0, 40));
        viewer.tick(500);
        assert_eq!(
            viewer.drain_events(),
            vec![ViewerEvent::LinkTapped {
                pagination: 10,
                action: LinkAction::Uri {
                    uri: "https://example.org".into()
                },
            }]
        );
        assert_eq!(viewer.current_page(), 0);

        viewer.on_pointer(pointer(PointerKind::Down, 300.0, 400.0, 1_000));
        viewer.on_pointer(pointer(PointerKind::Up, 300.0, 400.0, 1_040));
        viewer.tick(1_500);
        let events = viewer.drain_events();
        assert!(events.contains(&ViewerEvent::LinkTapped {
            pagination: 10,
            action: LinkAction::GoTo { page: 13 },
        }));
        assert_eq!(viewer.current_page(), 3);
        assert_eq!(viewer.offset().y, -1_500.0);
    }

    #[tokio::test]
    async fn taps_beside_links_fall_through() {
        let engine = Arc::new(FakeEngine::with_pages(&[(400.0, 500.0); 5]).with_link(
            0,
            NormalizedRect {
                left: 0.5,
                top: 0.6,
                right: 1.0,
                bottom: 1.0,
            },
            LinkAction::GoTo { page: 3 },
        ));
        let mut viewer = viewer(engine);
        viewer.load(file(), None).await.unwrap();
        viewer.set_annotations(vec![comment(5, 0)]);
        viewer.drain_events();

        viewer.on_pointer(pointer(PointerKind::Down, 25.0, 25.0, 0));
        viewer.on_pointer(pointer(PointerKind::Up, 25.0, 25.0, 40));
        viewer.tick(500);
        let events = viewer.drain_events();
        assert!(events
            .iter()
            .all(|event| !matches!(event, ViewerEvent::LinkTapped { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, ViewerEvent::AnnotationTapped(_))));
        assert_eq!(viewer.current_page(), 0);
    }
}
