//! Single-threaded rasterization pipeline.
//!
//! Every engine render call happens on one dedicated worker thread fed by a
//! FIFO queue. Finished tiles, and page failures already converted to
//! [`ViewerError`], travel back over a second channel and are collected by
//! the owning thread.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::engine::{PdfEngine, PixelBuffer, RenderRegion};
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::NormalizedRect;
use crate::layout::PageTarget;
use crate::tiles::{Tile, TileKey};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub target: PageTarget,
    /// Output size in pixels.
    pub width: u32,
    pub height: u32,
    pub crop: NormalizedRect,
    pub thumbnail: bool,
    pub best_quality: bool,
    pub annotations: bool,
    pub cache_order: u64,
    pub generation: u64,
}

impl RenderRequest {
    pub fn key(&self) -> TileKey {
        TileKey::new(
            self.target.pagination,
            &self.crop,
            self.width,
            self.height,
            self.thumbnail,
        )
    }
}

#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Tile(Tile),
    PageError { pagination: usize, error: ViewerError },
}

enum WorkerMessage {
    Render(RenderRequest),
    Shutdown,
}

/// Open/failed page bookkeeping shared with the worker.
#[derive(Debug, Default)]
struct PageStates {
    opened: HashSet<usize>,
    failed: HashSet<usize>,
}

struct Shared {
    generation: AtomicU64,
    accepting: AtomicBool,
    in_flight: AtomicUsize,
    pages: Mutex<PageStates>,
}

pub struct TileRenderer {
    requests: Sender<WorkerMessage>,
    /// Consumer-side handle on the request queue, used to drain it on flush.
    pending: Receiver<WorkerMessage>,
    completions: Receiver<RenderOutcome>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TileRenderer {
    pub fn spawn(engine: Arc<dyn PdfEngine>, generation: u64) -> ViewerResult<Self> {
        let (request_tx, request_rx) = flume::unbounded();
        let (completion_tx, completion_rx) = flume::unbounded();
        let shared = Arc::new(Shared {
            generation: AtomicU64::new(generation),
            accepting: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            pages: Mutex::new(PageStates::default()),
        });

        let worker_rx = request_rx.clone();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("folio-render".to_string())
            .spawn(move || render_loop(engine, worker_rx, completion_tx, worker_shared))?;

        Ok(Self {
            requests: request_tx,
            pending: request_rx,
            completions: completion_rx,
            shared,
            worker: Some(worker),
        })
    }

    pub fn submit(&self, request: RenderRequest) {
        if !self.shared.accepting.load(Ordering::Acquire) {
            return;
        }
        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
        if self.requests.send(WorkerMessage::Render(request)).is_err() {
            self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            warn!("render worker is gone; request dropped");
        }
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Adopts a new cache generation and drops every queued request.
    pub fn set_generation(&self, generation: u64) -> usize {
        self.shared.generation.store(generation, Ordering::Release);
        self.flush()
    }

    /// Removes queued requests that the worker has not picked up yet.
    pub fn flush(&self) -> usize {
        let mut dropped = 0;
        for message in self.pending.try_iter() {
            match message {
                WorkerMessage::Render(_) => {
                    dropped += 1;
                    self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
                }
                WorkerMessage::Shutdown => {
                    // keep the shutdown signal for the worker
                    if self.requests.send(WorkerMessage::Shutdown).is_err() {
                        debug!("render worker already gone, shutdown not requeued");
                    }
                    break;
                }
            }
        }
        if dropped > 0 {
            debug!(dropped, "flushed pending render requests");
        }
        dropped
    }

    /// Requests submitted but not yet answered.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0 && self.completions.is_empty()
    }

    pub fn try_completions(&self) -> Vec<RenderOutcome> {
        self.completions.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderOutcome> {
        match self.completions.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn failed_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.shared.pages.lock().failed.iter().copied().collect();
        pages.sort_unstable();
        pages
    }

    pub fn has_failed(&self, pagination: usize) -> bool {
        self.shared.pages.lock().failed.contains(&pagination)
    }

    /// Stops accepting work, drops queued requests and joins the worker.
    pub fn shutdown(&mut self) {
        self.shared.accepting.store(false, Ordering::Release);
        self.flush();
        if self.requests.send(WorkerMessage::Shutdown).is_err() {
            debug!("render worker already gone before shutdown");
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("render worker panicked");
            }
        }
        let mut pages = self.shared.pages.lock();
        pages.opened.clear();
        pages.failed.clear();
    }
}

impl Drop for TileRenderer {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

fn render_loop(
    engine: Arc<dyn PdfEngine>,
    requests: Receiver<WorkerMessage>,
    completions: Sender<RenderOutcome>,
    shared: Arc<Shared>,
) {
    while let Ok(message) = requests.recv() {
        let request = match message {
            WorkerMessage::Render(request) => request,
            WorkerMessage::Shutdown => break,
        };
        let outcome = if request.generation == shared.generation.load(Ordering::Acquire) {
            render_request(engine.as_ref(), &shared, request)
        } else {
            trace!(generation = request.generation, "skipping stale request");
            None
        };
        let delivered = match outcome {
            Some(outcome) if shared.accepting.load(Ordering::Acquire) => {
                completions.send(outcome).is_ok()
            }
            _ => true,
        };
        shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        if !delivered {
            break;
        }
    }
    debug!("render worker stopped");
}

fn render_request(
    engine: &dyn PdfEngine,
    shared: &Shared,
    request: RenderRequest,
) -> Option<RenderOutcome> {
    let target = request.target;
    {
        let mut pages = shared.pages.lock();
        if pages.failed.contains(&target.pagination) {
            return None;
        }
        if !pages.opened.contains(&target.pagination) {
            if let Err(err) = engine.open_page(target.doc, target.local_page) {
                warn!(pagination = target.pagination, %err, "cannot open page");
                pages.failed.insert(target.pagination);
                return Some(RenderOutcome::PageError {
                    pagination: target.pagination,
                    error: ViewerError::page_render(target.pagination, err),
                });
            }
            pages.opened.insert(target.pagination);
        }
    }

    if request.width == 0 || request.height == 0 || !request.crop.is_valid() {
        return None;
    }
    let page_width = (request.width as f32 / request.crop.width()).round() as u32;
    let page_height = (request.height as f32 / request.crop.height()).round() as u32;
    let region = RenderRegion {
        page_width,
        page_height,
        origin_x: (request.crop.left * page_width as f32).round() as u32,
        origin_y: (request.crop.top * page_height as f32).round() as u32,
    };

    let mut bitmap = if request.best_quality {
        PixelBuffer::new(request.width, request.height)
    } else {
        PixelBuffer::filled(request.width, request.height, [255, 255, 255, 255])
    };
    if let Err(err) = engine.render_region(
        target.doc,
        target.local_page,
        &mut bitmap,
        region,
        request.annotations,
    ) {
        warn!(pagination = target.pagination, %err, "page render failed");
        shared.pages.lock().failed.insert(target.pagination);
        return Some(RenderOutcome::PageError {
            pagination: target.pagination,
            error: ViewerError::page_render(target.pagination, err),
        });
    }

    Some(RenderOutcome::Tile(Tile {
        pagination: target.pagination,
        crop: request.crop,
        bitmap: Arc::new(bitmap),
        thumbnail: request.thumbnail,
        best_quality: request.best_quality,
        cache_order: request.cache_order,
        generation: request.generation,
    }))
}
