use std::sync::Arc;

use parking_lot::Mutex;

use crate::annotation::AnnotationHit;
use crate::engine::LinkAction;
use crate::error::ViewerError;
use crate::geometry::PointF;
use crate::viewport::Edge;

/// Notifications for the host, queued in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    PreparationStarted,
    PreparationSucceeded {
        pages: usize,
    },
    PreparationFailed(ViewerError),
    PageChanged {
        page: usize,
        pagination: usize,
    },
    PageError {
        pagination: usize,
        error: ViewerError,
    },
    TextSelected {
        text: String,
        pagination: usize,
        /// Screen point just below the selection end, for placing a menu.
        anchor: PointF,
    },
    SelectionCleared,
    AnnotationTapped(AnnotationHit),
    /// A tap landed on a link of `pagination`. `GoTo` targets are pagination indices.
    LinkTapped {
        pagination: usize,
        action: LinkAction,
    },
    EdgeReached(Edge),
    MergeStarted {
        edge: Edge,
        page_to_load: usize,
    },
    MergeEnded {
        edge: Edge,
        pages: usize,
    },
    MergeFailed {
        edge: Edge,
        error: ViewerError,
    },
}

/// Shared, drainable event queue.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<Vec<ViewerEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: ViewerEvent) {
        self.inner.lock().push(event);
    }

    pub fn drain(&self) -> Vec<ViewerEvent> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// The underlying queue, for hosts that read it from another thread.
    pub fn handle(&self) -> Arc<Mutex<Vec<ViewerEvent>>> {
        Arc::clone(&self.inner)
    }
}
