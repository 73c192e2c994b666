//! Bookkeeping for stitching freshly decoded chunks onto the loaded document.
//!
//! At most one merge runs at a time. A request made while another one is in
//! flight is refused without touching any state, and completions carrying an
//! outdated merge id are ignored.

use thiserror::Error;
use tracing::debug;

use crate::error::{ViewerError, ViewerResult};
use crate::layout::DocumentLayout;
use crate::viewport::Edge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeState {
    #[default]
    Idle,
    MergingAtTop,
    MergingAtBottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MergeRefusal {
    #[error("another merge is in progress")]
    Busy,
    #[error("the first page of the document is already loaded")]
    FirstPageReached,
    #[error("the last page of the document is already loaded")]
    LastPageReached,
    #[error("total page count is unknown")]
    TotalUnknown,
    #[error("no document is loaded")]
    NotLoaded,
}

/// An accepted merge request. The host decodes `page_to_load` (and any
/// neighbouring pages it wants) and hands the chunk back with `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeTicket {
    pub id: u64,
    pub edge: Edge,
    pub page_to_load: usize,
}

#[derive(Debug, Default)]
pub struct ChunkMerge {
    state: MergeState,
    next_id: u64,
    active: Option<MergeTicket>,
    total_pages: Option<usize>,
}

impl ChunkMerge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == MergeState::Idle
    }

    pub fn active(&self) -> Option<MergeTicket> {
        self.active
    }

    pub fn total_pages(&self) -> Option<usize> {
        self.total_pages
    }

    /// Page count of the whole document; bottom merges are refused until known.
    pub fn set_total_pages(&mut self, total: Option<usize>) {
        self.total_pages = total;
    }

    pub fn request(
        &mut self,
        edge: Edge,
        layout: Option<&DocumentLayout>,
    ) -> Result<MergeTicket, MergeRefusal> {
        if !self.is_idle() {
            return Err(MergeRefusal::Busy);
        }
        let layout = layout.ok_or(MergeRefusal::NotLoaded)?;
        let page_to_load = match edge {
            Edge::Top => layout
                .pagination_start()
                .checked_sub(1)
                .ok_or(MergeRefusal::FirstPageReached)?,
            Edge::Bottom => {
                let total = self.total_pages.ok_or(MergeRefusal::TotalUnknown)?;
                let next = layout.pagination_end() + 1;
                if next >= total {
                    return Err(MergeRefusal::LastPageReached);
                }
                next
            }
        };

        self.next_id += 1;
        let ticket = MergeTicket {
            id: self.next_id,
            edge,
            page_to_load,
        };
        self.state = match edge {
            Edge::Top => MergeState::MergingAtTop,
            Edge::Bottom => MergeState::MergingAtBottom,
        };
        self.active = Some(ticket);
        debug!(id = ticket.id, ?edge, page_to_load, "merge requested");
        Ok(ticket)
    }

    /// Ends the merge `id` and returns its ticket; `None` for stale ids.
    pub fn finish(&mut self, id: u64) -> Option<MergeTicket> {
        match self.active {
            Some(ticket) if ticket.id == id => {
                self.active = None;
                self.state = MergeState::Idle;
                Some(ticket)
            }
            _ => {
                debug!(id, "ignoring stale merge completion");
                None
            }
        }
    }

    /// Drops any in-flight merge; its completion will be treated as stale.
    pub fn reset(&mut self) {
        self.active = None;
        self.state = MergeState::Idle;
    }

    /// Checks that a decoded chunk borders the loaded pagination range on the
    /// ticket's side.
    pub fn check_contiguous(
        ticket: &MergeTicket,
        layout: &DocumentLayout,
        pagination_start: usize,
        count: usize,
    ) -> ViewerResult<()> {
        if count == 0 {
            return Err(ViewerError::Merge("chunk has no pages".into()));
        }
        let adjacent = match ticket.edge {
            Edge::Top => pagination_start + count == layout.pagination_start(),
            Edge::Bottom => pagination_start == layout.pagination_end() + 1,
        };
        if adjacent {
            Ok(())
        } else {
            Err(ViewerError::Merge(format!(
                "chunk {}..{} does not border loaded pages {}..={}",
                pagination_start,
                pagination_start + count,
                layout.pagination_start(),
                layout.pagination_end()
            )))
        }
    }
}
