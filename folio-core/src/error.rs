use thiserror::Error;

use crate::merge::MergeRefusal;

/// Failure taxonomy surfaced by the viewer. Worker and decode failures are
/// converted into one of these before they leave the thread that produced them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ViewerError {
    #[error("failed to decode document: {0}")]
    Decode(String),
    #[error("failed to render page {page}: {reason}")]
    PageRender { page: usize, reason: String },
    #[error("failed to merge document chunk: {0}")]
    Merge(String),
    #[error("failed to extract text from page {page}: {reason}")]
    TextExtraction { page: usize, reason: String },
    #[error("merge refused: {0}")]
    MergeRefused(MergeRefusal),
    #[error("no document is loaded")]
    NotLoaded,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

impl ViewerError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        ViewerError::Decode(err.to_string())
    }

    pub fn page_render(page: usize, err: impl std::fmt::Display) -> Self {
        ViewerError::PageRender {
            page,
            reason: err.to_string(),
        }
    }

    pub fn text_extraction(page: usize, err: impl std::fmt::Display) -> Self {
        ViewerError::TextExtraction {
            page,
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ViewerError {
    fn from(err: std::io::Error) -> Self {
        ViewerError::Io(err.to_string())
    }
}

pub type ViewerResult<T> = std::result::Result<T, ViewerError>;
