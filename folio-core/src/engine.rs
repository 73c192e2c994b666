use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ViewerResult;
use crate::geometry::{NormalizedRect, RectF, SizeF};

/// Opaque identifier of a document opened by a [`PdfEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentHandle(pub u64);

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

#[derive(Clone)]
pub enum DocumentSource {
    File(PathBuf),
    Bytes(Arc<Vec<u8>>),
}

impl DocumentSource {
    pub fn bytes(bytes: Vec<u8>) -> Self {
        DocumentSource::Bytes(Arc::new(bytes))
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::File(path) => f.debug_tuple("File").field(path).finish(),
            DocumentSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// RGBA8 pixel buffer, row-major, no padding.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ])
    }
}

/// Where the buffer sits inside the page rasterised at `page_width x page_height`.
///
/// The buffer's top-left pixel corresponds to page pixel `(origin_x, origin_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRegion {
    pub page_width: u32,
    pub page_height: u32,
    pub origin_x: u32,
    pub origin_y: u32,
}

/// One glyph as reported by the engine, in PDF units with a top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChar {
    pub ch: char,
    pub bounds: RectF,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawLine {
    pub chars: Vec<RawChar>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPageText {
    pub size: SizeF,
    pub lines: Vec<RawLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkAction {
    /// Page index inside the document that owns the link.
    GoTo { page: usize },
    Uri { uri: String },
}

/// Clickable area of a page, relative to the page size with a top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub bounds: NormalizedRect,
    pub action: LinkAction,
}

/// Native document engine: decoding, rasterisation and text extraction.
///
/// Rasterisation calls are issued from a single worker thread; the remaining
/// calls may arrive from decode tasks running on a blocking pool.
pub trait PdfEngine: Send + Sync {
    fn open_document(
        &self,
        source: &DocumentSource,
        password: Option<&str>,
    ) -> ViewerResult<DocumentHandle>;

    fn close_document(&self, doc: DocumentHandle);

    fn page_count(&self, doc: DocumentHandle) -> ViewerResult<usize>;

    fn page_size(&self, doc: DocumentHandle, page: usize) -> ViewerResult<SizeF>;

    fn open_page(&self, doc: DocumentHandle, page: usize) -> ViewerResult<()>;

    fn close_page(&self, doc: DocumentHandle, page: usize);

    fn render_region(
        &self,
        doc: DocumentHandle,
        page: usize,
        buffer: &mut PixelBuffer,
        region: RenderRegion,
        annotations: bool,
    ) -> ViewerResult<()>;

    fn extract_text(&self, doc: DocumentHandle, page: usize) -> ViewerResult<RawPageText>;

    fn page_links(&self, doc: DocumentHandle, page: usize) -> ViewerResult<Vec<PageLink>>;

    /// Text for every page of `doc`; one failing page does not affect the others.
    fn extract_all_text(&self, doc: DocumentHandle) -> ViewerResult<Vec<ViewerResult<RawPageText>>> {
        let count = self.page_count(doc)?;
        Ok((0..count).map(|page| self.extract_text(doc, page)).collect())
    }
}
