//! In-memory engine used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::engine::{
    DocumentHandle, DocumentSource, LinkAction, PageLink, PdfEngine, PixelBuffer, RawChar,
    RawLine, RawPageText, RenderRegion,
};
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::{NormalizedRect, RectF, SizeF};

#[derive(Debug, Clone)]
struct FakeDocument {
    sizes: Vec<SizeF>,
}

/// Engine double. Documents opened from a file use the default page list;
/// byte sources are looked up among registered chunks.
pub(crate) struct FakeEngine {
    default: FakeDocument,
    chunks: Vec<(Vec<u8>, FakeDocument)>,
    password: Option<String>,
    failing_pages: HashSet<usize>,
    failing_text: HashSet<usize>,
    links: HashMap<usize, Vec<PageLink>>,
    next_handle: AtomicU64,
    open: Mutex<HashMap<DocumentHandle, FakeDocument>>,
    closed: Mutex<Vec<DocumentHandle>>,
    open_attempts: Mutex<HashMap<usize, usize>>,
    rendered: Mutex<Vec<RenderRegion>>,
}

impl FakeEngine {
    pub(crate) fn with_pages(sizes: &[(f32, f32)]) -> Self {
        Self {
            default: FakeDocument {
                sizes: sizes.iter().map(|(w, h)| SizeF::new(*w, *h)).collect(),
            },
            chunks: Vec::new(),
            password: None,
            failing_pages: HashSet::new(),
            failing_text: HashSet::new(),
            links: HashMap::new(),
            next_handle: AtomicU64::new(1),
            open: Mutex::new(HashMap::new()),
            closed: Mutex::new(Vec::new()),
            open_attempts: Mutex::new(HashMap::new()),
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_chunk(mut self, key: &[u8], sizes: &[(f32, f32)]) -> Self {
        self.chunks.push((
            key.to_vec(),
            FakeDocument {
                sizes: sizes.iter().map(|(w, h)| SizeF::new(*w, *h)).collect(),
            },
        ));
        self
    }

    pub(crate) fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub(crate) fn failing_page(mut self, page: usize) -> Self {
        self.failing_pages.insert(page);
        self
    }

    pub(crate) fn failing_text(mut self, page: usize) -> Self {
        self.failing_text.insert(page);
        self
    }

    /// Adds a link to `page` of every document.
    pub(crate) fn with_link(mut self, page: usize, bounds: NormalizedRect, action: LinkAction) -> Self {
        self.links
            .entry(page)
            .or_default()
            .push(PageLink { bounds, action });
        self
    }

    pub(crate) fn page_color(page: usize) -> [u8; 4] {
        [(page * 40 % 256) as u8, 100, 200, 255]
    }

    pub(crate) fn rendered_regions(&self) -> Vec<RenderRegion> {
        self.rendered.lock().clone()
    }

    pub(crate) fn open_attempts(&self, page: usize) -> usize {
        self.open_attempts.lock().get(&page).copied().unwrap_or(0)
    }

    pub(crate) fn open_documents(&self) -> usize {
        self.open.lock().len()
    }

    pub(crate) fn closed_documents(&self) -> Vec<DocumentHandle> {
        self.closed.lock().clone()
    }

    fn document(&self, doc: DocumentHandle) -> ViewerResult<FakeDocument> {
        self.open
            .lock()
            .get(&doc)
            .cloned()
            .ok_or_else(|| ViewerError::decode(format!("{doc} is not open")))
    }

    /// One line of text per page: "page N" with 10 unit glyph advance.
    fn page_text(page: usize, size: SizeF) -> RawPageText {
        let chars = format!("page {page}")
            .chars()
            .enumerate()
            .map(|(i, ch)| RawChar {
                ch,
                bounds: RectF::new(
                    10.0 + i as f32 * 10.0,
                    20.0,
                    18.0 + i as f32 * 10.0,
                    30.0,
                ),
            })
            .collect();
        RawPageText {
            size,
            lines: vec![RawLine { chars }],
        }
    }
}

impl PdfEngine for FakeEngine {
    fn open_document(
        &self,
        source: &DocumentSource,
        password: Option<&str>,
    ) -> ViewerResult<DocumentHandle> {
        if let Some(expected) = &self.password {
            if password != Some(expected.as_str()) {
                return Err(ViewerError::decode("incorrect password"));
            }
        }
        let document = match source {
            DocumentSource::File(_) => self.default.clone(),
            DocumentSource::Bytes(bytes) => self
                .chunks
                .iter()
                .find(|(key, _)| key.as_slice() == bytes.as_slice())
                .map(|(_, document)| document.clone())
                .ok_or_else(|| ViewerError::decode("not a PDF document"))?,
        };
        let handle = DocumentHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.open.lock().insert(handle, document);
        Ok(handle)
    }

    fn close_document(&self, doc: DocumentHandle) {
        if self.open.lock().remove(&doc).is_some() {
            self.closed.lock().push(doc);
        }
    }

    fn page_count(&self, doc: DocumentHandle) -> ViewerResult<usize> {
        Ok(self.document(doc)?.sizes.len())
    }

    fn page_size(&self, doc: DocumentHandle, page: usize) -> ViewerResult<SizeF> {
        self.document(doc)?
            .sizes
            .get(page)
            .copied()
            .ok_or_else(|| ViewerError::decode(format!("page {page} out of range")))
    }

    fn open_page(&self, _doc: DocumentHandle, page: usize) -> ViewerResult<()> {
        *self.open_attempts.lock().entry(page).or_insert(0) += 1;
        if self.failing_pages.contains(&page) {
            return Err(ViewerError::page_render(page, "corrupt content stream"));
        }
        Ok(())
    }

    fn close_page(&self, _doc: DocumentHandle, _page: usize) {}

    fn render_region(
        &self,
        _doc: DocumentHandle,
        page: usize,
        buffer: &mut PixelBuffer,
        region: RenderRegion,
        _annotations: bool,
    ) -> ViewerResult<()> {
        self.rendered.lock().push(region);
        let color = Self::page_color(page);
        *buffer = PixelBuffer::filled(buffer.width, buffer.height, color);
        Ok(())
    }

    fn extract_text(&self, doc: DocumentHandle, page: usize) -> ViewerResult<RawPageText> {
        if self.failing_text.contains(&page) {
            return Err(ViewerError::text_extraction(page, "no text layer"));
        }
        let size = self.page_size(doc, page)?;
        Ok(Self::page_text(page, size))
    }

    fn page_links(&self, doc: DocumentHandle, page: usize) -> ViewerResult<Vec<PageLink>> {
        self.page_size(doc, page)?;
        Ok(self.links.get(&page).cloned().unwrap_or_default())
    }
}
