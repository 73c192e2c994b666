use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context, Result};
use folio_core::{
    DocumentHandle, DocumentSource, LinkAction, NormalizedRect, PageLink, PdfEngine, PixelBuffer,
    RawChar, RawPageText, RectF, RenderRegion, SizeF, ViewerError, ViewerResult,
};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use tracing::{debug, instrument, trace, warn};

use crate::{blit_region, group_lines};

/// [`PdfEngine`] backed by a dynamically bound pdfium library.
pub struct PdfiumEngine {
    // declared before `pdfium` so open documents drop first
    documents: Mutex<HashMap<DocumentHandle, PdfDocument<'static>>>,
    next_handle: AtomicU64,
    pdfium: Pdfium,
}

impl PdfiumEngine {
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_build_hint() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            documents: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            pdfium,
        })
    }

    fn load(&self, source: &DocumentSource, password: Option<&str>) -> Result<PdfDocument<'static>> {
        let document = match source {
            DocumentSource::File(path) => self
                .pdfium
                .load_pdf_from_file(path, password)
                .with_context(|| format!("failed to open {:?}", path))?,
            DocumentSource::Bytes(bytes) => self
                .pdfium
                .load_pdf_from_byte_vec(bytes.as_ref().clone(), password)
                .with_context(|| format!("failed to open {} byte document", bytes.len()))?,
        };
        // SAFETY: the document borrows the bindings owned by `self.pdfium`. It is
        // stored in `self.documents`, which is declared before `pdfium` and so is
        // dropped first; the borrow never outlives the bindings.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        Ok(document)
    }

    fn with_page<R, F>(&self, doc: DocumentHandle, page: usize, f: F) -> Result<R>
    where
        F: FnOnce(&PdfPage<'_>) -> Result<R>,
    {
        let documents = self.documents.lock();
        let document = documents
            .get(&doc)
            .ok_or_else(|| anyhow!("{doc} is not open"))?;
        let index: PdfPageIndex = page
            .try_into()
            .map_err(|_| anyhow!("page {} is out of supported range", page))?;
        let page = document
            .pages()
            .get(index)
            .with_context(|| format!("page {} out of range", page))?;
        f(&page)
    }

    fn render(
        &self,
        doc: DocumentHandle,
        page_index: usize,
        buffer: &mut PixelBuffer,
        region: RenderRegion,
        annotations: bool,
    ) -> Result<()> {
        let width = i32::try_from(region.page_width).context("page raster too wide")?;
        let height = i32::try_from(region.page_height).context("page raster too tall")?;
        let image = self.with_page(doc, page_index, |page| {
            let config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_target_height(height)
                .render_annotations(annotations);
            let bitmap = page
                .render_with_config(&config)
                .with_context(|| format!("failed to render page {}", page_index))?;
            Ok(bitmap.as_image().to_rgba8())
        })?;
        blit_region(&image, region, buffer);
        Ok(())
    }

    fn text(&self, doc: DocumentHandle, page_index: usize) -> Result<RawPageText> {
        self.with_page(doc, page_index, |page| {
            let width = page.width().value;
            let height = page.height().value;
            let text = page
                .text()
                .with_context(|| format!("failed to extract text for page {}", page_index))?;
            let mut chars = Vec::new();
            for glyph in text.chars().iter() {
                let Some(ch) = glyph.unicode_char() else {
                    continue;
                };
                let bounds = match glyph.loose_bounds() {
                    Ok(bounds) => bounds,
                    Err(err) => {
                        trace!(?err, page = page_index, "glyph without bounds");
                        continue;
                    }
                };
                // pdfium measures from the bottom-left corner
                chars.push(RawChar {
                    ch,
                    bounds: RectF::new(
                        bounds.left().value,
                        height - bounds.top().value,
                        bounds.right().value,
                        height - bounds.bottom().value,
                    ),
                });
            }
            Ok(RawPageText {
                size: SizeF::new(width, height),
                lines: group_lines(chars),
            })
        })
    }

    fn links(&self, doc: DocumentHandle, page_index: usize) -> Result<Vec<PageLink>> {
        self.with_page(doc, page_index, |page| {
            let width = page.width().value;
            let height = page.height().value;
            if width <= 0.0 || height <= 0.0 {
                return Ok(Vec::new());
            }
            let mut links = Vec::new();
            let page_links = page.links();
            for link in page_links.iter() {
                let rect = match link.rect() {
                    Ok(rect) => rect,
                    Err(err) => {
                        warn!(?err, page = page_index, "failed to resolve link rectangle");
                        continue;
                    }
                };
                let bounds = NormalizedRect {
                    left: rect.left().value / width,
                    top: 1.0 - rect.top().value / height,
                    right: rect.right().value / width,
                    bottom: 1.0 - rect.bottom().value / height,
                }
                .clamp();
                if !bounds.is_valid() {
                    continue;
                }
                let Some(action) = link_action(&link) else {
                    continue;
                };
                links.push(PageLink { bounds, action });
            }
            Ok(links)
        })
    }
}

fn link_action(link: &PdfLink<'_>) -> Option<LinkAction> {
    if let Some(action) = link.action() {
        match action.action_type() {
            PdfActionType::GoToDestinationInSameDocument => {
                let page = action
                    .as_local_destination_action()
                    .and_then(|local| local.destination().ok())
                    .and_then(|destination| destination.page_index().ok());
                if let Some(page) = page {
                    return Some(LinkAction::GoTo {
                        page: page as usize,
                    });
                }
            }
            PdfActionType::Uri => {
                let uri = action
                    .as_uri_action()
                    .and_then(|uri_action| uri_action.uri().ok())
                    .filter(|uri| !uri.is_empty());
                if let Some(uri) = uri {
                    return Some(LinkAction::Uri { uri });
                }
            }
            _ => {}
        }
    }
    link.destination()
        .and_then(|destination| destination.page_index().ok())
        .map(|page| LinkAction::GoTo {
            page: page as usize,
        })
}

impl PdfEngine for PdfiumEngine {
    #[instrument(skip(self, password))]
    fn open_document(
        &self,
        source: &DocumentSource,
        password: Option<&str>,
    ) -> ViewerResult<DocumentHandle> {
        let document = self
            .load(source, password)
            .map_err(|err| ViewerError::decode(format!("{err:#}")))?;
        let handle = DocumentHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.documents.lock().insert(handle, document);
        debug!(%handle, "document opened");
        Ok(handle)
    }

    fn close_document(&self, doc: DocumentHandle) {
        if self.documents.lock().remove(&doc).is_some() {
            debug!(%doc, "document closed");
        }
    }

    fn page_count(&self, doc: DocumentHandle) -> ViewerResult<usize> {
        let documents = self.documents.lock();
        let document = documents
            .get(&doc)
            .ok_or_else(|| ViewerError::decode(format!("{doc} is not open")))?;
        Ok(usize::try_from(document.pages().len()).unwrap_or_default())
    }

    fn page_size(&self, doc: DocumentHandle, page: usize) -> ViewerResult<SizeF> {
        self.with_page(doc, page, |page| {
            Ok(SizeF::new(page.width().value, page.height().value))
        })
        .map_err(|err| ViewerError::decode(format!("{err:#}")))
    }

    fn open_page(&self, doc: DocumentHandle, page: usize) -> ViewerResult<()> {
        // pdfium loads pages on demand; this only checks the page can be loaded
        self.with_page(doc, page, |_| Ok(()))
            .map_err(|err| ViewerError::page_render(page, format!("{err:#}")))
    }

    fn close_page(&self, doc: DocumentHandle, page: usize) {
        trace!(%doc, page, "page released");
    }

    #[instrument(skip(self, buffer))]
    fn render_region(
        &self,
        doc: DocumentHandle,
        page: usize,
        buffer: &mut PixelBuffer,
        region: RenderRegion,
        annotations: bool,
    ) -> ViewerResult<()> {
        self.render(doc, page, buffer, region, annotations)
            .map_err(|err| {
                warn!(%doc, page, "render failed: {err:#}");
                ViewerError::page_render(page, format!("{err:#}"))
            })
    }

    fn extract_text(&self, doc: DocumentHandle, page: usize) -> ViewerResult<RawPageText> {
        self.text(doc, page)
            .map_err(|err| ViewerError::text_extraction(page, format!("{err:#}")))
    }

    fn page_links(&self, doc: DocumentHandle, page: usize) -> ViewerResult<Vec<PageLink>> {
        self.links(doc, page)
            .map_err(|err| ViewerError::decode(format!("{err:#}")))
    }
}

fn bind_pdfium_from_build_hint() -> Option<Pdfium> {
    match option_env!("FOLIO_PDFIUM_LIBRARY_PATH") {
        Some(path) if !path.is_empty() => match Pdfium::bind_to_library(path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!(
                    "failed to load pdfium from build-provided path {}: {}",
                    path, err
                );
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}
