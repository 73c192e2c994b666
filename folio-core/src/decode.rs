//! Off-thread document decoding.
//!
//! Decoding opens the document, reads every page size and extracts raw text.
//! Geometry ids are assigned later on the consumer side, so a decoded chunk
//! carries only engine output.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::engine::{DocumentHandle, DocumentSource, PdfEngine, RawPageText};
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::SizeF;
use crate::layout::ChunkPages;

/// A decoded document chunk ready to be attached to the layout.
#[derive(Debug)]
pub struct DecodedChunk {
    pub doc: DocumentHandle,
    pub pagination_start: usize,
    pub sizes: Vec<SizeF>,
    pub text: Vec<ViewerResult<RawPageText>>,
}

impl DecodedChunk {
    pub fn page_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn pages(&self) -> ChunkPages {
        ChunkPages {
            doc: self.doc,
            pagination_start: self.pagination_start,
            sizes: self.sizes.clone(),
        }
    }
}

#[async_trait]
pub trait ChunkDecoder: Send + Sync {
    /// Decodes `source` whose first page has absolute index `pagination_start`.
    async fn decode(
        &self,
        source: DocumentSource,
        password: Option<String>,
        pagination_start: usize,
    ) -> ViewerResult<DecodedChunk>;

    /// Releases a chunk that will not be attached.
    fn discard(&self, chunk: DecodedChunk);
}

/// Decoder that runs the blocking engine calls on tokio's blocking pool.
pub struct EngineDecoder {
    engine: Arc<dyn PdfEngine>,
}

impl EngineDecoder {
    pub fn new(engine: Arc<dyn PdfEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ChunkDecoder for EngineDecoder {
    async fn decode(
        &self,
        source: DocumentSource,
        password: Option<String>,
        pagination_start: usize,
    ) -> ViewerResult<DecodedChunk> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            decode_blocking(engine.as_ref(), &source, password.as_deref(), pagination_start)
        })
        .await
        .map_err(|err| ViewerError::decode(format!("decode task failed: {err}")))?
    }

    fn discard(&self, chunk: DecodedChunk) {
        debug!(doc = %chunk.doc, "discarding decoded chunk");
        self.engine.close_document(chunk.doc);
    }
}

pub fn decode_blocking(
    engine: &dyn PdfEngine,
    source: &DocumentSource,
    password: Option<&str>,
    pagination_start: usize,
) -> ViewerResult<DecodedChunk> {
    let doc = engine.open_document(source, password)?;
    match read_chunk(engine, doc, pagination_start) {
        Ok(chunk) => Ok(chunk),
        Err(err) => {
            engine.close_document(doc);
            Err(err)
        }
    }
}

fn read_chunk(
    engine: &dyn PdfEngine,
    doc: DocumentHandle,
    pagination_start: usize,
) -> ViewerResult<DecodedChunk> {
    let count = engine.page_count(doc)?;
    if count == 0 {
        return Err(ViewerError::decode("document has no pages"));
    }
    let sizes = (0..count)
        .map(|page| engine.page_size(doc, page))
        .collect::<ViewerResult<Vec<_>>>()?;
    let text = match engine.extract_all_text(doc) {
        Ok(text) => text,
        Err(err) => {
            warn!(%err, "text extraction unavailable for chunk");
            (0..count)
                .map(|page| Err(ViewerError::text_extraction(pagination_start + page, &err)))
                .collect()
        }
    };
    debug!(%doc, pages = count, pagination_start, "decoded chunk");
    Ok(DecodedChunk {
        doc,
        pagination_start,
        sizes,
        text,
    })
}
