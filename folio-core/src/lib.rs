//! Core of a virtualized PDF viewer: continuous page layout, tiled rendering
//! with a bounded cache, touch gestures, text selection, annotation overlays
//! and incremental loading of document chunks.
//!
//! The host owns the window and the event loop. It feeds pointer events and
//! frame ticks into a [`Viewer`], drains [`ViewerEvent`]s, and asks the viewer
//! to compose frames into a [`RasterSurface`].

pub mod animation;
pub mod annotation;
pub mod canvas;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod gesture;
pub mod layout;
pub mod merge;
pub mod planner;
pub mod renderer;
pub mod selection;
pub mod text;
pub mod tiles;
pub mod viewer;
pub mod viewport;

#[cfg(test)]
mod testing;

pub use annotation::{Annotation, AnnotationHit, AnnotationKind, AnnotationOverlay};
pub use canvas::{RasterSurface, RgbaCanvas};
pub use config::{GestureConfig, Orientation, RenderConfig, ViewerConfig, ZoomConfig};
pub use decode::{ChunkDecoder, DecodedChunk, EngineDecoder};
pub use engine::{
    DocumentHandle, DocumentSource, LinkAction, PageLink, PdfEngine, PixelBuffer, RawChar,
    RawLine, RawPageText, RenderRegion,
};
pub use error::{ViewerError, ViewerResult};
pub use events::{EventQueue, ViewerEvent};
pub use geometry::{NormalizedRect, PointF, RectF, SizeF};
pub use gesture::{PointerEvent, PointerKind};
pub use layout::{DocumentLayout, FitPolicy};
pub use merge::{MergeRefusal, MergeState, MergeTicket};
pub use viewer::{LoadToken, Viewer};
pub use viewport::Edge;
