use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Orientation, ViewerConfig};
use crate::engine::DocumentHandle;
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::{PointF, SizeF};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    #[default]
    Width,
    Height,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapEdge {
    Start,
    Center,
    End,
    None,
}

/// Derives display sizes from native page sizes for one fit policy.
#[derive(Debug, Clone)]
pub struct PageSizeCalculator {
    policy: FitPolicy,
    view_size: SizeF,
    fit_each_page: bool,
    width_ratio: f32,
    height_ratio: f32,
    optimal_max_width_page: SizeF,
    optimal_max_height_page: SizeF,
}

impl PageSizeCalculator {
    pub fn new(
        policy: FitPolicy,
        original_max_width_page: SizeF,
        original_max_height_page: SizeF,
        view_size: SizeF,
        fit_each_page: bool,
    ) -> Self {
        let mut calculator = Self {
            policy,
            view_size,
            fit_each_page,
            width_ratio: 0.0,
            height_ratio: 0.0,
            optimal_max_width_page: SizeF::default(),
            optimal_max_height_page: SizeF::default(),
        };
        calculator.calculate_max_pages(original_max_width_page, original_max_height_page);
        calculator
    }

    fn calculate_max_pages(&mut self, max_width_page: SizeF, max_height_page: SizeF) {
        if max_width_page.is_empty() || max_height_page.is_empty() {
            return;
        }
        let view = self.view_size;
        match self.policy {
            FitPolicy::Width => {
                self.optimal_max_width_page = fit_width(max_width_page, view.width);
                self.width_ratio = self.optimal_max_width_page.width / max_width_page.width;
                self.height_ratio = self.width_ratio;
                self.optimal_max_height_page =
                    fit_width(max_height_page, max_height_page.width * self.width_ratio);
            }
            FitPolicy::Height => {
                self.optimal_max_height_page = fit_height(max_height_page, view.height);
                self.height_ratio = self.optimal_max_height_page.height / max_height_page.height;
                self.width_ratio = self.height_ratio;
                self.optimal_max_width_page =
                    fit_height(max_width_page, max_width_page.height * self.height_ratio);
            }
            FitPolicy::Both => {
                let local_max_width = fit_both(max_width_page, view.width, view.height);
                let local_width_ratio = local_max_width.width / max_width_page.width;
                self.optimal_max_height_page = fit_both(
                    max_height_page,
                    max_height_page.width * local_width_ratio,
                    view.height,
                );
                self.height_ratio = self.optimal_max_height_page.height / max_height_page.height;
                self.optimal_max_width_page = fit_both(
                    max_width_page,
                    view.width,
                    max_width_page.height * self.height_ratio,
                );
                self.width_ratio = self.optimal_max_width_page.width / max_width_page.width;
            }
        }
    }

    pub fn calculate(&self, page: SizeF) -> SizeF {
        if page.is_empty() {
            return SizeF::default();
        }
        let max_width = if self.fit_each_page {
            self.view_size.width
        } else {
            page.width * self.width_ratio
        };
        let max_height = if self.fit_each_page {
            self.view_size.height
        } else {
            page.height * self.height_ratio
        };
        match self.policy {
            FitPolicy::Width => fit_width(page, max_width),
            FitPolicy::Height => fit_height(page, max_height),
            FitPolicy::Both => fit_both(page, max_width, max_height),
        }
    }

    pub fn optimal_max_width_page(&self) -> SizeF {
        self.optimal_max_width_page
    }

    pub fn optimal_max_height_page(&self) -> SizeF {
        self.optimal_max_height_page
    }
}

fn fit_width(page: SizeF, max_width: f32) -> SizeF {
    let ratio = page.width / page.height;
    SizeF::new(max_width, (max_width / ratio).floor())
}

fn fit_height(page: SizeF, max_height: f32) -> SizeF {
    let ratio = page.height / page.width;
    SizeF::new((max_height / ratio).floor(), max_height)
}

fn fit_both(page: SizeF, max_width: f32, max_height: f32) -> SizeF {
    let ratio = page.width / page.height;
    let mut width = max_width;
    let mut height = (max_width / ratio).floor();
    if height > max_height {
        height = max_height;
        width = (max_height * ratio).floor();
    }
    SizeF::new(width, height)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub fit_policy: FitPolicy,
    pub fit_each_page: bool,
    pub orientation: Orientation,
    pub spacing: f32,
    pub auto_spacing: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self::from(&ViewerConfig::default())
    }
}

impl From<&ViewerConfig> for LayoutOptions {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            fit_policy: config.fit_policy,
            fit_each_page: config.fit_each_page,
            orientation: config.orientation,
            spacing: config.spacing,
            auto_spacing: config.auto_spacing,
        }
    }
}

/// Pages contributed by one decoded chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPages {
    pub doc: DocumentHandle,
    pub pagination_start: usize,
    pub sizes: Vec<SizeF>,
}

/// A contiguous run of layout pages `[start, end)` backed by one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub doc: DocumentHandle,
    pub start: usize,
    pub end: usize,
    pub pagination_start: usize,
    /// Unscaled length this chunk added to the document when it was attached.
    pub pixel_length: f32,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn contains(&self, page: usize) -> bool {
        page >= self.start && page < self.end
    }
}

/// Everything the worker needs to address one page in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTarget {
    pub doc: DocumentHandle,
    pub local_page: usize,
    pub pagination: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentLayout {
    options: LayoutOptions,
    view_size: SizeF,
    original_sizes: Vec<SizeF>,
    page_sizes: Vec<SizeF>,
    /// Spacing owned by each page; the half on either side belongs to it.
    page_spacing: Vec<f32>,
    offsets: Vec<f32>,
    document_length: f32,
    max_width_page: SizeF,
    max_height_page: SizeF,
    segments: Vec<Segment>,
}

impl DocumentLayout {
    pub fn new(options: LayoutOptions, view_size: SizeF, chunk: ChunkPages) -> Self {
        let count = chunk.sizes.len();
        let mut layout = Self {
            options,
            view_size,
            original_sizes: chunk.sizes,
            page_sizes: Vec::new(),
            page_spacing: Vec::new(),
            offsets: Vec::new(),
            document_length: 0.0,
            max_width_page: SizeF::default(),
            max_height_page: SizeF::default(),
            segments: vec![Segment {
                doc: chunk.doc,
                start: 0,
                end: count,
                pagination_start: chunk.pagination_start,
                pixel_length: 0.0,
            }],
        };
        layout.recompute();
        if let Some(first) = layout.segments.first_mut() {
            first.pixel_length = layout.document_length;
        }
        layout
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn is_vertical(&self) -> bool {
        self.options.orientation.is_vertical()
    }

    pub fn view_size(&self) -> SizeF {
        self.view_size
    }

    pub fn pages_count(&self) -> usize {
        self.page_sizes.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Recomputes every derived array for a new view size.
    pub fn recalculate(&mut self, view_size: SizeF) {
        self.view_size = view_size;
        self.recompute();
    }

    fn recompute(&mut self) {
        let mut max_width = SizeF::default();
        let mut max_height = SizeF::default();
        for size in &self.original_sizes {
            if size.width > max_width.width {
                max_width = *size;
            }
            if size.height > max_height.height {
                max_height = *size;
            }
        }
        let calculator = PageSizeCalculator::new(
            self.options.fit_policy,
            max_width,
            max_height,
            self.view_size,
            self.options.fit_each_page,
        );
        self.max_width_page = calculator.optimal_max_width_page();
        self.max_height_page = calculator.optimal_max_height_page();
        self.page_sizes = self
            .original_sizes
            .iter()
            .map(|size| calculator.calculate(*size))
            .collect();

        let vertical = self.is_vertical();
        let spacing = self.options.spacing;
        let auto_spacing = self.options.auto_spacing;
        let count = self.page_sizes.len();
        let view_len = if vertical {
            self.view_size.height
        } else {
            self.view_size.width
        };
        let length_of = |size: &SizeF| if vertical { size.height } else { size.width };

        self.page_spacing = self
            .page_sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                if !auto_spacing {
                    return spacing;
                }
                let padding = (view_len - length_of(size)).max(0.0);
                if i + 1 < count {
                    padding + spacing
                } else {
                    padding
                }
            })
            .collect();

        self.offsets.clear();
        let mut offset = 0.0;
        for (i, size) in self.page_sizes.iter().enumerate() {
            let length = length_of(size);
            if auto_spacing {
                let half = self.page_spacing[i] / 2.0;
                offset += half;
                if i == 0 && count > 1 {
                    offset -= spacing / 2.0;
                } else if i > 0 && i + 1 == count {
                    offset += spacing / 2.0;
                }
                self.offsets.push(offset);
                offset += length + half;
            } else {
                self.offsets.push(offset);
                offset += length;
                if i + 1 < count {
                    offset += spacing;
                }
            }
        }
        self.document_length = offset;
    }

    pub fn page_size(&self, page: usize) -> SizeF {
        self.page_sizes.get(page).copied().unwrap_or_default()
    }

    pub fn original_page_size(&self, page: usize) -> SizeF {
        self.original_sizes.get(page).copied().unwrap_or_default()
    }

    pub fn scaled_page_size(&self, page: usize, zoom: f32) -> SizeF {
        self.page_size(page).scaled(zoom)
    }

    /// Widest page in vertical mode, tallest page in horizontal mode.
    fn max_page_size(&self) -> SizeF {
        if self.is_vertical() {
            self.max_width_page
        } else {
            self.max_height_page
        }
    }

    pub fn max_page_width(&self) -> f32 {
        self.max_page_size().width
    }

    pub fn max_page_height(&self) -> f32 {
        self.max_page_size().height
    }

    pub fn doc_len(&self, zoom: f32) -> f32 {
        self.document_length * zoom
    }

    pub fn page_length(&self, page: usize, zoom: f32) -> f32 {
        let size = self.page_size(page);
        let length = if self.is_vertical() {
            size.height
        } else {
            size.width
        };
        length * zoom
    }

    /// Gap between the end of `page` and the start of the next one; the last page has none.
    pub fn spacing_after(&self, page: usize, zoom: f32) -> f32 {
        match (self.offsets.get(page), self.offsets.get(page + 1)) {
            (Some(start), Some(next)) => (next - start - self.page_length(page, 1.0)) * zoom,
            _ => 0.0,
        }
    }

    /// Spacing owned by `page`: the fixed spacing, or its auto padding.
    pub fn page_spacing(&self, page: usize, zoom: f32) -> f32 {
        self.page_spacing
            .get(page)
            .copied()
            .unwrap_or(self.options.spacing)
            * zoom
    }

    /// Primary-axis offset of `page` (y when vertical, x when horizontal).
    pub fn page_offset(&self, page: usize, zoom: f32) -> f32 {
        self.offsets.get(page).copied().unwrap_or_default() * zoom
    }

    /// Cross-axis offset centering pages narrower than the widest one.
    pub fn secondary_page_offset(&self, page: usize, zoom: f32) -> f32 {
        let size = self.page_size(page);
        if self.is_vertical() {
            zoom * (self.max_page_width() - size.width) / 2.0
        } else {
            zoom * (self.max_page_height() - size.height) / 2.0
        }
    }

    /// Document-space origin of the page slot, before the viewport offset.
    pub fn page_origin(&self, page: usize, zoom: f32) -> PointF {
        let main = self.page_offset(page, zoom);
        if self.is_vertical() {
            PointF::new(0.0, main)
        } else {
            PointF::new(main, 0.0)
        }
    }

    /// Page whose spacing-reduced offset is the last one not exceeding `offset`.
    pub fn page_at_offset(&self, offset: f32, zoom: f32) -> usize {
        let mut current = 0usize;
        for (page, start) in self.offsets.iter().enumerate() {
            if start * zoom - self.page_spacing(page, zoom) / 2.0 > offset {
                break;
            }
            current += 1;
        }
        current
            .saturating_sub(1)
            .min(self.pages_count().saturating_sub(1))
    }

    pub fn page_at_position_offset(&self, position: f32, zoom: f32) -> usize {
        self.page_at_offset(self.doc_len(zoom) * position, zoom)
    }

    pub fn determine_valid_page_number(&self, page: isize) -> usize {
        if page <= 0 {
            return 0;
        }
        let page = page as usize;
        if page >= self.pages_count() {
            return self.pages_count().saturating_sub(1);
        }
        page
    }

    pub fn segment_for_page(&self, page: usize) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.contains(page))
    }

    pub fn resolve(&self, page: usize) -> Option<PageTarget> {
        let segment = self.segment_for_page(page)?;
        let local_page = page - segment.start;
        Some(PageTarget {
            doc: segment.doc,
            local_page,
            pagination: segment.pagination_start + local_page,
        })
    }

    pub fn pagination_index(&self, page: usize) -> Option<usize> {
        self.resolve(page).map(|target| target.pagination)
    }

    pub fn page_index_from_pagination(&self, pagination: usize) -> Option<usize> {
        self.segments.iter().find_map(|segment| {
            let end = segment.pagination_start + segment.len();
            (pagination >= segment.pagination_start && pagination < end)
                .then(|| segment.start + (pagination - segment.pagination_start))
        })
    }

    pub fn pagination_start(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| segment.pagination_start)
            .min()
            .unwrap_or(0)
    }

    pub fn pagination_end(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| segment.pagination_start + segment.len())
            .max()
            .unwrap_or(0)
            .saturating_sub(1)
    }

    /// Prepends a chunk and returns how far the previously first page moved, unscaled.
    pub fn merge_at_top(&mut self, chunk: ChunkPages) -> ViewerResult<f32> {
        let count = chunk.sizes.len();
        if count == 0 {
            return Err(ViewerError::Merge("chunk has no pages".into()));
        }
        let previous_length = self.document_length;
        let previous_first = self.offsets.first().copied().unwrap_or_default();
        for segment in &mut self.segments {
            segment.start += count;
            segment.end += count;
        }
        self.segments.insert(
            0,
            Segment {
                doc: chunk.doc,
                start: 0,
                end: count,
                pagination_start: chunk.pagination_start,
                pixel_length: 0.0,
            },
        );
        let mut sizes = chunk.sizes;
        sizes.append(&mut self.original_sizes);
        self.original_sizes = sizes;
        self.recompute();

        self.segments[0].pixel_length = (self.document_length - previous_length).abs();
        let delta = self.offsets.get(count).copied().unwrap_or_default() - previous_first;
        debug!(pages = count, delta, "merged chunk at top");
        Ok(delta)
    }

    /// Appends a chunk and returns the unscaled growth of the document length.
    pub fn merge_at_bottom(&mut self, chunk: ChunkPages) -> ViewerResult<f32> {
        let count = chunk.sizes.len();
        if count == 0 {
            return Err(ViewerError::Merge("chunk has no pages".into()));
        }
        let previous_length = self.document_length;
        let start = self.segments.last().map(|segment| segment.end).unwrap_or(0);
        self.segments.push(Segment {
            doc: chunk.doc,
            start,
            end: start + count,
            pagination_start: chunk.pagination_start,
            pixel_length: 0.0,
        });
        self.original_sizes.extend(chunk.sizes);
        self.recompute();

        let delta = (self.document_length - previous_length).abs();
        if let Some(last) = self.segments.last_mut() {
            last.pixel_length = delta;
        }
        debug!(pages = count, delta, "merged chunk at bottom");
        Ok(delta)
    }

    /// Alignment for `page` given the current primary-axis viewport offset.
    pub fn snap_edge(
        &self,
        page: usize,
        zoom: f32,
        current_offset: f32,
        viewport_len: f32,
    ) -> SnapEdge {
        if page >= self.pages_count() {
            return SnapEdge::None;
        }
        let offset = -self.page_offset(page, zoom);
        let page_len = self.page_length(page, zoom);
        if viewport_len >= page_len {
            SnapEdge::Center
        } else if current_offset >= offset {
            SnapEdge::Start
        } else if offset - page_len > current_offset - viewport_len {
            SnapEdge::End
        } else {
            SnapEdge::None
        }
    }

    /// Document offset the viewport should start at to align `page` on `edge`.
    pub fn snap_offset(&self, page: usize, edge: SnapEdge, zoom: f32, viewport_len: f32) -> f32 {
        let offset = self.page_offset(page, zoom);
        let page_len = self.page_length(page, zoom);
        match edge {
            SnapEdge::Center => offset - viewport_len / 2.0 + page_len / 2.0,
            SnapEdge::End => offset - viewport_len + page_len,
            SnapEdge::Start | SnapEdge::None => offset,
        }
    }
}
