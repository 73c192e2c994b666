//! Native engine backends for folio.

use folio_core::{PixelBuffer, RawChar, RawLine, RectF, RenderRegion};
use image::{imageops, RgbaImage};

#[cfg(feature = "pdf")]
mod pdfium;

#[cfg(feature = "pdf")]
pub use pdfium::PdfiumEngine;

/// Copies the part of a full-page raster selected by `region` into `target`.
/// Pixels outside the page stay untouched.
pub fn blit_region(page: &RgbaImage, region: RenderRegion, target: &mut PixelBuffer) {
    let width = target.width.min(page.width().saturating_sub(region.origin_x));
    let height = target
        .height
        .min(page.height().saturating_sub(region.origin_y));
    if width == 0 || height == 0 {
        return;
    }
    let crop = imageops::crop_imm(page, region.origin_x, region.origin_y, width, height).to_image();
    let row_bytes = width as usize * 4;
    let target_stride = target.width as usize * 4;
    for (row, source) in crop.as_raw().chunks_exact(row_bytes).enumerate() {
        let start = row * target_stride;
        target.pixels[start..start + row_bytes].copy_from_slice(source);
    }
}

/// Splits characters in reading order into lines: explicit line breaks end a
/// line, and so does a glyph whose vertical center leaves the current line's
/// band. Bounds are expected top-down.
pub fn group_lines(chars: impl IntoIterator<Item = RawChar>) -> Vec<RawLine> {
    let mut lines = Vec::new();
    let mut current: Vec<RawChar> = Vec::new();
    let mut band: Option<RectF> = None;
    for raw in chars {
        if raw.ch == '\n' || raw.ch == '\r' {
            flush(&mut lines, &mut current);
            band = None;
            continue;
        }
        let center = raw.bounds.center_y();
        if let Some(line) = band {
            if center < line.top || center > line.bottom {
                flush(&mut lines, &mut current);
                band = None;
            }
        }
        band = Some(match band {
            Some(line) if !raw.ch.is_whitespace() => line.union(&raw.bounds),
            Some(line) => line,
            None => raw.bounds,
        });
        current.push(raw);
    }
    flush(&mut lines, &mut current);
    lines
}

fn flush(lines: &mut Vec<RawLine>, current: &mut Vec<RawChar>) {
    if !current.is_empty() {
        lines.push(RawLine {
            chars: std::mem::take(current),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn glyph(ch: char, x: f32, top: f32) -> RawChar {
        RawChar {
            ch,
            bounds: RectF::new(x, top, x + 8.0, top + 10.0),
        }
    }

    fn text(line: &RawLine) -> String {
        line.chars.iter().map(|c| c.ch).collect()
    }

    #[test]
    fn line_breaks_and_baseline_jumps_split_lines() {
        let chars = vec![
            glyph('a', 0.0, 10.0),
            glyph('b', 10.0, 11.0),
            glyph('\r', 20.0, 10.0),
            glyph('\n', 20.0, 10.0),
            glyph('c', 0.0, 30.0),
            glyph(' ', 10.0, 30.0),
            glyph('d', 20.0, 30.0),
            glyph('e', 0.0, 50.0),
        ];
        let lines = group_lines(chars);
        let texts: Vec<String> = lines.iter().map(text).collect();
        assert_eq!(texts, vec!["ab", "c d", "e"]);
    }

    #[test]
    fn blit_copies_the_requested_window() {
        let mut page = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
        page.put_pixel(5, 6, Rgba([1, 2, 3, 255]));
        let mut target = PixelBuffer::new(4, 4);
        let region = RenderRegion {
            page_width: 8,
            page_height: 8,
            origin_x: 4,
            origin_y: 4,
        };
        blit_region(&page, region, &mut target);
        assert_eq!(target.pixel(1, 2), Some([1, 2, 3, 255]));
        assert_eq!(target.pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn blit_clips_at_the_page_edge() {
        let page = RgbaImage::from_pixel(6, 6, Rgba([9, 9, 9, 255]));
        let mut target = PixelBuffer::new(4, 4);
        let region = RenderRegion {
            page_width: 6,
            page_height: 6,
            origin_x: 4,
            origin_y: 4,
        };
        blit_region(&page, region, &mut target);
        assert_eq!(target.pixel(1, 1), Some([9, 9, 9, 255]));
        assert_eq!(target.pixel(2, 2), Some([0, 0, 0, 0]));
    }
}
