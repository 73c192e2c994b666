//! Host-supplied drawing surface and an in-memory RGBA implementation.

use crate::engine::PixelBuffer;
use crate::geometry::{PointF, RectF};

/// Drawing capability the viewer composes frames into. Colors are RGBA with
/// straight alpha; every operation blends over existing content and clips to
/// the surface.
pub trait RasterSurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn fill_rect(&mut self, rect: RectF, color: [u8; 4]);

    fn fill_circle(&mut self, center: PointF, radius: f32, color: [u8; 4]);

    /// Draws `bitmap` scaled into `dest`.
    fn draw_bitmap(&mut self, bitmap: &PixelBuffer, dest: RectF);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

#[derive(Debug, Clone)]
pub struct RgbaCanvas {
    buffer: PixelBuffer,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32, background: [u8; 4]) -> Self {
        Self {
            buffer: PixelBuffer::filled(width, height, background),
        }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }

    fn clip(&self, rect: RectF) -> Option<PixelRect> {
        let clamp_x = |v: f32| v.round().clamp(0.0, self.buffer.width as f32) as u32;
        let clamp_y = |v: f32| v.round().clamp(0.0, self.buffer.height as f32) as u32;
        let area = PixelRect {
            x0: clamp_x(rect.left),
            y0: clamp_y(rect.top),
            x1: clamp_x(rect.right),
            y1: clamp_y(rect.bottom),
        };
        (area.x0 < area.x1 && area.y0 < area.y1).then_some(area)
    }

    fn blend_at(&mut self, x: u32, y: u32, color: [u8; 4]) {
        let idx = (y as usize * self.buffer.width as usize + x as usize) * 4;
        if let Some(pixel) = self.buffer.pixels.get_mut(idx..idx + 4) {
            blend_pixel(pixel, color);
        }
    }
}

impl RasterSurface for RgbaCanvas {
    fn width(&self) -> u32 {
        self.buffer.width
    }

    fn height(&self) -> u32 {
        self.buffer.height
    }

    fn fill_rect(&mut self, rect: RectF, color: [u8; 4]) {
        let Some(area) = self.clip(rect) else {
            return;
        };
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                self.blend_at(x, y, color);
            }
        }
    }

    fn fill_circle(&mut self, center: PointF, radius: f32, color: [u8; 4]) {
        let bounds = RectF::new(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        );
        let Some(area) = self.clip(bounds) else {
            return;
        };
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let pixel_center = PointF::new(x as f32 + 0.5, y as f32 + 0.5);
                if pixel_center.distance(center) <= radius {
                    self.blend_at(x, y, color);
                }
            }
        }
    }

    fn draw_bitmap(&mut self, bitmap: &PixelBuffer, dest: RectF) {
        if bitmap.width == 0 || bitmap.height == 0 || dest.width() <= 0.0 || dest.height() <= 0.0
        {
            return;
        }
        let Some(area) = self.clip(dest) else {
            return;
        };
        let scale_x = bitmap.width as f32 / dest.width();
        let scale_y = bitmap.height as f32 / dest.height();
        for y in area.y0..area.y1 {
            let src_y = (((y as f32 + 0.5 - dest.top) * scale_y) as u32).min(bitmap.height - 1);
            for x in area.x0..area.x1 {
                let src_x =
                    (((x as f32 + 0.5 - dest.left) * scale_x) as u32).min(bitmap.width - 1);
                if let Some(color) = bitmap.pixel(src_x, src_y) {
                    self.blend_at(x, y, color);
                }
            }
        }
    }
}

fn blend_pixel(pixel: &mut [u8], color: [u8; 4]) {
    let alpha = color[3] as f32 / 255.0;
    let inv = 1.0 - alpha;
    for channel in 0..3 {
        pixel[channel] = ((pixel[channel] as f32 * inv) + (color[channel] as f32 * alpha))
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    let dst_alpha = pixel[3] as f32 / 255.0;
    pixel[3] = ((alpha + dst_alpha * inv) * 255.0).round().clamp(0.0, 255.0) as u8;
}
