use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: PointF) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SizeF {
    pub width: f32,
    pub height: f32,
}

impl SizeF {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Axis-aligned rectangle, y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin(origin: PointF, size: SizeF) -> Self {
        Self::new(
            origin.x,
            origin.y,
            origin.x + size.width,
            origin.y + size.height,
        )
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    pub fn contains(&self, point: PointF) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }

    pub fn intersects(&self, other: &RectF) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn union(&self, other: &RectF) -> RectF {
        RectF {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn offset(&self, dx: f32, dy: f32) -> RectF {
        RectF {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    pub fn scale(&self, factor: f32) -> RectF {
        RectF {
            left: self.left * factor,
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
        }
    }
}

/// Region of a page expressed in `[0, 1]` fractions of its width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NormalizedRect {
    pub const FULL: NormalizedRect = NormalizedRect {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };

    pub fn clamp(self) -> Self {
        let left = self.left.clamp(0.0, 1.0);
        let right = self.right.clamp(0.0, 1.0);
        let top = self.top.clamp(0.0, 1.0);
        let bottom = self.bottom.clamp(0.0, 1.0);
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: right.max(left),
            bottom: bottom.max(top),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }

    /// The same rectangle in the units of a page of `size`.
    pub fn to_rect(&self, size: SizeF) -> RectF {
        RectF::new(
            self.left * size.width,
            self.top * size.height,
            self.right * size.width,
            self.bottom * size.height,
        )
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Quantised form used for equality lookups in the tile cache.
    pub(crate) fn key(&self) -> [u32; 4] {
        let q = |v: f32| (v * 10_000.0).round().max(0.0) as u32;
        [q(self.left), q(self.top), q(self.right), q(self.bottom)]
    }
}

/// Maps page-local view coordinates (zoom 1) onto screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageProjection {
    /// Screen position of the page slot's origin.
    pub origin: PointF,
    pub zoom: f32,
}

impl PageProjection {
    pub fn to_screen(&self, point: PointF) -> PointF {
        PointF::new(
            self.origin.x + point.x * self.zoom,
            self.origin.y + point.y * self.zoom,
        )
    }

    pub fn rect_to_screen(&self, rect: &RectF) -> RectF {
        rect.scale(self.zoom).offset(self.origin.x, self.origin.y)
    }

    pub fn to_local(&self, screen: PointF) -> PointF {
        PointF::new(
            (screen.x - self.origin.x) / self.zoom,
            (screen.y - self.origin.y) / self.zoom,
        )
    }
}

pub fn circles_collide(a: PointF, ra: f32, b: PointF, rb: f32) -> bool {
    a.distance(b) <= ra + rb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_rect_clamp_orders_edges() {
        let rect = NormalizedRect {
            left: 1.4,
            top: -0.2,
            right: 0.5,
            bottom: 0.7,
        }
        .clamp();
        assert_eq!(rect.left, 0.5);
        assert_eq!(rect.right, 1.0);
        assert_eq!(rect.top, 0.0);
        assert!(rect.is_valid());
    }

    #[test]
    fn rect_contains_edges_inclusive() {
        let rect = RectF::new(0.0, 0.0, 10.0, 5.0);
        assert!(rect.contains(PointF::new(10.0, 5.0)));
        assert!(!rect.contains(PointF::new(10.1, 5.0)));
    }

    #[test]
    fn projection_round_trips_local_points() {
        let projection = PageProjection {
            origin: PointF::new(-40.0, 120.0),
            zoom: 2.0,
        };
        let screen = projection.to_screen(PointF::new(10.0, 5.0));
        assert_eq!(screen, PointF::new(-20.0, 130.0));
        assert_eq!(projection.to_local(screen), PointF::new(10.0, 5.0));
        let rect = projection.rect_to_screen(&RectF::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(rect, RectF::new(-40.0, 120.0, -20.0, 140.0));
    }

    #[test]
    fn circle_collision_uses_combined_radius() {
        assert!(circles_collide(
            PointF::new(0.0, 0.0),
            3.0,
            PointF::new(5.0, 0.0),
            2.0
        ));
        assert!(!circles_collide(
            PointF::new(0.0, 0.0),
            1.0,
            PointF::new(5.0, 0.0),
            2.0
        ));
    }
}
