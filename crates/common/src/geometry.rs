//! Geometric primitives.

use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A 2D rectangle in floating point coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Smallest integer rectangle containing this one. Coordinates outside
    /// the `i32` range saturate, as do sizes beyond `u32::MAX`.
    pub fn round_out(&self) -> IRect {
        // Float to int casts saturate; NaN becomes 0.
        let left = self.x.floor() as i64;
        let top = self.y.floor() as i64;
        let right = self.right().ceil() as i64;
        let bottom = self.bottom().ceil() as i64;
        IRect::new(
            clamp_i32(left),
            clamp_i32(top),
            clamp_u32(right.saturating_sub(left)),
            clamp_u32(bottom.saturating_sub(top)),
        )
    }
}

/// An integer point, used for device-space layer offsets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IPoint {
    pub x: i32,
    pub y: i32,
}

impl IPoint {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Integer rectangle for pixel operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl IRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    #[inline]
    pub fn origin(&self) -> IPoint {
        IPoint::new(self.x, self.y)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn same_size(&self, other: &IRect) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Whether `other` is the same size give or take one pixel per axis.
    #[inline]
    pub fn size_close_to(&self, other: &IRect) -> bool {
        self.width.abs_diff(other.width) <= 1 && self.height.abs_diff(other.height) <= 1
    }
}

/// A 2D affine transformation matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub m11: f32,
    pub m12: f32,
    pub m21: f32,
    pub m22: f32,
    pub m31: f32,
    pub m32: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub const fn identity() -> Self {
        Self {
            m11: 1.0,
            m12: 0.0,
            m21: 0.0,
            m22: 1.0,
            m31: 0.0,
            m32: 0.0,
        }
    }

    pub fn translation(x: f32, y: f32) -> Self {
        Self {
            m31: x,
            m32: y,
            ..Self::identity()
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            m11: sx,
            m22: sy,
            ..Self::identity()
        }
    }

    /// Apply `self` first, then `other`.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            m11: self.m11 * other.m11 + self.m12 * other.m21,
            m12: self.m11 * other.m12 + self.m12 * other.m22,
            m21: self.m21 * other.m11 + self.m22 * other.m21,
            m22: self.m21 * other.m12 + self.m22 * other.m22,
            m31: self.m31 * other.m11 + self.m32 * other.m21 + other.m31,
            m32: self.m31 * other.m12 + self.m32 * other.m22 + other.m32,
        }
    }

    pub fn transform_point(&self, point: Point) -> Point {
        Point::new(
            self.m11 * point.x + self.m21 * point.y + self.m31,
            self.m12 * point.x + self.m22 * point.y + self.m32,
        )
    }

    /// Axis-aligned bounds of the transformed rectangle.
    pub fn transform_rect(&self, rect: Rect) -> Rect {
        let p1 = self.transform_point(Point::new(rect.x, rect.y));
        let p2 = self.transform_point(Point::new(rect.right(), rect.y));
        let p3 = self.transform_point(Point::new(rect.x, rect.bottom()));
        let p4 = self.transform_point(Point::new(rect.right(), rect.bottom()));

        let min_x = p1.x.min(p2.x).min(p3.x).min(p4.x);
        let min_y = p1.y.min(p2.y).min(p3.y).min(p4.y);
        let max_x = p1.x.max(p2.x).max(p3.x).max(p4.x);
        let max_y = p1.y.max(p2.y).max(p3.y).max(p4.y);

        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersects() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(a.intersects(&Rect::new(50.0, 50.0, 100.0, 100.0)));
        assert!(!a.intersects(&Rect::new(100.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_round_out() {
        let r = Rect::new(10.5, -0.25, 20.0, 5.5);
        assert_eq!(r.round_out(), IRect::new(10, -1, 21, 7));
        assert!(Rect::new(3.0, 3.0, 0.0, 4.0).round_out().is_empty());
    }

    #[test]
    fn test_round_out_saturates() {
        let huge = Rect::new(-3.0e9, 0.0, 6.0e9, 50.0).round_out();
        assert_eq!(huge.x, i32::MIN);
        assert_eq!(huge.width, u32::MAX);
        assert_eq!(huge.height, 50);

        let far = Rect::new(f32::MAX, 0.0, f32::MAX, 1.0).round_out();
        assert_eq!(far.x, i32::MAX);
        assert_eq!(far.width, 0);
    }

    #[test]
    fn test_size_close_to() {
        let a = IRect::new(0, 0, 40, 40);
        assert!(a.size_close_to(&IRect::new(7, 7, 41, 40)));
        assert!(!a.size_close_to(&IRect::new(0, 0, 80, 80)));
    }

    #[test]
    fn test_transform_composition() {
        let t = Transform::scale(2.0, 2.0).then(&Transform::translation(10.0, 5.0));
        let p = t.transform_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 7.0));

        let r = t.transform_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(r, Rect::new(10.0, 5.0, 20.0, 20.0));
    }
}
