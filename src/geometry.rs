//! Plain geometric value types shared by every stage.

use std::ops::Sub;

/// A 2D point or vector in canvas space (y grows downward).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(&self, other: &Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_sq(&self, other: &Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Vec2) -> f64 {
        self.distance_sq(other).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 1e-12 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self { x: 0.0, y: 0.0 }
        }
    }

    /// Angle in degrees of the direction from `self` to `other`, in (-180, 180].
    pub fn angle_to(&self, other: &Vec2) -> f64 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }

    /// Both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// An integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Nearest grid point, rounding halves to even.
    pub fn from_vec2(v: Vec2) -> Self {
        Self {
            x: v.x.round_ties_even() as i32,
            y: v.y.round_ties_even() as i32,
        }
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(f64::from(self.x), f64::from(self.y))
    }
}

/// Axis-aligned rectangle `[x0, x1) x [y0, y1)` in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> usize {
        (self.width().max(0) as usize) * (self.height().max(0) as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains(&self, p: GridPoint) -> bool {
        p.x >= self.x0 && p.x < self.x1 && p.y >= self.y0 && p.y < self.y1
    }

    /// Closed containment test for continuous points (edges included).
    pub fn contains_vec2(&self, v: Vec2) -> bool {
        v.x >= f64::from(self.x0)
            && v.x <= f64::from(self.x1)
            && v.y >= f64::from(self.y0)
            && v.y <= f64::from(self.y1)
    }

    /// `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    /// Corners in boundary order: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Vec2; 4] {
        let (x0, y0) = (f64::from(self.x0), f64::from(self.y0));
        let (x1, y1) = (f64::from(self.x1), f64::from(self.y1));
        [
            Vec2::new(x0, y0),
            Vec2::new(x1, y0),
            Vec2::new(x1, y1),
            Vec2::new(x0, y1),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_to_uses_canvas_axes() {
        let origin = Vec2::new(10.0, 10.0);
        assert!((origin.angle_to(&Vec2::new(20.0, 10.0)) - 0.0).abs() < 1e-9);
        assert!((origin.angle_to(&Vec2::new(10.0, 20.0)) - 90.0).abs() < 1e-9);
        assert!((origin.angle_to(&Vec2::new(0.0, 10.0)) - 180.0).abs() < 1e-9);
        assert!((origin.angle_to(&Vec2::new(10.0, 0.0)) + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_point_rounding() {
        assert_eq!(GridPoint::from_vec2(Vec2::new(2.5, 3.5)), GridPoint::new(2, 4));
        assert_eq!(GridPoint::from_vec2(Vec2::new(-0.6, 7.49)), GridPoint::new(-1, 7));
    }

    #[test]
    fn test_rect_dimensions() {
        let rect = Rect::new(10, 20, 110, 70);
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
        assert_eq!(rect.area(), 5000);
        assert!(rect.contains(GridPoint::new(10, 20)));
        assert!(!rect.contains(GridPoint::new(110, 20)));
        assert!(rect.contains_vec2(Vec2::new(110.0, 70.0)));
        assert!(Rect::from_size(200, 200).contains_rect(&rect));
    }
}
