use crate::error::{Result, TerrainError};
use crate::geometry::{GridPoint, Rect};

/// Scalar image buffer with a working sub-rectangle and toroidal addressing.
///
/// The full backing array covers the whole image (dead space included); the
/// generator only ever computes inside the working rectangle. Coordinates
/// outside the working rectangle wrap by its width and height, so the map
/// behaves like a torus for lookups and writes.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    working: Rect,
    data: Vec<f32>,
}

impl PixelBuffer {
    /// Create a buffer filled with `value`, working over the whole image.
    pub fn new_with(width: usize, height: usize, value: f32) -> Result<Self> {
        let len = Self::pixel_count(width, height)?;
        Self::from_pixels(vec![value; len], width, height)
    }

    /// Pixel count of a `width` x `height` image addressable by `i32` coordinates.
    fn pixel_count(width: usize, height: usize) -> Result<usize> {
        let shape_error = |reason: &str| TerrainError::InvalidInputShape {
            width,
            height,
            reason: reason.into(),
        };
        if width == 0 || height == 0 {
            return Err(shape_error("image has no pixels"));
        }
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(shape_error("image side exceeds the coordinate range"));
        }
        width
            .checked_mul(height)
            .ok_or_else(|| shape_error("pixel count overflows"))
    }

    /// Wrap an existing row-major pixel array.
    pub fn from_pixels(pixels: Vec<f32>, width: usize, height: usize) -> Result<Self> {
        let expected = Self::pixel_count(width, height)?;
        if pixels.len() != expected {
            return Err(TerrainError::InvalidInputShape {
                width,
                height,
                reason: format!("expected {expected} pixels, got {}", pixels.len()),
            });
        }
        Ok(Self {
            width,
            height,
            working: Rect::from_size(width, height),
            data: pixels,
        })
    }

    /// Restrict computation to `rect`, which must lie inside the image.
    pub fn with_working_rect(mut self, rect: Rect) -> Result<Self> {
        if rect.is_empty() || !Rect::from_size(self.width, self.height).contains_rect(&rect) {
            return Err(TerrainError::InvalidInputShape {
                width: self.width,
                height: self.height,
                reason: format!("working rectangle {rect:?} does not fit inside the image"),
            });
        }
        self.working = rect;
        Ok(self)
    }

    pub fn working_rect(&self) -> Rect {
        self.working
    }

    /// Normalise a coordinate into the working rectangle, wrapping
    /// horizontally by its width and vertically by its height.
    pub fn wrap(&self, x: i32, y: i32) -> GridPoint {
        let r = self.working;
        GridPoint::new(
            r.x0 + (x - r.x0).rem_euclid(r.width()),
            r.y0 + (y - r.y0).rem_euclid(r.height()),
        )
    }

    /// Get the index into the data array after wrapping.
    fn index(&self, x: i32, y: i32) -> usize {
        let p = self.wrap(x, y);
        p.y as usize * self.width + p.x as usize
    }

    pub fn get(&self, x: i32, y: i32) -> f32 {
        self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: i32, y: i32, value: f32) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Fill the working rectangle with a value.
    pub fn fill_working(&mut self, value: f32) {
        let r = self.working;
        for y in r.y0..r.y1 {
            let row = y as usize * self.width;
            self.data[row + r.x0 as usize..row + r.x1 as usize].fill(value);
        }
    }

    /// Write `value` to `[x_start, x_end)` on row `y`; every coordinate goes
    /// through the wraparound rule.
    pub fn fill_span(&mut self, y: i32, x_start: i32, x_end: i32, value: f32) {
        for x in x_start..x_end {
            self.set(x, y, value);
        }
    }

    /// Full backing array, row-major.
    pub fn pixels(&self) -> &[f32] {
        &self.data
    }

    pub fn into_pixels(self) -> Vec<f32> {
        self.data
    }

    /// Iterate over working-rectangle pixels with their coordinates.
    pub fn iter_working(&self) -> impl Iterator<Item = (i32, i32, f32)> + '_ {
        let r = self.working;
        (r.y0..r.y1).flat_map(move |y| (r.x0..r.x1).map(move |x| (x, y, self.get(x, y))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraparound_addressing() {
        let mut buffer = PixelBuffer::new_with(8, 8, 0.0)
            .and_then(|b| b.with_working_rect(Rect::new(0, 0, 4, 4)))
            .expect("rect fits");

        buffer.set(-1, 0, 0.5);
        assert_eq!(buffer.get(3, 0), 0.5);

        buffer.set(4, 5, 0.25);
        assert_eq!(buffer.get(0, 1), 0.25);

        assert_eq!(buffer.wrap(-5, -1), GridPoint::new(3, 3));
        assert_eq!(buffer.wrap(9, 8), GridPoint::new(1, 0));

        // Dead space outside the working rectangle stays untouched
        assert_eq!(buffer.pixels()[4], 0.0);
        assert_eq!(buffer.pixels()[7 * 8 + 7], 0.0);
    }

    #[test]
    fn test_working_rect_with_offset() {
        let buffer = PixelBuffer::new_with(10, 10, 0.0)
            .and_then(|b| b.with_working_rect(Rect::new(2, 2, 6, 6)))
            .expect("rect fits");
        assert_eq!(buffer.wrap(1, 2), GridPoint::new(5, 2));
        assert_eq!(buffer.wrap(6, 7), GridPoint::new(2, 3));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(PixelBuffer::from_pixels(vec![0.0; 10], 4, 4).is_err());
        assert!(PixelBuffer::from_pixels(Vec::new(), 0, 0).is_err());
        assert!(PixelBuffer::new_with(4, 4, 0.0)
            .and_then(|b| b.with_working_rect(Rect::new(0, 0, 8, 8)))
            .is_err());
        assert!(matches!(
            PixelBuffer::new_with(0, 0, 0.0),
            Err(TerrainError::InvalidInputShape { .. })
        ));
        assert!(PixelBuffer::new_with(usize::MAX, 2, 0.0).is_err());
    }

    #[test]
    fn test_fill_working_and_span() {
        let mut buffer = PixelBuffer::new_with(6, 6, -1.0)
            .and_then(|b| b.with_working_rect(Rect::new(0, 0, 4, 4)))
            .expect("rect fits");
        buffer.fill_working(0.0);
        assert!(buffer.iter_working().all(|(_, _, v)| v == 0.0));
        assert_eq!(buffer.get(5, 5), 0.0);
        assert_eq!(buffer.pixels()[5], -1.0);

        buffer.fill_span(1, 3, 6, 1.0);
        assert_eq!(buffer.get(3, 1), 1.0);
        assert_eq!(buffer.get(0, 1), 1.0);
        assert_eq!(buffer.get(1, 1), 1.0);
        assert_eq!(buffer.get(2, 1), 0.0);
    }
}
