use std::path::Path;

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use crate::pixels::PixelBuffer;

/// Spectral colormap stops (matplotlib style), low to high.
const SPECTRAL: [[f32; 3]; 11] = [
    [0.37, 0.31, 0.64], // Dark blue/purple (low)
    [0.20, 0.53, 0.74],
    [0.40, 0.76, 0.65],
    [0.67, 0.87, 0.64],
    [0.90, 0.96, 0.60],
    [1.00, 1.00, 0.75],
    [1.00, 0.88, 0.55],
    [0.99, 0.68, 0.38],
    [0.96, 0.43, 0.26],
    [0.84, 0.24, 0.31],
    [0.62, 0.00, 0.26], // Dark red (high)
];

/// Grayscale image of the working rectangle. Values are expected in [0, 1].
pub fn render_heightmap(buffer: &PixelBuffer) -> GrayImage {
    let rect = buffer.working_rect();
    let mut img: GrayImage = ImageBuffer::new(rect.width() as u32, rect.height() as u32);
    for (x, y, v) in buffer.iter_working() {
        let level = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        img.put_pixel((x - rect.x0) as u32, (y - rect.y0) as u32, Luma([level]));
    }
    img
}

/// Spectral-coloured image of the working rectangle.
pub fn render_spectral(buffer: &PixelBuffer) -> RgbImage {
    let rect = buffer.working_rect();
    let mut img: RgbImage = ImageBuffer::new(rect.width() as u32, rect.height() as u32);
    for (x, y, v) in buffer.iter_working() {
        let color = spectral_colormap(v.clamp(0.0, 1.0));
        img.put_pixel((x - rect.x0) as u32, (y - rect.y0) as u32, Rgb(color));
    }
    img
}

/// Save the working rectangle as a grayscale PNG (or any format `image`
/// infers from the extension).
pub fn export_heightmap(buffer: &PixelBuffer, path: &Path) -> Result<(), image::ImageError> {
    render_heightmap(buffer).save(path)
}

/// Save the working rectangle through the spectral colormap.
pub fn export_spectral(buffer: &PixelBuffer, path: &Path) -> Result<(), image::ImageError> {
    render_spectral(buffer).save(path)
}

fn spectral_colormap(t: f32) -> [u8; 3] {
    let t_scaled = t * 10.0;
    let idx = (t_scaled as usize).min(9);
    let frac = t_scaled - idx as f32;

    let c1 = SPECTRAL[idx];
    let c2 = SPECTRAL[idx + 1];
    let channel = |i: usize| ((c1[i] + (c2[i] - c1[i]) * frac) * 255.0) as u8;
    [channel(0), channel(1), channel(2)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn test_spectral_endpoints() {
        assert_eq!(spectral_colormap(0.0), [94, 79, 163]);
        assert_eq!(spectral_colormap(1.0), [158, 0, 66]);
    }

    #[test]
    fn test_render_crops_to_working_rect() {
        let mut buffer = PixelBuffer::new_with(8, 8, 0.0)
            .and_then(|b| b.with_working_rect(Rect::new(2, 2, 6, 6)))
            .expect("rect fits");
        buffer.set(2, 2, 1.0);
        buffer.set(5, 5, 0.5);

        let gray = render_heightmap(&buffer);
        assert_eq!(gray.dimensions(), (4, 4));
        assert_eq!(gray.get_pixel(0, 0), &Luma([255]));
        assert_eq!(gray.get_pixel(3, 3), &Luma([128]));
        assert_eq!(gray.get_pixel(1, 0), &Luma([0]));

        assert_eq!(render_spectral(&buffer).dimensions(), (4, 4));
    }
}
