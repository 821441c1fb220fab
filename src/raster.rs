//! Scanline rasterization of cell polygons into the pixel buffer.
//!
//! A pixel `(x, y)` belongs to a triangle when the lattice point lies inside
//! it under a half-open rule: rows run over `[ceil(top), ceil(bottom))` and
//! each row covers `[ceil(left), ceil(right))`. Edge intercepts are computed
//! from end points in a canonical order, so two triangles sharing an edge
//! agree bit for bit on where it crosses each row. Together with welded
//! corners this writes every pixel of the working rectangle exactly once.

use rayon::prelude::*;

use crate::cells::{CellGraph, CellId, MAX_HEIGHT};
use crate::geometry::{Rect, Vec2};
use crate::pixels::PixelBuffer;

/// Half-open run `[x_start, x_end)` on row `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub y: i32,
    pub x_start: i32,
    pub x_end: i32,
}

impl Span {
    pub fn len(&self) -> usize {
        (self.x_end - self.x_start).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.x_end <= self.x_start
    }
}

/// Outcome of rasterizing a cell graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub cells_drawn: usize,
    pub cells_skipped: usize,
    pub pixels_written: usize,
}

/// Map a height in [0, 255] to an intensity in [0, 1].
pub fn height_to_intensity(height: i32) -> f32 {
    height.clamp(0, MAX_HEIGHT) as f32 / MAX_HEIGHT as f32
}

/// x where the segment `p`-`q` crosses row `y`.
fn edge_x_at(p: Vec2, q: Vec2, y: f64) -> f64 {
    let (a, b) = if (p.y, p.x) <= (q.y, q.x) { (p, q) } else { (q, p) };
    a.x + (b.x - a.x) * ((y - a.y) / (b.y - a.y))
}

/// Spans covered by the triangle `a`, `b`, `c`, restricted to `clip`.
pub fn triangle_spans(a: Vec2, b: Vec2, c: Vec2, clip: Rect) -> Vec<Span> {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Vec::new();
    }

    let mut v = [a, b, c];
    v.sort_by(|p, q| p.y.total_cmp(&q.y).then(p.x.total_cmp(&q.x)));
    let [top, mid, bottom] = v;

    let y_start = (top.y.ceil() as i32).max(clip.y0);
    let y_end = (bottom.y.ceil() as i32).min(clip.y1);

    let mut spans = Vec::new();
    for y in y_start..y_end {
        let yf = f64::from(y);
        let long = edge_x_at(top, bottom, yf);
        let short = if yf < mid.y {
            edge_x_at(top, mid, yf)
        } else {
            edge_x_at(mid, bottom, yf)
        };
        let (left, right) = if long <= short { (long, short) } else { (short, long) };

        let x_start = (left.ceil() as i32).max(clip.x0);
        let x_end = (right.ceil() as i32).min(clip.x1);
        if x_start < x_end {
            spans.push(Span { y, x_start, x_end });
        }
    }
    spans
}

/// Fan a convex polygon around the mean of its corners.
pub fn fan_triangles(points: &[Vec2]) -> Vec<[Vec2; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }
    let n = points.len() as f64;
    let centroid = Vec2::new(
        points.iter().map(|p| p.x).sum::<f64>() / n,
        points.iter().map(|p| p.y).sum::<f64>() / n,
    );
    (0..points.len())
        .map(|i| [points[i], points[(i + 1) % points.len()], centroid])
        .collect()
}

/// Spans covered by a convex polygon given in boundary order.
pub fn polygon_spans(points: &[Vec2], clip: Rect) -> Vec<Span> {
    fan_triangles(points)
        .into_iter()
        .flat_map(|[a, b, c]| triangle_spans(a, b, c, clip))
        .collect()
}

/// Fill a triangle with `value`, writing through the buffer's wrap rule.
pub fn fill_triangle(buffer: &mut PixelBuffer, a: Vec2, b: Vec2, c: Vec2, value: f32) {
    for span in triangle_spans(a, b, c, buffer.working_rect()) {
        buffer.fill_span(span.y, span.x_start, span.x_end, value);
    }
}

/// Spans of every cell polygon built from its colour points. Cells with
/// fewer than three colour points yield no spans.
pub fn cell_spans(graph: &CellGraph, clip: Rect) -> Vec<(CellId, Vec<Span>)> {
    graph
        .cells()
        .par_iter()
        .map(|cell| {
            let corners: Vec<Vec2> = cell.colour_points().iter().map(|p| p.position).collect();
            (cell.id, polygon_spans(&corners, clip))
        })
        .collect()
}

/// Paint every cell with its height. Spans are computed in parallel and
/// written sequentially in cell order.
pub fn rasterize_cells(graph: &CellGraph, buffer: &mut PixelBuffer) -> RasterStats {
    let mut stats = RasterStats::default();
    for (id, spans) in cell_spans(graph, buffer.working_rect()) {
        let cell = graph.cell(id);
        if cell.colour_points().len() < 3 {
            tracing::warn!(
                target: "raster",
                cell = id.index(),
                points = cell.colour_points().len(),
                "raster.missing_geometry"
            );
            stats.cells_skipped += 1;
            continue;
        }

        let value = height_to_intensity(cell.height);
        for span in &spans {
            buffer.fill_span(span.y, span.x_start, span.x_end, value);
            stats.pixels_written += span.len();
        }
        stats.cells_drawn += 1;
    }
    stats
}
