//! Planar Voronoi subdivision of the working rectangle.
//!
//! Each site's region starts as the bounding rectangle and is clipped by the
//! perpendicular bisector to every other site, nearest first, until no
//! remaining site is close enough to cut it. Regions are built in parallel;
//! afterwards vertices are welded across regions so corners shared by
//! adjacent cells are bit-identical, which the rasterizer relies on to tile
//! the canvas without gaps or double writes.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::cells::CellId;
use crate::error::{Result, TerrainError};
use crate::geometry::{Rect, Vec2};

const CLIP_EPSILON: f64 = 1e-9;

/// Default distance under which two region corners are the same corner.
pub const WELD_TOLERANCE: f64 = 1e-6;

/// One boundary segment of a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub start: Vec2,
    pub end: Vec2,
    /// Cell on the other side, `None` for segments on the bounding rectangle.
    pub neighbor: Option<CellId>,
}

impl Edge {
    /// Edge has non-zero length.
    pub fn is_visible(&self) -> bool {
        self.start != self.end
    }

    /// `corner` is exactly one of the two end points.
    pub fn touches(&self, corner: Vec2) -> bool {
        self.start == corner || self.end == corner
    }
}

/// A region emitted by a subdivider: the site and its ordered boundary.
#[derive(Clone, Debug)]
pub struct RawCell {
    pub site: Vec2,
    pub edges: Vec<Edge>,
}

/// Turns a point set into polygonal cells with shared boundary edges.
pub trait Subdivider: Send + Sync {
    /// Produce one cell per site, in site order. Every edge with a neighbor
    /// must appear (reversed) in that neighbor's boundary as well.
    fn subdivide(&self, sites: &[Vec2], bounds: Rect) -> Result<Vec<RawCell>>;
}

/// Half-plane clipping Voronoi builder.
#[derive(Clone, Debug)]
pub struct VoronoiSubdivider {
    pub weld_tolerance: f64,
}

impl Default for VoronoiSubdivider {
    fn default() -> Self {
        Self {
            weld_tolerance: WELD_TOLERANCE,
        }
    }
}

impl Subdivider for VoronoiSubdivider {
    fn subdivide(&self, sites: &[Vec2], bounds: Rect) -> Result<Vec<RawCell>> {
        if bounds.is_empty() {
            return Err(TerrainError::InvalidInputShape {
                width: bounds.width().max(0) as usize,
                height: bounds.height().max(0) as usize,
                reason: "subdivision bounds are empty".into(),
            });
        }
        validate_sites(sites, bounds)?;

        let regions: Vec<ClipPolygon> = (0..sites.len())
            .into_par_iter()
            .map(|i| clip_region(i, sites, bounds))
            .collect();

        let mut welder = VertexWelder::new(self.weld_tolerance);
        let mut cells: Vec<RawCell> = regions
            .into_iter()
            .zip(sites)
            .map(|(region, &site)| RawCell {
                site,
                edges: region.into_edges(&mut welder),
            })
            .collect();

        drop_one_sided_links(&mut cells);
        Ok(cells)
    }
}

fn validate_sites(sites: &[Vec2], bounds: Rect) -> Result<()> {
    if let Some(site) = sites
        .iter()
        .find(|s| !s.is_finite() || !bounds.contains_vec2(**s))
    {
        return Err(TerrainError::InvalidConfig(format!(
            "site ({}, {}) lies outside the subdivision bounds",
            site.x, site.y
        )));
    }

    let mut keys: Vec<(u64, u64)> = sites.iter().map(|s| (s.x.to_bits(), s.y.to_bits())).collect();
    keys.sort_unstable();
    if keys.windows(2).any(|w| w[0] == w[1]) {
        return Err(TerrainError::InvalidConfig("duplicate subdivision sites".into()));
    }
    Ok(())
}

/// Build the region of site `index` by successive bisector clipping.
fn clip_region(index: usize, sites: &[Vec2], bounds: Rect) -> ClipPolygon {
    let site = sites[index];
    let mut candidates: Vec<(f64, usize)> = sites
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != index)
        .map(|(j, other)| (site.distance_sq(other), j))
        .collect();
    candidates.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut region = ClipPolygon::from_rect(bounds);
    let mut scratch = ClipScratch::default();
    let mut max_radius_sq = region.max_radius_sq(site);

    for (dist_sq, j) in candidates {
        // A site further than twice the region radius cannot cut it.
        if dist_sq > 4.0 * max_radius_sq {
            break;
        }
        let other = sites[j];
        let midpoint = Vec2::new((site.x + other.x) * 0.5, (site.y + other.y) * 0.5);
        let normal = (other - site).normalize();
        if region.clip(midpoint, normal, j, &mut scratch) {
            if region.is_empty() {
                break;
            }
            max_radius_sq = region.max_radius_sq(site);
        }
    }

    region
}

#[derive(Default)]
struct ClipScratch {
    vertices: Vec<Vec2>,
    neighbors: Vec<Option<usize>>,
    dists: Vec<f64>,
}

/// Convex polygon under construction. `neighbors[i]` belongs to the edge
/// starting at `vertices[i]`.
#[derive(Clone, Debug)]
struct ClipPolygon {
    vertices: Vec<Vec2>,
    neighbors: Vec<Option<usize>>,
}

impl ClipPolygon {
    fn from_rect(bounds: Rect) -> Self {
        Self {
            vertices: bounds.corners().to_vec(),
            neighbors: vec![None; 4],
        }
    }

    fn is_empty(&self) -> bool {
        self.vertices.len() < 3
    }

    fn max_radius_sq(&self, center: Vec2) -> f64 {
        self.vertices
            .iter()
            .map(|v| v.distance_sq(&center))
            .fold(0.0, f64::max)
    }

    /// Keep the half-plane `(v - point) . normal <= 0`. The new boundary
    /// segment is attributed to `neighbor`. Returns whether anything changed.
    fn clip(&mut self, point: Vec2, normal: Vec2, neighbor: usize, scratch: &mut ClipScratch) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }

        scratch.dists.clear();
        let mut all_inside = true;
        let mut all_outside = true;
        for v in &self.vertices {
            let d = (*v - point).dot(&normal);
            scratch.dists.push(d);
            if d > CLIP_EPSILON {
                all_inside = false;
            } else if d < -CLIP_EPSILON {
                all_outside = false;
            }
        }

        if all_inside {
            return false;
        }
        if all_outside {
            self.vertices.clear();
            self.neighbors.clear();
            return true;
        }

        scratch.vertices.clear();
        scratch.neighbors.clear();

        for i in 0..n {
            let j = (i + 1) % n;
            let d_i = scratch.dists[i];
            let d_j = scratch.dists[j];
            let vi = self.vertices[i];
            let vj = self.vertices[j];
            let edge_neighbor = self.neighbors[i];

            if d_i <= CLIP_EPSILON {
                scratch.vertices.push(vi);
                if d_j <= CLIP_EPSILON {
                    scratch.neighbors.push(edge_neighbor);
                } else {
                    // Leaving: vi -> intersection keeps the old edge,
                    // intersection -> next entry is the new bisector edge.
                    let t = d_i / (d_i - d_j);
                    scratch.neighbors.push(edge_neighbor);
                    scratch.vertices.push(lerp(vi, vj, t));
                    scratch.neighbors.push(Some(neighbor));
                }
            } else if d_j <= CLIP_EPSILON {
                // Entering: intersection -> vj keeps the old edge.
                let t = d_i / (d_i - d_j);
                scratch.vertices.push(lerp(vi, vj, t));
                scratch.neighbors.push(edge_neighbor);
            }
        }

        std::mem::swap(&mut self.vertices, &mut scratch.vertices);
        std::mem::swap(&mut self.neighbors, &mut scratch.neighbors);
        true
    }

    /// Weld corners and emit the non-degenerate boundary edges.
    fn into_edges(self, welder: &mut VertexWelder) -> Vec<Edge> {
        if self.is_empty() {
            return Vec::new();
        }
        let welded: Vec<Vec2> = self.vertices.iter().map(|v| welder.weld(*v)).collect();
        let n = welded.len();
        (0..n)
            .map(|i| Edge {
                start: welded[i],
                end: welded[(i + 1) % n],
                neighbor: self.neighbors[i].map(CellId),
            })
            .filter(Edge::is_visible)
            .collect()
    }
}

fn lerp(a: Vec2, b: Vec2, t: f64) -> Vec2 {
    Vec2::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
}

/// Snaps nearly-equal corners onto the first representative seen.
struct VertexWelder {
    tolerance: f64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
    vertices: Vec<Vec2>,
}

impl VertexWelder {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(f64::MIN_POSITIVE),
            buckets: HashMap::new(),
            vertices: Vec::new(),
        }
    }

    fn key(&self, v: Vec2) -> (i64, i64) {
        (
            (v.x / self.tolerance).floor() as i64,
            (v.y / self.tolerance).floor() as i64,
        )
    }

    fn weld(&mut self, v: Vec2) -> Vec2 {
        let (kx, ky) = self.key(v);
        let tolerance_sq = self.tolerance * self.tolerance;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(ids) = self.buckets.get(&(kx + dx, ky + dy)) {
                    for &id in ids {
                        if self.vertices[id].distance_sq(&v) <= tolerance_sq {
                            return self.vertices[id];
                        }
                    }
                }
            }
        }
        self.buckets.entry((kx, ky)).or_default().push(self.vertices.len());
        self.vertices.push(v);
        v
    }
}

/// Floating-point clipping can leave a sliver edge on one side of a pair
/// only; such links are demoted to plain boundary segments.
fn drop_one_sided_links(cells: &mut [RawCell]) {
    let links: Vec<Vec<usize>> = cells
        .iter()
        .map(|cell| {
            cell.edges
                .iter()
                .filter_map(|e| e.neighbor.map(|n| n.0))
                .collect()
        })
        .collect();

    for (index, cell) in cells.iter_mut().enumerate() {
        for edge in &mut cell.edges {
            if let Some(other) = edge.neighbor {
                if !links[other.0].contains(&index) {
                    edge.neighbor = None;
                }
            }
        }
    }
}
