//! Cell graph: Voronoi cells with adjacency, heights and plate membership.
//!
//! Adjacency comes in two kinds. Natural neighbours share a visible boundary
//! edge. False neighbours are cells on opposite horizontal borders that are
//! linked by seam stitching so the map wraps east to west. Both kinds count
//! for smoothing, plate growth and tectonic shift; only natural neighbours
//! feed the initial height estimate.

use rayon::prelude::*;

use crate::error::Result;
use crate::geometry::{Rect, Vec2};
use crate::plates::PlateId;
use crate::voronoi::{Edge, RawCell, Subdivider};

/// Upper bound of the height domain.
pub const MAX_HEIGHT: i32 = 255;

/// Distance from a bound under which a corner counts as touching it.
pub const BORDER_TOLERANCE: f64 = 0.1;

/// Index of a cell inside its [`CellGraph`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub usize);

impl CellId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which bounds of the working rectangle a cell touches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BorderFlags {
    pub left: bool,
    pub right: bool,
    /// Touches the top bound.
    pub north: bool,
    /// Touches the bottom bound.
    pub south: bool,
}

impl BorderFlags {
    fn from_edges(edges: &[Edge], bounds: Rect) -> Self {
        let near = |a: f64, b: i32| (a - f64::from(b)).abs() < BORDER_TOLERANCE;
        let mut flags = Self::default();
        for corner in edges.iter().flat_map(|e| [e.start, e.end]) {
            flags.left |= near(corner.x, bounds.x0);
            flags.right |= near(corner.x, bounds.x1);
            flags.north |= near(corner.y, bounds.y0);
            flags.south |= near(corner.y, bounds.y1);
        }
        flags
    }

    pub fn on_seam(&self) -> bool {
        self.left || self.right
    }

    pub fn is_pole(&self) -> bool {
        self.north || self.south
    }
}

/// A polygon corner carrying the height used for rasterization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColourPoint {
    pub position: Vec2,
    pub height: i32,
}

#[derive(Clone, Debug)]
pub struct Cell {
    pub id: CellId,
    pub site: Vec2,
    /// Boundary edges in polygon order.
    pub edges: Vec<Edge>,
    /// Elevation in [0, 255].
    pub height: i32,
    /// Owning plate; set once during plate growth.
    pub plate: Option<PlateId>,
    pub border: BorderFlags,
    natural_neighbours: Vec<CellId>,
    false_neighbours: Vec<CellId>,
    colour_points: Vec<ColourPoint>,
}

impl Cell {
    fn from_raw(id: CellId, raw: RawCell, bounds: Rect) -> Self {
        let border = BorderFlags::from_edges(&raw.edges, bounds);
        let mut natural_neighbours: Vec<CellId> = Vec::new();
        for edge in raw.edges.iter().filter(|e| e.is_visible()) {
            if let Some(n) = edge.neighbor {
                if n != id && !natural_neighbours.contains(&n) {
                    natural_neighbours.push(n);
                }
            }
        }
        Self {
            id,
            site: raw.site,
            edges: raw.edges,
            height: 0,
            plate: None,
            border,
            natural_neighbours,
            false_neighbours: Vec::new(),
            colour_points: Vec::new(),
        }
    }

    pub fn visible_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(|e| e.is_visible())
    }

    pub fn natural_neighbours(&self) -> &[CellId] {
        &self.natural_neighbours
    }

    pub fn false_neighbours(&self) -> &[CellId] {
        &self.false_neighbours
    }

    /// Natural neighbours followed by false neighbours.
    pub fn neighbours(&self) -> impl Iterator<Item = CellId> + '_ {
        self.natural_neighbours
            .iter()
            .chain(self.false_neighbours.iter())
            .copied()
    }

    /// `corner` is exactly an end point of one of this cell's visible edges.
    pub fn has_corner(&self, corner: Vec2) -> bool {
        self.visible_edges().any(|e| e.touches(corner))
    }

    /// Angularly ordered polygon corners, empty until colour points are computed.
    pub fn colour_points(&self) -> &[ColourPoint] {
        &self.colour_points
    }
}

/// All cells of one generation run.
#[derive(Clone, Debug)]
pub struct CellGraph {
    bounds: Rect,
    cells: Vec<Cell>,
}

impl CellGraph {
    /// Subdivide `sites` and wrap the result as a graph.
    pub fn build(sites: &[Vec2], bounds: Rect, subdivider: &dyn Subdivider) -> Result<Self> {
        let raw = subdivider.subdivide(sites, bounds)?;
        Ok(Self::from_raw(raw, bounds))
    }

    pub fn from_raw(raw: Vec<RawCell>, bounds: Rect) -> Self {
        let cells = raw
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Cell::from_raw(CellId(i), raw, bounds))
            .collect();
        Self { bounds, cells }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = CellId> {
        (0..self.cells.len()).map(CellId)
    }

    pub fn neighbours(&self, id: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.cells[id.0].neighbours()
    }

    /// Link two cells across the seam. Returns false when the pair is the
    /// same cell or already adjacent in either sense.
    pub fn add_false_neighbour(&mut self, a: CellId, b: CellId) -> bool {
        if a == b {
            return false;
        }
        let cell_a = &self.cells[a.0];
        if cell_a.natural_neighbours.contains(&b) || cell_a.false_neighbours.contains(&b) {
            return false;
        }
        self.cells[a.0].false_neighbours.push(b);
        self.cells[b.0].false_neighbours.push(a);
        true
    }

    // ========================================================================
    // Seam stitching
    // ========================================================================

    /// Link every left-border cell to its closest right-border cell and vice
    /// versa. Candidates are the opposite-border cells whose site lies within
    /// `band` of that border; closeness is vertical site distance, then
    /// horizontal distance to the seam, then id. Pole cells are excluded.
    ///
    /// Returns the number of new links.
    pub fn stitch_seam(&mut self, band: f64) -> usize {
        let left_bound = f64::from(self.bounds.x0);
        let right_bound = f64::from(self.bounds.x1);

        let seam_cells = |pick: fn(&BorderFlags) -> bool| -> Vec<CellId> {
            self.cells
                .iter()
                .filter(|c| pick(&c.border) && !c.border.is_pole())
                .map(|c| c.id)
                .collect()
        };
        let left = seam_cells(|b| b.left);
        let right = seam_cells(|b| b.right);

        let right_candidates: Vec<CellId> = right
            .iter()
            .copied()
            .filter(|&id| self.cells[id.0].site.x >= right_bound - band)
            .collect();
        let left_candidates: Vec<CellId> = left
            .iter()
            .copied()
            .filter(|&id| self.cells[id.0].site.x <= left_bound + band)
            .collect();

        let mut pairs = Vec::new();
        for &id in &left {
            if let Some(other) = self.closest_across(id, &right_candidates, right_bound) {
                pairs.push((id, other));
            }
        }
        for &id in &right {
            if let Some(other) = self.closest_across(id, &left_candidates, left_bound) {
                pairs.push((id, other));
            }
        }

        pairs
            .into_iter()
            .filter(|&(a, b)| self.add_false_neighbour(a, b))
            .count()
    }

    fn closest_across(&self, id: CellId, candidates: &[CellId], seam_x: f64) -> Option<CellId> {
        let site = self.cells[id.0].site;
        candidates
            .iter()
            .copied()
            .filter(|&c| c != id)
            .min_by(|&a, &b| {
                let sa = self.cells[a.0].site;
                let sb = self.cells[b.0].site;
                (sa.y - site.y)
                    .abs()
                    .total_cmp(&(sb.y - site.y).abs())
                    .then((sa.x - seam_x).abs().total_cmp(&(sb.x - seam_x).abs()))
                    .then(a.cmp(&b))
            })
    }

    // ========================================================================
    // Heights
    // ========================================================================

    /// Initial height from squared distances to natural neighbours: the
    /// truncated squared distances at or below `distance_limit` are summed,
    /// scaled by 0.2, divided by the natural neighbour count, capped at 255
    /// and rounded half to even. Cells without neighbours get 0.
    pub fn compute_initial_heights(&mut self, distance_limit: i64) {
        let heights: Vec<i32> = self
            .cells
            .iter()
            .map(|cell| {
                let count = cell.natural_neighbours.len();
                if count == 0 {
                    return 0;
                }
                let sum: i64 = cell
                    .natural_neighbours
                    .iter()
                    .map(|n| cell.site.distance_sq(&self.cells[n.0].site) as i64)
                    .filter(|&d| d <= distance_limit)
                    .sum();
                let weight = (sum as f64 * 0.2 / count as f64).min(f64::from(MAX_HEIGHT));
                weight.round_ties_even() as i32
            })
            .collect();

        for (cell, height) in self.cells.iter_mut().zip(heights) {
            cell.height = height;
        }
    }

    /// In-place neighbour averaging. Cells are visited in index order and
    /// each takes the truncated integer mean of its neighbours' current
    /// heights, so later cells already see earlier updates. Cells without
    /// neighbours keep their height.
    pub fn smooth(&mut self, iterations: usize) {
        for _ in 0..iterations {
            for i in 0..self.cells.len() {
                let (sum, count) = self.cells[i]
                    .neighbours()
                    .fold((0i64, 0i64), |(sum, count), n| {
                        (sum + i64::from(self.cells[n.0].height), count + 1)
                    });
                if count > 0 {
                    self.cells[i].height = (sum / count) as i32;
                }
            }
        }
    }

    // ========================================================================
    // Plate membership
    // ========================================================================

    /// Assign `plate` to an unassigned cell. Returns false if already owned.
    pub fn assign_plate(&mut self, id: CellId, plate: PlateId) -> bool {
        let cell = &mut self.cells[id.0];
        if cell.plate.is_some() {
            return false;
        }
        cell.plate = Some(plate);
        true
    }

    pub fn unassigned_count(&self) -> usize {
        self.cells.iter().filter(|c| c.plate.is_none()).count()
    }

    // ========================================================================
    // Colour points
    // ========================================================================

    /// Derive the colour points of every cell. Returns the number of cells
    /// left with fewer than three points.
    pub fn compute_colour_points(&mut self) -> usize {
        let graph = &*self;
        let points: Vec<Vec<ColourPoint>> = (0..graph.cells.len())
            .into_par_iter()
            .map(|i| graph.colour_points_for(CellId(i)))
            .collect();

        let mut degenerate = 0;
        for (cell, points) in self.cells.iter_mut().zip(points) {
            if points.len() < 3 {
                degenerate += 1;
            }
            cell.colour_points = points;
        }
        degenerate
    }

    /// Unique visible-edge corners of a cell, sorted by angle around the site
    /// (ties by distance), each carrying the rounded mean height of the cell
    /// and every neighbour sharing that exact corner.
    pub fn colour_points_for(&self, id: CellId) -> Vec<ColourPoint> {
        let cell = &self.cells[id.0];
        let mut points: Vec<ColourPoint> = Vec::new();
        for edge in cell.visible_edges() {
            for corner in [edge.start, edge.end] {
                if points.iter().any(|p| p.position == corner) {
                    continue;
                }
                points.push(ColourPoint {
                    position: corner,
                    height: self.corner_height(id, corner),
                });
            }
        }

        let site = cell.site;
        points.sort_by(|a, b| {
            site.angle_to(&a.position)
                .total_cmp(&site.angle_to(&b.position))
                .then(site.distance_sq(&a.position).total_cmp(&site.distance_sq(&b.position)))
        });
        points
    }

    fn corner_height(&self, id: CellId, corner: Vec2) -> i32 {
        let cell = &self.cells[id.0];
        let mut sum = f64::from(cell.height);
        let mut count = 1.0;
        for n in cell.neighbours() {
            let other = &self.cells[n.0];
            if other.has_corner(corner) {
                sum += f64::from(other.height);
                count += 1.0;
            }
        }
        (sum / count).round_ties_even() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voronoi::VoronoiSubdivider;

    /// 3x3 grid of square cells, 100 pixels each, ids row-major.
    fn grid_graph() -> CellGraph {
        let mut sites = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                sites.push(Vec2::new(50.0 + 100.0 * x as f64, 50.0 + 100.0 * y as f64));
            }
        }
        CellGraph::build(&sites, Rect::new(0, 0, 300, 300), &VoronoiSubdivider::default())
            .expect("grid subdivides")
    }

    #[test]
    fn test_border_flags_on_grid() {
        let graph = grid_graph();
        let flags = |i: usize| graph.cell(CellId(i)).border;

        assert!(flags(0).left && flags(0).north && !flags(0).right && !flags(0).south);
        assert!(flags(3).left && !flags(3).is_pole());
        assert!(flags(5).right && !flags(5).is_pole());
        assert_eq!(flags(4), BorderFlags::default());
        assert!(flags(7).south && !flags(7).on_seam());
    }

    #[test]
    fn test_natural_neighbours_from_shared_edges() {
        let graph = grid_graph();
        let mut centre: Vec<usize> = graph
            .cell(CellId(4))
            .natural_neighbours()
            .iter()
            .map(|c| c.index())
            .collect();
        centre.sort_unstable();
        assert_eq!(centre, vec![1, 3, 5, 7]);
        assert_eq!(graph.cell(CellId(0)).natural_neighbours().len(), 2);
    }

    #[test]
    fn test_seam_links_are_symmetric() {
        let mut graph = grid_graph();
        let links = graph.stitch_seam(150.0);

        // Only the middle row is a non-pole seam row: 3 <-> 5.
        assert_eq!(links, 1);
        assert_eq!(graph.cell(CellId(3)).false_neighbours(), &[CellId(5)]);
        assert_eq!(graph.cell(CellId(5)).false_neighbours(), &[CellId(3)]);

        for cell in graph.cells() {
            for &other in cell.false_neighbours() {
                assert!(graph.cell(other).false_neighbours().contains(&cell.id));
                assert!(!cell.natural_neighbours().contains(&other));
            }
        }

        // Stitching again adds nothing.
        assert_eq!(graph.stitch_seam(150.0), 0);
    }

    #[test]
    fn test_seam_band_limits_candidates() {
        let mut graph = grid_graph();
        assert_eq!(graph.stitch_seam(10.0), 0);
        assert!(graph.cells().iter().all(|c| c.false_neighbours().is_empty()));
    }

    #[test]
    fn test_add_false_neighbour_rejects_duplicates() {
        let mut graph = grid_graph();
        assert!(!graph.add_false_neighbour(CellId(4), CellId(4)));
        assert!(!graph.add_false_neighbour(CellId(4), CellId(1)));
        assert!(graph.add_false_neighbour(CellId(0), CellId(8)));
        assert!(!graph.add_false_neighbour(CellId(8), CellId(0)));
    }

    #[test]
    fn test_initial_heights_use_limited_distances() {
        let mut graph = grid_graph();
        // Neighbour distance is 100, squared 10000.
        graph.compute_initial_heights(10_000);
        // 0.2 * (4 * 10000) / 4 = 2000, capped.
        assert_eq!(graph.cell(CellId(4)).height, 255);

        graph.compute_initial_heights(9_999);
        assert!(graph.cells().iter().all(|c| c.height == 0));
    }

    #[test]
    fn test_smoothing_zero_iterations_is_noop() {
        let mut graph = grid_graph();
        for (i, id) in graph.ids().collect::<Vec<_>>().into_iter().enumerate() {
            graph.cell_mut(id).height = (i * 20) as i32;
        }
        let before: Vec<i32> = graph.cells().iter().map(|c| c.height).collect();
        graph.smooth(0);
        let after: Vec<i32> = graph.cells().iter().map(|c| c.height).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_smoothing_is_sequential_and_truncating() {
        let mut graph = grid_graph();
        graph.cell_mut(CellId(1)).height = 9;
        graph.cell_mut(CellId(3)).height = 0;
        graph.smooth(1);
        // Cell 0 sees 1 (=9) and 3 (=0): (9 + 0) / 2 = 4.
        assert_eq!(graph.cell(CellId(0)).height, 4);
        // Cell 1 then sees the updated cell 0: (4 + 0 + 0) / 3 = 1.
        assert_eq!(graph.cell(CellId(1)).height, 1);
    }

    #[test]
    fn test_colour_points_average_shared_corners() {
        let mut graph = grid_graph();
        graph.cell_mut(CellId(0)).height = 100;
        graph.cell_mut(CellId(1)).height = 50;
        graph.cell_mut(CellId(3)).height = 0;
        graph.cell_mut(CellId(4)).height = 10;
        assert_eq!(graph.compute_colour_points(), 0);

        let points = graph.cell(CellId(0)).colour_points();
        assert_eq!(points.len(), 4);

        let at = |x: f64, y: f64| {
            points
                .iter()
                .find(|p| p.position.distance(&Vec2::new(x, y)) < 1e-6)
                .map(|p| p.height)
        };
        // Outer corner belongs to cell 0 only.
        assert_eq!(at(0.0, 0.0), Some(100));
        // Shared with cell 1.
        assert_eq!(at(100.0, 0.0), Some(75));
        // Shared with cells 1 and 3; cell 4 is diagonal and not a neighbour.
        assert_eq!(at(100.0, 100.0), Some(50));
    }

    #[test]
    fn test_colour_points_sorted_by_angle() {
        let mut graph = grid_graph();
        graph.compute_colour_points();
        let cell = graph.cell(CellId(4));
        let angles: Vec<f64> = cell
            .colour_points()
            .iter()
            .map(|p| cell.site.angle_to(&p.position))
            .collect();
        assert!(angles.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(angles.len(), 4);
    }
}
