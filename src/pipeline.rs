//! Stage orchestration for a generation run.
//!
//! Stages run strictly in sequence; the only shared state is the cell graph
//! and the plate list. Cancellation is checked between stages.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::cells::CellGraph;
use crate::config::TerrainConfig;
use crate::error::{Result, TerrainError};
use crate::geometry::{Rect, Vec2};
use crate::pixels::PixelBuffer;
use crate::plates::{
    apply_tectonic_shift, equalize_plate_heights, generate_plates, raise_poles,
    InteractionCoefficients, Plate,
};
use crate::raster::{rasterize_cells, RasterStats};
use crate::rng::SeededRng;
use crate::sampling::sample_points;
use crate::voronoi::{Subdivider, VoronoiSubdivider};

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    SamplePoints,
    Subdivide,
    StitchSeam,
    InitialHeights,
    GrowPlates,
    SmoothPreShift,
    TectonicShift,
    PoleFixup,
    Equalize,
    SmoothPostEqualize,
    ColourPoints,
    Rasterize,
}

impl StageId {
    pub const ALL: [StageId; 12] = [
        StageId::SamplePoints,
        StageId::Subdivide,
        StageId::StitchSeam,
        StageId::InitialHeights,
        StageId::GrowPlates,
        StageId::SmoothPreShift,
        StageId::TectonicShift,
        StageId::PoleFixup,
        StageId::Equalize,
        StageId::SmoothPostEqualize,
        StageId::ColourPoints,
        StageId::Rasterize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SamplePoints => "sample-points",
            Self::Subdivide => "subdivide",
            Self::StitchSeam => "stitch-seam",
            Self::InitialHeights => "initial-heights",
            Self::GrowPlates => "grow-plates",
            Self::SmoothPreShift => "smooth-pre-shift",
            Self::TectonicShift => "tectonic-shift",
            Self::PoleFixup => "pole-fixup",
            Self::Equalize => "equalize",
            Self::SmoothPostEqualize => "smooth-post-equalize",
            Self::ColourPoints => "colour-points",
            Self::Rasterize => "rasterize",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared flag that stops a run at the next stage boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Simulation state after the geometric and tectonic stages.
#[derive(Clone, Debug)]
pub struct Terrain {
    pub sites: Vec<Vec2>,
    pub graph: CellGraph,
    pub plates: Vec<Plate>,
}

/// Runs the stage sequence with one config and subdivider.
pub struct TerrainPipeline<S: Subdivider = VoronoiSubdivider> {
    config: TerrainConfig,
    subdivider: S,
    cancel: CancelToken,
}

impl TerrainPipeline<VoronoiSubdivider> {
    pub fn new(config: TerrainConfig) -> Result<Self> {
        Self::with_subdivider(config, VoronoiSubdivider::default())
    }
}

impl<S: Subdivider> TerrainPipeline<S> {
    pub fn with_subdivider(config: TerrainConfig, subdivider: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            subdivider,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    fn checkpoint(&self, next: StageId) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::info!(target: "pipeline", stage = next.name(), "pipeline.cancelled");
            return Err(TerrainError::Cancelled { stage: next });
        }
        Ok(())
    }

    fn timed<T>(&self, stage: StageId, run: impl FnOnce() -> Result<T>) -> Result<T> {
        self.checkpoint(stage)?;
        let started = Instant::now();
        let out = run()?;
        tracing::debug!(
            target: "pipeline",
            stage = stage.name(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "pipeline.stage"
        );
        Ok(out)
    }

    /// Run every stage before rasterization over `canvas`.
    pub fn simulate(&self, seed: u64, canvas: Rect) -> Result<Terrain> {
        self.simulate_until(seed, canvas, StageId::ColourPoints)
    }

    /// Run stages up to and including `last`. Sampling and subdivision
    /// always run; `Rasterize` is never run here.
    pub fn simulate_until(&self, seed: u64, canvas: Rect, last: StageId) -> Result<Terrain> {
        let root = SeededRng::new(seed);
        let config = &self.config;

        let sites = self.timed(StageId::SamplePoints, || {
            let mut rng = root.stream("points");
            sample_points(
                config.point_count,
                canvas,
                &mut rng,
                config.sampling_attempts_per_point,
            )
        })?;
        let graph = self.timed(StageId::Subdivide, || {
            CellGraph::build(&sites, canvas, &self.subdivider)
        })?;

        let mut terrain = Terrain {
            sites,
            graph,
            plates: Vec::new(),
        };

        for stage in StageId::ALL {
            if stage <= StageId::Subdivide {
                continue;
            }
            if stage > last || stage == StageId::Rasterize {
                break;
            }
            self.timed(stage, || self.run_stage(stage, &mut terrain, &root))?;
        }

        Ok(terrain)
    }

    fn run_stage(&self, stage: StageId, terrain: &mut Terrain, root: &SeededRng) -> Result<()> {
        let config = &self.config;
        let graph = &mut terrain.graph;
        match stage {
            StageId::StitchSeam => {
                let links = graph.stitch_seam(config.seam_band);
                tracing::debug!(target: "pipeline", links, "seam.stitched");
            }
            StageId::InitialHeights => graph.compute_initial_heights(config.neighbour_distance_limit),
            StageId::GrowPlates => {
                let mut seeds = root.stream("plate-seeds");
                let mut drift = root.stream("plate-drift");
                terrain.plates = generate_plates(
                    graph,
                    config.plate_count,
                    &InteractionCoefficients::from_config(config),
                    &mut seeds,
                    &mut drift,
                )?;
            }
            StageId::SmoothPreShift => graph.smooth(config.pre_shift_smoothing),
            StageId::TectonicShift => {
                apply_tectonic_shift(graph, &terrain.plates, config.shift_iterations)
            }
            StageId::PoleFixup => {
                raise_poles(graph);
            }
            StageId::Equalize => equalize_plate_heights(
                graph,
                &terrain.plates,
                config.equalize_iterations,
                config.equalize_step,
            ),
            StageId::SmoothPostEqualize => graph.smooth(config.post_equalize_smoothing),
            StageId::ColourPoints => {
                let degenerate = graph.compute_colour_points();
                if degenerate > 0 {
                    tracing::warn!(target: "pipeline", cells = degenerate, "colour_points.degenerate");
                }
            }
            StageId::SamplePoints | StageId::Subdivide | StageId::Rasterize => {}
        }
        Ok(())
    }

    /// Paint a simulated terrain into `buffer`.
    pub fn rasterize(&self, terrain: &Terrain, buffer: &mut PixelBuffer) -> Result<RasterStats> {
        self.timed(StageId::Rasterize, || Ok(rasterize_cells(&terrain.graph, buffer)))
    }

    /// Full run over the buffer's working rectangle.
    pub fn run(&self, mut buffer: PixelBuffer, seed: u64) -> Result<PixelBuffer> {
        let started = Instant::now();
        let canvas = buffer.working_rect();
        let terrain = self.simulate(seed, canvas)?;
        let stats = self.rasterize(&terrain, &mut buffer)?;

        tracing::info!(
            target: "pipeline",
            seed,
            cells = terrain.graph.len(),
            plates = terrain.plates.len(),
            pixels = stats.pixels_written,
            skipped = stats.cells_skipped,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "pipeline.complete"
        );
        Ok(buffer)
    }
}

/// Generate a heightmap into a square image.
///
/// `pixels` is the row-major image; only the working rectangle from
/// `config` is written, with heights mapped to [0, 1].
pub fn generate_heightmap(
    pixels: Vec<f32>,
    width: usize,
    height: usize,
    seed: u64,
    config: &TerrainConfig,
) -> Result<PixelBuffer> {
    heightmap_with_cancel(pixels, width, height, seed, config, CancelToken::new())
}

fn heightmap_with_cancel(
    pixels: Vec<f32>,
    width: usize,
    height: usize,
    seed: u64,
    config: &TerrainConfig,
    cancel: CancelToken,
) -> Result<PixelBuffer> {
    if width != height {
        return Err(TerrainError::InvalidInputShape {
            width,
            height,
            reason: "image must be square".into(),
        });
    }
    let buffer =
        PixelBuffer::from_pixels(pixels, width, height)?.with_working_rect(config.working_rect())?;
    TerrainPipeline::new(config.clone())?
        .with_cancel_token(cancel)
        .run(buffer, seed)
}

/// Run [`generate_heightmap`] on a background thread. Cancelling `cancel`
/// stops the run at the next stage boundary.
pub fn spawn_heightmap(
    pixels: Vec<f32>,
    width: usize,
    height: usize,
    seed: u64,
    config: TerrainConfig,
    cancel: CancelToken,
) -> io::Result<JoinHandle<Result<PixelBuffer>>> {
    thread::Builder::new()
        .name("heightmap".into())
        .spawn(move || heightmap_with_cancel(pixels, width, height, seed, &config, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::MAX_HEIGHT;
    use crate::raster::cell_spans;
    use crate::voronoi::RawCell;

    fn small_config() -> TerrainConfig {
        TerrainConfig {
            point_count: 64,
            working_width: 128,
            working_height: 128,
            plate_count: 8,
            seam_band: 40.0,
            ..TerrainConfig::default()
        }
    }

    fn canvas() -> Rect {
        Rect::new(0, 0, 128, 128)
    }

    #[test]
    fn test_same_seed_same_heightmap() {
        let config = small_config();
        let a = generate_heightmap(vec![0.0; 128 * 128], 128, 128, 7, &config).expect("runs");
        let b = generate_heightmap(vec![0.0; 128 * 128], 128, 128, 7, &config).expect("runs");
        let bits = |buf: &PixelBuffer| buf.pixels().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));

        let c = generate_heightmap(vec![0.0; 128 * 128], 128, 128, 8, &config).expect("runs");
        assert_ne!(bits(&a), bits(&c));
    }

    #[test]
    fn test_every_working_pixel_written_once() {
        let pipeline = TerrainPipeline::new(small_config()).expect("valid config");
        let terrain = pipeline.simulate(11, canvas()).expect("runs");

        let mut counts = vec![0u32; 128 * 128];
        for (_, spans) in cell_spans(&terrain.graph, canvas()) {
            for span in spans {
                for x in span.x_start..span.x_end {
                    counts[span.y as usize * 128 + x as usize] += 1;
                }
            }
        }
        assert!(counts.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_output_in_unit_range_and_dead_space_untouched() {
        let config = TerrainConfig {
            working_width: 96,
            working_height: 96,
            ..small_config()
        };
        let out = generate_heightmap(vec![-1.0; 128 * 128], 128, 128, 3, &config).expect("runs");
        for (x, y, v) in out.iter_working() {
            assert!((0.0..=1.0).contains(&v), "pixel ({x}, {y}) = {v}");
        }
        assert_eq!(out.pixels()[127], -1.0);
        assert_eq!(out.pixels()[127 * 128], -1.0);
    }

    #[test]
    fn test_poles_at_max_after_fixup() {
        let pipeline = TerrainPipeline::new(small_config()).expect("valid config");
        let terrain = pipeline
            .simulate_until(5, canvas(), StageId::PoleFixup)
            .expect("runs");
        for cell in terrain.graph.cells() {
            if cell.border.is_pole() {
                assert_eq!(cell.height, MAX_HEIGHT);
            }
        }
    }

    #[test]
    fn test_heights_bounded_after_each_stage() {
        let pipeline = TerrainPipeline::new(small_config()).expect("valid config");
        for stage in [
            StageId::InitialHeights,
            StageId::TectonicShift,
            StageId::Equalize,
            StageId::ColourPoints,
        ] {
            let terrain = pipeline.simulate_until(21, canvas(), stage).expect("runs");
            assert!(terrain
                .graph
                .cells()
                .iter()
                .all(|c| (0..=MAX_HEIGHT).contains(&c.height)));
        }
    }

    #[test]
    fn test_plates_partition_cells() {
        let pipeline = TerrainPipeline::new(small_config()).expect("valid config");
        let terrain = pipeline
            .simulate_until(13, canvas(), StageId::GrowPlates)
            .expect("runs");
        assert_eq!(terrain.plates.len(), 8);
        assert_eq!(terrain.graph.unassigned_count(), 0);
        let total: usize = terrain.plates.iter().map(|p| p.cells.len()).sum();
        assert_eq!(total, terrain.graph.len());
        for plate in &terrain.plates {
            for &id in &plate.cells {
                assert_eq!(terrain.graph.cell(id).plate, Some(plate.id));
            }
        }
    }

    #[test]
    fn test_seam_links_symmetric_in_full_run() {
        let pipeline = TerrainPipeline::new(small_config()).expect("valid config");
        let terrain = pipeline
            .simulate_until(17, canvas(), StageId::StitchSeam)
            .expect("runs");
        for cell in terrain.graph.cells() {
            for &other in cell.false_neighbours() {
                assert!(terrain.graph.cell(other).false_neighbours().contains(&cell.id));
                assert!(!cell.border.is_pole());
            }
        }
    }

    #[test]
    fn test_rejects_non_square_input() {
        let result = generate_heightmap(vec![0.0; 128 * 64], 128, 64, 1, &small_config());
        assert!(matches!(result, Err(TerrainError::InvalidInputShape { .. })));

        let result = generate_heightmap(vec![0.0; 64 * 64], 64, 64, 1, &small_config());
        assert!(matches!(result, Err(TerrainError::InvalidInputShape { .. })));
    }

    #[test]
    fn test_cancelled_run_stops_before_first_stage() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let pipeline = TerrainPipeline::new(small_config())
            .expect("valid config")
            .with_cancel_token(cancel);
        let buffer = PixelBuffer::new_with(128, 128, 0.0).expect("valid shape");
        let result = pipeline.run(buffer, 1);
        assert!(matches!(
            result,
            Err(TerrainError::Cancelled { stage: StageId::SamplePoints })
        ));
    }

    /// Voronoi subdivision that trips the cancel flag once it has run.
    struct CancellingSubdivider {
        inner: VoronoiSubdivider,
        cancel: CancelToken,
    }

    impl Subdivider for CancellingSubdivider {
        fn subdivide(&self, sites: &[Vec2], bounds: Rect) -> Result<Vec<RawCell>> {
            let cells = self.inner.subdivide(sites, bounds)?;
            self.cancel.cancel();
            Ok(cells)
        }
    }

    #[test]
    fn test_cancel_during_stage_stops_at_next_boundary() {
        let cancel = CancelToken::new();
        let subdivider = CancellingSubdivider {
            inner: VoronoiSubdivider::default(),
            cancel: cancel.clone(),
        };
        let pipeline = TerrainPipeline::with_subdivider(small_config(), subdivider)
            .expect("valid config")
            .with_cancel_token(cancel);
        let result = pipeline.simulate(1, canvas());
        assert!(matches!(
            result,
            Err(TerrainError::Cancelled { stage: StageId::StitchSeam })
        ));
    }

    #[test]
    fn test_spawned_run_matches_direct_run() {
        let config = small_config();
        let direct = generate_heightmap(vec![0.0; 128 * 128], 128, 128, 4, &config).expect("runs");
        let handle = spawn_heightmap(vec![0.0; 128 * 128], 128, 128, 4, config, CancelToken::new())
            .expect("thread spawns");
        let spawned = handle.join().expect("thread completes").expect("runs");
        assert_eq!(direct, spawned);
    }

    #[test]
    fn test_stage_names_unique() {
        let mut names: Vec<&str> = StageId::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), StageId::ALL.len());
        assert_eq!(StageId::PoleFixup.to_string(), "pole-fixup");
    }
}
