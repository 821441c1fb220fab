//! Tectonic heightmap generation library
//!
//! Builds a horizontally wrapping heightmap from a Voronoi subdivision of
//! random sites: cells are grouped into drifting tectonic plates, heights
//! are shaped by plate interactions and smoothing, and the cells are
//! rasterized into a scalar image.

pub mod cells;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod pipeline;
pub mod pixels;
pub mod plates;
pub mod raster;
pub mod rng;
pub mod sampling;
pub mod voronoi;

pub use cells::{BorderFlags, Cell, CellGraph, CellId, ColourPoint};
pub use config::TerrainConfig;
pub use error::{Result, TerrainError};
pub use geometry::{GridPoint, Rect, Vec2};
pub use pipeline::{
    generate_heightmap, spawn_heightmap, CancelToken, StageId, Terrain, TerrainPipeline,
};
pub use pixels::PixelBuffer;
pub use plates::{Plate, PlateId, PlateKind};
pub use rng::{RandomSource, SeededRng};
pub use voronoi::{Edge, RawCell, Subdivider, VoronoiSubdivider};
