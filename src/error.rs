//! Error types for heightmap generation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::StageId;

/// Errors that abort a generation run.
///
/// Per-cell geometric anomalies are not represented here: a cell without
/// usable geometry is logged and skipped during rasterization.
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("invalid input shape {width}x{height}: {reason}")]
    InvalidInputShape {
        width: usize,
        height: usize,
        reason: String,
    },
    #[error("could only sample {collected} of {requested} unique points after {attempts} draws")]
    DegenerateSampling {
        requested: usize,
        collected: usize,
        attempts: usize,
    },
    #[error("plate growth finished with {unassigned} unassigned cells")]
    IncompleteTiling { unassigned: usize },
    #[error("invalid terrain config: {0}")]
    InvalidConfig(String),
    #[error("generation cancelled before stage '{stage}'")]
    Cancelled { stage: StageId },
    #[error("failed to read terrain config from {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse terrain config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TerrainError>;
