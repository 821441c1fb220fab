//! Unique random site sampling on the integer lattice.

use std::collections::HashSet;

use crate::error::{Result, TerrainError};
use crate::geometry::{GridPoint, Rect, Vec2};
use crate::rng::RandomSource;

/// Draw `count` distinct integer points inside `bounds`, in draw order.
///
/// Each point costs at least one draw; duplicates are redrawn. The run fails
/// with [`TerrainError::DegenerateSampling`] once `count * attempts_per_point`
/// draws have been spent, or immediately when `bounds` has fewer lattice
/// positions than requested.
pub fn sample_points(
    count: usize,
    bounds: Rect,
    rng: &mut dyn RandomSource,
    attempts_per_point: usize,
) -> Result<Vec<Vec2>> {
    if count > bounds.area() {
        return Err(TerrainError::DegenerateSampling {
            requested: count,
            collected: 0,
            attempts: 0,
        });
    }

    let budget = count.saturating_mul(attempts_per_point.max(1));
    let mut seen: HashSet<GridPoint> = HashSet::with_capacity(count);
    let mut points = Vec::with_capacity(count);
    let mut attempts = 0;

    while points.len() < count {
        if attempts >= budget {
            return Err(TerrainError::DegenerateSampling {
                requested: count,
                collected: points.len(),
                attempts,
            });
        }
        attempts += 1;

        let x = rng.next_int(i64::from(bounds.x0), i64::from(bounds.x1)) as i32;
        let y = rng.next_int(i64::from(bounds.y0), i64::from(bounds.y1)) as i32;
        let p = GridPoint::new(x, y);
        if seen.insert(p) {
            points.push(p.to_vec2());
        }
    }

    tracing::debug!(
        target: "sampling",
        requested = count,
        attempts,
        "sampling.complete"
    );
    Ok(points)
}
