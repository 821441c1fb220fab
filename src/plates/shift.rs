use crate::cells::{CellGraph, CellId, MAX_HEIGHT};

use super::types::Plate;

/// Push heights across plate boundaries. For every plate, every neighbour
/// of its cells that lies in a different plate receives the coefficient this
/// plate holds toward that plate, clamped to [0, 255]. A cell bordering
/// several foreign cells is hit once per adjacency.
pub fn apply_tectonic_shift(graph: &mut CellGraph, plates: &[Plate], iterations: usize) {
    for _ in 0..iterations {
        for plate in plates {
            for &cell in &plate.cells {
                let targets: Vec<CellId> = graph.neighbours(cell).collect();
                for n in targets {
                    let Some(other) = graph.cell(n).plate else {
                        continue;
                    };
                    if other == plate.id {
                        continue;
                    }
                    let delta = plate.interaction_with(other).unwrap_or(0);
                    let target = graph.cell_mut(n);
                    target.height = (target.height + delta).clamp(0, MAX_HEIGHT);
                }
            }
        }
    }
}

/// Force every pole cell to the maximum height. Returns the number of cells raised.
pub fn raise_poles(graph: &mut CellGraph) -> usize {
    let poles: Vec<CellId> = graph
        .cells()
        .iter()
        .filter(|c| c.border.is_pole())
        .map(|c| c.id)
        .collect();
    for &id in &poles {
        graph.cell_mut(id).height = MAX_HEIGHT;
    }
    poles.len()
}

/// Pull each plate's heights toward the plate's truncated mean by `step`
/// per pass, clamped to [0, 255]. Cells exactly at the mean stay put.
pub fn equalize_plate_heights(graph: &mut CellGraph, plates: &[Plate], iterations: usize, step: i32) {
    for plate in plates {
        if plate.cells.is_empty() {
            continue;
        }
        for _ in 0..iterations {
            let sum: i64 = plate
                .cells
                .iter()
                .map(|&id| i64::from(graph.cell(id).height))
                .sum();
            let mean = (sum / plate.cells.len() as i64) as i32;

            for &id in &plate.cells {
                let cell = graph.cell_mut(id);
                if cell.height > mean {
                    cell.height = (cell.height - step).clamp(0, MAX_HEIGHT);
                } else if cell.height < mean {
                    cell.height = (cell.height + step).clamp(0, MAX_HEIGHT);
                }
            }
        }
    }
}
