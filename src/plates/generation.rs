use std::collections::BTreeMap;

use crate::cells::{CellGraph, CellId};
use crate::error::{Result, TerrainError};
use crate::rng::RandomSource;

use super::types::{GrowthState, Interaction, InteractionCoefficients, Plate, PlateId, PlateKind};

/// Redraws allowed per drifting plate when its random seed cell is taken.
pub const SEED_ATTEMPTS_PER_PLATE: usize = 1024;

/// Partition the cell graph into `plate_count` plates: the two pole plates
/// claim every top and bottom border cell, the rest start from random
/// unassigned cells and grow outward until every cell belongs to a plate.
/// Each plate then records how it interacts with its neighbours.
///
/// `seeds` picks the seed cells; `drift` picks drift directions.
pub fn generate_plates(
    graph: &mut CellGraph,
    plate_count: usize,
    coefficients: &InteractionCoefficients,
    seeds: &mut dyn RandomSource,
    drift: &mut dyn RandomSource,
) -> Result<Vec<Plate>> {
    let mut plates = seed_plates(graph, plate_count, seeds, drift)?;
    let rounds = grow_plates(graph, &mut plates)?;
    associate_plates(graph, &mut plates, coefficients);

    tracing::debug!(
        target: "plates",
        plates = plates.len(),
        rounds,
        "plates.grown"
    );
    Ok(plates)
}

/// Create the pole plates and the seeded drifting plates.
pub fn seed_plates(
    graph: &mut CellGraph,
    plate_count: usize,
    seeds: &mut dyn RandomSource,
    drift: &mut dyn RandomSource,
) -> Result<Vec<Plate>> {
    if plate_count < 2 || plate_count > usize::from(u16::MAX) {
        return Err(TerrainError::InvalidConfig(format!(
            "plate_count {plate_count} must be between 2 and {}",
            u16::MAX
        )));
    }

    let mut north = Plate::new(PlateId::NORTH_POLE, PlateKind::NorthPole, draw_direction(drift));
    let mut south = Plate::new(PlateId::SOUTH_POLE, PlateKind::SouthPole, draw_direction(drift));

    for id in graph.ids().collect::<Vec<_>>() {
        let border = graph.cell(id).border;
        if border.north && graph.assign_plate(id, north.id) {
            north.cells.push(id);
        } else if border.south && graph.assign_plate(id, south.id) {
            south.cells.push(id);
        }
    }

    let drifting = plate_count - 2;
    let available = graph.unassigned_count();
    if drifting > available {
        return Err(TerrainError::InvalidConfig(format!(
            "{drifting} drifting plates requested but only {available} cells are left after the poles"
        )));
    }

    let mut plates = vec![north, south];
    let budget = drifting * SEED_ATTEMPTS_PER_PLATE;
    let mut attempts = 0;
    let cell_count = graph.len() as i64;

    for index in 2..plate_count {
        let id = PlateId(index as u16);
        let mut plate = Plate::new(id, PlateKind::Drifting, draw_direction(drift));
        loop {
            if attempts >= budget {
                return Err(TerrainError::DegenerateSampling {
                    requested: drifting,
                    collected: index - 2,
                    attempts,
                });
            }
            attempts += 1;
            let candidate = CellId(seeds.next_int(0, cell_count) as usize);
            if graph.assign_plate(candidate, id) {
                plate.cells.push(candidate);
                break;
            }
        }
        plates.push(plate);
    }

    Ok(plates)
}

fn draw_direction(drift: &mut dyn RandomSource) -> i32 {
    drift.next_int(0, 359) as i32
}

/// Grow all plates in rounds. In each round every growing plate, in id
/// order, claims every unassigned neighbour of the cells it claimed in the
/// previous round; a plate that claims nothing is exhausted. Returns the
/// number of rounds run.
pub fn grow_plates(graph: &mut CellGraph, plates: &mut [Plate]) -> Result<usize> {
    // Cells claimed last round. Older cells cannot have unassigned
    // neighbours left: they were claimed the round after their owner got them.
    let mut frontiers: Vec<Vec<CellId>> = plates.iter().map(|p| p.cells.clone()).collect();
    for plate in plates.iter_mut() {
        plate.state = if plate.cells.is_empty() {
            GrowthState::Exhausted
        } else {
            GrowthState::Growing
        };
    }

    let mut rounds = 0;
    while plates.iter().any(|p| p.state == GrowthState::Growing) {
        rounds += 1;
        for (plate, frontier) in plates.iter_mut().zip(frontiers.iter_mut()) {
            if plate.state == GrowthState::Exhausted {
                continue;
            }

            let mut claimed = Vec::new();
            for &cell in frontier.iter() {
                let neighbours: Vec<CellId> = graph.neighbours(cell).collect();
                for n in neighbours {
                    if graph.assign_plate(n, plate.id) {
                        claimed.push(n);
                    }
                }
            }

            if claimed.is_empty() {
                plate.state = GrowthState::Exhausted;
            } else {
                plate.cells.extend_from_slice(&claimed);
            }
            *frontier = claimed;
        }
    }

    let unassigned = graph.unassigned_count();
    if unassigned > 0 {
        return Err(TerrainError::IncompleteTiling { unassigned });
    }
    Ok(rounds)
}

/// Record, for every plate, the coefficient toward each plate it touches.
/// The approach angle is the direction from this plate's centre to the
/// other's, turned by 180 degrees, compared against this plate's drift.
pub fn associate_plates(
    graph: &CellGraph,
    plates: &mut [Plate],
    coefficients: &InteractionCoefficients,
) {
    let centers: Vec<_> = plates.iter().map(|p| p.center(graph)).collect();

    for plate in plates.iter_mut() {
        let mut interactions = BTreeMap::new();
        if let Some(center) = centers.get(plate.id.index()).copied().flatten() {
            for &cell in &plate.cells {
                for n in graph.neighbours(cell) {
                    let Some(other) = graph.cell(n).plate else {
                        continue;
                    };
                    if other == plate.id || interactions.contains_key(&other) {
                        continue;
                    }
                    let Some(other_center) = centers.get(other.index()).copied().flatten() else {
                        continue;
                    };
                    let approach = center.angle_to(&other_center) + 180.0;
                    let interaction = Interaction::classify(f64::from(plate.direction), approach);
                    interactions.insert(other, coefficients.coefficient(interaction));
                }
            }
        }
        plate.set_interactions(interactions);
    }
}
