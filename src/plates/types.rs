use std::collections::BTreeMap;

use crate::cells::{CellGraph, CellId};
use crate::config::TerrainConfig;
use crate::geometry::Vec2;

/// Unique identifier for a tectonic plate, also its index in the plate list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PlateId(pub u16);

impl PlateId {
    /// Plate holding every cell that touches the top bound.
    pub const NORTH_POLE: PlateId = PlateId(0);
    /// Plate holding every cell that touches the bottom bound.
    pub const SOUTH_POLE: PlateId = PlateId(1);

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn is_pole(self) -> bool {
        self == Self::NORTH_POLE || self == Self::SOUTH_POLE
    }
}

/// Type of tectonic plate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlateKind {
    NorthPole,
    SouthPole,
    /// Seeded from a single random cell.
    Drifting,
}

/// Whether a plate can still claim cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GrowthState {
    #[default]
    Growing,
    Exhausted,
}

/// How a neighbouring plate sits relative to a plate's drift.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interaction {
    /// Neighbour ahead of the drift: boundary pushes up.
    Convergent,
    /// Neighbour to either side of the drift.
    Transform,
    /// Neighbour behind the drift: boundary pulls apart.
    Divergent,
}

impl Interaction {
    /// Classify by the signed offset between the approach angle and the
    /// drift direction, both in degrees. Sectors are tested in order ahead,
    /// +90, -90 with closed bounds; anything else is behind.
    pub fn classify(drift: f64, approach: f64) -> Self {
        let offset = angular_offset(drift, approach);
        if (-45.0..=45.0).contains(&offset) {
            Self::Convergent
        } else if (45.0..=135.0).contains(&offset) || (-135.0..=-45.0).contains(&offset) {
            Self::Transform
        } else {
            Self::Divergent
        }
    }
}

/// `angle - reference` normalised to [-180, 180).
pub fn angular_offset(reference: f64, angle: f64) -> f64 {
    (angle - reference + 180.0).rem_euclid(360.0) - 180.0
}

/// Height deltas applied across plate boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InteractionCoefficients {
    pub convergent: i32,
    pub transform: i32,
    pub divergent: i32,
}

impl Default for InteractionCoefficients {
    fn default() -> Self {
        Self {
            convergent: 16,
            transform: -2,
            divergent: -16,
        }
    }
}

impl InteractionCoefficients {
    pub fn from_config(config: &TerrainConfig) -> Self {
        Self {
            convergent: config.convergent_coefficient,
            transform: config.transform_coefficient,
            divergent: config.divergent_coefficient,
        }
    }

    pub fn coefficient(&self, interaction: Interaction) -> i32 {
        match interaction {
            Interaction::Convergent => self.convergent,
            Interaction::Transform => self.transform,
            Interaction::Divergent => self.divergent,
        }
    }
}

/// A tectonic plate with its properties.
#[derive(Clone, Debug)]
pub struct Plate {
    pub id: PlateId,
    pub kind: PlateKind,
    /// Drift direction in whole degrees, [0, 359).
    pub direction: i32,
    /// Member cells in claim order; the first is the plate centre.
    pub cells: Vec<CellId>,
    pub state: GrowthState,
    interactions: BTreeMap<PlateId, i32>,
}

impl Plate {
    pub fn new(id: PlateId, kind: PlateKind, direction: i32) -> Self {
        Self {
            id,
            kind,
            direction,
            cells: Vec::new(),
            state: GrowthState::Growing,
            interactions: BTreeMap::new(),
        }
    }

    /// Site of the first claimed cell.
    pub fn center(&self, graph: &CellGraph) -> Option<Vec2> {
        self.cells.first().map(|&id| graph.cell(id).site)
    }

    /// Coefficient toward a neighbouring plate, if the plates touch.
    pub fn interaction_with(&self, other: PlateId) -> Option<i32> {
        self.interactions.get(&other).copied()
    }

    pub fn interactions(&self) -> &BTreeMap<PlateId, i32> {
        &self.interactions
    }

    pub(crate) fn set_interactions(&mut self, interactions: BTreeMap<PlateId, i32>) {
        self.interactions = interactions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angular_offset_range() {
        assert_eq!(angular_offset(0.0, 10.0), 10.0);
        assert_eq!(angular_offset(350.0, 10.0), 20.0);
        assert_eq!(angular_offset(10.0, 350.0), -20.0);
        assert_eq!(angular_offset(0.0, 180.0), -180.0);
        assert_eq!(angular_offset(90.0, 450.0), 0.0);
    }

    #[test]
    fn test_classify_sectors() {
        assert_eq!(Interaction::classify(0.0, 0.0), Interaction::Convergent);
        assert_eq!(Interaction::classify(0.0, 45.0), Interaction::Convergent);
        assert_eq!(Interaction::classify(0.0, 315.0), Interaction::Convergent);
        assert_eq!(Interaction::classify(0.0, 90.0), Interaction::Transform);
        assert_eq!(Interaction::classify(0.0, 135.0), Interaction::Transform);
        assert_eq!(Interaction::classify(0.0, -90.0), Interaction::Transform);
        assert_eq!(Interaction::classify(0.0, 136.0), Interaction::Divergent);
        assert_eq!(Interaction::classify(0.0, 180.0), Interaction::Divergent);
        assert_eq!(Interaction::classify(300.0, 120.0), Interaction::Divergent);
        assert_eq!(Interaction::classify(300.0, 280.0), Interaction::Convergent);
    }

    #[test]
    fn test_coefficients_from_config() {
        let mut config = TerrainConfig::default();
        config.convergent_coefficient = 20;
        let coefficients = InteractionCoefficients::from_config(&config);
        assert_eq!(coefficients.coefficient(Interaction::Convergent), 20);
        assert_eq!(coefficients.coefficient(Interaction::Transform), -2);
        assert_eq!(coefficients.coefficient(Interaction::Divergent), -16);
    }

    #[test]
    fn test_pole_ids() {
        assert!(PlateId::NORTH_POLE.is_pole());
        assert!(PlateId::SOUTH_POLE.is_pole());
        assert!(!PlateId(2).is_pole());
        assert_eq!(PlateId(7).index(), 7);
    }
}
