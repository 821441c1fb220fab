pub mod generation;
pub mod shift;
pub mod types;

pub use generation::{associate_plates, generate_plates, grow_plates, seed_plates};
pub use shift::{apply_tectonic_shift, equalize_plate_heights, raise_poles};
pub use types::{GrowthState, Interaction, InteractionCoefficients, Plate, PlateId, PlateKind};
