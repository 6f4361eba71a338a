pub mod constants;
pub mod error;
pub mod fuzzy;
pub mod genetic;
pub mod geometry;
pub mod track;
pub mod vehicle;

pub use error::{GeneticError, GenomeError, TrackError};
pub use fuzzy::{Action, ActionLevels, FuzzyController, LookupGrid};
pub use genetic::{GeneLayout, Genome, MutationParams};
pub use geometry::Point;
pub use track::{Checkpoint, Track};
pub use vehicle::{
    Controller, DeathCause, KeyState, Sensors, Vehicle, VehicleBody, VehicleState,
};
