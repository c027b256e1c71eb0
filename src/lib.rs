pub mod config;
pub mod fov;
pub mod gates;
pub mod image;
pub mod index;
pub mod io;
pub mod normalisation;
pub mod numerics;
pub mod objective;
pub mod projdata;
pub mod projector;
pub mod subsets;
pub mod transform;
pub mod utils;

pub use objective::{make_objective_function, GatedObjectiveFunction, ObjectiveKind, PoissonGatedObjective};
