pub mod engine;
pub mod leaders;

pub use engine::RotationEngine;
pub use leaders::{LeaderRemoval, LeaderRoster};
