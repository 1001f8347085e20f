pub mod activations;
pub mod layers;
mod model;

pub use activations::ActFn;
pub use model::{FirstStage, Model, Topology};
