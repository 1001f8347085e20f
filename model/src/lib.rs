pub mod arch;
pub mod error;
pub mod format;
pub mod initialization;
mod test;
pub mod training;

pub use arch::{ActFn, FirstStage, Model, Topology};
pub use error::{ModelErr, Result};
pub use training::ParamUpdate;
