pub mod cache;
pub mod config;
pub mod data;
mod error;
pub mod propagator;
mod scorer;
pub mod softmax;
pub mod threads;

pub use cache::NgramCache;
pub use config::EvalConfig;
pub use error::{Result, ScoreErr};
pub use propagator::Propagator;
pub use scorer::Scorer;
