mod embedding;
mod linear;
mod output;

pub use embedding::Embeddings;
pub use linear::Linear;
pub use output::OutputLayer;
