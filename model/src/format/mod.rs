//! The text model file format.
//!
//! A model file is a sequence of sections, each introduced by a `\name` marker line and terminated
//! by a blank line:
//!
//! ```text
//! \config
//! version 1
//! ngram_size 3
//! ...
//!
//! \input_embeddings
//! 0.1	-0.2
//! ...
//!
//! \end
//! ```
//!
//! Unknown sections are skipped so older readers keep working on files with extra sections.

mod config;
mod lines;
mod matrix;
mod reader;
mod writer;

pub use config::FORMAT_VERSION;
pub use lines::Lines;
pub use matrix::{read_matrix, read_vector, write_matrix, write_vector};
