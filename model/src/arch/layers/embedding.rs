use std::io::{BufRead, Write};

use ndarray::{Array2, ArrayView2, ArrayViewMut2, Ix2, s};
use rand::Rng;

use crate::{
    Result,
    format::{Lines, read_matrix, write_matrix},
    initialization::InitSpec,
    training::{ParamUpdate, UpdateState},
};

/// The input word embedding table: row `w` is the embedding of token `w`.
#[derive(Debug, Clone)]
pub struct Embeddings {
    w: Array2<f64>,
    context_size: usize,
    update: UpdateState<Ix2>,
}

impl Embeddings {
    /// Creates a zeroed table of `vocab_size` embeddings of `dim` reals, looked up for
    /// `context_size` positions at a time.
    pub fn new(vocab_size: usize, dim: usize, context_size: usize) -> Self {
        Self {
            w: Array2::zeros((vocab_size, dim)),
            context_size,
            update: UpdateState::None,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.w.nrows()
    }

    pub fn dim(&self) -> usize {
        self.w.ncols()
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    pub fn table(&self) -> ArrayView2<'_, f64> {
        self.w.view()
    }

    pub fn table_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.w.view_mut()
    }

    pub fn update_state(&self) -> &UpdateState<Ix2> {
        &self.update
    }

    pub fn initialize<R: Rng>(
        &mut self,
        rng: &mut R,
        init: InitSpec,
        update: ParamUpdate,
        epsilon: f64,
    ) -> Result<()> {
        init.fill(rng, self.w.view_mut())?;
        self.update = UpdateState::allocate(update, self.w.raw_dim(), epsilon);
        Ok(())
    }

    /// Writes the concatenated embeddings of each context column into `out`.
    ///
    /// # Arguments
    /// * `contexts` - A `(context_size, batch)` matrix of token indices.
    /// * `out` - A `(context_size * dim, batch)` buffer, position `i` fills rows
    ///   `i * dim..(i + 1) * dim`.
    pub fn gather(&self, contexts: ArrayView2<usize>, mut out: ArrayViewMut2<f64>) {
        let dim = self.dim();

        for (i, words) in contexts.rows().into_iter().enumerate() {
            let mut block = out.slice_mut(s![i * dim..(i + 1) * dim, ..]);

            for (mut column, &word) in block.columns_mut().into_iter().zip(words) {
                column.assign(&self.w.row(word));
            }
        }
    }

    pub fn read<R: BufRead>(&mut self, lines: &mut Lines<R>) -> Result<()> {
        self.w = read_matrix(lines, "input embeddings", self.w.dim())?;
        Ok(())
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_matrix(w, self.w.view())
    }
}
