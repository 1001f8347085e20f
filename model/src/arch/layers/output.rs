use std::io::{BufRead, Write};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis, Ix1, Ix2, linalg};
use rand::Rng;

use crate::{
    Result,
    format::{Lines, read_matrix, read_vector, write_matrix, write_vector},
    initialization::{ConstParamGen, InitSpec, ParamGen},
    training::{ParamUpdate, UpdateState},
};

/// The output word embeddings: row `w` scores token `w` against the last hidden activation.
#[derive(Debug, Clone)]
pub struct OutputLayer {
    w: Array2<f64>,
    b: Array1<f64>,
    update_w: UpdateState<Ix2>,
    update_b: UpdateState<Ix1>,
}

impl OutputLayer {
    pub fn new(vocab_size: usize, dim: usize) -> Self {
        Self {
            w: Array2::zeros((vocab_size, dim)),
            b: Array1::zeros(vocab_size),
            update_w: UpdateState::None,
            update_b: UpdateState::None,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.w.nrows()
    }

    pub fn dim(&self) -> usize {
        self.w.ncols()
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.w.view()
    }

    pub fn biases(&self) -> ArrayView1<'_, f64> {
        self.b.view()
    }

    pub fn weights_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.w.view_mut()
    }

    pub fn biases_mut(&mut self) -> ndarray::ArrayViewMut1<'_, f64> {
        self.b.view_mut()
    }

    pub fn update_state(&self) -> (&UpdateState<Ix2>, &UpdateState<Ix1>) {
        (&self.update_w, &self.update_b)
    }

    /// Randomizes the weights and sets every bias to `init_bias`.
    pub fn initialize<R: Rng>(
        &mut self,
        rng: &mut R,
        init: InitSpec,
        init_bias: f64,
        update: ParamUpdate,
        epsilon: f64,
    ) -> Result<()> {
        init.fill(rng, self.w.view_mut())?;
        ConstParamGen::new(init_bias, self.b.len()).fill(self.b.view_mut());
        self.update_w = UpdateState::allocate(update, self.w.raw_dim(), epsilon);
        self.update_b = UpdateState::allocate(update, self.b.raw_dim(), epsilon);
        Ok(())
    }

    /// Scores every token of the vocabulary for every column of `input`.
    ///
    /// # Arguments
    /// * `input` - A `(dim, batch)` activation matrix.
    /// * `out` - A `(vocab_size, batch)` buffer.
    pub fn scores(&self, input: ArrayView2<f64>, mut out: ArrayViewMut2<f64>) {
        linalg::general_mat_mul(1.0, &self.w, &input, 0.0, &mut out);
        out += &self.b.view().insert_axis(Axis(1));
    }

    /// Scores a single token against column `instance` of `input`.
    pub fn score(&self, input: ArrayView2<f64>, word: usize, instance: usize) -> f64 {
        self.w.row(word).dot(&input.column(instance)) + self.b[word]
    }

    pub fn read_weights<R: BufRead>(&mut self, lines: &mut Lines<R>) -> Result<()> {
        self.w = read_matrix(lines, "output weights", self.w.dim())?;
        Ok(())
    }

    pub fn read_biases<R: BufRead>(&mut self, lines: &mut Lines<R>) -> Result<()> {
        self.b = read_vector(lines, "output biases", self.b.len())?;
        Ok(())
    }

    pub fn write_weights<W: Write>(&self, w: &mut W) -> Result<()> {
        write_matrix(w, self.w.view())
    }

    pub fn write_biases<W: Write>(&self, w: &mut W) -> Result<()> {
        write_vector(w, self.b.view())
    }
}
