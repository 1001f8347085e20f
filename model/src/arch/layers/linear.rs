use std::io::{BufRead, Write};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis, Ix1, Ix2, linalg};
use rand::Rng;

use crate::{
    Result,
    format::{Lines, read_matrix, read_vector, write_matrix, write_vector},
    initialization::InitSpec,
    training::{ParamUpdate, UpdateState},
};

/// An affine stage `u * x + b` mapping `dim_in` reals to `dim_out` reals.
#[derive(Debug, Clone)]
pub struct Linear {
    u: Array2<f64>,
    b: Array1<f64>,
    update_u: UpdateState<Ix2>,
    update_b: UpdateState<Ix1>,
}

impl Linear {
    /// Creates a zeroed stage with a `(dim_out, dim_in)` weight matrix.
    pub fn new(dim_out: usize, dim_in: usize) -> Self {
        Self {
            u: Array2::zeros((dim_out, dim_in)),
            b: Array1::zeros(dim_out),
            update_u: UpdateState::None,
            update_b: UpdateState::None,
        }
    }

    /// Wraps already computed weights and biases.
    pub fn from_parts(u: Array2<f64>, b: Array1<f64>) -> Self {
        Self {
            u,
            b,
            update_u: UpdateState::None,
            update_b: UpdateState::None,
        }
    }

    pub fn dim_out(&self) -> usize {
        self.u.nrows()
    }

    pub fn dim_in(&self) -> usize {
        self.u.ncols()
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.u.view()
    }

    pub fn biases(&self) -> ArrayView1<'_, f64> {
        self.b.view()
    }

    pub fn weights_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.u.view_mut()
    }

    pub fn biases_mut(&mut self) -> ndarray::ArrayViewMut1<'_, f64> {
        self.b.view_mut()
    }

    pub fn into_parts(self) -> (Array2<f64>, Array1<f64>) {
        (self.u, self.b)
    }

    pub fn update_state(&self) -> (&UpdateState<Ix2>, &UpdateState<Ix1>) {
        (&self.update_u, &self.update_b)
    }

    pub fn initialize<R: Rng>(
        &mut self,
        rng: &mut R,
        init: InitSpec,
        update: ParamUpdate,
        epsilon: f64,
    ) -> Result<()> {
        init.fill(rng, self.u.view_mut())?;
        init.fill(rng, self.b.view_mut())?;
        self.update_u = UpdateState::allocate(update, self.u.raw_dim(), epsilon);
        self.update_b = UpdateState::allocate(update, self.b.raw_dim(), epsilon);
        Ok(())
    }

    /// Computes `u * x + b` for every column of `x` into `out`.
    ///
    /// # Arguments
    /// * `x` - A `(dim_in, batch)` input.
    /// * `out` - A `(dim_out, batch)` buffer.
    pub fn forward(&self, x: ArrayView2<f64>, mut out: ArrayViewMut2<f64>) {
        linalg::general_mat_mul(1.0, &self.u, &x, 0.0, &mut out);
        out += &self.b.view().insert_axis(Axis(1));
    }

    /// Computes the stage's output for inputs that are a concatenation of one-hot blocks, each
    /// `block` wide, without materializing them: column `j` of the output is `b` plus, for every
    /// position `i`, column `i * block + words[(i, j)]` of `u`.
    ///
    /// # Arguments
    /// * `words` - A `(positions, batch)` matrix with the hot index of each block.
    /// * `block` - The width of each one-hot block.
    /// * `out` - A `(dim_out, batch)` buffer.
    pub fn forward_one_hot(
        &self,
        words: ArrayView2<usize>,
        block: usize,
        mut out: ArrayViewMut2<f64>,
    ) {
        for (mut column, positions) in out.columns_mut().into_iter().zip(words.columns()) {
            column.assign(&self.b);

            for (i, &word) in positions.iter().enumerate() {
                column += &self.u.column(i * block + word);
            }
        }
    }

    pub fn read_weights<R: BufRead>(&mut self, lines: &mut Lines<R>) -> Result<()> {
        self.u = read_matrix(lines, "hidden weights", self.u.dim())?;
        Ok(())
    }

    pub fn read_biases<R: BufRead>(&mut self, lines: &mut Lines<R>) -> Result<()> {
        self.b = read_vector(lines, "hidden biases", self.b.len())?;
        Ok(())
    }

    pub fn write_weights<W: Write>(&self, w: &mut W) -> Result<()> {
        write_matrix(w, self.u.view())
    }

    pub fn write_biases<W: Write>(&self, w: &mut W) -> Result<()> {
        write_vector(w, self.b.view())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn layer() -> Linear {
        Linear::from_parts(
            array![[1., 0., 2., -1.], [0., 3., 1., 1.]],
            array![0.5, -0.5],
        )
    }

    #[test]
    fn forward_is_affine() {
        let x = array![[1., 0.], [1., 0.], [0., 1.], [0., 0.]];
        let mut out = Array2::zeros((2, 2));

        layer().forward(x.view(), out.view_mut());
        assert_eq!(out, array![[1.5, 2.5], [2.5, 0.5]]);
    }

    #[test]
    fn one_hot_matches_dense_forward() {
        let words = array![[1, 0], [0, 1]];
        let x = array![[0., 1.], [1., 0.], [1., 0.], [0., 1.]];

        let mut dense = Array2::zeros((2, 2));
        let mut sparse = Array2::zeros((2, 2));
        layer().forward(x.view(), dense.view_mut());
        layer().forward_one_hot(words.view(), 2, sparse.view_mut());

        assert_eq!(dense, sparse);
    }
}
