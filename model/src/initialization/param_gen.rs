use ndarray::{ArrayViewMut, Dimension};

/// Takes up to `n` of the `remaining` values a generator may still produce.
///
/// # Returns
/// How many values to produce, `None` once nothing remains.
pub(super) fn claim(remaining: &mut usize, n: usize) -> Option<usize> {
    if *remaining == 0 {
        return None;
    }

    let n = n.min(*remaining);
    *remaining -= n;
    Some(n)
}

/// A source of starting values for model parameters, limited to a fixed amount of values.
pub trait ParamGen {
    /// Produces up to `n` values, fewer if the limit is reached first.
    ///
    /// # Returns
    /// `None` once the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f64>>;

    /// Overwrites every element of `params` with freshly sampled values, in logical order.
    ///
    /// # Returns
    /// The amount of elements written, which is less than `params.len()` if the generator ran
    /// out of values.
    fn fill<D: Dimension>(&mut self, mut params: ArrayViewMut<'_, f64, D>) -> usize
    where
        Self: Sized,
    {
        let Some(sample) = self.sample(params.len()) else {
            return 0;
        };

        let written = sample.len();
        params
            .iter_mut()
            .zip(sample)
            .for_each(|(param, value)| *param = value);

        written
    }
}
