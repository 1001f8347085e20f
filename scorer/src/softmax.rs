use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Zip};

use crate::threads;

/// Computes `ln(sum(exp(x)))` without overflowing, by factoring out the maximum.
pub fn logsum(x: ArrayView1<f64>) -> f64 {
    let max = x.fold(f64::NEG_INFINITY, |max, &v| max.max(v));
    if !max.is_finite() {
        return max;
    }

    max + x.fold(0., |sum, &v| sum + (v - max).exp()).ln()
}

fn log_softmax_into(scores: ArrayView1<f64>, mut log_probs: ArrayViewMut1<f64>) {
    let logz = logsum(scores);
    log_probs.zip_mut_with(&scores, |p, &s| *p = s - logz);
}

/// Softmax over the output vocabulary followed by the log loss of the observed targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftmaxLogLoss;

impl SoftmaxLogLoss {
    /// Normalizes every column of `scores` into log-probabilities.
    ///
    /// # Arguments
    /// * `scores` - A `(vocab, batch)` matrix of raw scores.
    /// * `targets` - The observed token of each column.
    /// * `log_probs` - A `(vocab, batch)` buffer for the normalized scores.
    ///
    /// # Returns
    /// The summed log-likelihood of the targets.
    pub fn forward(
        &self,
        scores: ArrayView2<f64>,
        targets: ArrayView1<usize>,
        mut log_probs: ArrayViewMut2<f64>,
    ) -> f64 {
        let zip = Zip::from(log_probs.columns_mut()).and(scores.columns());

        if threads::parallel() {
            zip.par_for_each(|log_probs, scores| log_softmax_into(scores, log_probs));
        } else {
            zip.for_each(|log_probs, scores| log_softmax_into(scores, log_probs));
        }

        targets
            .iter()
            .enumerate()
            .map(|(j, &target)| log_probs[(target, j)])
            .sum()
    }
}
