use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{ParamGen, param_gen::claim};
use crate::Result;

/// Draws parameters from a probability distribution.
pub struct RandParamGen<'r, R: Rng, D: Distribution<f64>> {
    rng: &'r mut R,
    distribution: D,
    remaining: usize,
}

impl<'r, R: Rng, D: Distribution<f64>> RandParamGen<'r, R, D> {
    /// # Arguments
    /// * `rng` - The source of randomness, borrowed so one seeded generator covers every layer.
    /// * `distribution` - The distribution values are drawn from.
    /// * `limit` - How many values the generator hands out before it is exhausted.
    pub fn new(rng: &'r mut R, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<'r, R: Rng> RandParamGen<'r, R, Uniform<f64>> {
    /// Draws uniformly from `[-range, range]`.
    ///
    /// # Returns
    /// `ModelErr::InvalidInit` if `range` is negative or not finite.
    pub fn symmetric_uniform(rng: &'r mut R, limit: usize, range: f64) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new_inclusive(-range, range)?, limit))
    }
}

impl<'r, R: Rng> RandParamGen<'r, R, Normal<f64>> {
    /// Draws from a normal distribution.
    ///
    /// # Returns
    /// `ModelErr::InvalidInit` if `std_dev` is not finite.
    pub fn normal(rng: &'r mut R, limit: usize, mean: f64, std_dev: f64) -> Result<Self> {
        Ok(Self::new(rng, Normal::new(mean, std_dev)?, limit))
    }
}

impl<R: Rng, D: Distribution<f64>> ParamGen for RandParamGen<'_, R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f64>> {
        let n = claim(&mut self.remaining, n)?;
        let rng = &mut *self.rng;

        Some((&self.distribution).sample_iter(rng).take(n).collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);

        let mut param_gen = RandParamGen::symmetric_uniform(&mut rng, 1000, 0.1).unwrap();
        let sample = param_gen.sample(1000).unwrap();

        assert_eq!(sample.len(), 1000);
        assert!(sample.iter().all(|x| x.abs() <= 0.1));
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn normal_rejects_infinite_std_dev() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(RandParamGen::normal(&mut rng, 10, 0., f64::INFINITY).is_err());
    }

    #[test]
    fn same_seed_same_sample() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);

        let xs = RandParamGen::normal(&mut a, 5, 0., 1.).unwrap().sample(5);
        let ys = RandParamGen::normal(&mut b, 5, 0., 1.).unwrap().sample(5);
        assert_eq!(xs, ys);
    }
}
