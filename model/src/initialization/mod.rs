mod constant;
mod param_gen;
mod random;

pub use constant::ConstParamGen;
pub use param_gen::ParamGen;
pub use random::RandParamGen;

use ndarray::{ArrayViewMut, Dimension};
use rand::Rng;

use crate::Result;

/// How freshly initialized weights are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitSpec {
    /// Draw from a normal distribution with standard deviation `range` instead of a uniform one on
    /// `[-range, range]`.
    pub normal: bool,
    pub range: f64,
}

impl InitSpec {
    /// Fills `params` with random values drawn as configured.
    pub fn fill<R: Rng, D: Dimension>(
        &self,
        rng: &mut R,
        params: ArrayViewMut<'_, f64, D>,
    ) -> Result<()> {
        let n = params.len();

        if self.normal {
            RandParamGen::normal(rng, n, 0., self.range)?.fill(params);
        } else {
            RandParamGen::symmetric_uniform(rng, n, self.range)?.fill(params);
        }

        Ok(())
    }
}
