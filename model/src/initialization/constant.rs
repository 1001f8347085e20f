use super::{ParamGen, param_gen::claim};

/// Repeats a single value, used for biases that all start out equal.
pub struct ConstParamGen {
    value: f64,
    remaining: usize,
}

impl ConstParamGen {
    /// # Arguments
    /// * `value` - The value every sample holds.
    /// * `limit` - How many values the generator hands out before it is exhausted.
    pub fn new(value: f64, limit: usize) -> Self {
        Self {
            value,
            remaining: limit,
        }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f64>> {
        claim(&mut self.remaining, n).map(|n| vec![self.value; n])
    }
}
