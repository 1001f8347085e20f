use model::{ActFn, FirstStage, Model, Topology};
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Zip, s};

use crate::{Result, ScoreErr, threads};

fn activate(act_fn: ActFn, mut a: ArrayViewMut2<f64>) {
    if threads::parallel() {
        Zip::from(&mut a).par_for_each(|x| *x = act_fn.f(*x));
    } else {
        a.mapv_inplace(|x| act_fn.f(x));
    }
}

/// Runs context columns forward through a model's hidden stages and keeps the activations.
#[derive(Debug, Clone, Default)]
pub struct Propagator {
    topology: Topology,
    width: usize,
    batch: usize,
    input: Array2<f64>,
    first_hidden: Array2<f64>,
    second_hidden: Array2<f64>,
}

impl Propagator {
    /// Creates a propagator for `model` with buffers for batches of up to `width` columns.
    pub fn new(model: &Model, width: usize) -> Self {
        let mut propagator = Self::default();
        propagator.resize(model, width);
        propagator
    }

    /// Reallocates the activation buffers after `model`'s topology for batches of up to `width`
    /// columns.
    pub fn resize(&mut self, model: &Model, width: usize) {
        let topology = *model.topology();
        let input_dim = topology.input_embedding_dimension * topology.context_size();

        self.input = Array2::zeros((input_dim, width));
        self.first_hidden = Array2::zeros((topology.first_stage_dim(), width));
        self.second_hidden = if topology.num_hidden == 0 {
            Array2::zeros((0, 0))
        } else {
            Array2::zeros((topology.output_embedding_dimension, width))
        };

        self.topology = topology;
        self.width = width;
        self.batch = 0;
    }

    /// The widest batch the buffers currently hold.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether the second hidden stage is skipped, which is the case for models without a hidden
    /// layer.
    pub fn skip_hidden(&self) -> bool {
        self.topology.num_hidden == 0
    }

    /// Runs the forward pass for every column of `contexts`, growing the buffers if the batch is
    /// wider than [`Propagator::width`].
    ///
    /// # Arguments
    /// * `model` - The model to evaluate.
    /// * `contexts` - A `(ngram_size - 1, batch)` matrix of context token indices.
    pub fn forward(&mut self, model: &Model, contexts: ArrayView2<usize>) -> Result<()> {
        let context_size = model.topology().context_size();
        if contexts.nrows() != context_size {
            return Err(ScoreErr::WidthMismatch {
                what: "context",
                got: contexts.nrows(),
                expected: context_size,
            });
        }

        let n = contexts.ncols();
        if *model.topology() != self.topology || n > self.width {
            self.resize(model, n.max(self.width));
        }

        let mut first = self.first_hidden.slice_mut(s![.., ..n]);
        match model.first_stage() {
            FirstStage::Raw { embeddings, linear } => {
                let mut input = self.input.slice_mut(s![.., ..n]);
                embeddings.gather(contexts, input.view_mut());
                linear.forward(input.view(), first.view_mut());
            }
            FirstStage::Premultiplied { fused } => {
                let vocab = model.topology().input_vocab_size;
                fused.forward_one_hot(contexts, vocab, first.view_mut());
            }
        }
        activate(model.act_fn(), first.view_mut());

        if !self.skip_hidden() {
            let mut second = self.second_hidden.slice_mut(s![.., ..n]);
            model
                .second_linear()
                .forward(self.first_hidden.slice(s![.., ..n]), second.view_mut());
            activate(model.act_fn(), second);
        }

        self.batch = n;
        Ok(())
    }

    /// The first hidden stage's activations from the last forward pass.
    pub fn first_hidden(&self) -> ArrayView2<'_, f64> {
        self.first_hidden.slice(s![.., ..self.batch])
    }

    /// The second hidden stage's activations from the last forward pass, empty when skipped.
    pub fn second_hidden(&self) -> ArrayView2<'_, f64> {
        if self.skip_hidden() {
            return self.second_hidden.view();
        }

        self.second_hidden.slice(s![.., ..self.batch])
    }

    /// The activations the output layer consumes: the last stage that was not skipped.
    pub fn last_hidden(&self) -> ArrayView2<'_, f64> {
        if self.skip_hidden() {
            self.first_hidden()
        } else {
            self.second_hidden()
        }
    }
}

#[cfg(test)]
mod tests {
    use model::{ParamUpdate, Topology};
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn model(num_hidden: usize) -> Model {
        let mut model = Model::new(Topology {
            ngram_size: 4,
            input_vocab_size: 9,
            output_vocab_size: 6,
            input_embedding_dimension: 3,
            num_hidden,
            output_embedding_dimension: 2,
        });
        let mut rng = StdRng::seed_from_u64(99);
        model
            .initialize(&mut rng, false, 0.3, 0., ParamUpdate::Sgd, 0.)
            .unwrap();
        model
    }

    #[test]
    fn last_hidden_follows_topology() {
        let contexts = array![[1, 2], [3, 4], [5, 6]];

        let shallow = model(0);
        let mut propagator = Propagator::new(&shallow, 2);
        propagator.forward(&shallow, contexts.view()).unwrap();
        assert!(propagator.skip_hidden());
        assert_eq!(propagator.last_hidden().dim(), (2, 2));

        let deep = model(5);
        let mut propagator = Propagator::new(&deep, 2);
        propagator.forward(&deep, contexts.view()).unwrap();
        assert!(!propagator.skip_hidden());
        assert_eq!(propagator.first_hidden().dim(), (5, 2));
        assert_eq!(propagator.last_hidden().dim(), (2, 2));
    }

    #[test]
    fn rectifier_output_is_non_negative() {
        let deep = model(5);
        let mut propagator = Propagator::new(&deep, 1);
        propagator
            .forward(&deep, array![[0], [8], [4]].view())
            .unwrap();

        assert!(propagator.first_hidden().iter().all(|&a| a >= 0.));
    }

    #[test]
    fn grows_for_wide_batches() {
        let deep = model(5);
        let mut propagator = Propagator::new(&deep, 1);
        let contexts = Array2::from_shape_fn((3, 10), |(i, j)| (i + j) % 9);

        propagator.forward(&deep, contexts.view()).unwrap();
        assert_eq!(propagator.width(), 10);
        assert_eq!(propagator.last_hidden().ncols(), 10);
    }

    #[test]
    fn rejects_wrong_context_width() {
        let deep = model(5);
        let mut propagator = Propagator::new(&deep, 1);

        let err = propagator
            .forward(&deep, array![[0], [1]].view())
            .unwrap_err();
        assert!(matches!(
            err,
            ScoreErr::WidthMismatch {
                got: 2,
                expected: 3,
                ..
            }
        ));
    }

    #[test]
    fn columns_are_independent() {
        let deep = model(5);
        let contexts = array![[1, 7], [2, 0], [3, 3]];

        let mut batch = Propagator::new(&deep, 2);
        batch.forward(&deep, contexts.view()).unwrap();

        let mut single = Propagator::new(&deep, 1);
        single
            .forward(&deep, contexts.slice(s![.., 1..2]))
            .unwrap();

        let (a, b) = (batch.last_hidden(), single.last_hidden());
        for (x, y) in a.column(1).iter().zip(b.column(0)) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}
