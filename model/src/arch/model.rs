use ndarray::{Array2, linalg, s};
use rand::Rng;

use super::{
    activations::ActFn,
    layers::{Embeddings, Linear, OutputLayer},
};
use crate::{Result, initialization::InitSpec, training::ParamUpdate};

/// The six integers every parameter shape of a model derives from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Topology {
    /// Context width plus the target position.
    pub ngram_size: usize,
    pub input_vocab_size: usize,
    pub output_vocab_size: usize,
    pub input_embedding_dimension: usize,
    /// Zero means the embeddings feed a single linear stage straight into the output layer.
    pub num_hidden: usize,
    pub output_embedding_dimension: usize,
}

impl Topology {
    pub fn context_size(&self) -> usize {
        self.ngram_size.saturating_sub(1)
    }

    /// The output width of the first linear stage.
    pub fn first_stage_dim(&self) -> usize {
        if self.num_hidden == 0 {
            self.output_embedding_dimension
        } else {
            self.num_hidden
        }
    }
}

/// The embedding lookup and first linear stage, either as trained or fused by
/// [`Model::premultiply`].
#[derive(Debug, Clone)]
pub enum FirstStage {
    Raw {
        embeddings: Embeddings,
        linear: Linear,
    },
    /// A single `(first_stage_dim, input_vocab_size * context_size)` stage whose block `i` holds
    /// the first linear stage's position `i` weights already multiplied by the embedding table.
    Premultiplied { fused: Linear },
}

/// A feedforward neural probabilistic language model.
#[derive(Debug, Clone)]
pub struct Model {
    topology: Topology,
    act_fn: ActFn,
    first: FirstStage,
    second: Linear,
    output: OutputLayer,
}

impl Default for Model {
    fn default() -> Self {
        let mut model = Self {
            topology: Topology::default(),
            act_fn: ActFn::default(),
            first: FirstStage::Raw {
                embeddings: Embeddings::new(0, 0, 0),
                linear: Linear::new(0, 0),
            },
            second: Linear::new(1, 1),
            output: OutputLayer::new(0, 0),
        };

        model.resize(Topology::default());
        model
    }
}

impl Model {
    /// Creates a zeroed model with the given topology.
    pub fn new(topology: Topology) -> Self {
        let mut model = Self::default();
        model.resize(topology);
        model
    }

    /// Reshapes every parameter array after `topology`, zeroing them and leaving the model in the
    /// raw (not premultiplied) state.
    pub fn resize(&mut self, topology: Topology) {
        let Topology {
            input_vocab_size,
            output_vocab_size,
            input_embedding_dimension,
            num_hidden,
            output_embedding_dimension,
            ..
        } = topology;
        let context_size = topology.context_size();
        let first_in = input_embedding_dimension * context_size;

        self.first = FirstStage::Raw {
            embeddings: Embeddings::new(input_vocab_size, input_embedding_dimension, context_size),
            linear: Linear::new(topology.first_stage_dim(), first_in),
        };

        self.second = if num_hidden == 0 {
            Linear::new(1, 1)
        } else {
            Linear::new(output_embedding_dimension, num_hidden)
        };

        self.output = OutputLayer::new(output_vocab_size, output_embedding_dimension);
        self.topology = topology;
    }

    /// Randomizes every parameter.
    ///
    /// # Arguments
    /// * `rng` - The random number generator.
    /// * `init_normal` - Draw from a normal distribution instead of a uniform one.
    /// * `init_range` - The half width of the uniform range, or the normal standard deviation.
    /// * `init_bias` - The value every output bias starts at.
    /// * `update` - The update rule training will use, layers allocate its state now.
    /// * `epsilon` - The adagrad starting value.
    ///
    /// # Returns
    /// An error if `init_range` is not a valid range or standard deviation, or if the model is
    /// premultiplied.
    pub fn initialize<R: Rng>(
        &mut self,
        rng: &mut R,
        init_normal: bool,
        init_range: f64,
        init_bias: f64,
        update: ParamUpdate,
        epsilon: f64,
    ) -> Result<()> {
        let init = InitSpec {
            normal: init_normal,
            range: init_range,
        };

        let FirstStage::Raw { embeddings, linear } = &mut self.first else {
            return Err(crate::ModelErr::Premultiplied);
        };

        embeddings.initialize(rng, init, update, epsilon)?;
        self.output
            .initialize(rng, init, init_bias, update, epsilon)?;
        linear.initialize(rng, init, update, epsilon)?;
        self.second.initialize(rng, init, update, epsilon)
    }

    /// Fuses the embedding table into the first linear stage and drops the table.
    ///
    /// Afterwards the first stage takes one-hot context blocks of `input_vocab_size` instead of
    /// embeddings. Does nothing if the model is already premultiplied.
    pub fn premultiply(&mut self) {
        let FirstStage::Raw { embeddings, linear } = &self.first else {
            return;
        };

        let vocab = embeddings.vocab_size();
        let dim = embeddings.dim();
        let context_size = self.topology.context_size();
        let table = embeddings.table();
        let u = linear.weights();

        let mut fused = Array2::zeros((linear.dim_out(), vocab * context_size));
        for i in 0..context_size {
            let mut block = fused.slice_mut(s![.., i * vocab..(i + 1) * vocab]);
            let u_i = u.slice(s![.., i * dim..(i + 1) * dim]);
            linalg::general_mat_mul(1.0, &u_i, &table.t(), 0.0, &mut block);
        }

        let b = linear.biases().to_owned();
        log::debug!(width = fused.ncols(); "premultiplied first stage");
        self.first = FirstStage::Premultiplied {
            fused: Linear::from_parts(fused, b),
        };
    }

    pub fn is_premultiplied(&self) -> bool {
        matches!(self.first, FirstStage::Premultiplied { .. })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn ngram_size(&self) -> usize {
        self.topology.ngram_size
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    pub fn set_act_fn(&mut self, act_fn: ActFn) {
        self.act_fn = act_fn;
    }

    pub fn first_stage(&self) -> &FirstStage {
        &self.first
    }

    pub fn first_stage_mut(&mut self) -> &mut FirstStage {
        &mut self.first
    }

    /// The embedding table, gone once the model is premultiplied.
    pub fn embeddings(&self) -> Option<&Embeddings> {
        match &self.first {
            FirstStage::Raw { embeddings, .. } => Some(embeddings),
            FirstStage::Premultiplied { .. } => None,
        }
    }

    /// The first linear stage, fused or not.
    pub fn first_linear(&self) -> &Linear {
        match &self.first {
            FirstStage::Raw { linear, .. } => linear,
            FirstStage::Premultiplied { fused } => fused,
        }
    }

    pub fn second_linear(&self) -> &Linear {
        &self.second
    }

    pub fn second_linear_mut(&mut self) -> &mut Linear {
        &mut self.second
    }

    pub fn output_layer(&self) -> &OutputLayer {
        &self.output
    }

    pub fn output_layer_mut(&mut self) -> &mut OutputLayer {
        &mut self.output
    }
}
