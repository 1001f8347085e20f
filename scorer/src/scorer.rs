use std::{io::BufRead, path::Path, process, sync::Arc};

use log::{debug, error, info};
use model::Model;
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis, Zip, aview1, s};

use crate::{
    Result, ScoreErr,
    cache::NgramCache,
    propagator::Propagator,
    softmax::{SoftmaxLogLoss, logsum},
    threads::{self, SingleThreaded},
};

/// Scores n-grams under a neural language model.
///
/// An n-gram is `ngram_size` token indices: the context followed by the target. Scores are the
/// target's log-probability given the context, scaled by the log-base weight (natural log by
/// default). Without normalization the score is the output layer's raw score for the target, which
/// is cheaper but is not a log-probability.
///
/// A `Scorer` is not meant to be shared between threads: single lookups mutate its cache and
/// activation buffers. The bound model can be shared between scorers.
#[derive(Debug, Clone)]
pub struct Scorer {
    model: Option<Arc<Model>>,
    ngram_size: usize,
    normalization: bool,
    weight: f64,
    propagator: Propagator,
    scores: Array2<f64>,
    cache_capacity: usize,
    cache: Option<NgramCache>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            model: None,
            ngram_size: 0,
            normalization: false,
            weight: 1.,
            propagator: Propagator::default(),
            scores: Array2::zeros((0, 0)),
            cache_capacity: 0,
            cache: None,
        }
    }
}

impl Scorer {
    /// Creates a scorer bound to `model`.
    pub fn new(model: impl Into<Arc<Model>>) -> Self {
        let mut scorer = Self::default();
        scorer.configure(model);
        scorer
    }

    /// Binds `model` and sizes the buffers and the cache after it.
    pub fn configure(&mut self, model: impl Into<Arc<Model>>) {
        self.model = Some(model.into());
        self.resize();
    }

    /// Resizes the buffers after the bound model's topology, clearing the cache if one is enabled.
    fn resize(&mut self) {
        let Some(model) = &self.model else {
            return;
        };

        let topology = model.topology();
        self.ngram_size = topology.ngram_size;
        self.propagator.resize(model, self.propagator.width().max(1));
        self.scores = Array2::zeros((topology.output_vocab_size, 1));

        if self.cache_capacity > 0 {
            self.cache = Some(NgramCache::new(self.ngram_size, self.cache_capacity));
        }

        info!(
            ngram_size = topology.ngram_size,
            input_vocab_size = topology.input_vocab_size,
            output_vocab_size = topology.output_vocab_size,
            num_hidden = topology.num_hidden;
            "configured scorer"
        );
    }

    /// Reads a model from `reader` and binds it.
    ///
    /// # Returns
    /// Any error reading the model, the previously bound model is kept in that case.
    pub fn read_from<R: BufRead>(&mut self, reader: R) -> Result<()> {
        let mut model = Model::default();
        model.read_from(reader, None, None)?;
        self.configure(model);
        Ok(())
    }

    /// Reads a model file and binds it.
    pub fn read<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut model = Model::default();
        model.read(path, None, None)?;
        self.configure(model);
        Ok(())
    }

    /// Reads a model file and binds it, terminating the process if the file cannot be opened or
    /// read, or declares an unsupported format version.
    pub fn read_or_exit<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref();

        if let Err(e) = self.read(path) {
            error!("could not load neural LM file {}: {e}", path.display());
            process::exit(1);
        }
    }

    /// The bound model.
    pub fn model(&self) -> Option<&Model> {
        self.model.as_deref()
    }

    /// A shared handle to the bound model, for binding it to other scorers.
    pub fn shared_model(&self) -> Option<Arc<Model>> {
        self.model.clone()
    }

    /// Switches between log-probabilities and raw scores, evicting cached scores on a change.
    pub fn set_normalization(&mut self, normalization: bool) {
        if normalization != self.normalization {
            self.normalization = normalization;
            self.evict_cached_scores();
        }
    }

    pub fn normalization(&self) -> bool {
        self.normalization
    }

    /// Reports scores as logarithms in `base` instead of natural logarithms, evicting cached scores
    /// on a change.
    pub fn set_log_base(&mut self, base: f64) {
        let weight = 1. / base.ln();
        if weight != self.weight {
            self.weight = weight;
            self.evict_cached_scores();
        }
    }

    /// The factor natural log scores are multiplied by.
    pub fn log_weight(&self) -> f64 {
        self.weight
    }

    /// The number of tokens in an n-gram, context and target.
    pub fn order(&self) -> usize {
        self.ngram_size
    }

    /// The number of context tokens in an n-gram.
    pub fn context_width(&self) -> usize {
        self.ngram_size.saturating_sub(1)
    }

    /// Preallocates buffers for batches of up to `width` n-grams.
    pub fn set_width(&mut self, width: usize) -> Result<()> {
        let model = self.model.as_ref().ok_or(ScoreErr::NotConfigured)?;
        self.propagator.resize(model, width);
        Ok(())
    }

    /// Enables a cache of `capacity` slots for single lookups, or disables caching if zero.
    /// Either way every cached entry and counter is dropped.
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.cache_capacity = capacity;
        self.cache = (capacity > 0).then(|| NgramCache::new(self.ngram_size, capacity));
        debug!(capacity = capacity; "reset n-gram cache");
    }

    /// Drops every cached score and zeroes the counters, keeping the capacity.
    fn evict_cached_scores(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
            debug!("evicted cached scores");
        }
    }

    /// The fraction of cached single lookups that hit.
    ///
    /// # Returns
    /// `ScoreErr::NoLookups` if caching is disabled or nothing has been looked up since it was
    /// enabled.
    pub fn cache_hit_rate(&self) -> Result<f64> {
        self.cache
            .as_ref()
            .and_then(NgramCache::hit_rate)
            .ok_or(ScoreErr::NoLookups)
    }

    /// The cache's lookup and hit counters, `None` if caching is disabled.
    pub fn cache_counters(&self) -> Option<(u64, u64)> {
        self.cache.as_ref().map(|c| (c.lookups(), c.hits()))
    }

    /// Fuses the bound model's embedding table into its first linear stage. Faster lookups at the
    /// cost of memory; cannot be undone. Cached scores are evicted.
    ///
    /// If the model is shared with other scorers this scorer gets its own premultiplied copy.
    pub fn premultiply_model(&mut self) -> Result<()> {
        let model = self.model.as_mut().ok_or(ScoreErr::NotConfigured)?;

        if !model.is_premultiplied() {
            info!("premultiplying hidden layer");
            Arc::make_mut(model).premultiply();
            self.evict_cached_scores();
        }

        Ok(())
    }

    /// Checks that `ngram` has `ngram_size` tokens, the context ones in the input vocabulary and
    /// the target in the output vocabulary.
    fn validate(model: &Model, ngram: ArrayView2<usize>) -> Result<()> {
        let topology = model.topology();
        if ngram.nrows() != topology.ngram_size || topology.ngram_size == 0 {
            return Err(ScoreErr::WidthMismatch {
                what: "n-gram",
                got: ngram.nrows(),
                expected: topology.ngram_size,
            });
        }

        let context_size = topology.context_size();
        let contexts = ngram.slice(s![..context_size, ..]);
        if let Some(&token) = contexts.iter().find(|&&t| t >= topology.input_vocab_size) {
            return Err(ScoreErr::TokenOutOfRange {
                token,
                vocab: topology.input_vocab_size,
            });
        }

        let targets = ngram.row(context_size);
        if let Some(&token) = targets.iter().find(|&&t| t >= topology.output_vocab_size) {
            return Err(ScoreErr::TokenOutOfRange {
                token,
                vocab: topology.output_vocab_size,
            });
        }

        Ok(())
    }

    /// Scores a single n-gram, consulting and filling the cache if one is enabled.
    ///
    /// # Arguments
    /// * `ngram` - Exactly `ngram_size` tokens, the context followed by the target.
    pub fn score_single(&mut self, ngram: &[usize]) -> Result<f64> {
        let Self {
            model,
            normalization,
            weight,
            propagator,
            scores,
            cache,
            ..
        } = self;
        let model = model.as_deref().ok_or(ScoreErr::NotConfigured)?;

        let column = aview1(ngram).insert_axis(Axis(1));
        Self::validate(model, column)?;

        let mut slot = None;
        if let Some(cache) = cache.as_mut() {
            let (free, cached) = cache.probe(ngram);
            if let Some(log_prob) = cached {
                return Ok(log_prob);
            }

            slot = Some(free);
        }

        let _single = SingleThreaded::enter();

        let context_size = ngram.len() - 1;
        let target = ngram[context_size];
        propagator.forward(model, column.slice(s![..context_size, ..]))?;

        let output = model.output_layer();
        let log_prob = if *normalization {
            let mut scores = scores.slice_mut(s![.., ..1]);
            output.scores(propagator.last_hidden(), scores.view_mut());

            let scores = scores.column(0);
            *weight * (scores[target] - logsum(scores))
        } else {
            *weight * output.score(propagator.last_hidden(), target, 0)
        };

        if let (Some(cache), Some(slot)) = (cache.as_mut(), slot) {
            cache.store(slot, ngram, log_prob);
        }

        Ok(log_prob)
    }

    /// Builds an n-gram from a token sequence that may be shorter or longer than `ngram_size`.
    ///
    /// Long sequences keep their last `ngram_size` tokens. Short ones are left padded with
    /// `start` if they begin with it, or with `null` otherwise.
    pub fn assemble_ngram(&self, tokens: &[usize], start: usize, null: usize) -> Result<Vec<usize>> {
        let &first = tokens.first().ok_or(ScoreErr::EmptyPrefix)?;
        let want = self.ngram_size;

        if tokens.len() >= want {
            return Ok(tokens[tokens.len() - want..].to_vec());
        }

        let fill = if first == start { start } else { null };
        let mut ngram = vec![fill; want - tokens.len()];
        ngram.extend_from_slice(tokens);
        Ok(ngram)
    }

    /// Scores the n-gram [`Scorer::assemble_ngram`] builds from `tokens`.
    pub fn assemble_from_flat_sequence(
        &mut self,
        tokens: &[usize],
        start: usize,
        null: usize,
    ) -> Result<f64> {
        if self.model.is_none() {
            return Err(ScoreErr::NotConfigured);
        }

        let ngram = self.assemble_ngram(tokens, start, null)?;
        self.score_single(&ngram)
    }

    /// Scores many n-grams at once. Never touches the cache.
    ///
    /// # Arguments
    /// * `ngrams` - A `(ngram_size, batch)` matrix, one n-gram per column.
    /// * `out` - Receives the score of each column.
    pub fn score_batch(
        &mut self,
        ngrams: ArrayView2<usize>,
        mut out: ArrayViewMut1<f64>,
    ) -> Result<()> {
        let model = self.model.as_deref().ok_or(ScoreErr::NotConfigured)?;
        Self::validate(model, ngrams)?;

        let n = ngrams.ncols();
        if out.len() != n {
            return Err(ScoreErr::WidthMismatch {
                what: "batch output",
                got: out.len(),
                expected: n,
            });
        }

        let context_size = model.topology().context_size();
        let targets = ngrams.row(context_size);
        self.propagator
            .forward(model, ngrams.slice(s![..context_size, ..]))?;

        let weight = self.weight;
        let output = model.output_layer();
        let hidden = self.propagator.last_hidden();

        if self.normalization {
            let mut scores = Array2::zeros((output.vocab_size(), n));
            output.scores(hidden, scores.view_mut());

            let mut log_probs = Array2::zeros((output.vocab_size(), n));
            let loglik = SoftmaxLogLoss.forward(scores.view(), targets, log_probs.view_mut());
            debug!(batch = n, loglik = loglik; "scored normalized batch");

            for (j, (o, &target)) in out.iter_mut().zip(targets).enumerate() {
                *o = weight * log_probs[(target, j)];
            }
        } else {
            let zip = Zip::indexed(&mut out).and(&targets);
            let score = |j: usize, o: &mut f64, &target: &usize| {
                *o = weight * output.score(hidden, target, j);
            };

            if threads::parallel() {
                zip.par_for_each(score);
            } else {
                zip.for_each(score);
            }
        }

        Ok(())
    }
}
