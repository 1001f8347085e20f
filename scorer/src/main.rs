use std::io::{self, Write};

use anyhow::Context;
use log::info;
use ndarray::{Array1, s};

use scorer::{EvalConfig, Scorer, data};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = EvalConfig::from_env()?;

    if config.num_threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build_global()
            .context("configuring the thread pool")?;
    }
    info!(threads = rayon::current_num_threads(); "thread pool ready");

    let mut scorer = Scorer::default();
    scorer.read_or_exit(&config.model_file);
    scorer.set_normalization(!config.unnormalized);

    if config.premultiply {
        scorer.premultiply_model()?;
    }

    let ngrams = data::read_ngram_file(&config.test_file, scorer.order())
        .context("reading test data")?;

    let batch = config.minibatch_size;
    scorer.set_width(batch)?;

    let mut stderr = io::stderr().lock();
    let mut log_probs = Array1::zeros(batch);
    let mut loglik = 0.;

    for start in (0..ngrams.ncols()).step_by(batch) {
        let end = (start + batch).min(ngrams.ncols());
        let chunk = ngrams.slice(s![.., start..end]);
        let mut out = log_probs.slice_mut(s![..end - start]);

        scorer.score_batch(chunk, out.view_mut())?;

        if config.debug > 0 {
            for (ngram, log_prob) in chunk.columns().into_iter().zip(out.iter()) {
                if config.debug > 1 {
                    let tokens: Vec<String> = ngram.iter().map(ToString::to_string).collect();
                    write!(stderr, "{}\t", tokens.join(" "))?;
                }
                writeln!(stderr, "{log_prob}")?;
            }
        }

        loglik += out.sum();
    }

    println!("Test log-likelihood: {loglik}");
    Ok(())
}
