use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use log::info;
use ndarray::Array2;

use crate::{Result, ScoreErr};

/// Reads numberized n-grams, one per line as whitespace separated token indices.
///
/// Blank lines are skipped.
///
/// # Returns
/// A `(ngram_size, count)` matrix with one n-gram per column, or an error naming the first line
/// that does not hold exactly `ngram_size` indices.
pub fn read_ngrams<R: BufRead>(reader: R, ngram_size: usize) -> Result<Array2<usize>> {
    let mut tokens = Vec::new();
    let mut count = 0;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let before = tokens.len();
        for field in line.split_whitespace() {
            let token = field.parse::<usize>().map_err(|e| ScoreErr::Data {
                line: i + 1,
                msg: format!("bad token {field:?}: {e}"),
            })?;
            tokens.push(token);
        }

        let found = tokens.len() - before;
        if found != ngram_size {
            return Err(ScoreErr::Data {
                line: i + 1,
                msg: format!("expected {ngram_size} tokens, found {found}"),
            });
        }

        count += 1;
    }

    // Rows are read n-gram by n-gram, so the buffer is laid out one n-gram per row.
    let by_row = Array2::from_shape_vec((count, ngram_size), tokens).map_err(|e| {
        ScoreErr::Data {
            line: 0,
            msg: e.to_string(),
        }
    })?;

    Ok(by_row.reversed_axes().as_standard_layout().into_owned())
}

/// Reads a numberized n-gram file.
pub fn read_ngram_file<P: AsRef<Path>>(path: P, ngram_size: usize) -> Result<Array2<usize>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ScoreErr::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let ngrams = read_ngrams(BufReader::new(file), ngram_size)?;
    info!("read {} n-grams from {}", ngrams.ncols(), path.display());
    Ok(ngrams)
}
