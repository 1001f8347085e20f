use std::{error::Error, fmt, io, path::PathBuf};

use model::ModelErr;

/// The scorer module's result type.
pub type Result<T> = std::result::Result<T, ScoreErr>;

/// Scoring failures.
#[derive(Debug)]
pub enum ScoreErr {
    Model(ModelErr),
    Io(io::Error),
    Open {
        path: PathBuf,
        source: io::Error,
    },
    NotConfigured,
    WidthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    TokenOutOfRange {
        token: usize,
        vocab: usize,
    },
    EmptyPrefix,
    NoLookups,
    Data {
        line: usize,
        msg: String,
    },
}

impl fmt::Display for ScoreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreErr::Model(e) => write!(f, "model error: {e}"),
            ScoreErr::Io(e) => write!(f, "io error: {e}"),
            ScoreErr::Open { path, source } => {
                write!(f, "could not open {}: {source}", path.display())
            }
            ScoreErr::NotConfigured => write!(f, "no model has been configured"),
            ScoreErr::WidthMismatch {
                what,
                got,
                expected,
            } => write!(f, "width mismatch for {what}: got {got}, expected {expected}"),
            ScoreErr::TokenOutOfRange { token, vocab } => {
                write!(f, "token {token} out of range for a vocabulary of {vocab}")
            }
            ScoreErr::EmptyPrefix => write!(f, "cannot assemble an n-gram from no tokens"),
            ScoreErr::NoLookups => write!(f, "no cache lookups have been made"),
            ScoreErr::Data { line, msg } => write!(f, "bad data at line {line}: {msg}"),
        }
    }
}

impl Error for ScoreErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScoreErr::Model(e) => Some(e),
            ScoreErr::Io(e) => Some(e),
            ScoreErr::Open { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ModelErr> for ScoreErr {
    fn from(value: ModelErr) -> Self {
        Self::Model(value)
    }
}

impl From<io::Error> for ScoreErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
