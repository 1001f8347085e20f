use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// The result type used in the entire model module.
pub type Result<T> = std::result::Result<T, ModelErr>;

/// The model module's error type.
#[derive(Debug)]
pub enum ModelErr {
    Io(io::Error),
    Open {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        line: usize,
        msg: String,
    },
    VersionMismatch {
        expected: u32,
        found: u32,
    },
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    UnknownActivation(String),
    UnknownUpdateMode(String),
    MissingConfig(&'static str),
    Premultiplied,
    InvalidInit(String),
}

impl Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::Io(e) => write!(f, "io error: {e}"),
            ModelErr::Open { path, source } => {
                write!(f, "could not open file {}: {source}", path.display())
            }
            ModelErr::Parse { line, msg } => write!(f, "parse error at line {line}: {msg}"),
            ModelErr::VersionMismatch { expected, found } => write!(
                f,
                "file format mismatch (expected {expected}, found {found})"
            ),
            ModelErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got}, expected {expected}"
            ),
            ModelErr::UnknownActivation(name) => write!(f, "unknown activation function: {name}"),
            ModelErr::UnknownUpdateMode(name) => {
                write!(f, "unknown parameter update mode: {name}")
            }
            ModelErr::MissingConfig(key) => write!(f, "missing config field: {key}"),
            ModelErr::Premultiplied => {
                write!(f, "the model is premultiplied, its embedding table is gone")
            }
            ModelErr::InvalidInit(msg) => write!(f, "invalid initialization: {msg}"),
        }
    }
}

impl Error for ModelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelErr::Io(e) => Some(e),
            ModelErr::Open { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rand_distr::NormalError> for ModelErr {
    fn from(value: rand_distr::NormalError) -> Self {
        Self::InvalidInit(value.to_string())
    }
}

impl From<rand_distr::uniform::Error> for ModelErr {
    fn from(value: rand_distr::uniform::Error) -> Self {
        Self::InvalidInit(value.to_string())
    }
}
