use std::{env, error::Error, fmt, path::PathBuf, str::FromStr};

const DEFAULT_MINIBATCH_SIZE: usize = 64;

/// A configuration variable that is missing or does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErr {
    Missing(&'static str),
    Invalid { var: &'static str, value: String },
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErr::Missing(var) => write!(f, "{var} is not set"),
            ConfigErr::Invalid { var, value } => write!(f, "invalid value for {var}: {value:?}"),
        }
    }
}

impl Error for ConfigErr {}

/// Settings of an evaluation run of the `scorer` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    pub model_file: PathBuf,
    pub test_file: PathBuf,
    pub minibatch_size: usize,
    /// Zero leaves the size of rayon's pool up to rayon.
    pub num_threads: usize,
    pub premultiply: bool,
    pub unnormalized: bool,
    /// 1 prints each n-gram's score, 2 prints the n-gram along with it.
    pub debug: u8,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl EvalConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigErr> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigErr>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| lookup(var).ok_or(ConfigErr::Missing(var));

        let parsed = |var: &'static str, default| -> Result<_, ConfigErr> {
            match lookup(var) {
                None => Ok(default),
                Some(value) => usize::from_str(value.trim())
                    .map_err(|_| ConfigErr::Invalid { var, value }),
            }
        };

        let flag = |var: &'static str| -> Result<bool, ConfigErr> {
            match lookup(var) {
                None => Ok(false),
                Some(value) => {
                    parse_bool(value.trim()).ok_or(ConfigErr::Invalid { var, value })
                }
            }
        };

        let minibatch_size = parsed("MINIBATCH_SIZE", DEFAULT_MINIBATCH_SIZE)?;
        if minibatch_size == 0 {
            return Err(ConfigErr::Invalid {
                var: "MINIBATCH_SIZE",
                value: "0".to_string(),
            });
        }

        let debug = match parsed("DEBUG", 0)? {
            level @ 0..=2 => level as u8,
            level => {
                return Err(ConfigErr::Invalid {
                    var: "DEBUG",
                    value: level.to_string(),
                });
            }
        };

        Ok(Self {
            model_file: required("MODEL_FILE")?.into(),
            test_file: required("TEST_FILE")?.into(),
            minibatch_size,
            num_threads: parsed("NUM_THREADS", 0)?,
            premultiply: flag("PREMULTIPLY")?,
            unnormalized: flag("UNNORMALIZED")?,
            debug,
        })
    }
}
