//! Auxiliary per-parameter state consumed by the training path.
//!
//! Scoring never reads any of this, but layers allocate it when they are initialized so a freshly
//! initialized model is ready to be trained.

use std::{fmt, str::FromStr};

use ndarray::{Array, Dimension};

use crate::ModelErr;

/// The update rule the trainer will apply to the parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamUpdate {
    #[default]
    Sgd,
    Adagrad,
    Adadelta,
}

impl FromStr for ParamUpdate {
    type Err = ModelErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SGD" => Ok(Self::Sgd),
            "ADA" => Ok(Self::Adagrad),
            "ADAD" => Ok(Self::Adadelta),
            other => Err(ModelErr::UnknownUpdateMode(other.to_string())),
        }
    }
}

impl fmt::Display for ParamUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sgd => "SGD",
            Self::Adagrad => "ADA",
            Self::Adadelta => "ADAD",
        };

        f.write_str(s)
    }
}

/// The running statistics an update rule keeps for one parameter array.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateState<D: Dimension> {
    None,
    Adagrad {
        running_gradient: Array<f64, D>,
    },
    Adadelta {
        running_gradient: Array<f64, D>,
        running_update: Array<f64, D>,
    },
}

impl<D: Dimension> UpdateState<D> {
    /// Allocates the state `update` needs for a parameter array of shape `dim`.
    ///
    /// # Arguments
    /// * `update` - The update rule.
    /// * `dim` - The shape of the parameter array.
    /// * `epsilon` - The value adagrad's running squared gradient starts at.
    pub fn allocate(update: ParamUpdate, dim: D, epsilon: f64) -> Self {
        match update {
            ParamUpdate::Sgd => Self::None,
            ParamUpdate::Adagrad => Self::Adagrad {
                running_gradient: Array::from_elem(dim, epsilon),
            },
            ParamUpdate::Adadelta => Self::Adadelta {
                running_gradient: Array::zeros(dim.clone()),
                running_update: Array::zeros(dim),
            },
        }
    }
}
