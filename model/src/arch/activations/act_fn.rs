use std::{fmt, str::FromStr};

use crate::ModelErr;

/// The nonlinearity applied after each hidden linear stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActFn {
    Identity,
    #[default]
    Rectifier,
    Tanh,
    HardTanh,
}
use ActFn::*;

impl ActFn {
    pub fn f(&self, x: f64) -> f64 {
        match self {
            Identity => x,
            Rectifier => x.max(0.),
            Tanh => x.tanh(),
            HardTanh => x.clamp(-1., 1.),
        }
    }

    /// The name used for this function in model files.
    pub fn name(&self) -> &'static str {
        match self {
            Identity => "identity",
            Rectifier => "rectifier",
            Tanh => "tanh",
            HardTanh => "hardtanh",
        }
    }
}

impl fmt::Display for ActFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActFn {
    type Err = ModelErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(Identity),
            "rectifier" => Ok(Rectifier),
            "tanh" => Ok(Tanh),
            "hardtanh" => Ok(HardTanh),
            other => Err(ModelErr::UnknownActivation(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectifier_clips_negatives() {
        assert_eq!(Rectifier.f(-2.5), 0.);
        assert_eq!(Rectifier.f(1.5), 1.5);
    }

    #[test]
    fn hardtanh_saturates() {
        assert_eq!(HardTanh.f(3.), 1.);
        assert_eq!(HardTanh.f(-3.), -1.);
        assert_eq!(HardTanh.f(0.25), 0.25);
    }

    #[test]
    fn names_round_trip() {
        for act_fn in [Identity, Rectifier, Tanh, HardTanh] {
            assert_eq!(act_fn.name().parse::<ActFn>().unwrap(), act_fn);
        }
    }

    #[test]
    fn unknown_name() {
        assert!(matches!(
            "sigmoid".parse::<ActFn>(),
            Err(ModelErr::UnknownActivation(name)) if name == "sigmoid"
        ));
    }
}
