use ::core::fmt::Display;
use ::std::str::FromStr;

use ::anyhow::anyhow;
use ::serde::{Deserialize, Serialize};

use crate::error::OpalError;

/// The closed set of computations a compute node can be asked to run.
///
/// Requests carry the operation as a string; it is parsed into this enum
/// once at ingress, so an unknown name is a validation error and never a
/// runtime dispatch failure.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Multiply,
    Mean,
    Sum,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Multiply => write!(f, "multiply"),
            Self::Mean => write!(f, "mean"),
            Self::Sum => write!(f, "sum"),
        }
    }
}

impl FromStr for Operation {
    type Err = OpalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "multiply" => Ok(Self::Multiply),
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            other => Err(OpalError::illegal_argument(anyhow!(
                "Unsupported operation: {}",
                other
            ))),
        }
    }
}
