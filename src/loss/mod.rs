//! Pluggable per-point loss functions
//!
//! A loss is evaluated as `g(prediction, target, point)`; margin-based losses
//! additionally read the point's group. Every loss also provides its
//! derivative with respect to the prediction.

pub mod margin;
pub mod regression;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Datapoint, RermError, Result};

pub use self::margin::*;
pub use self::regression::*;

pub trait LossFunction: Send + Sync + fmt::Debug {
    fn loss(&self, prediction: f64, target: f64, point: &Datapoint) -> f64;

    /// Derivative of [`LossFunction::loss`] with respect to the prediction
    fn derivative(&self, prediction: f64, target: f64, point: &Datapoint) -> f64;

    /// Serializable description of this loss
    fn kind(&self) -> LossKind;
}

/// Serializable loss selection.
///
/// Numeric ids: 0 hard step, 1 BNLL, 2 sigmoidal, 3 smooth hinge,
/// 4 squared error, 5 Lorentzian, 6 sided quadratic, 7 sided Lorentzian,
/// 8 logistic regression, 9 log-loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LossKind {
    HardStep { threshold: f64 },
    Bnll,
    Sigmoidal { sigma: f64 },
    SmoothHinge,
    SquaredError,
    Lorentzian,
    SidedQuadratic,
    SidedLorentzian,
    LogisticRegression,
    LogLoss { eps: f64 },
}

impl LossKind {
    pub fn from_id(id: u32) -> Result<Self> {
        Ok(match id {
            0 => LossKind::HardStep { threshold: 0.0 },
            1 => LossKind::Bnll,
            2 => LossKind::Sigmoidal { sigma: 1.0 },
            3 => LossKind::SmoothHinge,
            4 => LossKind::SquaredError,
            5 => LossKind::Lorentzian,
            6 => LossKind::SidedQuadratic,
            7 => LossKind::SidedLorentzian,
            8 => LossKind::LogisticRegression,
            9 => LossKind::LogLoss { eps: 1e-5 },
            _ => {
                return Err(RermError::InvalidParameter(format!(
                    "unknown loss function id {id}"
                )))
            }
        })
    }

    pub fn id(&self) -> u32 {
        match self {
            LossKind::HardStep { .. } => 0,
            LossKind::Bnll => 1,
            LossKind::Sigmoidal { .. } => 2,
            LossKind::SmoothHinge => 3,
            LossKind::SquaredError => 4,
            LossKind::Lorentzian => 5,
            LossKind::SidedQuadratic => 6,
            LossKind::SidedLorentzian => 7,
            LossKind::LogisticRegression => 8,
            LossKind::LogLoss { .. } => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LossKind::HardStep { .. } => "hard_step",
            LossKind::Bnll => "bnll",
            LossKind::Sigmoidal { .. } => "sigmoidal",
            LossKind::SmoothHinge => "smooth_hinge",
            LossKind::SquaredError => "squared_error",
            LossKind::Lorentzian => "lorentzian",
            LossKind::SidedQuadratic => "sided_quadratic",
            LossKind::SidedLorentzian => "sided_lorentzian",
            LossKind::LogisticRegression => "logistic",
            LossKind::LogLoss { .. } => "log_loss",
        }
    }

    /// Validate the parameters and instantiate the loss
    pub fn build(&self) -> Result<Arc<dyn LossFunction>> {
        Ok(match *self {
            LossKind::HardStep { threshold } => Arc::new(HardStep::new(threshold)),
            LossKind::Bnll => Arc::new(Bnll),
            LossKind::Sigmoidal { sigma } => {
                if !(sigma > 0.0) || !sigma.is_finite() {
                    return Err(RermError::InvalidParameter(format!(
                        "sigmoidal slope must be positive, got {sigma}"
                    )));
                }
                Arc::new(Sigmoidal::new(sigma))
            }
            LossKind::SmoothHinge => Arc::new(SmoothHinge),
            LossKind::SquaredError => Arc::new(SquaredError),
            LossKind::Lorentzian => Arc::new(Lorentzian),
            LossKind::SidedQuadratic => Arc::new(SidedQuadratic),
            LossKind::SidedLorentzian => Arc::new(SidedLorentzian),
            LossKind::LogisticRegression => Arc::new(LogisticRegression),
            LossKind::LogLoss { eps } => {
                if !(eps > 0.0 && eps < 0.5) {
                    return Err(RermError::InvalidParameter(format!(
                        "log-loss eps must lie in (0, 0.5), got {eps}"
                    )));
                }
                Arc::new(LogLoss::new(eps))
            }
        })
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LossKind {
    type Err = RermError;

    /// Accepts a loss name or its numeric id; parameters take their defaults
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u32>() {
            return Self::from_id(id);
        }
        let wanted = s.to_ascii_lowercase().replace('-', "_");
        let alias = match wanted.as_str() {
            "mse" => "squared_error",
            "logistic_regression" => "logistic",
            other => other,
        };
        (0..10)
            .filter_map(|id| Self::from_id(id).ok())
            .find(|kind| kind.name() == alias)
            .ok_or_else(|| RermError::InvalidParameter(format!("unknown loss function '{s}'")))
    }
}
