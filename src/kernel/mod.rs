//! Kernel functions for the dual learners

pub mod gram;
pub mod linear;
pub mod polynomial;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{RermError, Result};

pub use self::gram::GramMatrix;
pub use self::linear::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

/// Serializable kernel selection, with the legacy numeric ids
/// 0 linear, 1 rbf, 2 sigmoid, 3 polynomial
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum KernelKind {
    #[default]
    Linear,
    Rbf { sigma: f64 },
    Sigmoid { factor: f64, offset: f64 },
    Polynomial { degree: u32, factor: f64, offset: f64 },
}

impl KernelKind {
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(KernelKind::Linear),
            1 => Ok(KernelKind::Rbf { sigma: 1.0 }),
            2 => Ok(KernelKind::Sigmoid {
                factor: 1.0,
                offset: 0.0,
            }),
            3 => Ok(KernelKind::Polynomial {
                degree: 2,
                factor: 1.0,
                offset: 1.0,
            }),
            _ => Err(RermError::InvalidParameter(format!("unknown kernel id {id}"))),
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            KernelKind::Linear => 0,
            KernelKind::Rbf { .. } => 1,
            KernelKind::Sigmoid { .. } => 2,
            KernelKind::Polynomial { .. } => 3,
        }
    }

    /// RBF selection from `gamma`, stored as the width `sigma = sqrt(1 / (2 gamma))`
    pub fn rbf_from_gamma(gamma: f64) -> Result<Self> {
        if !(gamma > 0.0) || !gamma.is_finite() {
            return Err(RermError::InvalidParameter(format!(
                "rbf gamma must be positive, got {gamma}"
            )));
        }
        Ok(KernelKind::Rbf {
            sigma: (1.0 / (2.0 * gamma)).sqrt(),
        })
    }

    /// Validate the parameters and instantiate the kernel
    pub fn build(&self) -> Result<Arc<dyn Kernel>> {
        match *self {
            KernelKind::Linear => Ok(Arc::new(LinearKernel::new())),
            KernelKind::Rbf { sigma } => {
                if !(sigma > 0.0) || !sigma.is_finite() {
                    return Err(RermError::InvalidParameter(format!(
                        "rbf sigma must be positive, got {sigma}"
                    )));
                }
                Ok(Arc::new(RBFKernel::from_sigma(sigma)))
            }
            KernelKind::Sigmoid { factor, offset } => {
                if !(factor > 0.0) || !factor.is_finite() {
                    return Err(RermError::InvalidParameter(format!(
                        "sigmoid factor must be positive, got {factor}"
                    )));
                }
                Ok(Arc::new(SigmoidKernel::new(factor, offset)))
            }
            KernelKind::Polynomial {
                degree,
                factor,
                offset,
            } => {
                if degree == 0 {
                    return Err(RermError::InvalidParameter(
                        "polynomial degree must be positive".to_string(),
                    ));
                }
                Ok(Arc::new(PolynomialKernel::new(degree, factor, offset)))
            }
        }
    }
}

impl FromStr for KernelKind {
    type Err = RermError;

    /// Accepts a kernel name or its numeric id; parameters take their defaults
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(id) = s.trim().parse::<u32>() {
            return Self::from_id(id);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Self::from_id(0),
            "rbf" | "gaussian" => Self::from_id(1),
            "sigmoid" | "tanh" => Self::from_id(2),
            "poly" | "polynomial" => Self::from_id(3),
            other => Err(RermError::InvalidParameter(format!("unknown kernel '{other}'"))),
        }
    }
}
