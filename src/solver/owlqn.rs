//! Orthant-wise limited-memory quasi-Newton (OWL-QN)
//!
//! Minimizes `f(x) + C * sum_{i < p} |x_i|` where `f` is smooth, `C` is
//! [`SolverConfig::l1_weight`] and `p` is [`DiffFunction::penalized_dimension`].
//! Search directions are computed from the pseudo-gradient and every trial
//! point is projected back onto the orthant of the current iterate.

use log::{debug, warn};

use crate::core::vector::{dot_unchecked, l2_norm, norm_pow};
use crate::core::{RermError, Result};
use crate::solver::lbfgs::{History, Step};
use crate::solver::{check_finite, gradient_converged, DiffFunction, Minimum, SolverConfig};

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;

/// Minimum-norm subgradient of the penalized objective
pub(crate) fn pseudo_gradient(x: &[f64], gradient: &[f64], c: f64, penalized: usize) -> Vec<f64> {
    x.iter()
        .zip(gradient)
        .enumerate()
        .map(|(i, (&xi, &gi))| {
            if i >= penalized || c == 0.0 {
                gi
            } else if xi < 0.0 {
                gi - c
            } else if xi > 0.0 {
                gi + c
            } else if gi + c < 0.0 {
                gi + c
            } else if gi - c > 0.0 {
                gi - c
            } else {
                0.0
            }
        })
        .collect()
}

fn penalty(x: &[f64], c: f64, penalized: usize) -> f64 {
    c * norm_pow(&x[..penalized], 1.0)
}

#[allow(clippy::too_many_arguments)]
fn projected_backtrack<F: DiffFunction + ?Sized>(
    f: &F,
    x: &[f64],
    value: f64,
    direction: &[f64],
    pseudo: &[f64],
    orthant: &[f64],
    c: f64,
    penalized: usize,
    initial: f64,
) -> Option<Step> {
    let mut t = initial;
    for _ in 0..MAX_BACKTRACKS {
        let mut candidate: Vec<f64> = x.iter().zip(direction).map(|(xi, di)| xi + t * di).collect();
        for i in 0..penalized {
            if candidate[i] * orthant[i] <= 0.0 {
                candidate[i] = 0.0;
            }
        }
        let (loss, gradient) = f.evaluate(&candidate);
        let new_value = loss + penalty(&candidate, c, penalized);
        let moved: f64 = pseudo
            .iter()
            .zip(candidate.iter().zip(x))
            .map(|(p, (a, b))| p * (a - b))
            .sum();
        if new_value.is_finite() && new_value <= value + ARMIJO * moved {
            return Some(Step {
                x: candidate,
                value: new_value,
                gradient,
            });
        }
        t *= 0.5;
    }
    None
}

/// Minimize `f` plus the L1 penalty starting from `x`
pub fn minimize<F: DiffFunction + ?Sized>(
    f: &F,
    mut x: Vec<f64>,
    config: &SolverConfig,
) -> Result<Minimum> {
    let c = config.l1_weight;
    if c < 0.0 || !c.is_finite() {
        return Err(RermError::InvalidParameter(format!(
            "L1 weight must be non-negative, got {c}"
        )));
    }
    let penalized = f.penalized_dimension().min(x.len());

    let (loss, mut gradient) = f.evaluate(&x);
    let mut value = loss + penalty(&x, c, penalized);
    check_finite(value, 0)?;
    let mut history = History::new(config.memory);

    for iteration in 0..config.max_iterations {
        let pseudo = pseudo_gradient(&x, &gradient, c, penalized);
        if gradient_converged(&pseudo, &x, config.grad_tolerance) {
            debug!("OWL-QN converged after {iteration} iterations, objective {value:.6e}");
            return Ok(Minimum {
                x,
                value,
                iterations: iteration,
                converged: true,
            });
        }

        let mut direction = history.direction(&pseudo);
        for (d, p) in direction.iter_mut().zip(&pseudo) {
            if *d * *p >= 0.0 {
                *d = 0.0;
            }
        }
        if dot_unchecked(&direction, &pseudo) >= 0.0 {
            history.clear();
            direction = pseudo.iter().map(|p| -p).collect();
        }

        let orthant: Vec<f64> = x
            .iter()
            .zip(&pseudo)
            .map(|(&xi, &pi)| {
                if xi != 0.0 {
                    xi.signum()
                } else if pi != 0.0 {
                    -pi.signum()
                } else {
                    0.0
                }
            })
            .collect();
        let initial = if history.is_empty() {
            (1.0 / l2_norm(&pseudo)).min(1.0)
        } else {
            1.0
        };

        let Some(step) = projected_backtrack(
            f, &x, value, &direction, &pseudo, &orthant, c, penalized, initial,
        ) else {
            warn!("OWL-QN line search failed at iteration {iteration}, objective {value:.6e}");
            return Ok(Minimum {
                x,
                value,
                iterations: iteration,
                converged: false,
            });
        };

        let s: Vec<f64> = step.x.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = step.gradient.iter().zip(&gradient).map(|(a, b)| a - b).collect();
        history.push(s, y);

        let decrease = value - step.value;
        x = step.x;
        value = step.value;
        gradient = step.gradient;
        check_finite(value, iteration + 1)?;
        debug!("OWL-QN iteration {}: objective {value:.6e}", iteration + 1);

        if decrease <= config.function_tolerance * value.abs().max(1.0) {
            return Ok(Minimum {
                x,
                value,
                iterations: iteration + 1,
                converged: true,
            });
        }
    }

    warn!(
        "OWL-QN reached the iteration cap of {} without converging",
        config.max_iterations
    );
    Ok(Minimum {
        x,
        value,
        iterations: config.max_iterations,
        converged: false,
    })
}
