//! Limited-memory BFGS with a backtracking Armijo line search

use std::collections::VecDeque;

use log::{debug, warn};

use crate::core::vector::{dot_unchecked, l2_norm};
use crate::core::Result;
use crate::solver::{check_finite, gradient_converged, DiffFunction, Minimum, SolverConfig};

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;

/// The most recent correction pairs `s = x' - x`, `y = g' - g`
#[derive(Debug)]
pub(crate) struct History {
    memory: usize,
    s: VecDeque<Vec<f64>>,
    y: VecDeque<Vec<f64>>,
    rho: VecDeque<f64>,
}

impl History {
    pub(crate) fn new(memory: usize) -> Self {
        let memory = memory.max(1);
        Self {
            memory,
            s: VecDeque::with_capacity(memory),
            y: VecDeque::with_capacity(memory),
            rho: VecDeque::with_capacity(memory),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.s.clear();
        self.y.clear();
        self.rho.clear();
    }

    /// Store a pair unless it violates the curvature condition
    pub(crate) fn push(&mut self, s: Vec<f64>, y: Vec<f64>) {
        let sy = dot_unchecked(&s, &y);
        if sy <= 1e-12 * l2_norm(&s) * l2_norm(&y) || sy <= 0.0 {
            return;
        }
        if self.s.len() == self.memory {
            self.s.pop_front();
            self.y.pop_front();
            self.rho.pop_front();
        }
        self.s.push_back(s);
        self.y.push_back(y);
        self.rho.push_back(1.0 / sy);
    }

    /// `-H g` by the two-loop recursion
    pub(crate) fn direction(&self, gradient: &[f64]) -> Vec<f64> {
        let k = self.s.len();
        let mut q = gradient.to_vec();
        let mut alpha = vec![0.0; k];

        for i in (0..k).rev() {
            alpha[i] = self.rho[i] * dot_unchecked(&self.s[i], &q);
            for (qj, yj) in q.iter_mut().zip(&self.y[i]) {
                *qj -= alpha[i] * yj;
            }
        }

        if let (Some(s), Some(y)) = (self.s.back(), self.y.back()) {
            let gamma = dot_unchecked(s, y) / dot_unchecked(y, y);
            q.iter_mut().for_each(|v| *v *= gamma);
        }

        for i in 0..k {
            let beta = self.rho[i] * dot_unchecked(&self.y[i], &q);
            for (qj, sj) in q.iter_mut().zip(&self.s[i]) {
                *qj += (alpha[i] - beta) * sj;
            }
        }

        q.iter_mut().for_each(|v| *v = -*v);
        q
    }
}

/// Accepted line-search point
pub(crate) struct Step {
    pub x: Vec<f64>,
    pub value: f64,
    pub gradient: Vec<f64>,
}

/// Halve the step from `initial` until the Armijo condition holds
fn backtrack<F: DiffFunction + ?Sized>(
    f: &F,
    x: &[f64],
    value: f64,
    direction: &[f64],
    slope: f64,
    initial: f64,
) -> Option<Step> {
    let mut t = initial;
    for _ in 0..MAX_BACKTRACKS {
        let candidate: Vec<f64> = x.iter().zip(direction).map(|(xi, di)| xi + t * di).collect();
        let (new_value, gradient) = f.evaluate(&candidate);
        if new_value.is_finite() && new_value <= value + ARMIJO * t * slope {
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

/// Minimize a smooth function starting from `x`
pub fn minimize<F: DiffFunction + ?Sized>(
    f: &F,
    mut x: Vec<f64>,
    config: &SolverConfig,
) -> Result<Minimum> {
    let (mut value, mut gradient) = f.evaluate(&x);
    check_finite(value, 0)?;
    let mut history = History::new(config.memory);

    for iteration in 0..config.max_iterations {
        if gradient_converged(&gradient, &x, config.grad_tolerance) {
            debug!("L-BFGS converged after {iteration} iterations, objective {value:.6e}");
            return Ok(Minimum {
                x,
                value,
                iterations: iteration,
                converged: true,
            });
        }

        let mut direction = history.direction(&gradient);
        let mut slope = dot_unchecked(&gradient, &direction);
        if slope >= 0.0 {
            history.clear();
            direction = gradient.iter().map(|g| -g).collect();
            slope = -dot_unchecked(&gradient, &gradient);
        }
        let initial = if history.is_empty() {
            (1.0 / l2_norm(&gradient)).min(1.0)
        } else {
            1.0
        };

        let Some(step) = backtrack(f, &x, value, &direction, slope, initial) else {
            warn!("L-BFGS line search failed at iteration {iteration}, objective {value:.6e}");
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
        debug!("L-BFGS iteration {}: objective {value:.6e}", iteration + 1);

        if decrease <= config.function_tolerance * value.abs().max(1.0) {
            debug!("L-BFGS stalled after {} iterations", iteration + 1);
            return Ok(Minimum {
                x,
                value,
                iterations: iteration + 1,
                converged: true,
            });
        }
    }

    warn!(
        "L-BFGS reached the iteration cap of {} without converging",
        config.max_iterations
    );
    Ok(Minimum {
        x,
        value,
        iterations: config.max_iterations,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::test_functions::{Quadratic, Rosenbrock};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quadratic_minimum() {
        let f = Quadratic {
            target: vec![1.0, -2.0, 3.5],
            scale: vec![1.0, 10.0, 0.1],
        };
        let config = SolverConfig {
            grad_tolerance: 1e-10,
            ..Default::default()
        };
        let min = minimize(&f, vec![0.0; 3], &config).unwrap();
        assert!(min.converged);
        for (x, t) in min.x.iter().zip(&f.target) {
            assert_abs_diff_eq!(x, t, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rosenbrock() {
        let config = SolverConfig {
            grad_tolerance: 1e-8,
            ..Default::default()
        };
        let min = minimize(&Rosenbrock, vec![-1.2, 1.0], &config).unwrap();
        assert_abs_diff_eq!(min.x[0], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(min.x[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_iteration_cap() {
        let config = SolverConfig {
            grad_tolerance: 0.0,
            function_tolerance: 0.0,
            max_iterations: 3,
            ..Default::default()
        };
        let min = minimize(&Rosenbrock, vec![-1.2, 1.0], &config).unwrap();
        assert!(!min.converged);
        assert!(min.iterations <= 3);
    }

    #[test]
    fn test_two_loop_without_history_is_steepest_descent() {
        let history = History::new(3);
        assert_eq!(history.direction(&[1.0, -2.0]), vec![-1.0, 2.0]);
    }
}
