//! Resilient propagation: sign-based steps with per-coordinate adaptive sizes

use log::{debug, warn};

use crate::core::Result;
use crate::solver::{check_finite, gradient_converged, DiffFunction, Minimum, SolverConfig};

/// Reaction to a gradient sign change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpropVariant {
    /// Shrink the step and skip the update of that coordinate (iRprop-)
    Minus,
    /// Shrink the step and revert the previous update if the error grew (iRprop+)
    Plus,
}

/// Per-coordinate Rprop state
#[derive(Debug, Clone)]
pub struct Rprop {
    variant: RpropVariant,
    steps: Vec<f64>,
    previous_gradient: Vec<f64>,
    previous_update: Vec<f64>,
    previous_error: f64,
    increase: f64,
    decrease: f64,
    max_step: f64,
    min_step: f64,
}

impl Rprop {
    pub fn new(dimension: usize, variant: RpropVariant, config: &SolverConfig) -> Self {
        Self {
            variant,
            steps: vec![config.initial_step; dimension],
            previous_gradient: vec![0.0; dimension],
            previous_update: vec![0.0; dimension],
            previous_error: f64::INFINITY,
            increase: config.step_increase,
            decrease: config.step_decrease,
            max_step: config.max_step,
            min_step: config.min_step,
        }
    }

    /// Apply one update to `x` given the error and gradient evaluated there
    pub fn step(&mut self, x: &mut [f64], error: f64, gradient: &[f64]) {
        let error_grew = error > self.previous_error;
        for i in 0..x.len() {
            let g = gradient[i];
            let agreement = self.previous_gradient[i] * g;

            if agreement > 0.0 {
                self.steps[i] = (self.steps[i] * self.increase).min(self.max_step);
            } else if agreement < 0.0 {
                self.steps[i] = (self.steps[i] * self.decrease).max(self.min_step);
                if self.variant == RpropVariant::Plus && error_grew {
                    x[i] -= self.previous_update[i];
                }
                self.previous_update[i] = 0.0;
                self.previous_gradient[i] = 0.0;
                continue;
            }

            let update = -sign(g) * self.steps[i];
            x[i] += update;
            self.previous_update[i] = update;
            self.previous_gradient[i] = g;
        }
        self.previous_error = error;
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Iterate Rprop until the relative gradient norm falls below the tolerance
pub fn minimize<F: DiffFunction + ?Sized>(
    f: &F,
    mut x: Vec<f64>,
    config: &SolverConfig,
    variant: RpropVariant,
) -> Result<Minimum> {
    let mut rprop = Rprop::new(x.len(), variant, config);

    for iteration in 0..config.max_iterations {
        let (value, gradient) = f.evaluate(&x);
        check_finite(value, iteration)?;
        if gradient_converged(&gradient, &x, config.grad_tolerance) {
            debug!("Rprop converged after {iteration} iterations, objective {value:.6e}");
            return Ok(Minimum {
                x,
                value,
                iterations: iteration,
                converged: true,
            });
        }
        rprop.step(&mut x, value, &gradient);
        if iteration % 100 == 0 {
            debug!("Rprop iteration {iteration}: objective {value:.6e}");
        }
    }

    let (value, _) = f.evaluate(&x);
    warn!(
        "Rprop reached the iteration cap of {} without converging",
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
    use crate::solver::test_functions::Quadratic;
    use approx::assert_abs_diff_eq;

    fn quadratic() -> Quadratic {
        Quadratic {
            target: vec![3.0, -1.0, 0.25],
            scale: vec![1.0, 4.0, 0.5],
        }
    }

    #[test]
    fn test_rprop_minus_converges() {
        let config = SolverConfig {
            grad_tolerance: 1e-7,
            ..Default::default()
        };
        let min = minimize(&quadratic(), vec![0.0; 3], &config, RpropVariant::Minus).unwrap();
        assert!(min.converged);
        for (x, t) in min.x.iter().zip(&[3.0, -1.0, 0.25]) {
            assert_abs_diff_eq!(x, t, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rprop_plus_converges() {
        let config = SolverConfig {
            grad_tolerance: 1e-7,
            ..Default::default()
        };
        let min = minimize(&quadratic(), vec![0.0; 3], &config, RpropVariant::Plus).unwrap();
        assert!(min.converged);
        for (x, t) in min.x.iter().zip(&[3.0, -1.0, 0.25]) {
            assert_abs_diff_eq!(x, t, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_step_sizes_grow_and_shrink() {
        let config = SolverConfig::default();
        let mut rprop = Rprop::new(1, RpropVariant::Minus, &config);
        let mut x = vec![0.0];

        rprop.step(&mut x, 1.0, &[1.0]);
        assert_abs_diff_eq!(x[0], -0.001);
        rprop.step(&mut x, 0.9, &[1.0]);
        assert_abs_diff_eq!(x[0], -0.001 - 0.0012, epsilon = 1e-15);

        // sign flip: step shrinks and this coordinate is left alone
        rprop.step(&mut x, 0.8, &[-1.0]);
        assert_abs_diff_eq!(x[0], -0.0022, epsilon = 1e-15);
        assert_abs_diff_eq!(rprop.steps[0], 0.0006, epsilon = 1e-15);
    }

    #[test]
    fn test_plus_variant_reverts_on_error_increase() {
        let config = SolverConfig::default();
        let mut rprop = Rprop::new(1, RpropVariant::Plus, &config);
        let mut x = vec![0.0];
        rprop.step(&mut x, 1.0, &[1.0]);
        rprop.step(&mut x, 2.0, &[-1.0]);
        assert_abs_diff_eq!(x[0], 0.0, epsilon = 1e-15);
    }
}
