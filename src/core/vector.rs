//! Dense vector algebra over `f64` slices
//!
//! Every binary operation checks lengths and fails with
//! [`RermError::DimensionMismatch`] instead of truncating.

use crate::core::{RermError, Result};

fn check_len(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(RermError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Dot product of two equally sized vectors
pub fn dot(a: &[f64], b: &[f64]) -> Result<f64> {
    check_len(a, b)?;
    Ok(dot_unchecked(a, b))
}

#[inline]
pub(crate) fn dot_unchecked(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Sum of `|x|^p` over all elements (no root is taken)
pub fn norm_pow(a: &[f64], p: f64) -> f64 {
    if p == 2.0 {
        return a.iter().map(|x| x * x).sum();
    }
    if p == 1.0 {
        return a.iter().map(|x| x.abs()).sum();
    }
    a.iter().map(|x| x.abs().powf(p)).sum()
}

/// Euclidean norm
pub fn l2_norm(a: &[f64]) -> f64 {
    norm_pow(a, 2.0).sqrt()
}

/// Squared euclidean distance
pub fn squared_distance(a: &[f64], b: &[f64]) -> Result<f64> {
    check_len(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum())
}

/// `y += alpha * x`
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) -> Result<()> {
    check_len(x, y)?;
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
    Ok(())
}

/// Elementwise product
pub fn hadamard(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    check_len(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x * y).collect())
}

/// Elementwise sum
pub fn add(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    check_len(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x + y).collect())
}

/// Elementwise difference
pub fn sub(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    check_len(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x - y).collect())
}

/// Multiplies every element by `factor`
pub fn scale(a: &mut [f64], factor: f64) {
    a.iter_mut().for_each(|x| *x *= factor);
}

/// Divides every element by `divisor`, failing on zero
pub fn divide(a: &mut [f64], divisor: f64) -> Result<()> {
    if divisor == 0.0 {
        return Err(RermError::NumericalFailure("division by zero".to_string()));
    }
    scale(a, 1.0 / divisor);
    Ok(())
}

/// Elementwise division where a zero divisor leaves the element untouched
pub fn divide_unless_zero(a: &mut [f64], divisors: &[f64]) -> Result<()> {
    check_len(a, divisors)?;
    for (x, &d) in a.iter_mut().zip(divisors) {
        if d != 0.0 {
            *x /= d;
        }
    }
    Ok(())
}

/// Removes the given positions, which must be sorted ascending and in range
pub fn delete_indices<T: Clone>(values: &[T], sorted: &[usize]) -> Result<Vec<T>> {
    validate_indices(values.len(), sorted)?;
    let mut out = Vec::with_capacity(values.len() - sorted.len());
    let mut next = sorted.iter().peekable();
    for (i, v) in values.iter().enumerate() {
        if next.peek() == Some(&&i) {
            next.next();
        } else {
            out.push(v.clone());
        }
    }
    Ok(out)
}

/// Keeps only the given positions, which must be sorted ascending and in range
pub fn keep_indices<T: Clone>(values: &[T], sorted: &[usize]) -> Result<Vec<T>> {
    validate_indices(values.len(), sorted)?;
    Ok(sorted.iter().map(|&i| values[i].clone()).collect())
}

fn validate_indices(len: usize, sorted: &[usize]) -> Result<()> {
    if sorted.windows(2).any(|w| w[0] >= w[1]) {
        return Err(RermError::InvalidParameter(
            "indices must be strictly ascending".to_string(),
        ));
    }
    if let Some(&last) = sorted.last() {
        if last >= len {
            return Err(RermError::InvalidParameter(format!(
                "index {last} out of range for length {len}"
            )));
        }
    }
    Ok(())
}

/// Positions of the `k` smallest values, ties broken by position
pub fn min_indices(values: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
    order.truncate(k);
    order
}

pub fn mean(a: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter().sum::<f64>() / a.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(a: &[f64]) -> f64 {
    if a.len() < 2 {
        return 0.0;
    }
    let m = mean(a);
    (a.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (a.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dot_and_norms() {
        let a = [3.0, 4.0];
        let b = [1.0, 2.0];
        assert_eq!(dot(&a, &b).unwrap(), 11.0);
        assert_eq!(norm_pow(&a, 2.0), 25.0);
        assert_eq!(norm_pow(&[-1.0, 2.0], 1.0), 3.0);
        assert_relative_eq!(l2_norm(&a), 5.0);
        assert_eq!(squared_distance(&a, &b).unwrap(), 8.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = dot(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            RermError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_delete_and_keep() {
        let v = [10.0, 11.0, 12.0, 13.0];
        assert_eq!(delete_indices(&v, &[1, 3]).unwrap(), vec![10.0, 12.0]);
        assert_eq!(keep_indices(&v, &[1, 3]).unwrap(), vec![11.0, 13.0]);
        assert!(delete_indices(&v, &[3, 1]).is_err());
        assert!(keep_indices(&v, &[4]).is_err());
    }

    #[test]
    fn test_min_indices() {
        let v = [0.5, -1.0, 0.5, 2.0];
        assert_eq!(min_indices(&v, 2), vec![1, 0]);
        assert_eq!(min_indices(&v, 10).len(), 4);
    }

    #[test]
    fn test_divide_variants() {
        let mut v = vec![2.0, 4.0];
        assert!(divide(&mut v, 0.0).is_err());
        divide(&mut v, 2.0).unwrap();
        assert_eq!(v, vec![1.0, 2.0]);

        let mut w = vec![2.0, 4.0];
        divide_unless_zero(&mut w, &[0.0, 2.0]).unwrap();
        assert_eq!(w, vec![2.0, 2.0]);
    }

    #[test]
    fn test_stats() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(mean(&v), 2.5);
        assert_relative_eq!(std_dev(&v), (5.0f64 / 3.0).sqrt());
    }
}
