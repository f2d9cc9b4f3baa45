//! Covariance from an information (curvature) matrix.

use nalgebra::DMatrix;

/// Inverse of an information matrix.
#[derive(Debug, Clone)]
pub struct Inverse {
    /// Covariance matrix.
    pub covariance: DMatrix<f64>,
    /// Diagonal shift that had to be added before the matrix factorised (0 when exact).
    pub damping: f64,
}

impl Inverse {
    /// True when no damping was needed.
    pub fn is_exact(&self) -> bool {
        self.damping == 0.0
    }

    /// Square roots of the covariance diagonal.
    pub fn standard_errors(&self) -> Vec<f64> {
        self.covariance.diagonal().iter().map(|v| v.sqrt()).collect()
    }

    /// Row-major copy of the covariance.
    pub fn row_major(&self) -> Vec<f64> {
        self.covariance.transpose().as_slice().to_vec()
    }
}

/// Invert a symmetric information matrix.
///
/// Cholesky is tried first; on failure the diagonal is shifted by a growing multiple of
/// its largest element (1e-9 up to 1e-1), then LU is the last resort. Returns `None`
/// when no inverse with finite positive variances exists. A zero pivot counts as a
/// failed factorisation.
pub fn invert_information(matrix: &DMatrix<f64>) -> Option<Inverse> {
    let n = matrix.nrows();
    if n == 0 || n != matrix.ncols() || matrix.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let identity = DMatrix::<f64>::identity(n, n);
    let scale = matrix.diagonal().iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));

    let mut shifted = matrix.clone();
    let mut damping = 0.0_f64;
    const ATTEMPTS: usize = 10;
    for attempt in 0..ATTEMPTS {
        if let Some(chol) = shifted.clone().cholesky() {
            let covariance = chol.solve(&identity);
            if has_positive_variances(&covariance) {
                return Some(Inverse { covariance, damping });
            }
        }
        if attempt + 1 == ATTEMPTS {
            break;
        }
        let next = if damping == 0.0 { scale * 1e-9 } else { damping * 10.0 };
        for i in 0..n {
            shifted[(i, i)] += next - damping;
        }
        damping = next;
    }

    let covariance = shifted.lu().try_inverse()?;
    has_positive_variances(&covariance).then_some(Inverse { covariance, damping })
}

fn has_positive_variances(covariance: &DMatrix<f64>) -> bool {
    covariance.diagonal().iter().all(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_inverse() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let inv = invert_information(&m).unwrap();
        assert!(inv.is_exact());
        // det = 8
        assert_relative_eq!(inv.covariance[(0, 0)], 3.0 / 8.0, epsilon = 1e-12);
        assert_relative_eq!(inv.covariance[(0, 1)], -2.0 / 8.0, epsilon = 1e-12);
        assert_relative_eq!(inv.covariance[(1, 1)], 4.0 / 8.0, epsilon = 1e-12);
        assert_relative_eq!(inv.standard_errors()[1], 0.5_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(inv.row_major().len(), 4);
    }

    #[test]
    fn test_singular_needs_damping() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let inv = invert_information(&m).unwrap();
        assert!(!inv.is_exact());
    }

    #[test]
    fn test_indefinite_rejected() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(invert_information(&m).is_none());
        assert!(invert_information(&DMatrix::from_element(2, 2, f64::NAN)).is_none());
    }
}
