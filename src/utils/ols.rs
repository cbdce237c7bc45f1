//! Ordinary least squares via the normal equations.
//!
//! Used by the unit-root regressions and for linear trend extrapolation.

use crate::error::{AnalyzerError, Result};

/// Fitted linear regression.
#[derive(Debug, Clone)]
pub struct OLSResult {
    /// Intercept (0.0 when fitted without one).
    pub intercept: f64,
    /// One coefficient per regressor column.
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients, same order as `coefficients`.
    pub std_errors: Vec<f64>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Observations used.
    pub nobs: usize,
}

impl OLSResult {
    /// t-statistic of the `i`-th regressor.
    pub fn t_stat(&self, i: usize) -> f64 {
        match (self.coefficients.get(i), self.std_errors.get(i)) {
            (Some(b), Some(se)) if *se > 0.0 => b / se,
            _ => f64::NAN,
        }
    }

    /// Gaussian AIC, `n ln(rss / n) + 2k`.
    pub fn aic(&self, with_intercept: bool) -> f64 {
        if self.rss <= 0.0 || self.nobs == 0 {
            return f64::NEG_INFINITY;
        }
        let k = self.coefficients.len() + usize::from(with_intercept);
        let n = self.nobs as f64;
        n * (self.rss / n).ln() + 2.0 * k as f64
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }
}

/// Regress `y` on the given columns, optionally with an intercept.
///
/// Every column must have the same length as `y`.
pub fn ols_fit(y: &[f64], columns: &[Vec<f64>], intercept: bool) -> Result<OLSResult> {
    let n = y.len();
    let k = columns.len() + usize::from(intercept);
    if k == 0 {
        return Err(AnalyzerError::InvalidParameter(
            "regression needs at least one regressor".into(),
        ));
    }
    if n <= k {
        return Err(AnalyzerError::InsufficientData {
            needed: k + 1,
            got: n,
        });
    }
    for col in columns {
        if col.len() != n {
            return Err(AnalyzerError::DimensionMismatch {
                expected: n,
                got: col.len(),
            });
        }
    }

    let row = |obs: usize| -> Vec<f64> {
        let mut r = Vec::with_capacity(k);
        if intercept {
            r.push(1.0);
        }
        r.extend(columns.iter().map(|c| c[obs]));
        r
    };

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (obs, &y_obs) in y.iter().enumerate() {
        let x = row(obs);
        for i in 0..k {
            xty[i] += x[i] * y_obs;
            for j in 0..=i {
                xtx[i][j] += x[i] * x[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
    }

    let chol = cholesky(&xtx).ok_or_else(|| {
        AnalyzerError::ComputationError("design matrix is singular".into())
    })?;
    let beta = chol.solve(&xty);

    let rss: f64 = (0..n)
        .map(|obs| {
            let fitted: f64 = row(obs).iter().zip(&beta).map(|(x, b)| x * b).sum();
            (y[obs] - fitted).powi(2)
        })
        .sum();
    let sigma2 = rss / (n - k) as f64;

    // Diagonal of (X'X)^-1 from unit right-hand sides.
    let std_errors_all: Vec<f64> = (0..k)
        .map(|i| {
            let mut e = vec![0.0; k];
            e[i] = 1.0;
            (sigma2 * chol.solve(&e)[i]).max(0.0).sqrt()
        })
        .collect();

    let offset = usize::from(intercept);
    Ok(OLSResult {
        intercept: if intercept { beta[0] } else { 0.0 },
        coefficients: beta[offset..].to_vec(),
        std_errors: std_errors_all[offset..].to_vec(),
        rss,
        nobs: n,
    })
}

/// Lower-triangular Cholesky factor `A = L L'`.
struct Cholesky {
    l: Vec<Vec<f64>>,
}

fn cholesky(a: &[Vec<f64>]) -> Option<Cholesky> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 1e-12 * a[i][i].abs().max(1.0) {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(Cholesky { l })
}

impl Cholesky {
    fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = b.len();
        let l = &self.l;

        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= l[i][j] * y[j];
            }
            y[i] = sum / l[i][i];
        }

        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= l[j][i] * x[j];
            }
            x[i] = sum / l[i][i];
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_exact_line() {
        // y = 2 + 3x
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();

        let fit = ols_fit(&y, &[x], true).unwrap();
        assert_relative_eq!(fit.intercept, 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.coefficients[0], 3.0, epsilon = 1e-9);
        assert!(fit.rss < 1e-18);
        assert_relative_eq!(fit.predict_row(&[10.0]), 32.0, epsilon = 1e-9);
    }

    #[test]
    fn two_regressors_and_standard_errors() {
        let x1 = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let x2 = vec![0.5, 2.5, 1.0, 3.0, 1.5, 3.5, 2.0, 4.0];
        let noise = [0.1, -0.1, 0.05, -0.05, 0.02, -0.02, 0.08, -0.08];
        let y: Vec<f64> = (0..8)
            .map(|i| 1.0 + 2.0 * x1[i] + 3.0 * x2[i] + noise[i])
            .collect();

        let fit = ols_fit(&y, &[x1, x2], true).unwrap();
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 0.1);
        assert_relative_eq!(fit.coefficients[1], 3.0, epsilon = 0.1);
        assert!(fit.std_errors.iter().all(|se| *se > 0.0 && se.is_finite()));
        assert!(fit.t_stat(0) > 10.0);
    }

    #[test]
    fn without_intercept() {
        let x = vec![1.0, 2.0, 3.0];
        let y = vec![2.0, 4.0, 6.0];
        let fit = ols_fit(&y, &[x], false).unwrap();
        assert_eq!(fit.intercept, 0.0);
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_bad_shapes() {
        let y = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            ols_fit(&y, &[vec![1.0, 2.0]], true),
            Err(AnalyzerError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            ols_fit(&y[..2], &[vec![1.0, 2.0]], true),
            Err(AnalyzerError::InsufficientData { .. })
        ));
        assert!(ols_fit(&y, &[], false).is_err());
    }

    #[test]
    fn collinear_columns_fail() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![1.0, 3.0, 2.0, 5.0];
        assert!(matches!(
            ols_fit(&y, &[x.clone(), x], true),
            Err(AnalyzerError::ComputationError(_))
        ));
    }
}
