//! Lag-polynomial arithmetic for multiplicative seasonal models.
//!
//! Operators are dense coefficient vectors indexed by lag, with the lag-0
//! coefficient first: `[1.0, c1, c2, ...]` represents `1 + c1 B + c2 B² + ...`.

/// Product of two lag polynomials.
pub fn polymul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return vec![];
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0.0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] += ai * bj;
        }
    }
    out
}

/// `1 - φ1 B - ... - φp B^p`, spread by `stride` (the seasonal period for Φ).
fn ar_factor(coefs: &[f64], stride: usize) -> Vec<f64> {
    let mut op = vec![0.0; coefs.len() * stride + 1];
    op[0] = 1.0;
    for (i, c) in coefs.iter().enumerate() {
        op[(i + 1) * stride] = -c;
    }
    op
}

/// `1 + θ1 B + ... + θq B^q`, spread by `stride`.
fn ma_factor(coefs: &[f64], stride: usize) -> Vec<f64> {
    let mut op = vec![0.0; coefs.len() * stride + 1];
    op[0] = 1.0;
    for (i, c) in coefs.iter().enumerate() {
        op[(i + 1) * stride] = *c;
    }
    op
}

/// Full autoregressive operator `φ(B)Φ(B^s)`.
pub fn ar_operator(ar: &[f64], seasonal_ar: &[f64], s: usize) -> Vec<f64> {
    polymul(&ar_factor(ar, 1), &ar_factor(seasonal_ar, s.max(1)))
}

/// Full moving-average operator `θ(B)Θ(B^s)`.
pub fn ma_operator(ma: &[f64], seasonal_ma: &[f64], s: usize) -> Vec<f64> {
    polymul(&ma_factor(ma, 1), &ma_factor(seasonal_ma, s.max(1)))
}

/// Differencing operator `(1 - B)^d (1 - B^s)^D`.
pub fn differencing_operator(d: usize, cap_d: usize, s: usize) -> Vec<f64> {
    let mut op = vec![1.0];
    for _ in 0..d {
        op = polymul(&op, &[1.0, -1.0]);
    }
    if s > 0 {
        let mut seasonal = vec![0.0; s + 1];
        seasonal[0] = 1.0;
        seasonal[s] = -1.0;
        for _ in 0..cap_d {
            op = polymul(&op, &seasonal);
        }
    }
    op
}

/// Non-zero terms of an operator beyond lag 0, as `(lag, coefficient)` pairs.
pub fn sparse_terms(op: &[f64]) -> Vec<(usize, f64)> {
    op.iter()
        .enumerate()
        .skip(1)
        .filter(|(_, c)| **c != 0.0)
        .map(|(lag, c)| (lag, *c))
        .collect()
}

/// First `n` ψ-weights of the MA(∞) representation `ma_op(B) / ar_op(B)`.
///
/// `ar_op` must include any differencing factors for interval widths on the
/// undifferenced scale.
pub fn psi_weights(ar_op: &[f64], ma_op: &[f64], n: usize) -> Vec<f64> {
    let mut psi = vec![0.0; n];
    if n == 0 {
        return psi;
    }
    psi[0] = 1.0;
    for j in 1..n {
        let mut value = ma_op.get(j).copied().unwrap_or(0.0);
        for k in 1..=j.min(ar_op.len().saturating_sub(1)) {
            // ar_op stores -a_k for the recursion y_t = Σ a_k y_{t-k}.
            value -= ar_op[k] * psi[j - k];
        }
        psi[j] = value;
    }
    psi
}

/// Map unconstrained reals to the coefficients of a stationary AR polynomial.
///
/// Each input is squashed to a partial autocorrelation in (-1, 1) and the
/// Durbin-Levinson recursion turns those into AR coefficients (Jones, 1980).
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    let partials: Vec<f64> = unconstrained
        .iter()
        .map(|x| x / (1.0 + x * x).sqrt())
        .collect();

    let mut coefs = vec![0.0; n];
    let mut previous = vec![0.0; n];
    for k in 0..n {
        previous[..k].copy_from_slice(&coefs[..k]);
        for j in 0..k {
            coefs[j] = previous[j] - partials[k] * previous[k - j - 1];
        }
        coefs[k] = partials[k];
    }
    coefs
}

/// Inverse of [`constrain_stationary`]; inputs must be stationary coefficients.
pub fn unconstrain_stationary(constrained: &[f64]) -> Vec<f64> {
    let n = constrained.len();
    let mut coefs = constrained.to_vec();
    let mut partials = vec![0.0; n];
    for k in (0..n).rev() {
        let r = coefs[k].clamp(-0.999, 0.999);
        partials[k] = r;
        let denom = 1.0 - r * r;
        let previous = coefs.clone();
        for j in 0..k {
            coefs[j] = (previous[j] + r * previous[k - j - 1]) / denom;
        }
    }
    partials.iter().map(|r| r / (1.0 - r * r).sqrt()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn multiplies_polynomials() {
        // (1 - B)(1 + B) = 1 - B²
        assert_eq!(polymul(&[1.0, -1.0], &[1.0, 1.0]), vec![1.0, 0.0, -1.0]);
        assert!(polymul(&[], &[1.0]).is_empty());
    }

    #[test]
    fn seasonal_ar_operator_has_cross_term() {
        // (1 - 0.5B)(1 - 0.3B^4) = 1 - 0.5B - 0.3B^4 + 0.15B^5
        let op = ar_operator(&[0.5], &[0.3], 4);
        assert_eq!(op.len(), 6);
        assert_relative_eq!(op[1], -0.5);
        assert_relative_eq!(op[4], -0.3);
        assert_relative_eq!(op[5], 0.15);
        assert_eq!(sparse_terms(&op).len(), 3);
    }

    #[test]
    fn differencing_operator_expands() {
        assert_eq!(differencing_operator(2, 0, 0), vec![1.0, -2.0, 1.0]);
        // (1 - B)(1 - B^3) = 1 - B - B^3 + B^4
        assert_eq!(
            differencing_operator(1, 1, 3),
            vec![1.0, -1.0, 0.0, -1.0, 1.0]
        );
    }

    #[test]
    fn psi_weights_of_ar1_decay_geometrically() {
        let psi = psi_weights(&ar_operator(&[0.6], &[], 0), &[1.0], 4);
        assert_relative_eq!(psi[1], 0.6);
        assert_relative_eq!(psi[2], 0.36);
        assert_relative_eq!(psi[3], 0.216, epsilon = 1e-12);
    }

    #[test]
    fn psi_weights_of_random_walk_are_ones() {
        let psi = psi_weights(&differencing_operator(1, 0, 0), &[1.0], 5);
        assert!(psi.iter().all(|&p| (p - 1.0).abs() < 1e-12));
    }

    #[test]
    fn psi_weights_of_ma1() {
        let psi = psi_weights(&[1.0], &ma_operator(&[0.4], &[], 0), 3);
        assert_eq!(psi, vec![1.0, 0.4, 0.0]);
    }

    #[test]
    fn constrained_coefficients_are_stationary() {
        let ar = constrain_stationary(&[5.0]);
        assert!(ar[0].abs() < 1.0);

        // AR(2) stationarity triangle: |φ2| < 1, φ2 + φ1 < 1, φ2 - φ1 < 1.
        for &(a, b) in &[(3.0, -4.0), (-2.0, 10.0), (0.3, 0.2)] {
            let c = constrain_stationary(&[a, b]);
            assert!(c[1].abs() < 1.0);
            assert!(c[1] + c[0] < 1.0);
            assert!(c[1] - c[0] < 1.0);
        }
    }

    #[test]
    fn unconstrain_inverts_constrain() {
        let raw = [0.7, -0.4, 0.2];
        let back = unconstrain_stationary(&constrain_stationary(&raw));
        for (a, b) in raw.iter().zip(&back) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }
}
