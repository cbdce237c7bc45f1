//! Gaussian information criteria for model comparison.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalyzerError;

/// Criterion minimised by the order search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationCriterion {
    #[default]
    Aic,
    Bic,
    Aicc,
    Hqic,
}

impl InformationCriterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aic => "aic",
            Self::Bic => "bic",
            Self::Aicc => "aicc",
            Self::Hqic => "hqic",
        }
    }
}

impl fmt::Display for InformationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InformationCriterion {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aic" => Ok(Self::Aic),
            "bic" => Ok(Self::Bic),
            "aicc" => Ok(Self::Aicc),
            "hqic" => Ok(Self::Hqic),
            other => Err(AnalyzerError::InvalidParameter(format!(
                "unknown information criterion '{}'",
                other
            ))),
        }
    }
}

/// Log-likelihood and derived criteria of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InformationCriteria {
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Infinite when `n - k - 1 <= 0`.
    pub aicc: f64,
    pub hqic: f64,
    /// Estimated parameters, σ² included.
    pub num_params: usize,
    /// Observations entering the likelihood.
    pub nobs: usize,
}

impl InformationCriteria {
    /// Criteria from the concentrated Gaussian likelihood with variance `sigma2`.
    pub fn from_variance(sigma2: f64, nobs: usize, num_params: usize) -> Self {
        let n = nobs as f64;
        let k = num_params as f64;
        let log_likelihood =
            -0.5 * n * (1.0 + sigma2.ln() + (2.0 * std::f64::consts::PI).ln());
        let aic = -2.0 * log_likelihood + 2.0 * k;
        let aicc = if n - k - 1.0 > 0.0 {
            aic + 2.0 * k * (k + 1.0) / (n - k - 1.0)
        } else {
            f64::INFINITY
        };
        Self {
            log_likelihood,
            aic,
            bic: -2.0 * log_likelihood + k * n.ln(),
            aicc,
            hqic: -2.0 * log_likelihood + 2.0 * k * n.ln().ln(),
            num_params,
            nobs,
        }
    }

    pub fn get(&self, criterion: InformationCriterion) -> f64 {
        match criterion {
            InformationCriterion::Aic => self.aic,
            InformationCriterion::Bic => self.bic,
            InformationCriterion::Aicc => self.aicc,
            InformationCriterion::Hqic => self.hqic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn criteria_from_variance() {
        let c = InformationCriteria::from_variance(1.0, 100, 3);
        let ll = -50.0 * (1.0 + (2.0 * std::f64::consts::PI).ln());
        assert_relative_eq!(c.log_likelihood, ll, epsilon = 1e-12);
        assert_relative_eq!(c.aic, -2.0 * ll + 6.0, epsilon = 1e-12);
        assert_relative_eq!(c.bic, -2.0 * ll + 3.0 * 100f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(c.aicc, c.aic + 24.0 / 96.0, epsilon = 1e-12);
        assert!(c.hqic > c.aic);
        assert_eq!(c.get(InformationCriterion::Bic), c.bic);
    }

    #[test]
    fn aicc_is_infinite_for_saturated_models() {
        let c = InformationCriteria::from_variance(0.5, 4, 3);
        assert!(c.aicc.is_infinite());
        assert!(c.aic.is_finite());
    }

    #[test]
    fn criterion_names() {
        assert_eq!("AICc".parse::<InformationCriterion>().unwrap(), InformationCriterion::Aicc);
        assert_eq!(InformationCriterion::Hqic.to_string(), "hqic");
        assert!("mdl".parse::<InformationCriterion>().is_err());
        assert_eq!(InformationCriterion::default(), InformationCriterion::Aic);
    }
}
