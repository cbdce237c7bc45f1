//! Model orders `(p, d, q)(P, D, Q)[m]`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Seasonal part of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeasonalOrder {
    /// Seasonal AR order (P).
    pub p: usize,
    /// Seasonal differencing (D).
    pub d: usize,
    /// Seasonal MA order (Q).
    pub q: usize,
    /// Period (m).
    pub period: usize,
}

impl SeasonalOrder {
    pub fn new(p: usize, d: usize, q: usize, period: usize) -> Self {
        Self { p, d, q, period }
    }

    /// `(P, D, Q, m)` as an array.
    pub fn as_array(&self) -> [usize; 4] {
        [self.p, self.d, self.q, self.period]
    }
}

/// Non-seasonal order with an optional seasonal part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal: Option<SeasonalOrder>,
}

impl ModelOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal: None,
        }
    }

    pub fn with_seasonal(mut self, p: usize, d: usize, q: usize, period: usize) -> Self {
        self.seasonal = Some(SeasonalOrder::new(p, d, q, period));
        self
    }

    pub fn is_seasonal(&self) -> bool {
        self.seasonal.is_some()
    }

    /// Seasonal period, 0 when non-seasonal.
    pub fn period(&self) -> usize {
        self.seasonal.map_or(0, |s| s.period)
    }

    /// `(P, D, Q)` with zeros when non-seasonal.
    pub fn seasonal_orders(&self) -> (usize, usize, usize) {
        self.seasonal.map_or((0, 0, 0), |s| (s.p, s.d, s.q))
    }

    /// `(p, d, q)` as an array.
    pub fn as_array(&self) -> [usize; 3] {
        [self.p, self.d, self.q]
    }

    /// Number of AR and MA coefficients, seasonal ones included.
    pub fn num_coefficients(&self) -> usize {
        let (sp, _, sq) = self.seasonal_orders();
        self.p + self.q + sp + sq
    }

    /// Total differencing applied: `d + D * m`.
    pub fn differencing_lag(&self) -> usize {
        let (_, sd, _) = self.seasonal_orders();
        self.d + sd * self.period()
    }

    /// Largest lag of the AR polynomial `φ(B)Φ(B^m)`.
    pub fn ar_lag(&self) -> usize {
        let (sp, _, _) = self.seasonal_orders();
        self.p + sp * self.period()
    }

    /// Largest lag of the MA polynomial `θ(B)Θ(B^m)`.
    pub fn ma_lag(&self) -> usize {
        let (_, _, sq) = self.seasonal_orders();
        self.q + sq * self.period()
    }
}

impl Default for ModelOrder {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seasonal {
            Some(s) => write!(
                f,
                "SARIMA({},{},{})({},{},{})[{}]",
                self.p, self.d, self.q, s.p, s.d, s.q, s.period
            ),
            None => write!(f, "ARIMA({},{},{})", self.p, self.d, self.q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(ModelOrder::new(1, 1, 1).to_string(), "ARIMA(1,1,1)");
        assert_eq!(
            ModelOrder::new(2, 1, 0).with_seasonal(1, 1, 0, 8).to_string(),
            "SARIMA(2,1,0)(1,1,0)[8]"
        );
    }

    #[test]
    fn lags_and_counts() {
        let order = ModelOrder::new(2, 1, 1).with_seasonal(1, 1, 2, 5);
        assert_eq!(order.num_coefficients(), 6);
        assert_eq!(order.differencing_lag(), 6);
        assert_eq!(order.ar_lag(), 7);
        assert_eq!(order.ma_lag(), 11);
        assert_eq!(order.seasonal.unwrap().as_array(), [1, 1, 2, 5]);

        let plain = ModelOrder::new(1, 0, 2);
        assert_eq!(plain.period(), 0);
        assert_eq!(plain.seasonal_orders(), (0, 0, 0));
        assert_eq!(plain.ar_lag(), 1);
    }

    #[test]
    fn serializes_seasonal_as_null_when_absent() {
        let json = serde_json::to_value(ModelOrder::new(1, 1, 0)).unwrap();
        assert!(json["seasonal"].is_null());
        assert_eq!(json["p"], 1);
    }
}
