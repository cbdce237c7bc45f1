//! Derivative-free minimisation used for model parameter estimation.

use std::cmp::Ordering;

/// Outcome of a Nelder-Mead run.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub optimal_point: Vec<f64>,
    pub optimal_value: f64,
    pub iterations: usize,
    /// Objective evaluations performed.
    pub evaluations: usize,
    pub converged: bool,
}

/// Settings for [`nelder_mead`].
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Stop when the spread of simplex values falls below
    /// `tolerance * (1 + |best value|)`.
    pub tolerance: f64,
    /// Absolute step used to build the initial simplex around zero coordinates.
    pub initial_step: f64,
    /// Relative step used around non-zero coordinates.
    pub relative_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            initial_step: 0.1,
            relative_step: 0.05,
        }
    }
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

struct Simplex<'a, F> {
    vertices: Vec<Vec<f64>>,
    values: Vec<f64>,
    objective: &'a F,
    evaluations: usize,
}

impl<'a, F: Fn(&[f64]) -> f64> Simplex<'a, F> {
    fn eval(&mut self, point: &[f64]) -> f64 {
        self.evaluations += 1;
        let value = (self.objective)(point);
        // NaN must never win a comparison.
        if value.is_nan() {
            f64::INFINITY
        } else {
            value
        }
    }

    fn order(&mut self) {
        let mut paired: Vec<(Vec<f64>, f64)> = self
            .vertices
            .drain(..)
            .zip(self.values.drain(..))
            .collect();
        paired.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        for (v, f) in paired {
            self.vertices.push(v);
            self.values.push(f);
        }
    }

    /// Centroid of all vertices except the worst (last after ordering).
    fn centroid(&self) -> Vec<f64> {
        let n = self.vertices.len() - 1;
        let mut c = vec![0.0; self.vertices[0].len()];
        for vertex in &self.vertices[..n] {
            for (ci, xi) in c.iter_mut().zip(vertex) {
                *ci += xi;
            }
        }
        c.iter_mut().for_each(|ci| *ci /= n as f64);
        c
    }

    fn replace_worst(&mut self, point: Vec<f64>, value: f64) {
        let last = self.vertices.len() - 1;
        self.vertices[last] = point;
        self.values[last] = value;
    }

    fn shrink(&mut self) {
        let best = self.vertices[0].clone();
        for i in 1..self.vertices.len() {
            let shrunk = lerp(&best, &self.vertices[i], SHRINK);
            self.values[i] = self.eval(&shrunk);
            self.vertices[i] = shrunk;
        }
    }
}

/// Point `from + t * (to - from)`.
fn lerp(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    from.iter().zip(to).map(|(a, b)| a + t * (b - a)).collect()
}

/// Minimise `objective` starting from `initial` with the Nelder-Mead simplex method.
///
/// Non-finite objective values are treated as +∞, so infeasible regions can be
/// signalled by returning `f64::INFINITY` or NaN.
///
/// ```
/// use arima_analyzer::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
///     &[0.0, 0.0],
///     NelderMeadConfig::default(),
/// );
/// assert!((result.optimal_point[0] - 2.0).abs() < 1e-3);
/// assert!((result.optimal_point[1] + 1.0).abs() < 1e-3);
/// ```
pub fn nelder_mead<F>(objective: F, initial: &[f64], config: NelderMeadConfig) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: objective(&[]),
            iterations: 0,
            evaluations: 1,
            converged: true,
        };
    }

    let mut simplex = Simplex {
        vertices: Vec::with_capacity(n + 1),
        values: Vec::with_capacity(n + 1),
        objective: &objective,
        evaluations: 0,
    };

    let mut seeds = vec![initial.to_vec()];
    for i in 0..n {
        let mut vertex = initial.to_vec();
        vertex[i] += if initial[i].abs() > 1e-10 {
            config.relative_step * initial[i].abs()
        } else {
            config.initial_step
        };
        seeds.push(vertex);
    }
    for vertex in seeds {
        let value = simplex.eval(&vertex);
        simplex.vertices.push(vertex);
        simplex.values.push(value);
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;
        simplex.order();

        let best = simplex.values[0];
        let worst = simplex.values[n];
        let second_worst = simplex.values[n - 1];

        if (worst - best).abs() <= config.tolerance * (1.0 + best.abs()) {
            converged = true;
            break;
        }

        let centroid = simplex.centroid();
        let reflected = lerp(&centroid, &simplex.vertices[n], -REFLECTION);
        let f_reflected = simplex.eval(&reflected);

        if f_reflected < best {
            let expanded = lerp(&centroid, &reflected, EXPANSION);
            let f_expanded = simplex.eval(&expanded);
            if f_expanded < f_reflected {
                simplex.replace_worst(expanded, f_expanded);
            } else {
                simplex.replace_worst(reflected, f_reflected);
            }
        } else if f_reflected < second_worst {
            simplex.replace_worst(reflected, f_reflected);
        } else {
            // Contract towards the better of the reflected and worst points.
            let (target, f_target) = if f_reflected < worst {
                (reflected, f_reflected)
            } else {
                (simplex.vertices[n].clone(), worst)
            };
            let contracted = lerp(&centroid, &target, CONTRACTION);
            let f_contracted = simplex.eval(&contracted);
            if f_contracted < f_target {
                simplex.replace_worst(contracted, f_contracted);
            } else {
                simplex.shrink();
            }
        }
    }

    simplex.order();
    NelderMeadResult {
        optimal_point: simplex.vertices[0].clone(),
        optimal_value: simplex.values[0],
        iterations,
        evaluations: simplex.evaluations,
        converged,
    }
}
