use crate::data::DataSet;
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::function::logistic::logistic;
use std::f64::consts::PI;
use wolfe_bfgs::{Bfgs, BfgsError};

/// Relative pivot floor for the normal-equation Cholesky factor. Pivots this
/// far below the largest one mean the subset is rank-deficient to working
/// precision and its fit is rejected.
const PIVOT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Gaussian,
    Binomial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Performance {
    Aic,
    Mse,
}

/// Per-worker GLM fitter. The data view is shared and borrowed; the feature
/// subset is swapped in per combination so one `Glm` serves a whole batch.
///
/// Fitting never fails loudly: a combination whose fit breaks down
/// numerically gets `error_value` as its negative log-likelihood, and
/// [`Glm::score`] reports `error_value` for it.
pub struct Glm<'a> {
    data: &'a DataSet,
    family: Family,
    performance: Performance,
    intercept: bool,
    error_value: f64,
    accept_stalled_fit: bool,
    /// Resolved 0-based column indices, intercept column first
    columns: Vec<usize>,
    n_beta: usize,
    beta: Array1<f64>,
    negloglik: f64,
}

impl<'a> Glm<'a> {
    pub fn new(
        data: &'a DataSet,
        family: Family,
        performance: Performance,
        intercept: bool,
        error_value: f64,
        accept_stalled_fit: bool,
    ) -> Glm<'a> {
        Glm {
            data,
            family,
            performance,
            intercept,
            error_value,
            accept_stalled_fit,
            columns: Vec::new(),
            n_beta: 0,
            beta: Array1::zeros(0),
            negloglik: 0.0,
        }
    }

    /// Select the predictor subset for the next fit. `comb` holds 1-based
    /// candidate indices; with an intercept, column 0 is prepended and the
    /// candidates start at column 1.
    pub fn set_feature_combination(&mut self, comb: &[u32]) {
        self.columns.clear();
        if self.intercept {
            self.columns.push(0);
            self.columns.extend(comb.iter().map(|&c| c as usize));
        } else {
            self.columns.extend(comb.iter().map(|&c| c as usize - 1));
        }
        self.n_beta = self.columns.len();

        // Reset the coefficients and the negative log-likelihood
        self.beta = Array1::zeros(self.n_beta);
        self.negloglik = 0.0;
    }

    /// Fit the current subset on the training data.
    pub fn fit(&mut self) {
        if self.n_beta == 0 {
            return;
        }
        match self.family {
            Family::Gaussian => self.fit_ols(),
            Family::Binomial => self.fit_logistic(),
        }
    }

    /// Ordinary least squares via the normal equations. The Cholesky
    /// factorization doubles as the singularity check: a factor that does not
    /// exist, or whose pivots collapse relative to the largest one, marks the
    /// system as rank-deficient and the fit as failed.
    fn fit_ols(&mut self) {
        let m = self.n_beta;
        let n = self.data.X.nrows();

        let mut xtx = DMatrix::<f64>::zeros(m, m);
        let mut xty = DVector::<f64>::zeros(m);
        {
            let x = &self.data.X;
            let y = &self.data.y;
            for i in 0..n {
                for (a, &col_a) in self.columns.iter().enumerate() {
                    let x_ia = x[[i, col_a]];
                    xty[a] += x_ia * y[i];
                    for (b, &col_b) in self.columns.iter().enumerate().skip(a) {
                        xtx[(a, b)] += x_ia * x[[i, col_b]];
                    }
                }
            }
            for a in 0..m {
                for b in 0..a {
                    xtx[(a, b)] = xtx[(b, a)];
                }
            }
        }

        let chol = match xtx.cholesky() {
            Some(chol) => chol,
            None => {
                self.negloglik = self.error_value;
                return;
            }
        };
        let l = chol.l();
        let mut min_pivot = f64::MAX;
        let mut max_pivot = 0.0_f64;
        for j in 0..m {
            min_pivot = min_pivot.min(l[(j, j)]);
            max_pivot = max_pivot.max(l[(j, j)]);
        }
        if min_pivot <= max_pivot * PIVOT_TOLERANCE {
            self.negloglik = self.error_value;
            return;
        }

        let beta = chol.solve(&xty);
        self.beta = Array1::from_iter(beta.iter().copied());

        let mut sse = 0.0;
        for i in 0..n {
            let residual = self.data.y[i] - self.eta_row(&self.data.X, i);
            sse += residual * residual;
        }
        let n = n as f64;
        self.negloglik = n / 2.0 * ((2.0 * PI * sse / n).ln() + 1.0);
    }

    /// Logistic regression: minimize the negative log-likelihood with BFGS
    /// from beta = 0, the optimizer consuming the `(value, gradient)` closure.
    fn fit_logistic(&mut self) {
        let x0 = Array1::<f64>::zeros(self.n_beta);
        let result = {
            let mut solver = Bfgs::new(x0, |beta: &Array1<f64>| self.nll_and_gradient(beta))
                .with_tolerance(1e-8)
                .with_max_iterations(100);
            solver.run()
        };

        match result {
            Ok(solution) => {
                self.negloglik = solution.final_value;
                self.beta = solution.final_point;
            }
            Err(BfgsError::LineSearchFailed { last_solution, .. })
            | Err(BfgsError::MaxIterationsReached { last_solution }) => {
                // The optimizer gave up but may still hold a usable minimum,
                // e.g. on separable data where the likelihood has no interior
                // optimum. Whether to accept it is configurable.
                if self.accept_stalled_fit
                    && last_solution.final_value.is_finite()
                    && last_solution.final_value > 0.0
                {
                    self.negloglik = last_solution.final_value;
                    self.beta = last_solution.final_point;
                } else {
                    self.negloglik = self.error_value;
                }
            }
            Err(_) => self.negloglik = self.error_value,
        }
    }

    /// Negative log-likelihood of the logistic model and its gradient.
    fn nll_and_gradient(&self, beta: &Array1<f64>) -> (f64, Array1<f64>) {
        let x = &self.data.X;
        let y = &self.data.y;
        let eps = f64::EPSILON;

        let mut gradient = Array1::<f64>::zeros(self.n_beta);
        let mut log_lik = 0.0;
        for i in 0..x.nrows() {
            let mut eta = 0.0;
            for (j, &col) in self.columns.iter().enumerate() {
                eta += x[[i, col]] * beta[j];
            }
            let mut y_hat = logistic(eta);

            // Exact 0 or 1 would break the log terms below
            if y_hat == 0.0 {
                y_hat = eps;
            }
            if y_hat == 1.0 {
                y_hat = 1.0 - eps;
            }

            // d(-logL)/d(beta_j) = -sum( (y_i - y_ihat) * x_ij )
            for (j, &col) in self.columns.iter().enumerate() {
                gradient[j] -= (y[i] - y_hat) * x[[i, col]];
            }
            log_lik += y[i] * y_hat.ln() + (1.0 - y[i]) * (1.0 - y_hat).ln();
        }

        (-log_lik, gradient)
    }

    /// The configured performance measure for the fitted subset. Any
    /// numerical breakdown (failed fit, non-finite score) reports
    /// `error_value`.
    pub fn score(&self) -> f64 {
        if self.negloglik == self.error_value {
            return self.error_value;
        }
        let score = match self.performance {
            Performance::Aic => self.aic(),
            Performance::Mse => self.mse(),
        };
        if score.is_finite() {
            score
        } else {
            self.error_value
        }
    }

    fn aic(&self) -> f64 {
        let correction = if self.family == Family::Gaussian {
            1.0
        } else {
            0.0
        };
        2.0 * (self.negloglik + self.n_beta as f64 + correction)
    }

    fn mse(&self) -> f64 {
        if self.family == Family::Gaussian && self.data.no_test_set() {
            // The Gaussian likelihood already encodes the training MSE
            let n = self.data.y.len() as f64;
            return (2.0 * self.negloglik / n - 1.0).exp() / (2.0 * PI);
        }

        let x = self.data.x_eval();
        let y = self.data.y_eval();
        let mut sse = 0.0;
        for i in 0..x.nrows() {
            let eta = self.eta_row(x, i);
            let y_hat = match self.family {
                Family::Gaussian => eta,
                Family::Binomial => logistic(eta),
            };
            let residual = y[i] - y_hat;
            sse += residual * residual;
        }
        sse / y.len() as f64
    }

    /// The linear predictor of row `i` under the current coefficients.
    fn eta_row(&self, x: &ndarray::Array2<f64>, i: usize) -> f64 {
        self.columns
            .iter()
            .enumerate()
            .map(|(j, &col)| x[[i, col]] * self.beta[j])
            .sum()
    }

    pub fn negloglik(&self) -> f64 {
        self.negloglik
    }

    pub fn beta(&self) -> &Array1<f64> {
        &self.beta
    }

    pub fn family(&self) -> Family {
        self.family
    }
}
