//! Curve fitting on snapshot columns.
//!
//! Two models, both solved in closed form by ordinary least squares:
//!
//! - power law (Cobb–Douglas) `y = A * x^alpha`, fitted as a line in
//!   log-log space; R² is reported in that log space
//! - linear `y = slope * x + intercept`; R² is reported in the untransformed space
//!
//! Each R² describes the space its regression was estimated in. The two are
//! therefore not directly comparable.

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Points a fit needs before it is determined
pub const MIN_FIT_POINTS: usize = 2;

/// Default resolution of a plotted curve
pub const DEFAULT_CURVE_POINTS: usize = 200;

/// `n` evenly spaced values over the closed interval [start, end]
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Slope and intercept of the least-squares line through the points
fn least_squares(x: &[f64], y: &[f64]) -> Result<(f64, f64)> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (sxx, sxy) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxx, sxy), (xi, yi)| {
            let dx = xi - mean_x;
            (sxx + dx * dx, sxy + dx * (yi - mean_y))
        });

    // All x equal: a single distinct x value determines no slope
    if sxx == 0.0 {
        let distinct = if x.is_empty() { 0 } else { 1 };
        return Err(DashboardError::InsufficientData {
            required: MIN_FIT_POINTS,
            found: distinct,
        });
    }

    let slope = sxy / sxx;
    Ok((slope, mean_y - slope * mean_x))
}

/// Coefficient of determination of `predicted` against `observed`
///
/// With no variance in `observed` this is 1.0 for an exact fit and 0.0
/// otherwise.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Pair up finite values, enforcing equal lengths
fn finite_pairs(x: &[f64], y: &[f64]) -> Result<Vec<(f64, f64)>> {
    if x.len() != y.len() {
        return Err(DashboardError::InvalidInput {
            message: format!("x has {} values but y has {}", x.len(), y.len()),
        });
    }

    Ok(x.iter()
        .zip(y)
        .map(|(x, y)| (*x, *y))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect())
}

fn ensure_enough(points: usize) -> Result<()> {
    if points < MIN_FIT_POINTS {
        return Err(DashboardError::InsufficientData {
            required: MIN_FIT_POINTS,
            found: points,
        });
    }
    Ok(())
}

// =============================================================================
// Power Law
// =============================================================================

/// `y = A * x^alpha` estimated by log-log regression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawFit {
    /// Scale parameter A
    pub scale: f64,
    /// Elasticity exponent alpha
    pub alpha: f64,
    /// R² of the line in log-log space
    pub r2: f64,
    /// Pairs used after dropping non-positive values
    pub points: usize,
}

impl PowerLawFit {
    /// Fit on pairs where both x and y are strictly positive
    ///
    /// Non-positive pairs are skipped silently since their logarithm is
    /// undefined; fewer than two remaining pairs is `InsufficientData`.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        let (log_x, log_y): (Vec<f64>, Vec<f64>) = finite_pairs(x, y)?
            .into_iter()
            .filter(|(x, y)| *x > 0.0 && *y > 0.0)
            .map(|(x, y)| (x.ln(), y.ln()))
            .unzip();
        ensure_enough(log_x.len())?;

        let (alpha, log_scale) = least_squares(&log_x, &log_y)?;
        let predicted: Vec<f64> = log_x.iter().map(|lx| log_scale + alpha * lx).collect();

        Ok(Self {
            scale: log_scale.exp(),
            alpha,
            r2: r_squared(&log_y, &predicted),
            points: log_x.len(),
        })
    }

    /// Predicted y; 0 at x = 0 for positive alpha
    pub fn predict(&self, x: f64) -> f64 {
        self.scale * x.powf(self.alpha)
    }

    /// Sampled curve over [x_min, x_max] for plotting
    pub fn curve(&self, x_min: f64, x_max: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let xs = linspace(x_min, x_max, n);
        let ys = xs.iter().map(|x| self.predict(*x)).collect();
        (xs, ys)
    }
}

// =============================================================================
// Linear
// =============================================================================

/// `y = slope * x + intercept` by ordinary least squares
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// R² in the untransformed (x, y) space
    pub r2: f64,
    pub points: usize,
}

impl LinearFit {
    /// Fit on all finite pairs; zero and negative values are valid
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        let (xs, ys): (Vec<f64>, Vec<f64>) = finite_pairs(x, y)?.into_iter().unzip();
        ensure_enough(xs.len())?;

        let (slope, intercept) = least_squares(&xs, &ys)?;
        let predicted: Vec<f64> = xs.iter().map(|x| slope * x + intercept).collect();

        Ok(Self {
            slope,
            intercept,
            r2: r_squared(&ys, &predicted),
            points: xs.len(),
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn curve(&self, x_min: f64, x_max: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let xs = linspace(x_min, x_max, n);
        let ys = xs.iter().map(|x| self.predict(*x)).collect();
        (xs, ys)
    }
}

// =============================================================================
// Either Model
// =============================================================================

/// Model selectable as a chart overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitKind {
    PowerLaw,
    Linear,
}

/// Result of fitting either model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FitResult {
    PowerLaw(PowerLawFit),
    Linear(LinearFit),
}

impl FitResult {
    pub fn fit(kind: FitKind, x: &[f64], y: &[f64]) -> Result<Self> {
        match kind {
            FitKind::PowerLaw => PowerLawFit::fit(x, y).map(Self::PowerLaw),
            FitKind::Linear => LinearFit::fit(x, y).map(Self::Linear),
        }
    }

    pub fn kind(&self) -> FitKind {
        match self {
            Self::PowerLaw(_) => FitKind::PowerLaw,
            Self::Linear(_) => FitKind::Linear,
        }
    }

    /// R² in the space the model was estimated in
    pub fn r2(&self) -> f64 {
        match self {
            Self::PowerLaw(fit) => fit.r2,
            Self::Linear(fit) => fit.r2,
        }
    }

    pub fn points(&self) -> usize {
        match self {
            Self::PowerLaw(fit) => fit.points,
            Self::Linear(fit) => fit.points,
        }
    }

    pub fn predict(&self, x: f64) -> f64 {
        match self {
            Self::PowerLaw(fit) => fit.predict(x),
            Self::Linear(fit) => fit.predict(x),
        }
    }

    pub fn curve(&self, x_min: f64, x_max: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
        match self {
            Self::PowerLaw(fit) => fit.curve(x_min, x_max, n),
            Self::Linear(fit) => fit.curve(x_min, x_max, n),
        }
    }

    /// Legend text for the fitted curve
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerLaw(fit) => write!(
                f,
                "Cobb–Douglas (α = {:.2}, R² = {:.2})",
                fit.alpha, fit.r2
            ),
            Self::Linear(fit) => write!(f, "Linear fit (R² = {:.2})", fit.r2),
        }
    }
}
