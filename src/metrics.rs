//! Regression error metrics

use crate::{Error, Result};

fn check_lengths(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.is_empty() {
        return Err(Error::Other("metrics need at least one sample".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(Error::Other(format!(
            "y_true has {} samples but y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of squared residuals.
///
/// # Errors
///
/// Returns error on empty input or length mismatch
#[allow(clippy::cast_precision_loss)]
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// Square root of [`mean_squared_error`].
///
/// # Errors
///
/// Returns error on empty input or length mismatch
pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    Ok(mean_squared_error(y_true, y_pred)?.sqrt())
}

/// Mean of absolute residuals.
///
/// # Errors
///
/// Returns error on empty input or length mismatch
#[allow(clippy::cast_precision_loss)]
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let sum: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    Ok(sum / y_true.len() as f64)
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// A constant `y_true` scores 1.0 when predicted exactly and 0.0 otherwise.
///
/// # Errors
///
/// Returns error on empty input or length mismatch
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mean_true = mean(y_true);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean_true).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// The two scalars reported by the evaluation stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionReport {
    /// Mean squared error
    pub mse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl RegressionReport {
    /// Compute both metrics.
    ///
    /// # Errors
    ///
    /// Returns error on empty input or length mismatch
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        Ok(Self {
            mse: mean_squared_error(y_true, y_pred)?,
            r2: r2_score(y_true, y_pred)?,
        })
    }
}
