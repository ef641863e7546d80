//! Statistical primitives shared by pair selection and model fitting.

pub mod adf;
pub mod ols;

pub use adf::{adf_test, mackinnon_p_value, AdfResult};
pub use ols::{ols, regress_through_origin, OlsFit};

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n, not n - 1).
pub fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Sum of squared differences between two equally long series.
pub fn sum_squared_differences(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
