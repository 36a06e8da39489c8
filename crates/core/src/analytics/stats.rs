//! Small numeric helpers shared by the analyzers. All of them return finite values for
//! empty or degenerate input.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|value| (value - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Standard deviation divided by the mean, or 0 when the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let avg = mean(values);
    if avg <= f64::EPSILON {
        return 0.0;
    }
    finite_or_zero(std_dev(values) / avg)
}

/// Exponential moving average seeded with the first value:
/// `ema[0] = v[0]`, `ema[i] = alpha * v[i] + (1 - alpha) * ema[i - 1]`.
pub fn exponential_moving_average(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut smoothed = Vec::with_capacity(values.len());
    let mut previous: Option<f64> = None;
    for &value in values {
        let next = match previous {
            None => value,
            Some(prior) => alpha * value + (1.0 - alpha) * prior,
        };
        smoothed.push(next);
        previous = Some(next);
    }
    smoothed
}

/// Least-squares slope of `values` against their index. Zero for fewer than two points.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let (numerator, denominator) =
        values.iter().enumerate().fold((0.0, 0.0), |(num, den), (index, value)| {
            let dx = index as f64 - x_mean;
            (num + dx * (value - y_mean), den + dx * dx)
        });
    if denominator <= f64::EPSILON {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
