//! Small numeric helpers shared by the analytics model.

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for fewer than two values.
pub fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Absolute z-score of `value` against a window. 0 when the window's spread
/// is effectively zero (a constant series is never anomalous).
pub fn z_score(value: f64, window: &[f64]) -> f64 {
    let sd = stddev(window);
    if sd < 1e-9 {
        return 0.0;
    }
    ((value - mean(window)) / sd).abs()
}

/// Least-squares slope of `y` over sample index 0..n. 0 for fewer than two
/// points.
pub fn least_squares_slope(y: &[f64]) -> f64 {
    let n = y.len();
    if n < 2 {
        return 0.0;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let x_mean = mean(&xs);
    let y_mean = mean(y);
    let numerator: f64 = xs
        .iter()
        .zip(y)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let denominator: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    if denominator < 1e-9 {
        0.0
    } else {
        numerator / denominator
    }
}
