//! Descriptive statistics over `f64` samples.
//!
//! Empty input yields NaN rather than an error, so a statistic that cannot be
//! computed lands in storage as NULL.

/// Arithmetic mean
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentile `q` in `[0, 100]` with linear interpolation between order statistics
#[must_use]
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, q)
}

/// [`percentile`] over input already sorted ascending
#[must_use]
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[must_use]
pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Population standard deviation
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    let mu = mean(values);
    if mu.is_nan() {
        return f64::NAN;
    }
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Pearson's second skewness coefficient, `3 (mean - median) / std`; NaN when std is zero
#[must_use]
pub fn pearson_skew(mean: f64, median: f64, std: f64) -> f64 {
    if std == 0.0 || std.is_nan() {
        return f64::NAN;
    }
    3.0 * (mean - median) / std
}

/// Area under a piecewise-linear curve by the trapezoid rule; `xs` must be ascending
#[must_use]
pub fn find_area(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
        .sum()
}

/// `n` evenly spaced values from `start` to `end` inclusive
#[must_use]
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Rescale `column` in place to zero mean and unit population std.
///
/// NaN entries are ignored when fitting and stay NaN. A column with zero
/// variance becomes all zeros.
pub fn standardize(column: &mut [f64]) {
    let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    let mu = mean(&present);
    let sigma = std_dev(&present);

    for value in column.iter_mut().filter(|v| !v.is_nan()) {
        *value = if sigma > 0.0 { (*value - mu) / sigma } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_find_area() {
        assert!(close(find_area(&[0.0, 1.0], &[0.0, 1.0]), 0.5));
        assert!(close(find_area(&[0.0, 0.5, 1.0], &[1.0, 1.0, 1.0]), 1.0));
        assert!(close(find_area(&[0.0], &[3.0]), 0.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [15.0, 20.0, 35.0, 40.0, 50.0];
        assert!(close(percentile(&values, 0.0), 15.0));
        assert!(close(percentile(&values, 40.0), 29.0));
        assert!(close(percentile(&values, 100.0), 50.0));
        assert!(close(median(&[4.0, 1.0, 3.0, 2.0]), 2.5));
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_population_std() {
        assert!(close(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0));
        assert!(close(std_dev(&[3.0]), 0.0));
        assert!(std_dev(&[]).is_nan());
    }

    #[test]
    fn test_skew() {
        assert!(close(pearson_skew(5.0, 4.0, 2.0), 1.5));
        assert!(pearson_skew(5.0, 5.0, 0.0).is_nan());
    }

    #[test]
    fn test_linspace() {
        let xs = linspace(0.0, 1.0, 11);
        assert_eq!(xs.len(), 11);
        assert!(close(xs[3], 0.3));
        assert!(close(xs[10], 1.0));
    }

    #[test]
    fn test_standardize() {
        let mut column = vec![1.0, 2.0, f64::NAN, 3.0];
        standardize(&mut column);
        assert!(close(column[1], 0.0));
        assert!(close(column[0], -column[3]));
        assert!(column[2].is_nan());
        let present = [column[0], column[1], column[3]];
        assert!(close(std_dev(&present), 1.0));

        let mut flat = vec![7.0, 7.0, 7.0];
        standardize(&mut flat);
        assert_eq!(flat, vec![0.0, 0.0, 0.0]);
    }
}
