//! Return and risk statistics over daily close series.

/// Trading days per year used for annualisation.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Rounds `value` to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Simple daily returns; one element shorter than `closes`.
#[must_use]
pub fn pct_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

/// Arithmetic mean; `0.0` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample covariance (n − 1 denominator); `0.0` with fewer than two points.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (ma, mb) = (mean(&a[..n]), mean(&b[..n]));
    let sum: f64 = a[..n].iter().zip(&b[..n]).map(|(x, y)| (x - ma) * (y - mb)).sum();
    sum / (n - 1) as f64
}

/// Sample standard deviation.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    covariance(values, values).sqrt()
}

/// Pearson correlation; `0.0` when either side has no variance.
#[must_use]
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let denom = std_dev(a) * std_dev(b);
    if denom == 0.0 { 0.0 } else { covariance(a, b) / denom }
}

/// Annualised volatility of daily `returns`, in percent.
#[must_use]
pub fn annualized_vol_pct(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
}

/// Largest peak-to-trough decline, in percent (zero or negative).
#[must_use]
pub fn max_drawdown_pct(closes: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &close in closes {
        peak = peak.max(close);
        if peak > 0.0 {
            worst = worst.min(close / peak - 1.0);
        }
    }
    worst * 100.0
}

/// Total return from first to last close, in percent.
#[must_use]
pub fn cumulative_return_pct(closes: &[f64]) -> f64 {
    match (closes.first(), closes.last()) {
        (Some(&first), Some(&last)) if first != 0.0 => (last / first - 1.0) * 100.0,
        _ => 0.0,
    }
}

/// Ordinary least squares fit `y = alpha + beta * x`.
///
/// Returns `None` when `x` has no variance.
#[must_use]
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let var_x = covariance(x, x);
    if var_x == 0.0 {
        return None;
    }
    let beta = covariance(x, y) / var_x;
    let alpha = mean(y) - beta * mean(x);
    Some((alpha, beta))
}

/// Rolling annualised volatility over `window` returns, in percent.
#[must_use]
pub fn rolling_vol_pct(returns: &[f64], window: usize) -> Vec<f64> {
    if window < 2 {
        return Vec::new();
    }
    returns.windows(window).map(annualized_vol_pct).collect()
}

/// Standard normal CDF (Abramowitz and Stegun 7.1.26, |error| < 1.5e-7).
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    let x = z.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    let erf = 1.0 - poly * (-x * x).exp();
    if z >= 0.0 { 0.5 * (1.0 + erf) } else { 0.5 * (1.0 - erf) }
}

/// Two-sided p-value for `t` under the normal approximation.
#[must_use]
pub fn two_sided_p_value(t: f64) -> f64 {
    (2.0 * (1.0 - normal_cdf(t.abs()))).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_pct_returns() {
        let r = pct_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!(close(r[0], 0.1));
        assert!(close(r[1], -0.1));
    }

    #[test]
    fn test_std_dev_is_sample() {
        assert!(close(std_dev(&[1.0, 2.0, 3.0, 4.0]), 1.290_994_4));
        assert!(close(std_dev(&[5.0]), 0.0));
    }

    #[test]
    fn test_correlation_perfect() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!(close(correlation(&a, &b), 1.0));
        assert!(close(correlation(&a, &[1.0, 1.0, 1.0]), 0.0));
    }

    #[test]
    fn test_max_drawdown() {
        assert!(close(max_drawdown_pct(&[100.0, 120.0, 90.0, 130.0]), -25.0));
        assert!(close(max_drawdown_pct(&[1.0, 2.0, 3.0]), 0.0));
    }

    #[test]
    fn test_linear_fit_recovers_line() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 0.5 + 2.0 * v).collect();
        let (alpha, beta) = linear_fit(&x, &y).unwrap_or_default();
        assert!(close(alpha, 0.5));
        assert!(close(beta, 2.0));
        assert!(linear_fit(&[1.0, 1.0], &[2.0, 3.0]).is_none());
    }

    #[test]
    fn test_normal_cdf_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((two_sided_p_value(1.96) - 0.05).abs() < 1e-3);
        assert!((two_sided_p_value(-1.96) - 0.05).abs() < 1e-3);
    }

    #[test]
    fn test_round_to() {
        assert!(close(round_to(1.23456, 2), 1.23));
        assert!(close(round_to(-0.0049, 2), 0.0));
    }
}
