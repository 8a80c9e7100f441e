//! Percentile thresholds for the low-volatility squeeze screen.
//!
//! Linear interpolation between closest ranks:
//! rank = p/100 * (n-1); P = x[floor] + (x[ceil] - x[floor]) * frac(rank).

/// Percentile of an ascending-sorted slice. `None` when empty.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pct = pct.clamp(0.0, 100.0);
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentile over every defined value at indices <= i.
///
/// At the last index this equals the percentile of the whole defined
/// history, without any index reading a later value.
pub fn expanding_percentile(values: &[Option<f64>], pct: f64) -> Vec<Option<f64>> {
    let mut seen: Vec<f64> = Vec::with_capacity(values.len());
    values
        .iter()
        .map(|v| {
            if let Some(x) = v {
                let at = seen.partition_point(|s| s < x);
                seen.insert(at, *x);
            }
            percentile_sorted(&seen, pct)
        })
        .collect()
}
