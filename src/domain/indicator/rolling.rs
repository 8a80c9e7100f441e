//! Trailing-window reducers shared by the indicator engine.
//!
//! Every output at index i reads only inputs at indices <= i.
//! Warmup: first (n-1) outputs are `None`.

fn rolling<F>(values: &[f64], window: usize, reduce: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    if window == 0 {
        return vec![None; values.len()];
    }
    let warmup = window - 1;
    (0..values.len())
        .map(|i| {
            if i < warmup {
                None
            } else {
                Some(reduce(&values[i + 1 - window..=i]))
            }
        })
        .collect()
}

/// MEAN(n)[i] = sum(x[i-n+1..=i]) / n
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// MAX(n)[i] = max(x[i-n+1..=i])
pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// MIN(n)[i] = min(x[i-n+1..=i])
pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_warmup_and_values() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[3], Some(3.0));
    }

    #[test]
    fn max_and_min_track_window() {
        let values = [5.0, 1.0, 4.0, 2.0, 3.0];
        let max = rolling_max(&values, 2);
        let min = rolling_min(&values, 2);
        assert_eq!(max, vec![None, Some(5.0), Some(4.0), Some(4.0), Some(3.0)]);
        assert_eq!(min, vec![None, Some(1.0), Some(1.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn window_longer_than_input_is_all_none() {
        let out = rolling_max(&[1.0, 2.0], 5);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn zero_window_is_all_none() {
        let out = rolling_mean(&[1.0, 2.0], 0);
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn window_of_one_is_identity() {
        let out = rolling_min(&[3.0, 1.0, 2.0], 1);
        assert_eq!(out, vec![Some(3.0), Some(1.0), Some(2.0)]);
    }
}
