/// Percentile of an ascending-sorted slice, `p` in [0, 1].
///
/// Linear interpolation between order statistics (numpy's default, Hyndman & Fan type 7):
/// `h = (n - 1) * p`, result `x[floor(h)] + (h - floor(h)) * (x[floor(h) + 1] - x[floor(h)])`.
/// Returns `None` for an empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let p = p.clamp(0.0, 1.0);
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Copy and sort ascending. NaNs sort last.
pub fn sorted_copy(data: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// `count` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_matches_linear_rule() {
        let data = [1.0, 2.0, 3.0, 4.0];
        // h = 3 * 0.5 = 1.5 -> 2.0 + 0.5 * (3.0 - 2.0)
        assert_eq!(percentile_sorted(&data, 0.5), Some(2.5));
        assert_eq!(percentile_sorted(&data, 0.0), Some(1.0));
        assert_eq!(percentile_sorted(&data, 1.0), Some(4.0));
        assert_eq!(percentile_sorted(&[], 0.5), None);
        assert_eq!(percentile_sorted(&[7.0], 0.05), Some(7.0));
    }

    #[test]
    fn linspace_hits_both_ends() {
        let v = linspace(-1.0, 1.0, 5);
        assert_eq!(v, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
