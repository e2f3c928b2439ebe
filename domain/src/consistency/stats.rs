//! Correlation statistics

/// Pearson product-moment correlation.
///
/// Returns `None` for mismatched lengths, fewer than two points, or a
/// series with zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Ordinal ranks (1-based, highest value first).
///
/// Ties keep their input order, so equal values get consecutive ranks.
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    let mut ranks = vec![0.0; values.len()];
    for (rank, index) in order.into_iter().enumerate() {
        ranks[index] = (rank + 1) as f64;
    }
    ranks
}

/// Spearman rank correlation of two paired series.
pub fn spearman(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    pearson(&ranks(xs), &ranks(ys))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_pearson_perfect() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert!(approx(pearson(&xs, &ys).unwrap(), 1.0));
        let inverted = [8.0, 6.0, 4.0, 2.0];
        assert!(approx(pearson(&xs, &inverted).unwrap(), -1.0));
    }

    #[test]
    fn test_pearson_degenerate() {
        assert_eq!(pearson(&[1.0], &[1.0]), None);
        assert_eq!(pearson(&[1.0, 1.0], &[2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[2.0]), None);
    }

    #[test]
    fn test_ranks_stable_ties() {
        assert_eq!(ranks(&[10.0, 30.0, 20.0]), vec![3.0, 1.0, 2.0]);
        assert_eq!(ranks(&[5.0, 5.0, 1.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_spearman_ignores_monotonic_transform() {
        let xs: Vec<f64> = (1..=6).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x.powi(4)).collect();

        let rho = spearman(&xs, &ys).unwrap();
        let r = pearson(&xs, &ys).unwrap();
        assert!(approx(rho, 1.0));
        assert!(!approx(r, 1.0));
        assert!(r < 0.99);
    }
}
