//! Loss functions for node classification

use ndarray::Array2;

use super::activation::softmax;
use crate::error::{GatError, Result};

/// Masked softmax cross-entropy over logits
///
/// Returns the mean loss over `mask` and the gradient with respect to the
/// logits. Rows outside the mask get a zero gradient.
pub fn cross_entropy(
    logits: &Array2<f64>,
    labels: &[usize],
    mask: &[usize],
) -> Result<(f64, Array2<f64>)> {
    if mask.is_empty() {
        return Err(GatError::EmptyMask("cross_entropy"));
    }
    if labels.len() != logits.nrows() {
        return Err(GatError::shape(
            "cross_entropy labels",
            logits.nrows(),
            labels.len(),
        ));
    }

    let num_classes = logits.ncols();
    let scale = 1.0 / mask.len() as f64;
    let mut grad = Array2::zeros(logits.dim());
    let mut loss = 0.0;

    for &node in mask {
        let label = labels[node];
        if label >= num_classes {
            return Err(GatError::shape(
                "cross_entropy label",
                format!("class < {num_classes}"),
                label,
            ));
        }

        let row: Vec<f64> = logits.row(node).to_vec();
        let probs = softmax(&row);
        loss -= probs[label].max(f64::MIN_POSITIVE).ln();

        for (c, p) in probs.iter().enumerate() {
            let target = if c == label { 1.0 } else { 0.0 };
            grad[[node, c]] += (p - target) * scale;
        }
    }

    Ok((loss * scale, grad))
}

/// Index of the largest logit in each row
pub fn argmax_rows(logits: &Array2<f64>) -> Vec<usize> {
    logits
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_uniform_logits() {
        let logits = Array2::zeros((2, 4));
        let (loss, grad) = cross_entropy(&logits, &[0, 3], &[0, 1]).unwrap();

        assert_abs_diff_eq!(loss, 4.0f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(grad[[0, 0]], (0.25 - 1.0) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grad[[1, 0]], 0.25 / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mask_limits_gradient() {
        let logits = array![[2.0, -1.0], [0.5, 0.5], [-3.0, 1.0]];
        let (_, grad) = cross_entropy(&logits, &[0, 1, 1], &[2]).unwrap();

        assert!(grad.row(0).iter().all(|&g| g == 0.0));
        assert!(grad.row(1).iter().all(|&g| g == 0.0));
        assert!(grad.row(2).iter().any(|&g| g != 0.0));
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let logits = array![[0.3, -0.2, 1.1], [2.0, 0.1, -0.4]];
        let labels = [2, 0];
        let mask = [0, 1];
        let (_, grad) = cross_entropy(&logits, &labels, &mask).unwrap();

        let h = 1e-6;
        for ((i, j), &analytic) in grad.indexed_iter() {
            let mut plus = logits.clone();
            let mut minus = logits.clone();
            plus[[i, j]] += h;
            minus[[i, j]] -= h;
            let lp = cross_entropy(&plus, &labels, &mask).unwrap().0;
            let lm = cross_entropy(&minus, &labels, &mask).unwrap().0;
            assert_abs_diff_eq!(analytic, (lp - lm) / (2.0 * h), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_errors() {
        let logits = Array2::zeros((2, 2));
        assert!(matches!(
            cross_entropy(&logits, &[0, 1], &[]),
            Err(GatError::EmptyMask(_))
        ));
        assert!(cross_entropy(&logits, &[0], &[0]).is_err());
        assert!(cross_entropy(&logits, &[0, 5], &[1]).is_err());
    }

    #[test]
    fn test_argmax_rows() {
        let logits = array![[0.1, 0.9, 0.0], [3.0, -1.0, 2.0]];
        assert_eq!(argmax_rows(&logits), vec![1, 0]);
    }
}
