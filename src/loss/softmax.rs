use crate::error::{NetError, Result};
use crate::math::{element::Element, tensor::Tensor};

/// Softmax cross-entropy averaged over the batch.
///
/// `scores` is (N, K) and `labels` holds one class index in [0, K) per row.
/// Returns the scalar loss and ∂loss/∂scores, which is
/// `(softmax(scores) - onehot(labels)) / N`.
///
/// Each row is shifted by its maximum before exponentiating, so large
/// scores do not overflow. Non-finite scores are reported as
/// `NetError::NonFinite` instead of producing a NaN loss.
pub fn softmax_loss<T: Element>(scores: &Tensor<T>, labels: &[usize]) -> Result<(T, Tensor<T>)> {
    if scores.ndim() != 2 || scores.shape()[1] == 0 {
        return Err(NetError::ShapeMismatch {
            what: "scores",
            got: scores.shape().to_vec(),
            expected: vec![labels.len(), 0],
        });
    }
    let (n, k) = (scores.shape()[0], scores.shape()[1]);
    if labels.len() != n {
        return Err(NetError::ShapeMismatch {
            what: "labels",
            got: vec![labels.len()],
            expected: vec![n],
        });
    }
    if let Some((index, &label)) = labels.iter().enumerate().find(|&(_, &y)| y >= k) {
        return Err(NetError::LabelOutOfRange {
            index,
            label,
            num_classes: k,
        });
    }
    if !scores.all_finite() {
        return Err(NetError::NonFinite { what: "class scores" });
    }

    let batch = T::from_f64(n as f64);
    let mut dx = Tensor::zeros(&[n, k]);
    let mut loss = T::ZERO;

    for ((row, drow), &y) in scores
        .values()
        .chunks(k)
        .zip(dx.values_mut().chunks_mut(k))
        .zip(labels)
    {
        let max = row.iter().copied().fold(row[0], T::max);
        let z: T = row.iter().map(|&s| (s - max).exp()).sum();
        let log_z = z.ln();

        for (j, (&s, d)) in row.iter().zip(drow.iter_mut()).enumerate() {
            let log_prob = s - max - log_z;
            if j == y {
                loss -= log_prob;
            }
            let target = if j == y { T::ONE } else { T::ZERO };
            *d = (log_prob.exp() - target) / batch;
        }
    }
    loss /= batch;

    if !loss.is_finite() {
        return Err(NetError::NonFinite { what: "softmax loss" });
    }
    Ok((loss, dx))
}
