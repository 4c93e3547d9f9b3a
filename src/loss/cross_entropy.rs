use crate::error::ComputationError;
use crate::math::tensor::Tensor;

/// Result of evaluating a classification loss on one batch.
#[derive(Debug, Clone)]
pub struct LossOutput {
    /// Mean loss over the batch.
    pub loss: f64,
    /// ∂(mean loss)/∂logits, same shape as the logits.
    pub grad: Tensor,
    /// Number of samples whose argmax logit equals the label.
    pub correct: usize,
}

/// Signature shared by the loss functions the training loop accepts.
pub type LossFn = fn(&Tensor, &[usize]) -> Result<LossOutput, ComputationError>;

/// Numerically stable softmax of one row of logits.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the maximum element in a slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Softmax cross-entropy over raw logits `[batch, classes]` and integer labels.
///
/// Per sample, L = logsumexp(z) - z[label]. Softmax and cross-entropy are
/// fused, so the gradient w.r.t. the logits simplifies to
///   ∂L/∂z_i = softmax(z)_i - onehot(label)_i
/// which is then divided by the batch size to match the mean loss.
pub fn softmax_cross_entropy(logits: &Tensor, labels: &[usize]) -> Result<LossOutput, ComputationError> {
    if logits.shape.len() != 2 {
        return Err(ComputationError::ShapeMismatch {
            context: "softmax_cross_entropy logits".to_owned(),
            expected: vec![labels.len(), 0],
            found: logits.shape.clone(),
        });
    }
    let (batch, classes) = (logits.shape[0], logits.shape[1]);
    if batch != labels.len() {
        return Err(ComputationError::LabelCount { batch, labels: labels.len() });
    }
    if let Some(&label) = labels.iter().find(|&&l| l >= classes) {
        return Err(ComputationError::LabelOutOfRange { label, classes });
    }
    if batch == 0 {
        return Ok(LossOutput { loss: 0.0, grad: logits.clone(), correct: 0 });
    }

    let inv_batch = 1.0 / batch as f64;
    let mut grad = Tensor::zeros(&logits.shape);
    let mut total = 0.0;
    let mut correct = 0;

    for (n, &label) in labels.iter().enumerate() {
        let row = logits.row(n);
        let probs = softmax(row);
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let log_sum_exp = max + row.iter().map(|&z| (z - max).exp()).sum::<f64>().ln();
        total += log_sum_exp - row[label];
        if argmax(row) == label {
            correct += 1;
        }
        let g_row = &mut grad.data[n * classes..(n + 1) * classes];
        for (i, (g, p)) in g_row.iter_mut().zip(probs).enumerate() {
            let target = if i == label { 1.0 } else { 0.0 };
            *g = (p - target) * inv_batch;
        }
    }

    Ok(LossOutput { loss: total * inv_batch, grad, correct })
}
