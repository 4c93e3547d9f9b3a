use serde::{Serialize, Deserialize};

/// Per-epoch training statistics emitted by `TrainingLoop::fit`.
///
/// Passed to callbacks on `ValidationEnd` / `EpochEnd`, sent on the optional
/// progress channel, and returned as the run's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over all samples seen in this epoch.
    pub train_loss: f64,
    /// Training accuracy as a fraction in [0, 1], measured while the weights were still moving.
    pub train_accuracy: f64,
    /// Mean validation loss after the epoch's updates; 0.0 for an empty validation split.
    pub val_loss: f64,
    /// Validation accuracy as a fraction in [0, 1]; 0.0 for an empty validation split.
    pub val_accuracy: f64,
    /// Wall-clock duration of this single epoch (training and validation) in milliseconds.
    pub elapsed_ms: u64,
}
