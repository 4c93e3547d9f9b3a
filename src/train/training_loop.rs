use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::data::mnist::{Batch, Split};
use crate::device::Device;
use crate::error::ComputationError;
use crate::loss::cross_entropy::LossFn;
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::train::callback::{Callback, LoopEvent};
use crate::train::epoch_stats::EpochStats;

/// Drives epochs of mini-batch SGD followed by a validation pass, firing
/// `LoopEvent`s to every registered callback.
///
/// Callbacks are borrowed so that accumulators such as `TrainingProgress`
/// can be read once the loop is dropped.
pub struct TrainingLoop<'a> {
    training: Split<'a>,
    validation: Split<'a>,
    optimizer: Sgd,
    loss: LossFn,
    callbacks: Vec<&'a mut dyn Callback>,
    progress_tx: Option<mpsc::Sender<EpochStats>>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl<'a> TrainingLoop<'a> {
    pub fn new(
        training: Split<'a>,
        validation: Split<'a>,
        optimizer: Sgd,
        loss: LossFn,
        callbacks: Vec<&'a mut dyn Callback>,
    ) -> TrainingLoop<'a> {
        TrainingLoop {
            training,
            validation,
            optimizer,
            loss,
            callbacks,
            progress_tx: None,
            stop_flag: None,
        }
    }

    /// Sends one `EpochStats` per completed epoch. If the receiver has been
    /// dropped the loop stops after the current epoch.
    pub fn with_progress_channel(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// When the flag is set from another thread, the loop stops at the next epoch boundary.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    fn emit(&mut self, event: LoopEvent<'_>) {
        for callback in self.callbacks.iter_mut() {
            callback.on_event(&event);
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Trains `network` in place for up to `epochs` epochs and returns the
    /// statistics of every completed epoch.
    ///
    /// Any failure aborts the run immediately; parameters keep whatever
    /// updates were applied before the failing batch.
    pub fn fit(
        &mut self,
        network: &mut Network,
        epochs: usize,
        device: Device,
    ) -> Result<Vec<EpochStats>, ComputationError> {
        network.zero_grad();
        let mut history = Vec::with_capacity(epochs);
        self.emit(LoopEvent::FitStart { epochs });

        for epoch in 1..=epochs {
            if self.stop_requested() {
                debug!(epoch, "stop flag set; ending fit early");
                break;
            }

            let t_start = Instant::now();
            let batches = self.training.epoch();
            let batch_count = batches.len();
            self.emit(LoopEvent::EpochStart { epoch, batches: batch_count });

            // ── One full pass over the training data ───────────────────────
            let mut loss_sum = 0.0;
            let mut correct = 0usize;
            let mut seen = 0usize;
            for (i, batch) in batches.enumerate() {
                let logits = network.forward(&batch.images)?;
                let out = (self.loss)(&logits, &batch.labels)?;
                if !out.loss.is_finite() {
                    return Err(ComputationError::NonFiniteLoss { epoch, batch: i + 1 });
                }
                network.backward(&out.grad);
                self.optimizer.step(network)?;

                loss_sum += out.loss * batch.labels.len() as f64;
                correct += out.correct;
                seen += batch.labels.len();
                self.emit(LoopEvent::BatchEnd {
                    epoch,
                    batch: i + 1,
                    batches: batch_count,
                    loss: out.loss,
                });
            }

            // ── Validation ─────────────────────────────────────────────────
            self.emit(LoopEvent::ValidationStart { epoch });
            let val_batches: Vec<Batch> = self.validation.epoch().collect();
            let (val_loss, val_accuracy) = evaluate(network, &val_batches, self.loss, device)?;

            let stats = EpochStats {
                epoch,
                total_epochs: epochs,
                train_loss: ratio(loss_sum, seen),
                train_accuracy: ratio(correct as f64, seen),
                val_loss,
                val_accuracy,
                elapsed_ms: t_start.elapsed().as_millis() as u64,
            };
            self.emit(LoopEvent::ValidationEnd(&stats));
            self.emit(LoopEvent::EpochEnd(&stats));
            history.push(stats.clone());

            if let Some(ref tx) = self.progress_tx {
                // If the receiver has been dropped, stop training.
                if tx.send(stats).is_err() {
                    warn!(epoch, "progress receiver dropped; ending fit early");
                    break;
                }
            }
        }

        self.emit(LoopEvent::FitEnd { epochs_completed: history.len() });
        Ok(history)
    }
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}

/// Mean loss and accuracy of `network` over `batches`, without updating parameters.
///
/// On a multi-threaded device the batches are split into contiguous shards,
/// one per thread, and evaluated on the rayon pool. Shard totals are combined
/// in order so the result does not depend on scheduling.
pub fn evaluate(
    network: &Network,
    batches: &[Batch],
    loss: LossFn,
    device: Device,
) -> Result<(f64, f64), ComputationError> {
    let threads = device.threads().clamp(1, batches.len().max(1));

    let totals: Vec<Result<(f64, usize, usize), ComputationError>> = if threads == 1 {
        vec![evaluate_shard(network, batches, loss)]
    } else {
        let shard_len = (batches.len() + threads - 1) / threads;
        batches
            .par_chunks(shard_len)
            .map(|shard| evaluate_shard(network, shard, loss))
            .collect()
    };

    let (mut loss_sum, mut correct, mut count) = (0.0, 0usize, 0usize);
    for shard in totals {
        let (l, c, n) = shard?;
        loss_sum += l;
        correct += c;
        count += n;
    }
    Ok((ratio(loss_sum, count), ratio(correct as f64, count)))
}

fn evaluate_shard(
    network: &Network,
    batches: &[Batch],
    loss: LossFn,
) -> Result<(f64, usize, usize), ComputationError> {
    let (mut loss_sum, mut correct, mut count) = (0.0, 0usize, 0usize);
    for batch in batches {
        let logits = network.predict(&batch.images)?;
        let out = loss(&logits, &batch.labels)?;
        loss_sum += out.loss * batch.labels.len() as f64;
        correct += out.correct;
        count += batch.labels.len();
    }
    Ok((loss_sum, correct, count))
}
