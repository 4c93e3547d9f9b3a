use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::train::callback::{Callback, LoopEvent};

/// Console progress: a batch progress bar per epoch on stderr, and one
/// `tracing` line per finished epoch.
#[derive(Default)]
pub struct ProgressPrinter {
    bar: Option<ProgressBar>,
}

impl ProgressPrinter {
    pub fn new() -> ProgressPrinter {
        ProgressPrinter::default()
    }
}

impl Callback for ProgressPrinter {
    fn on_event(&mut self, event: &LoopEvent<'_>) {
        match *event {
            LoopEvent::EpochStart { epoch, batches } => {
                let bar = ProgressBar::new(batches as u64);
                bar.set_style(
                    ProgressStyle::with_template("{prefix} [{bar:40}] {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                bar.set_prefix(format!("Epoch {}", epoch));
                self.bar = Some(bar);
            }
            LoopEvent::BatchEnd { loss, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(format!("loss: {:.4}", loss));
                    bar.inc(1);
                }
            }
            LoopEvent::EpochEnd(stats) => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                info!(
                    epoch = stats.epoch,
                    total = stats.total_epochs,
                    train_loss = stats.train_loss,
                    train_accuracy = stats.train_accuracy,
                    val_loss = stats.val_loss,
                    val_accuracy = stats.val_accuracy,
                    elapsed_ms = stats.elapsed_ms,
                    "epoch finished"
                );
            }
            LoopEvent::FitEnd { .. } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
            }
            _ => {}
        }
    }
}
