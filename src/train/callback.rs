use crate::train::epoch_stats::EpochStats;

/// Lifecycle events fired by `TrainingLoop::fit`, in this order per run:
///
/// `FitStart`, then for each epoch `EpochStart`, one `BatchEnd` per training
/// batch, `ValidationStart`, `ValidationEnd`, `EpochEnd`; finally `FitEnd`.
#[derive(Debug, Clone, Copy)]
pub enum LoopEvent<'a> {
    FitStart { epochs: usize },
    EpochStart { epoch: usize, batches: usize },
    BatchEnd { epoch: usize, batch: usize, batches: usize, loss: f64 },
    ValidationStart { epoch: usize },
    ValidationEnd(&'a EpochStats),
    EpochEnd(&'a EpochStats),
    FitEnd { epochs_completed: usize },
}

/// Observer invoked synchronously from inside the training loop.
pub trait Callback {
    fn on_event(&mut self, event: &LoopEvent<'_>);
}

impl<F> Callback for F
where
    F: FnMut(&LoopEvent<'_>),
{
    fn on_event(&mut self, event: &LoopEvent<'_>) {
        self(event)
    }
}
