use crate::train::callback::{Callback, LoopEvent};

/// Accumulates validation accuracy and loss, one entry per completed epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingProgress {
    pub accuracies: Vec<f64>,
    pub losses: Vec<f64>,
}

impl TrainingProgress {
    pub fn new() -> TrainingProgress {
        TrainingProgress::default()
    }

    pub fn len(&self) -> usize {
        self.accuracies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accuracies.is_empty()
    }
}

impl Callback for TrainingProgress {
    fn on_event(&mut self, event: &LoopEvent<'_>) {
        if let LoopEvent::ValidationEnd(stats) = event {
            self.accuracies.push(stats.val_accuracy);
            self.losses.push(stats.val_loss);
        }
    }
}
