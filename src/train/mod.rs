pub mod callback;
pub mod epoch_stats;
pub mod printer;
pub mod progress;
pub mod training_loop;

pub use callback::{Callback, LoopEvent};
pub use epoch_stats::EpochStats;
pub use printer::ProgressPrinter;
pub use progress::TrainingProgress;
pub use training_loop::{evaluate, TrainingLoop};
