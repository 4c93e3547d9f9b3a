use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::config::RunConfig;
use crate::data::mnist::Mnist;
use crate::error::RunError;
use crate::loss::cross_entropy::softmax_cross_entropy;
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::plot::plot;
use crate::train::{Callback, EpochStats, ProgressPrinter, TrainingLoop, TrainingProgress};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub progress: TrainingProgress,
    pub history: Vec<EpochStats>,
    /// Wall-clock seconds spent inside `TrainingLoop::fit`.
    pub elapsed_secs: f64,
    pub plot_path: PathBuf,
    pub network: Network,
}

/// Loads MNIST from `config.data_dir`, then trains and plots via `train_on`.
pub fn lenet_train_mnist(config: &RunConfig) -> Result<RunReport, RunError> {
    config.validate()?;
    let dataset = Mnist::load(&config.data_dir, config.batch_size, config.seed)?;
    train_on(config, &dataset)
}

/// Trains a fresh LeNet on `dataset` for `config.epochs` epochs, reports the
/// elapsed time on stdout, and renders validation accuracy/loss to
/// `config.plot_path`.
///
/// The dataset's own batch size is used; `config.batch_size` only applies
/// when the dataset is loaded by `lenet_train_mnist`.
pub fn train_on(config: &RunConfig, dataset: &Mnist) -> Result<RunReport, RunError> {
    config.validate()?;

    let mut classifier = Network::lenet(config.seed);
    info!(
        parameters = classifier.parameter_count(),
        device = %config.device,
        epochs = config.epochs,
        batch_size = dataset.batch_size,
        training_samples = dataset.training().sample_count(),
        validation_samples = dataset.validation().sample_count(),
        learning_rate = config.learning_rate,
        "starting LeNet training"
    );

    let optimizer = Sgd::new(&classifier, config.learning_rate);
    let mut training_progress = TrainingProgress::new();
    let mut printer = ProgressPrinter::new();

    let start_time = Instant::now();
    let history = {
        let callbacks: Vec<&mut dyn Callback> = vec![&mut training_progress, &mut printer];
        let mut training_loop = TrainingLoop::new(
            dataset.training(),
            dataset.validation(),
            optimizer,
            softmax_cross_entropy,
            callbacks,
        );
        training_loop.fit(&mut classifier, config.epochs, config.device)?
    };
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    println!("Time elapsed: {} s.", elapsed_secs);

    plot(&training_progress.accuracies, &training_progress.losses, &config.plot_path)?;

    if let Some(path) = &config.history_path {
        write_json(path, &history)?;
        info!(path = %path.display(), "history written");
    }
    if let Some(path) = &config.model_path {
        classifier
            .save_json(path)
            .map_err(|source| RunError::Io { path: path.clone(), source })?;
        info!(path = %path.display(), "model written");
    }

    Ok(RunReport {
        progress: training_progress,
        history,
        elapsed_secs,
        plot_path: config.plot_path.clone(),
        network: classifier,
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), RunError> {
    let io_err = |source| RunError::Io { path: path.to_path_buf(), source };
    let file = std::fs::File::create(path).map_err(io_err)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
        .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::Other, e)))
}
