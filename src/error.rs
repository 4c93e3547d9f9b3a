use std::fmt;
use std::io;
use std::path::PathBuf;

/// Invalid or unreadable run configuration.
#[derive(Debug)]
pub enum ConfigError {
    InvalidBatchSize,
    InvalidLearningRate(f64),
    UnknownDevice(String),
    UnsupportedPlotFormat(PathBuf),
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBatchSize => write!(f, "batch_size must be at least 1"),
            ConfigError::InvalidLearningRate(lr) => {
                write!(f, "learning_rate must be finite and positive, got {}", lr)
            }
            ConfigError::UnknownDevice(s) => write!(
                f,
                "unknown device '{}' (expected 'cpu', 'cpu-parallel' or 'cpu-parallel:<threads>')",
                s
            ),
            ConfigError::UnsupportedPlotFormat(path) => write!(
                f,
                "cannot write a chart to '{}' (use .svg, .png, .jpg, .bmp or .gif)",
                path.display()
            ),
            ConfigError::Read { path, .. } => write!(f, "cannot read config '{}'", path.display()),
            ConfigError::Parse { path, .. } => write!(f, "cannot parse config '{}'", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Missing, unreadable or malformed dataset files.
#[derive(Debug)]
pub enum DatasetError {
    Io { path: PathBuf, source: io::Error },
    Format { path: PathBuf, reason: String },
    InvalidBatchSize,
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Io { path, .. } => write!(f, "cannot read dataset file '{}'", path.display()),
            DatasetError::Format { path, reason } => {
                write!(f, "malformed dataset file '{}': {}", path.display(), reason)
            }
            DatasetError::InvalidBatchSize => write!(f, "batch_size must be at least 1"),
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures raised while running the network or the training loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputationError {
    ShapeMismatch { context: String, expected: Vec<usize>, found: Vec<usize> },
    LabelCount { batch: usize, labels: usize },
    LabelOutOfRange { label: usize, classes: usize },
    NonFiniteLoss { epoch: usize, batch: usize },
    ParameterMismatch { expected: Vec<Vec<usize>>, found: Vec<Vec<usize>> },
}

impl fmt::Display for ComputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputationError::ShapeMismatch { context, expected, found } => {
                write!(f, "{}: expected shape {:?}, found {:?}", context, expected, found)
            }
            ComputationError::LabelCount { batch, labels } => {
                write!(f, "batch has {} samples but {} labels", batch, labels)
            }
            ComputationError::LabelOutOfRange { label, classes } => {
                write!(f, "label {} is out of range for {} classes", label, classes)
            }
            ComputationError::NonFiniteLoss { epoch, batch } => {
                write!(f, "loss became non-finite at epoch {}, batch {}", epoch, batch)
            }
            ComputationError::ParameterMismatch { expected, found } => write!(
                f,
                "optimizer was bound to parameters {:?} but the network has {:?}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for ComputationError {}

/// Failure to render or write the accuracy/loss chart.
#[derive(Debug)]
pub enum PlotError {
    Io { path: PathBuf, source: io::Error },
    Image { path: PathBuf, source: image::ImageError },
}

impl fmt::Display for PlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlotError::Io { path, .. } => write!(f, "cannot write chart '{}'", path.display()),
            PlotError::Image { path, .. } => write!(f, "cannot encode chart '{}'", path.display()),
        }
    }
}

impl std::error::Error for PlotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlotError::Io { source, .. } => Some(source),
            PlotError::Image { source, .. } => Some(source),
        }
    }
}

/// Top-level error of a training run.
///
/// Separates dataset and I/O problems from failures inside the computation,
/// so callers can tell "fix your files" apart from "the run diverged".
#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Dataset(DatasetError),
    Computation(ComputationError),
    Plot(PlotError),
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(_) => write!(f, "invalid configuration"),
            RunError::Dataset(_) => write!(f, "dataset could not be loaded"),
            RunError::Computation(_) => write!(f, "training failed"),
            RunError::Plot(_) => write!(f, "chart could not be written"),
            RunError::Io { path, .. } => write!(f, "cannot write '{}'", path.display()),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(e) => Some(e),
            RunError::Dataset(e) => Some(e),
            RunError::Computation(e) => Some(e),
            RunError::Plot(e) => Some(e),
            RunError::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<DatasetError> for RunError {
    fn from(e: DatasetError) -> Self {
        RunError::Dataset(e)
    }
}

impl From<ComputationError> for RunError {
    fn from(e: ComputationError) -> Self {
        RunError::Computation(e)
    }
}

impl From<PlotError> for RunError {
    fn from(e: PlotError) -> Self {
        RunError::Plot(e)
    }
}
