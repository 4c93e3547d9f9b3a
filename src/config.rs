use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::ConfigError;
use crate::plot;

/// Every knob of a training run.
///
/// Missing fields in a JSON config file take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub device: Device,
    /// Directory holding the four MNIST IDX files (optionally `.gz`).
    pub data_dir: PathBuf,
    /// Chart output; the extension picks the format (`.svg`, `.png`, `.bmp`, …).
    pub plot_path: PathBuf,
    /// Seeds weight initialization and the training shuffle.
    pub seed: u64,
    /// Where to write the per-epoch history as JSON, if anywhere.
    pub history_path: Option<PathBuf>,
    /// Where to write the trained network as JSON, if anywhere.
    pub model_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            epochs: 5,
            batch_size: 128,
            learning_rate: 0.1,
            device: Device::Cpu,
            data_dir: PathBuf::from("mnist_data"),
            plot_path: PathBuf::from("mnist.png"),
            seed: 0,
            history_path: None,
            model_path: None,
        }
    }
}

impl RunConfig {
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        if !plot::is_supported_path(&self.plot_path) {
            return Err(ConfigError::UnsupportedPlotFormat(self.plot_path.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let config = RunConfig::default();
        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.learning_rate, 0.1);
        assert_eq!(config.device, Device::Cpu);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config: RunConfig =
            serde_json::from_str(r#"{ "epochs": 2, "device": "cpu-parallel:2" }"#).unwrap();
        assert_eq!(config.epochs, 2);
        assert_eq!(config.device, Device::CpuParallel { threads: 2 });
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.plot_path, PathBuf::from("mnist.png"));
    }

    #[test]
    fn rejects_zero_batch_and_bad_learning_rate() {
        let mut config = RunConfig { batch_size: 0, ..RunConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBatchSize)));
        config.batch_size = 1;
        config.learning_rate = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLearningRate(_))));
        config.learning_rate = -0.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLearningRate(_))));
    }

    #[test]
    fn rejects_chart_paths_no_encoder_can_write() {
        for path in ["mnist.pdf", "mnist"] {
            let config = RunConfig { plot_path: PathBuf::from(path), ..RunConfig::default() };
            assert!(matches!(config.validate(), Err(ConfigError::UnsupportedPlotFormat(_))));
        }
        let config = RunConfig { plot_path: PathBuf::from("chart.svg"), ..RunConfig::default() };
        assert!(config.validate().is_ok());
    }
}
