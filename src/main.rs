use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ferrite_lenet::{lenet_train_mnist, Device, RunConfig};

/// Train a LeNet classifier on MNIST and chart validation accuracy and loss.
#[derive(Debug, Parser)]
#[command(name = "ferrite-lenet", version)]
struct Args {
    /// JSON run configuration; command-line flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of training epochs [default: 5]
    #[arg(long)]
    epochs: Option<usize>,

    /// Samples per mini-batch [default: 128]
    #[arg(long)]
    batch_size: Option<usize>,

    /// SGD learning rate [default: 0.1]
    #[arg(long)]
    learning_rate: Option<f64>,

    /// cpu, cpu-parallel or cpu-parallel:<threads> [default: cpu]
    #[arg(long)]
    device: Option<Device>,

    /// Directory with the MNIST IDX files (raw or .gz) [default: mnist_data]
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Chart output path; .svg, .png or .bmp [default: mnist.png]
    #[arg(long = "plot")]
    plot_path: Option<PathBuf>,

    /// Seed for weight initialization and shuffling [default: 0]
    #[arg(long)]
    seed: Option<u64>,

    /// Write per-epoch statistics as JSON
    #[arg(long = "history")]
    history_path: Option<PathBuf>,

    /// Write the trained network as JSON
    #[arg(long = "save-model")]
    model_path: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load_json(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.epochs { config.epochs = v; }
        if let Some(v) = self.batch_size { config.batch_size = v; }
        if let Some(v) = self.learning_rate { config.learning_rate = v; }
        if let Some(v) = self.device { config.device = v; }
        if let Some(v) = self.data_dir { config.data_dir = v; }
        if let Some(v) = self.plot_path { config.plot_path = v; }
        if let Some(v) = self.seed { config.seed = v; }
        if self.history_path.is_some() { config.history_path = self.history_path; }
        if self.model_path.is_some() { config.model_path = self.model_path; }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Args::parse().into_config()?;
    let report = lenet_train_mnist(&config).context("LeNet MNIST run failed")?;

    if let (Some(acc), Some(loss)) = (report.progress.accuracies.last(), report.progress.losses.last()) {
        tracing::info!(val_accuracy = acc, val_loss = loss, "final validation metrics");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunConfig {
        let argv = std::iter::once("ferrite-lenet").chain(args.iter().copied());
        Args::try_parse_from(argv).unwrap().into_config().unwrap()
    }

    #[test]
    fn no_flags_gives_the_defaults() {
        assert_eq!(parse(&[]), RunConfig::default());
    }

    #[test]
    fn flags_override_the_config_file_which_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("run.json");
        std::fs::write(
            &file,
            r#"{ "epochs": 7, "learning_rate": 0.05, "history_path": "from-file.json" }"#,
        )
        .unwrap();
        let file = file.to_str().unwrap();

        let config = parse(&["--config", file, "--epochs", "2", "--device", "cpu-parallel:2"]);
        assert_eq!(config.epochs, 2);
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.device, Device::CpuParallel { threads: 2 });
        assert_eq!(config.history_path, Some(PathBuf::from("from-file.json")));
        assert_eq!(config.model_path, None);
        assert_eq!(config.batch_size, 128);

        let config = parse(&["--config", file, "--history", "cli.json", "--save-model", "model.json"]);
        assert_eq!(config.epochs, 7);
        assert_eq!(config.history_path, Some(PathBuf::from("cli.json")));
        assert_eq!(config.model_path, Some(PathBuf::from("model.json")));
    }

    #[test]
    fn plot_flag_sets_the_chart_path() {
        assert_eq!(parse(&["--plot", "out.svg"]).plot_path, PathBuf::from("out.svg"));
    }

    #[test]
    fn unreadable_config_file_is_an_error() {
        let args = Args::try_parse_from(["ferrite-lenet", "--config", "/nonexistent/run.json"]).unwrap();
        assert!(args.into_config().is_err());
    }
}
