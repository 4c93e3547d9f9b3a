pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;
pub mod data;
pub mod device;
pub mod config;
pub mod error;
pub mod plot;
pub mod workflow;

// Convenience re-exports
pub use math::tensor::Tensor;
pub use activation::activation::ActivationFunction;
pub use layers::Layer;
pub use network::{Network, NetworkSpec};
pub use loss::cross_entropy::softmax_cross_entropy;
pub use optim::sgd::Sgd;
pub use train::{Callback, EpochStats, LoopEvent, TrainingLoop, TrainingProgress};
pub use data::mnist::Mnist;
pub use device::Device;
pub use config::RunConfig;
pub use error::RunError;
pub use workflow::{lenet_train_mnist, train_on, RunReport};
