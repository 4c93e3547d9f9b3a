pub mod cross_entropy;

pub use cross_entropy::{softmax_cross_entropy, LossFn, LossOutput};
