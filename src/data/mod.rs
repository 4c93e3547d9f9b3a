pub mod idx;
pub mod mnist;

pub use mnist::{Batch, Batches, LabeledImages, Mnist, Split, MNIST_CLASSES};
