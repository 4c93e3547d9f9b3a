pub mod conv2d;
pub mod dense;
pub mod flatten;
pub mod parameter;
pub mod pool;

use serde::{Serialize, Deserialize};

use crate::math::tensor::Tensor;

pub use conv2d::{Conv2d, Padding};
pub use dense::Dense;
pub use flatten::Flatten;
pub use parameter::Parameter;
pub use pool::AvgPool2d;

/// One stage of a feed-forward `Network`.
///
/// `forward` caches whatever `backward` needs; `predict` is the read-only
/// inference path and may be called from several threads at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Layer {
    Conv2d(Conv2d),
    AvgPool2d(AvgPool2d),
    Flatten(Flatten),
    Dense(Dense),
}

impl Layer {
    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        match self {
            Layer::Conv2d(l) => l.forward(input),
            Layer::AvgPool2d(l) => l.forward(input),
            Layer::Flatten(l) => l.forward(input),
            Layer::Dense(l) => l.forward(input),
        }
    }

    pub fn predict(&self, input: &Tensor) -> Tensor {
        match self {
            Layer::Conv2d(l) => l.predict(input),
            Layer::AvgPool2d(l) => l.predict(input),
            Layer::Flatten(l) => l.predict(input),
            Layer::Dense(l) => l.predict(input),
        }
    }

    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        match self {
            Layer::Conv2d(l) => l.backward(grad_output),
            Layer::AvgPool2d(l) => l.backward(grad_output),
            Layer::Flatten(l) => l.backward(grad_output),
            Layer::Dense(l) => l.backward(grad_output),
        }
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        match self {
            Layer::Conv2d(l) => l.parameters(),
            Layer::Dense(l) => l.parameters(),
            Layer::AvgPool2d(_) | Layer::Flatten(_) => vec![],
        }
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        match self {
            Layer::Conv2d(l) => l.parameters_mut(),
            Layer::Dense(l) => l.parameters_mut(),
            Layer::AvgPool2d(_) | Layer::Flatten(_) => vec![],
        }
    }
}
