use serde::{Serialize, Deserialize};

use crate::math::tensor::Tensor;

/// Collapses every dimension after the batch dimension: `[N, ...] -> [N, prod(...)]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flatten {
    #[serde(skip)]
    cached_shape: Option<Vec<usize>>,
}

impl Flatten {
    pub fn new() -> Flatten {
        Flatten::default()
    }

    pub fn predict(&self, input: &Tensor) -> Tensor {
        let features = input.shape[1..].iter().product();
        input.clone().reshape(&[input.batch(), features])
    }

    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_shape = Some(input.shape.clone());
        self.predict(input)
    }

    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let shape = self
            .cached_shape
            .clone()
            .unwrap_or_else(|| panic!("Flatten::backward called before forward"));
        grad_output.clone().reshape(&shape)
    }
}
