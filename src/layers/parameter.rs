use serde::{Serialize, Deserialize};

use crate::math::tensor::Tensor;

/// A trainable tensor together with its accumulated gradient.
///
/// The gradient is not serialized; a freshly loaded parameter has none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub value: Tensor,
    #[serde(skip)]
    pub grad: Option<Tensor>,
}

impl Parameter {
    pub fn new(value: Tensor) -> Parameter {
        Parameter { value, grad: None }
    }

    pub fn accumulate_grad(&mut self, grad: &Tensor) {
        match self.grad.as_mut() {
            Some(acc) => acc.add_scaled(grad, 1.0),
            None => self.grad = Some(grad.clone()),
        }
    }

    pub fn zero_grad(&mut self) {
        self.grad = None;
    }

    pub fn shape(&self) -> &[usize] {
        &self.value.shape
    }
}
