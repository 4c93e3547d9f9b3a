use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{
    activation::activation::ActivationFunction,
    layers::parameter::Parameter,
    math::tensor::{matmul_acc, Tensor},
};

/// Fully-connected layer: `a = f(x·W + b)` over a `[batch, input_size]` input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub input_size: usize,
    pub size: usize,
    pub weights: Parameter, // [input_size, size]
    pub biases: Parameter,  // [size]
    pub activator: ActivationFunction,
    #[serde(skip)]
    cached_input: Option<Tensor>,
    #[serde(skip)]
    pre_neurons: Option<Tensor>, // pre-activation values (z = xW + b) needed for correct derivative
}

impl Dense {
    pub fn new<R: Rng>(
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Dense {
        Dense {
            input_size,
            size,
            weights: Parameter::new(Tensor::he(&[input_size, size], input_size, rng)),
            biases: Parameter::new(Tensor::zeros(&[size])),
            activator: activation,
            cached_input: None,
            pre_neurons: None,
        }
    }

    /// Returns `(z, a)` for a `[batch, input_size]` input.
    fn compute(&self, input: &Tensor) -> (Tensor, Tensor) {
        assert_eq!(input.shape.len(), 2, "Dense expects a [batch, features] input");
        assert_eq!(input.shape[1], self.input_size, "Dense input width mismatch");
        let batch = input.shape[0];

        let mut z = Tensor::zeros(&[batch, self.size]);
        matmul_acc(&input.data, &self.weights.value.data, &mut z.data, batch, self.input_size, self.size);
        for row in z.data.chunks_exact_mut(self.size) {
            for (v, b) in row.iter_mut().zip(&self.biases.value.data) {
                *v += b;
            }
        }
        let a = z.map(|x| self.activator.function(x));
        (z, a)
    }

    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        let (z, a) = self.compute(input);
        self.cached_input = Some(input.clone());
        self.pre_neurons = Some(z);
        a
    }

    pub fn predict(&self, input: &Tensor) -> Tensor {
        self.compute(input).1
    }

    /// Accumulates weight/bias gradients and returns ∂L/∂x.
    /// `grad_output` is ∂L/∂a for this layer (error in activation space).
    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let (input, z) = match (&self.cached_input, &self.pre_neurons) {
            (Some(input), Some(z)) => (input, z),
            _ => panic!("Dense::backward called before forward"),
        };
        let batch = input.shape[0];

        // δ = error ⊙ σ'(z)
        let act_derivative = z.map(|x| self.activator.derivative(x));
        let delta = grad_output.hadamard(&act_derivative);

        // ∂L/∂W = xᵀ·δ
        let mut w_grad = Tensor::zeros(&[self.input_size, self.size]);
        for n in 0..batch {
            let x_row = input.row(n);
            let d_row = delta.row(n);
            for (i, &x) in x_row.iter().enumerate() {
                if x == 0.0 {
                    continue;
                }
                let w_row = &mut w_grad.data[i * self.size..(i + 1) * self.size];
                for (w, &d) in w_row.iter_mut().zip(d_row) {
                    *w += x * d;
                }
            }
        }

        // ∂L/∂b = Σ_batch δ
        let mut b_grad = Tensor::zeros(&[self.size]);
        for n in 0..batch {
            for (b, &d) in b_grad.data.iter_mut().zip(delta.row(n)) {
                *b += d;
            }
        }

        // ∂L/∂x = δ·Wᵀ
        let mut grad_input = Tensor::zeros(&[batch, self.input_size]);
        for n in 0..batch {
            let d_row = delta.row(n);
            let g_row = &mut grad_input.data[n * self.input_size..(n + 1) * self.input_size];
            for (i, g) in g_row.iter_mut().enumerate() {
                let w_row = &self.weights.value.data[i * self.size..(i + 1) * self.size];
                *g = w_row.iter().zip(d_row).map(|(w, d)| w * d).sum();
            }
        }

        self.weights.accumulate_grad(&w_grad);
        self.biases.accumulate_grad(&b_grad);
        grad_input
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weights, &mut self.biases]
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weights, &self.biases]
    }
}
