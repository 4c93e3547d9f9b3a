use std::path::Path;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Serialize, Deserialize};

use crate::error::ComputationError;
use crate::layers::{AvgPool2d, Conv2d, Dense, Flatten, Layer, Parameter};
use crate::math::tensor::Tensor;
use crate::network::spec::{LayerSpec, NetworkSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Per-sample input shape, batch dimension excluded.
    pub input_shape: Vec<usize>,
    pub layers: Vec<Layer>,
}

impl Network {
    /// The fixed LeNet classifier, He-initialized from `seed`.
    pub fn lenet(seed: u64) -> Network {
        Network::build(&NetworkSpec::lenet(), seed)
    }

    /// Builds a network from a spec after checking that every layer's input
    /// shape matches the previous layer's output.
    pub fn from_spec(spec: &NetworkSpec, seed: u64) -> Result<Network, ComputationError> {
        spec.output_shape(&spec.input_shape)?;
        Ok(Network::build(spec, seed))
    }

    fn build(spec: &NetworkSpec, seed: u64) -> Network {
        let mut rng = StdRng::seed_from_u64(seed);
        let layers = spec.layers.iter()
            .map(|layer| match *layer {
                LayerSpec::Conv2d { kernel, channels_in, channels_out, padding, activation } => {
                    Layer::Conv2d(Conv2d::new(channels_in, channels_out, kernel, padding, activation, &mut rng))
                }
                LayerSpec::AvgPool2d { kernel, stride } => Layer::AvgPool2d(AvgPool2d::new(kernel, stride)),
                LayerSpec::Flatten => Layer::Flatten(Flatten::new()),
                LayerSpec::Dense { input_size, size, activation } => {
                    Layer::Dense(Dense::new(input_size, size, activation, &mut rng))
                }
            })
            .collect();
        Network { input_shape: spec.input_shape.clone(), layers }
    }

    fn check_input(&self, input: &Tensor) -> Result<(), ComputationError> {
        if input.shape.len() != self.input_shape.len() + 1 || input.shape[1..] != self.input_shape[..] {
            let mut expected = vec![input.batch()];
            expected.extend_from_slice(&self.input_shape);
            return Err(ComputationError::ShapeMismatch {
                context: "network input".to_owned(),
                expected,
                found: input.shape.clone(),
            });
        }
        Ok(())
    }

    /// Forward pass; stores activations in each layer for backprop.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor, ComputationError> {
        self.check_input(input)?;
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current);
        }
        Ok(current)
    }

    /// Inference-only forward pass; leaves no state behind, so it can run on a shared reference.
    pub fn predict(&self, input: &Tensor) -> Result<Tensor, ComputationError> {
        self.check_input(input)?;
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.predict(&current);
        }
        Ok(current)
    }

    /// Backpropagates ∂L/∂output through every layer, accumulating parameter gradients.
    /// Must follow a `forward` call on the same batch.
    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad);
        }
        grad
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.layers.iter_mut().flat_map(|l| l.parameters_mut()).collect()
    }

    pub fn parameter_shapes(&self) -> Vec<Vec<usize>> {
        self.parameters().iter().map(|p| p.shape().to_vec()).collect()
    }

    /// Total number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.value.numel()).sum()
    }

    pub fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json<P: AsRef<Path>>(path: P) -> std::io::Result<Network> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
