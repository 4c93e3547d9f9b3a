use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::ComputationError;
use crate::layers::conv2d::Padding;

/// Describes one layer in a network specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Square-kernel, stride-1 convolution followed by `activation`.
    Conv2d {
        kernel: usize,
        channels_in: usize,
        channels_out: usize,
        padding: Padding,
        activation: ActivationFunction,
    },
    AvgPool2d { kernel: usize, stride: usize },
    Flatten,
    /// Fully-connected layer: `input_size -> size`.
    Dense {
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
    },
}

impl LayerSpec {
    /// Shape of one sample after this layer, given the per-sample input shape
    /// (batch dimension excluded).
    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>, ComputationError> {
        match *self {
            LayerSpec::Conv2d { kernel, channels_in, channels_out, padding, .. } => {
                if kernel == 0 || channels_in == 0 || channels_out == 0 {
                    let expected = vec![channels_in.max(1), kernel.max(1), kernel.max(1)];
                    return Err(mismatch(self, expected, input));
                }
                let (h, w) = image_dims(self, input, channels_in)?;
                let p = padding.amount(kernel);
                if h + 2 * p < kernel || w + 2 * p < kernel {
                    return Err(mismatch(self, vec![channels_in, kernel, kernel], input));
                }
                Ok(vec![channels_out, h + 2 * p + 1 - kernel, w + 2 * p + 1 - kernel])
            }
            LayerSpec::AvgPool2d { kernel, stride } => {
                let channels = input.first().copied().unwrap_or(0);
                let (h, w) = image_dims(self, input, channels)?;
                if kernel == 0 || stride == 0 || h < kernel || w < kernel {
                    return Err(mismatch(self, vec![channels, kernel, kernel], input));
                }
                Ok(vec![channels, (h - kernel) / stride + 1, (w - kernel) / stride + 1])
            }
            LayerSpec::Flatten => Ok(vec![input.iter().product()]),
            LayerSpec::Dense { input_size, size, .. } => {
                if input_size == 0 || size == 0 || input != [input_size] {
                    return Err(mismatch(self, vec![input_size], input));
                }
                Ok(vec![size])
            }
        }
    }
}

fn image_dims(
    layer: &LayerSpec,
    input: &[usize],
    channels: usize,
) -> Result<(usize, usize), ComputationError> {
    match *input {
        [c, h, w] if c == channels => Ok((h, w)),
        _ => Err(mismatch(layer, vec![channels, 0, 0], input)),
    }
}

fn mismatch(layer: &LayerSpec, expected: Vec<usize>, found: &[usize]) -> ComputationError {
    ComputationError::ShapeMismatch {
        context: format!("{:?}", layer),
        expected,
        found: found.to_vec(),
    }
}

/// A fully serializable description of a network architecture.
///
/// `NetworkSpec` is checked for shape consistency before any weights are
/// allocated, and is the single source `Network::from_spec` builds from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    /// Per-sample input shape, `[channels, height, width]`.
    pub input_shape: Vec<usize>,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
    /// LeNet-5 variant for 28×28 grayscale digits:
    /// two conv + average-pool stages, then three dense layers down to 10 logits.
    pub fn lenet() -> NetworkSpec {
        use ActivationFunction::{Identity, ReLU};
        NetworkSpec {
            name: "lenet".to_owned(),
            input_shape: vec![1, 28, 28],
            layers: vec![
                LayerSpec::Conv2d { kernel: 5, channels_in: 1, channels_out: 6, padding: Padding::Same, activation: ReLU },
                LayerSpec::AvgPool2d { kernel: 2, stride: 2 },
                LayerSpec::Conv2d { kernel: 5, channels_in: 6, channels_out: 16, padding: Padding::Valid, activation: ReLU },
                LayerSpec::AvgPool2d { kernel: 2, stride: 2 },
                LayerSpec::Flatten,
                LayerSpec::Dense { input_size: 400, size: 40, activation: ReLU },
                LayerSpec::Dense { input_size: 40, size: 20, activation: ReLU },
                LayerSpec::Dense { input_size: 20, size: 10, activation: Identity },
            ],
        }
    }

    /// Folds `output_shape` through every layer.
    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>, ComputationError> {
        self.layers
            .iter()
            .try_fold(input.to_vec(), |shape, layer| layer.output_shape(&shape))
    }
}
