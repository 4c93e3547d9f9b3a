use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{
    activation::activation::ActivationFunction,
    layers::parameter::Parameter,
    math::tensor::{matmul_acc, Tensor},
};

/// Spatial padding mode for a stride-1 convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// Zero-pad so the output keeps the input's height and width.
    Same,
    /// No padding; output shrinks by `kernel - 1` in each dimension.
    Valid,
}

impl Padding {
    pub fn amount(&self, kernel: usize) -> usize {
        match self {
            Padding::Same => kernel.saturating_sub(1) / 2,
            Padding::Valid => 0,
        }
    }
}

/// Geometry of one convolution call, derived from the layer and its input.
#[derive(Debug, Clone, Copy)]
struct ConvGeometry {
    channels_in: usize,
    channels_out: usize,
    kernel: usize,
    padding: usize,
    height_in: usize,
    width_in: usize,
    height_out: usize,
    width_out: usize,
}

impl ConvGeometry {
    fn patch_rows(&self) -> usize {
        self.channels_in * self.kernel * self.kernel
    }

    fn out_plane(&self) -> usize {
        self.height_out * self.width_out
    }

    fn in_plane(&self) -> usize {
        self.height_in * self.width_in
    }
}

/// 2-D convolution with square kernel, stride 1, and a fused activation.
///
/// Filters are stored as `[channels_out, channels_in, kernel, kernel]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub channels_in: usize,
    pub channels_out: usize,
    pub kernel: usize,
    pub padding: Padding,
    pub filters: Parameter,
    pub biases: Parameter, // [channels_out]
    pub activator: ActivationFunction,
    #[serde(skip)]
    cached_input: Option<Tensor>,
    #[serde(skip)]
    pre_activation: Option<Tensor>,
}

impl Conv2d {
    pub fn new<R: Rng>(
        channels_in: usize,
        channels_out: usize,
        kernel: usize,
        padding: Padding,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Conv2d {
        let fan_in = channels_in * kernel * kernel;
        Conv2d {
            channels_in,
            channels_out,
            kernel,
            padding,
            filters: Parameter::new(Tensor::he(
                &[channels_out, channels_in, kernel, kernel],
                fan_in,
                rng,
            )),
            biases: Parameter::new(Tensor::zeros(&[channels_out])),
            activator: activation,
            cached_input: None,
            pre_activation: None,
        }
    }

    /// Output `(height, width)` for an input plane of `(height, width)`.
    pub fn output_hw(&self, height: usize, width: usize) -> (usize, usize) {
        let p = self.padding.amount(self.kernel);
        (height + 2 * p + 1 - self.kernel, width + 2 * p + 1 - self.kernel)
    }

    fn geometry(&self, input: &Tensor) -> ConvGeometry {
        assert_eq!(input.shape.len(), 4, "Conv2d expects an NCHW input");
        assert_eq!(input.shape[1], self.channels_in, "Conv2d channel mismatch");
        let (height_in, width_in) = (input.shape[2], input.shape[3]);
        let (height_out, width_out) = self.output_hw(height_in, width_in);
        ConvGeometry {
            channels_in: self.channels_in,
            channels_out: self.channels_out,
            kernel: self.kernel,
            padding: self.padding.amount(self.kernel),
            height_in,
            width_in,
            height_out,
            width_out,
        }
    }

    fn compute(&self, input: &Tensor) -> (Tensor, Tensor) {
        let g = self.geometry(input);
        let batch = input.shape[0];
        let mut z = Tensor::zeros(&[batch, g.channels_out, g.height_out, g.width_out]);
        let mut patches = vec![0.0; g.patch_rows() * g.out_plane()];
        let out_len = g.channels_out * g.out_plane();

        for n in 0..batch {
            im2col(&g, input.row(n), &mut patches);
            let out = &mut z.data[n * out_len..(n + 1) * out_len];
            // (O, C·K·K) × (C·K·K, OH·OW) = (O, OH·OW)
            matmul_acc(
                &self.filters.value.data,
                &patches,
                out,
                g.channels_out,
                g.patch_rows(),
                g.out_plane(),
            );
            for (plane, b) in out.chunks_exact_mut(g.out_plane()).zip(&self.biases.value.data) {
                plane.iter_mut().for_each(|v| *v += b);
            }
        }

        let a = z.map(|x| self.activator.function(x));
        (z, a)
    }

    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        let (z, a) = self.compute(input);
        self.cached_input = Some(input.clone());
        self.pre_activation = Some(z);
        a
    }

    pub fn predict(&self, input: &Tensor) -> Tensor {
        self.compute(input).1
    }

    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let (input, z) = match (&self.cached_input, &self.pre_activation) {
            (Some(input), Some(z)) => (input, z),
            _ => panic!("Conv2d::backward called before forward"),
        };
        let g = self.geometry(input);
        let batch = input.shape[0];

        let act_derivative = z.map(|x| self.activator.derivative(x));
        let delta = grad_output.hadamard(&act_derivative);

        let rows = g.patch_rows();
        let plane = g.out_plane();

        // Wᵀ: (C·K·K, O), used to fold the output error back into patch space.
        let mut filters_tr = vec![0.0; rows * g.channels_out];
        for o in 0..g.channels_out {
            for r in 0..rows {
                filters_tr[r * g.channels_out + o] = self.filters.value.data[o * rows + r];
            }
        }

        let mut f_grad = Tensor::zeros(&self.filters.value.shape);
        let mut b_grad = Tensor::zeros(&[g.channels_out]);
        let mut grad_input = Tensor::zeros(&input.shape);
        let mut patches = vec![0.0; rows * plane];
        let mut col_grad = vec![0.0; rows * plane];
        let in_len = g.channels_in * g.in_plane();

        for n in 0..batch {
            let d = delta.row(n);
            im2col(&g, input.row(n), &mut patches);

            // ∂L/∂W += δ · patchesᵀ: (O, OH·OW) × (OH·OW, C·K·K)
            for o in 0..g.channels_out {
                let d_plane = &d[o * plane..(o + 1) * plane];
                b_grad.data[o] += d_plane.iter().sum::<f64>();
                for r in 0..rows {
                    let p_row = &patches[r * plane..(r + 1) * plane];
                    f_grad.data[o * rows + r] +=
                        d_plane.iter().zip(p_row).map(|(a, b)| a * b).sum::<f64>();
                }
            }

            // ∂L/∂x = col2im(Wᵀ · δ)
            col_grad.iter_mut().for_each(|v| *v = 0.0);
            matmul_acc(&filters_tr, d, &mut col_grad, rows, g.channels_out, plane);
            col2im(&g, &col_grad, &mut grad_input.data[n * in_len..(n + 1) * in_len]);
        }

        self.filters.accumulate_grad(&f_grad);
        self.biases.accumulate_grad(&b_grad);
        grad_input
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.filters, &mut self.biases]
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.filters, &self.biases]
    }
}

/// Unfolds one `[C, H, W]` image into `[C·K·K, OH·OW]` patches; padded taps read as zero.
fn im2col(g: &ConvGeometry, img: &[f64], patches: &mut [f64]) {
    let plane = g.out_plane();
    for c in 0..g.channels_in {
        for k1 in 0..g.kernel {
            for k2 in 0..g.kernel {
                let r = (c * g.kernel + k1) * g.kernel + k2;
                let row = &mut patches[r * plane..(r + 1) * plane];
                for oh in 0..g.height_out {
                    let y = (oh + k1).wrapping_sub(g.padding);
                    for ow in 0..g.width_out {
                        let x = (ow + k2).wrapping_sub(g.padding);
                        row[oh * g.width_out + ow] = if y < g.height_in && x < g.width_in {
                            img[c * g.in_plane() + y * g.width_in + x]
                        } else {
                            0.0
                        };
                    }
                }
            }
        }
    }
}

/// Inverse of `im2col`: scatters patch gradients back onto the `[C, H, W]` image, summing overlaps.
fn col2im(g: &ConvGeometry, cols: &[f64], img_grad: &mut [f64]) {
    let plane = g.out_plane();
    for c in 0..g.channels_in {
        for k1 in 0..g.kernel {
            for k2 in 0..g.kernel {
                let r = (c * g.kernel + k1) * g.kernel + k2;
                let row = &cols[r * plane..(r + 1) * plane];
                for oh in 0..g.height_out {
                    let y = (oh + k1).wrapping_sub(g.padding);
                    if y >= g.height_in {
                        continue;
                    }
                    for ow in 0..g.width_out {
                        let x = (ow + k2).wrapping_sub(g.padding);
                        if x < g.width_in {
                            img_grad[c * g.in_plane() + y * g.width_in + x] += row[oh * g.width_out + ow];
                        }
                    }
                }
            }
        }
    }
}
