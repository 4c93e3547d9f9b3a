use serde::{Serialize, Deserialize};

use crate::math::tensor::Tensor;

/// Average pooling over `kernel × kernel` windows with the given stride, no padding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvgPool2d {
    pub kernel: usize,
    pub stride: usize,
    #[serde(skip)]
    cached_shape: Option<Vec<usize>>,
}

impl AvgPool2d {
    pub fn new(kernel: usize, stride: usize) -> AvgPool2d {
        AvgPool2d { kernel, stride, cached_shape: None }
    }

    pub fn output_hw(&self, height: usize, width: usize) -> (usize, usize) {
        (
            (height - self.kernel) / self.stride + 1,
            (width - self.kernel) / self.stride + 1,
        )
    }

    pub fn predict(&self, input: &Tensor) -> Tensor {
        assert_eq!(input.shape.len(), 4, "AvgPool2d expects an NCHW input");
        let (n, c, h, w) = (input.shape[0], input.shape[1], input.shape[2], input.shape[3]);
        let (oh_max, ow_max) = self.output_hw(h, w);
        let inv_k2 = 1.0 / (self.kernel * self.kernel) as f64;

        let mut out = Tensor::zeros(&[n, c, oh_max, ow_max]);
        for plane_idx in 0..n * c {
            let inp = &input.data[plane_idx * h * w..(plane_idx + 1) * h * w];
            let dst = &mut out.data[plane_idx * oh_max * ow_max..(plane_idx + 1) * oh_max * ow_max];
            for oh in 0..oh_max {
                for ow in 0..ow_max {
                    let mut tmp = 0.0;
                    for k1 in 0..self.kernel {
                        let y = oh * self.stride + k1;
                        for k2 in 0..self.kernel {
                            tmp += inp[y * w + ow * self.stride + k2];
                        }
                    }
                    dst[oh * ow_max + ow] = tmp * inv_k2;
                }
            }
        }
        out
    }

    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_shape = Some(input.shape.clone());
        self.predict(input)
    }

    /// Spreads each output gradient evenly over its window.
    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let shape = self
            .cached_shape
            .clone()
            .unwrap_or_else(|| panic!("AvgPool2d::backward called before forward"));
        let (n, c, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let (oh_max, ow_max) = self.output_hw(h, w);
        let inv_k2 = 1.0 / (self.kernel * self.kernel) as f64;

        let mut grad_input = Tensor::zeros(&shape);
        for plane_idx in 0..n * c {
            let g_out = &grad_output.data[plane_idx * oh_max * ow_max..(plane_idx + 1) * oh_max * ow_max];
            let g_in = &mut grad_input.data[plane_idx * h * w..(plane_idx + 1) * h * w];
            for oh in 0..oh_max {
                for ow in 0..ow_max {
                    let g = g_out[oh * ow_max + ow] * inv_k2;
                    for k1 in 0..self.kernel {
                        let y = oh * self.stride + k1;
                        for k2 in 0..self.kernel {
                            g_in[y * w + ow * self.stride + k2] += g;
                        }
                    }
                }
            }
        }
        grad_input
    }
}
