use log::trace;
use rand::RngCore;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::layers::layer::{check_input, Layer, LayerKind, ParameterizedLayer};
use crate::layers::params::ParameterSet;
use crate::math::init::he_normal;
use crate::math::tensor::{square_side, Tensor};
use crate::ops::convolution::{correlate, input_gradient, output_dim, weight_gradient};

/// Square-kernel convolutional layer over `channels` stacked square grids.
///
/// The flat input is `channels` grids of `d×d` laid end to end; the flat
/// output is `filters` grids of `g×g` with `g = (d - k)/s + 1`. Every filter
/// owns one kernel per input channel and sums their correlations. The kernel
/// pairing input channel `c` with filter `f` is weight `c * filters + f`.
/// There is no bias.
#[derive(Debug)]
pub struct ConvolutionalLayer {
    input_dim: usize,
    kernel_size: usize,
    stride: usize,
    channels: usize,
    filters: usize,
    output_dim: usize,
    params: ParameterSet,
    input: Option<Vec<Tensor>>,
}

impl ConvolutionalLayer {
    /// `input_size` is the flat length of all channels together.
    pub fn new(
        input_size: usize,
        kernel_size: usize,
        stride: usize,
        channels: usize,
        filters: usize,
    ) -> Result<ConvolutionalLayer> {
        if channels == 0 || filters == 0 {
            return Err(Error::InvalidConfig(format!(
                "convolution needs at least one channel and filter, got {channels} and {filters}"
            )));
        }
        if input_size % channels != 0 {
            return Err(Error::InvalidConfig(format!(
                "{input_size} inputs do not split into {channels} channels"
            )));
        }
        let input_dim = square_side(input_size / channels)?;
        let output_dim = output_dim(input_dim, kernel_size, stride)?;
        trace!(
            "convolution {channels}x{input_dim}x{input_dim} k{kernel_size} s{stride} -> {filters}x{output_dim}x{output_dim}"
        );

        let kernels = (0..channels * filters)
            .map(|_| Tensor::new(kernel_size, kernel_size, 1))
            .collect();
        let mut layer = ConvolutionalLayer {
            input_dim,
            kernel_size,
            stride,
            channels,
            filters,
            output_dim,
            params: ParameterSet::new(kernels, Vec::new()),
            input: None,
        };
        layer.initialize_parameters(&mut rand::thread_rng());
        Ok(layer)
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn filters(&self) -> usize {
        self.filters
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn kernel(&self, channel: usize, filter: usize) -> &Tensor {
        &self.params.weights()[channel * self.filters + filter]
    }
}

/// Cuts a flat vector into `count` square grids of side `dim`.
fn split_grids(flat: &Tensor, count: usize, dim: usize) -> Result<Vec<Tensor>> {
    let area = dim * dim;
    (0..count)
        .map(|i| flat.segment(i * area, area)?.reshape([dim, dim, 1]))
        .collect()
}

impl Layer for ConvolutionalLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Convolutional
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.channels * self.input_dim * self.input_dim)
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.filters * self.output_dim * self.output_dim)
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        check_input(self.kind(), self.channels * self.input_dim * self.input_dim, input)?;
        let grids = split_grids(input, self.channels, self.input_dim)?;

        let maps = (0..self.filters)
            .into_par_iter()
            .map(|f| -> Result<Tensor> {
                let mut map = Tensor::new(self.output_dim, self.output_dim, 1);
                for (c, grid) in grids.iter().enumerate() {
                    map.add_scaled(&correlate(grid, self.kernel(c, f), self.stride)?, 1.0)?;
                }
                Ok(map)
            })
            .collect::<Result<Vec<Tensor>>>()?;

        self.input = Some(grids);
        Ok(Tensor::concat(&maps))
    }

    fn backward(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        check_input(self.kind(), self.filters * self.output_dim * self.output_dim, output_gradient)?;
        let grids = self
            .input
            .as_ref()
            .ok_or(Error::BackwardBeforeForward(LayerKind::Convolutional.name()))?;
        let upstream = split_grids(output_gradient, self.filters, self.output_dim)?;

        // one task per input channel: its kernels' gradients and its input gradient
        let per_channel = grids
            .par_iter()
            .enumerate()
            .map(|(c, grid)| -> Result<(Vec<Tensor>, Tensor)> {
                let mut kernel_grads = Vec::with_capacity(self.filters);
                let mut grid_grad = Tensor::zeros_like(grid);
                for (f, g) in upstream.iter().enumerate() {
                    kernel_grads.push(weight_gradient(grid, g, self.stride)?);
                    grid_grad.add_scaled(&input_gradient(self.kernel(c, f), g, self.stride)?, 1.0)?;
                }
                Ok((kernel_grads, grid_grad))
            })
            .collect::<Result<Vec<(Vec<Tensor>, Tensor)>>>()?;

        let mut input_grads = Vec::with_capacity(self.channels);
        for (c, (kernel_grads, grid_grad)) in per_channel.into_iter().enumerate() {
            for (f, grad) in kernel_grads.iter().enumerate() {
                self.params.accumulate_weight(c * self.filters + f, grad)?;
            }
            input_grads.push(grid_grad);
        }
        Ok(Tensor::concat(&input_grads))
    }

    fn as_parameterized(&self) -> Option<&dyn ParameterizedLayer> {
        Some(self)
    }

    fn as_parameterized_mut(&mut self) -> Option<&mut dyn ParameterizedLayer> {
        Some(self)
    }
}

impl ParameterizedLayer for ConvolutionalLayer {
    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn initialize_parameters(&mut self, rng: &mut dyn RngCore) {
        let k = self.kernel_size;
        let fan_in = self.channels * k * k;
        for kernel in self.params.weights_mut() {
            *kernel = he_normal([k, k, 1], fan_in, rng);
        }
        self.params.reset_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn sizes_follow_the_output_formula() {
        let layer = ConvolutionalLayer::new(81, 3, 2, 1, 2).unwrap();
        assert_eq!(layer.output_dim(), 4);
        assert_eq!(layer.input_size(), Some(81));
        assert_eq!(layer.output_size(), Some(32));
        assert_eq!(layer.weights().len(), 2);
        assert!(layer.biases().is_empty());

        let stacked = ConvolutionalLayer::new(32, 2, 2, 2, 3).unwrap();
        assert_eq!(stacked.output_size(), Some(12));
        assert_eq!(stacked.weights().len(), 6);
    }

    #[test]
    fn rejects_ill_formed_configurations() {
        // (4 - 3) % 2 != 0
        assert!(ConvolutionalLayer::new(16, 3, 2, 1, 1).is_err());
        assert!(ConvolutionalLayer::new(9, 4, 1, 1, 1).is_err());
        assert!(ConvolutionalLayer::new(10, 3, 1, 1, 1).is_err());
        assert!(ConvolutionalLayer::new(18, 3, 1, 4, 1).is_err());
        assert!(ConvolutionalLayer::new(9, 3, 1, 1, 0).is_err());
    }

    #[test]
    fn full_kernel_is_a_dot_product() {
        let mut layer = ConvolutionalLayer::new(9, 3, 1, 1, 1).unwrap();
        let kernel = Tensor::from_vec([3, 3, 1], (1..=9).map(f64::from).collect()).unwrap();
        layer.load_parameters(vec![kernel], Vec::new()).unwrap();
        let out = layer.forward(&Tensor::vector(vec![1.0; 9])).unwrap();
        assert_eq!(out.as_slice(), &[45.0]);
    }

    #[test]
    fn filters_sum_over_channels() {
        let mut layer = ConvolutionalLayer::new(2, 1, 1, 2, 1).unwrap();
        layer
            .load_parameters(
                vec![Tensor::vector(vec![2.0]), Tensor::vector(vec![3.0])],
                Vec::new(),
            )
            .unwrap();
        let out = layer.forward(&Tensor::vector(vec![1.0, 10.0])).unwrap();
        assert_eq!(out.as_slice(), &[32.0]);

        let dx = layer.backward(&Tensor::vector(vec![1.0])).unwrap();
        assert_eq!(dx.as_slice(), &[2.0, 3.0]);
        assert_eq!(layer.weight_gradients()[0][0], 1.0);
        assert_eq!(layer.weight_gradients()[1][0], 10.0);
    }

    #[test]
    fn initialization_is_seeded() {
        let mut a = ConvolutionalLayer::new(25, 3, 1, 1, 2).unwrap();
        let mut b = ConvolutionalLayer::new(25, 3, 1, 1, 2).unwrap();
        a.initialize_parameters(&mut StdRng::seed_from_u64(9));
        b.initialize_parameters(&mut StdRng::seed_from_u64(9));
        assert_eq!(a.weights(), b.weights());
        assert_ne!(a.weights()[0], a.weights()[1]);
    }

    #[test]
    fn backward_before_forward_fails() {
        let mut layer = ConvolutionalLayer::new(9, 3, 1, 1, 1).unwrap();
        assert!(matches!(
            layer.backward(&Tensor::vector(vec![1.0])),
            Err(Error::BackwardBeforeForward(_))
        ));
    }
}
