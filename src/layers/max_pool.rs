use log::trace;

use crate::error::{Error, Result};
use crate::layers::layer::{check_input, Layer, LayerKind};
use crate::math::tensor::{square_side, Tensor};
use crate::ops::convolution::output_dim;

/// Max pooling over `channels` square grids, sized like a convolution.
///
/// The forward pass remembers where each maximum came from; the backward
/// pass routes each upstream value to that position, adding where windows
/// overlap.
#[derive(Debug)]
pub struct MaxPoolingLayer {
    input_dim: usize,
    pool_size: usize,
    stride: usize,
    channels: usize,
    output_dim: usize,
    argmax: Option<Vec<usize>>,
}

impl MaxPoolingLayer {
    pub fn new(input_size: usize, pool_size: usize, stride: usize, channels: usize) -> Result<MaxPoolingLayer> {
        if channels == 0 || input_size % channels != 0 {
            return Err(Error::InvalidConfig(format!(
                "{input_size} inputs do not split into {channels} channels"
            )));
        }
        let input_dim = square_side(input_size / channels)?;
        let output_dim = output_dim(input_dim, pool_size, stride)?;
        trace!("max pool {channels}x{input_dim}x{input_dim} p{pool_size} s{stride} -> {output_dim}");
        Ok(MaxPoolingLayer {
            input_dim,
            pool_size,
            stride,
            channels,
            output_dim,
            argmax: None,
        })
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}

impl Layer for MaxPoolingLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::MaxPooling
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.channels * self.input_dim * self.input_dim)
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.channels * self.output_dim * self.output_dim)
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let (d, g) = (self.input_dim, self.output_dim);
        check_input(self.kind(), self.channels * d * d, input)?;
        let values = input.as_slice();

        let mut out = Tensor::new(self.channels * g * g, 1, 1);
        let mut argmax = vec![0; self.channels * g * g];
        for c in 0..self.channels {
            let base = c * d * d;
            for y in 0..g {
                for x in 0..g {
                    let mut best = base + (y * self.stride) * d + x * self.stride;
                    for b in 0..self.pool_size {
                        for a in 0..self.pool_size {
                            let i = base + (y * self.stride + b) * d + x * self.stride + a;
                            // a NaN anywhere in the window wins
                            if values[i] > values[best] || values[i].is_nan() {
                                best = i;
                            }
                        }
                    }
                    let o = c * g * g + y * g + x;
                    out[o] = values[best];
                    argmax[o] = best;
                }
            }
        }
        self.argmax = Some(argmax);
        Ok(out)
    }

    fn backward(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        check_input(self.kind(), self.channels * self.output_dim * self.output_dim, output_gradient)?;
        let argmax = self
            .argmax
            .as_ref()
            .ok_or(Error::BackwardBeforeForward(LayerKind::MaxPooling.name()))?;
        let mut dx = Tensor::new(self.channels * self.input_dim * self.input_dim, 1, 1);
        for (&source, &g) in argmax.iter().zip(output_gradient.as_slice()) {
            dx[source] += g;
        }
        Ok(dx)
    }
}
