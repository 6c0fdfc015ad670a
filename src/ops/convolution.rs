//! Strided 2-D cross-correlation and its two adjoints.
//!
//! Every grid here is a square single-channel `Tensor` of shape `(d, d, 1)`.
//! The forward operator is
//!
//! ```text
//! out[x, y] = Σ_{a,b} input[x*s + a, y*s + b] * weight[a, b]
//! ```
//!
//! with `outDim = (d - k) / s + 1`. The backward operators are expressed as
//! stride-1 correlations over a dilated (and, for the input gradient, padded)
//! copy of the upstream gradient, so the same `output_dim` formula sizes
//! every result.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// Side length of the correlation of a `d`-grid with a `k`-kernel at stride `s`.
///
/// Rejects combinations where `(d - k) / s` is not a whole number: those
/// leave trailing input cells unread and break the adjoint sizes.
pub fn output_dim(input_dim: usize, kernel: usize, stride: usize) -> Result<usize> {
    if kernel == 0 || stride == 0 {
        return Err(Error::InvalidConfig(format!(
            "kernel ({kernel}) and stride ({stride}) must be positive"
        )));
    }
    if kernel > input_dim {
        return Err(Error::InvalidConfig(format!(
            "kernel {kernel} is larger than the {input_dim}x{input_dim} input"
        )));
    }
    if (input_dim - kernel) % stride != 0 {
        return Err(Error::InvalidConfig(format!(
            "({input_dim} - {kernel}) is not divisible by stride {stride}"
        )));
    }
    Ok((input_dim - kernel) / stride + 1)
}

fn grid_side(t: &Tensor, what: &str) -> Result<usize> {
    let [x, y, z] = t.shape();
    if x == 0 || x != y || z != 1 {
        return Err(Error::InvalidShape(format!(
            "{what} must be a square single-channel grid, got {:?}",
            t.shape()
        )));
    }
    Ok(x)
}

/// Strided cross-correlation (no kernel flip). Output rows run in parallel.
pub fn correlate(image: &Tensor, kernel: &Tensor, stride: usize) -> Result<Tensor> {
    let dim = grid_side(image, "image")?;
    let k = grid_side(kernel, "kernel")?;
    let out_dim = output_dim(dim, k, stride)?;

    let mut out = Tensor::new(out_dim, out_dim, 1);
    out.as_mut_slice()
        .par_chunks_mut(out_dim)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, cell) in row.iter_mut().enumerate() {
                let mut sum = 0.0;
                for b in 0..k {
                    for a in 0..k {
                        sum += image[(x * stride + a, y * stride + b)] * kernel[(a, b)];
                    }
                }
                *cell = sum;
            }
        });
    Ok(out)
}

/// Inserts `stride - 1` zeros between neighbouring cells along both axes,
/// turning a `g×g` grid into `g + (s-1)(g-1)` per side.
pub fn dilate(gradient: &Tensor, stride: usize) -> Result<Tensor> {
    pad_and_dilate(gradient, stride, 1)
}

/// Dilates like [`dilate`] and then surrounds the result with `kernel - 1`
/// zeros on every side.
pub fn pad_and_dilate(gradient: &Tensor, stride: usize, kernel: usize) -> Result<Tensor> {
    if stride == 0 || kernel == 0 {
        return Err(Error::InvalidConfig(format!(
            "kernel ({kernel}) and stride ({stride}) must be positive"
        )));
    }
    let g = grid_side(gradient, "gradient")?;
    let padding = kernel - 1;
    let dilated = g + (stride - 1) * (g - 1);
    let out_dim = dilated + 2 * padding;

    let mut out = Tensor::new(out_dim, out_dim, 1);
    for y in 0..g {
        for x in 0..g {
            out[(padding + x * stride, padding + y * stride)] = gradient[(x, y)];
        }
    }
    Ok(out)
}

/// `∂L/∂W` for one kernel: the input correlated at stride 1 with the dilated
/// upstream gradient. The result has the kernel's shape.
pub fn weight_gradient(input: &Tensor, output_gradient: &Tensor, stride: usize) -> Result<Tensor> {
    let dilated = dilate(output_gradient, stride)?;
    correlate(input, &dilated, 1)
}

/// `∂L/∂X` for one kernel: the padded, dilated upstream gradient correlated
/// at stride 1 with the kernel rotated by 180°. The result has the input's
/// shape.
pub fn input_gradient(weight: &Tensor, output_gradient: &Tensor, stride: usize) -> Result<Tensor> {
    let k = grid_side(weight, "kernel")?;
    let padded = pad_and_dilate(output_gradient, stride, k)?;
    correlate(&padded, &weight.rotate_180(), 1)
}
