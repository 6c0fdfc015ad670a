use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Index, IndexMut, Mul, Sub};

use crate::error::{Error, Result};

/// Dense container of up to three axes `(x, y, z)`.
///
/// Values live in one flat buffer addressed by `x + y*X + z*X*Y`, so `x` is
/// the fastest-varying axis. For 2-D use, `x` is the column and `y` the row
/// of each `z` channel. The shape never changes after construction; every
/// arithmetic method allocates a fresh tensor and leaves its operands alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: [usize; 3],
    data: Vec<f64>,
}

impl Tensor {
    /// Zero-filled tensor. Unused trailing axes are passed as `1`.
    pub fn new(x: usize, y: usize, z: usize) -> Tensor {
        Tensor {
            shape: [x, y, z],
            data: vec![0.0; x * y * z],
        }
    }

    pub fn zeros(shape: [usize; 3]) -> Tensor {
        Tensor::new(shape[0], shape[1], shape[2])
    }

    pub fn zeros_like(other: &Tensor) -> Tensor {
        Tensor::zeros(other.shape)
    }

    /// Wraps `data` in the given shape.
    pub fn from_vec(shape: [usize; 3], data: Vec<f64>) -> Result<Tensor> {
        if shape.iter().any(|&d| d == 0) {
            return Err(Error::InvalidShape(format!(
                "every axis must be positive, got {shape:?}"
            )));
        }
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::InvalidShape(format!(
                "shape {shape:?} holds {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Tensor { shape, data })
    }

    /// A column of values, shape `(n, 1, 1)`.
    pub fn vector(data: Vec<f64>) -> Tensor {
        Tensor {
            shape: [data.len(), 1, 1],
            data,
        }
    }

    /// Reshapes a flat vector into a `(d, d, 1)` grid, `d = round(sqrt(len))`.
    pub fn square(data: Vec<f64>) -> Result<Tensor> {
        let dim = square_side(data.len())?;
        Tensor::from_vec([dim, dim, 1], data)
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn x(&self) -> usize {
        self.shape[0]
    }

    pub fn y(&self) -> usize {
        self.shape[1]
    }

    pub fn z(&self) -> usize {
        self.shape[2]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable view of the values. The shape stays fixed.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    fn offset(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(
            x < self.shape[0] && y < self.shape[1] && z < self.shape[2],
            "index ({x}, {y}, {z}) out of bounds for shape {:?}",
            self.shape
        );
        x + y * self.shape[0] + z * self.shape[0] * self.shape[1]
    }

    /// Same values viewed as an `(n, 1, 1)` vector.
    pub fn flatten(&self) -> Tensor {
        Tensor::vector(self.data.clone())
    }

    /// Same values under a new shape with the same element count.
    pub fn reshape(&self, shape: [usize; 3]) -> Result<Tensor> {
        Tensor::from_vec(shape, self.data.clone())
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            shape: self.shape,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    fn zip_with<F>(&self, rhs: &Tensor, op: &'static str, f: F) -> Result<Tensor>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape != rhs.shape {
            return Err(Error::ShapeMismatch {
                op,
                left: self.shape,
                right: rhs.shape,
            });
        }
        Ok(Tensor {
            shape: self.shape,
            data: self
                .data
                .iter()
                .zip(&rhs.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub fn try_add(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_with(rhs, "add", |a, b| a + b)
    }

    pub fn try_sub(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_with(rhs, "sub", |a, b| a - b)
    }

    /// Element-wise division.
    pub fn try_div(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_with(rhs, "div", |a, b| a / b)
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_with(rhs, "hadamard", |a, b| a * b)
    }

    /// `self += factor * rhs`, in place. Used to accumulate gradients.
    pub fn add_scaled(&mut self, rhs: &Tensor, factor: f64) -> Result<()> {
        if self.shape != rhs.shape {
            return Err(Error::ShapeMismatch {
                op: "add_scaled",
                left: self.shape,
                right: rhs.shape,
            });
        }
        for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
            *a += factor * b;
        }
        Ok(())
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn scale(&self, factor: f64) -> Tensor {
        self.map(|v| v * factor)
    }

    pub fn pointwise_square(&self) -> Tensor {
        self.map(|v| v * v)
    }

    pub fn pointwise_sqrt(&self) -> Tensor {
        self.map(f64::sqrt)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn l2_norm(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Matrix product per channel, contracting the middle axis:
    /// `out[x,y,z] = Σ_n self[n,y,z] * rhs[x,n,z]`.
    ///
    /// Output rows are computed in parallel; each worker owns one row.
    pub fn matmul(&self, rhs: &Tensor) -> Result<Tensor> {
        let [inner, rows, channels] = self.shape;
        let [cols, rhs_inner, rhs_channels] = rhs.shape;
        if inner != rhs_inner || channels != rhs_channels {
            return Err(Error::ShapeMismatch {
                op: "matmul",
                left: self.shape,
                right: rhs.shape,
            });
        }

        let mut out = Tensor::new(cols, rows, channels);
        if out.is_empty() {
            return Ok(out);
        }

        out.data
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(row_index, row)| {
                let z = row_index / rows;
                let y = row_index % rows;
                for (x, cell) in row.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    for n in 0..inner {
                        sum += self[(n, y, z)] * rhs[(x, n, z)];
                    }
                    *cell = sum;
                }
            });

        Ok(out)
    }

    /// Swaps the `x` and `y` axes of every channel.
    pub fn transpose(&self) -> Tensor {
        let [xs, ys, zs] = self.shape;
        let mut out = Tensor::new(ys, xs, zs);
        for z in 0..zs {
            for y in 0..ys {
                for x in 0..xs {
                    out[(y, x, z)] = self[(x, y, z)];
                }
            }
        }
        out
    }

    /// Reverses both spatial axes of every channel.
    pub fn rotate_180(&self) -> Tensor {
        let [xs, ys, zs] = self.shape;
        let mut out = Tensor::zeros(self.shape);
        for z in 0..zs {
            for y in 0..ys {
                for x in 0..xs {
                    out[(xs - 1 - x, ys - 1 - y, z)] = self[(x, y, z)];
                }
            }
        }
        out
    }

    /// Copies `len` consecutive values starting at `start` into a vector.
    pub fn segment(&self, start: usize, len: usize) -> Result<Tensor> {
        let end = start + len;
        if end > self.data.len() {
            return Err(Error::InvalidShape(format!(
                "segment {start}..{end} exceeds {} values",
                self.data.len()
            )));
        }
        Ok(Tensor::vector(self.data[start..end].to_vec()))
    }

    /// Concatenates the values of every part into one vector.
    pub fn concat(parts: &[Tensor]) -> Tensor {
        let data = parts.iter().flat_map(|p| p.data.iter().copied()).collect();
        Tensor::vector(data)
    }
}

/// Side of the square grid holding `len` values.
pub fn square_side(len: usize) -> Result<usize> {
    let dim = (len as f64).sqrt().round() as usize;
    if dim == 0 || dim * dim != len {
        return Err(Error::InvalidShape(format!(
            "{len} values do not form a square grid"
        )));
    }
    Ok(dim)
}

impl Index<(usize, usize, usize)> for Tensor {
    type Output = f64;

    fn index(&self, (x, y, z): (usize, usize, usize)) -> &f64 {
        &self.data[self.offset(x, y, z)]
    }
}

impl IndexMut<(usize, usize, usize)> for Tensor {
    fn index_mut(&mut self, (x, y, z): (usize, usize, usize)) -> &mut f64 {
        let i = self.offset(x, y, z);
        &mut self.data[i]
    }
}

impl Index<(usize, usize)> for Tensor {
    type Output = f64;

    fn index(&self, (x, y): (usize, usize)) -> &f64 {
        &self[(x, y, 0)]
    }
}

impl IndexMut<(usize, usize)> for Tensor {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut f64 {
        &mut self[(x, y, 0)]
    }
}

impl Index<usize> for Tensor {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.data[i]
    }
}

impl IndexMut<usize> for Tensor {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.data[i]
    }
}

impl Add for &Tensor {
    type Output = Tensor;

    fn add(self, rhs: Self) -> Tensor {
        self.try_add(rhs).unwrap_or_else(|e| panic!("{e}"))
    }
}

impl Sub for &Tensor {
    type Output = Tensor;

    fn sub(self, rhs: Self) -> Tensor {
        self.try_sub(rhs).unwrap_or_else(|e| panic!("{e}"))
    }
}

impl Div for &Tensor {
    type Output = Tensor;

    fn div(self, rhs: Self) -> Tensor {
        self.try_div(rhs).unwrap_or_else(|e| panic!("{e}"))
    }
}

impl Mul<f64> for &Tensor {
    type Output = Tensor;

    fn mul(self, rhs: f64) -> Tensor {
        self.scale(rhs)
    }
}

impl Div<f64> for &Tensor {
    type Output = Tensor;

    fn div(self, rhs: f64) -> Tensor {
        self.map(|v| v / rhs)
    }
}
