//! Batch-normalization gradient, host reference implementation.
//!
//! Inputs mirror the backward op described by the `batch_norm` entry in
//! [`crate::ops::config`]: the output gradient, the saved forward input,
//! the scale, and the per-channel statistics saved by the forward pass
//! (mean and inverse standard deviation). Outputs are the gradients for
//! input, scale, and bias.
//!
//! Tensors use the channels-second layout `(N, C, spatial…)`; statistics
//! are per-channel vectors of length `C`. All five inputs must share one
//! float element type.

use ndarray::{Array3, ArrayView1, ArrayView3, Axis, NdFloat};

use crate::bundle::{DType, TensorValue};
use crate::kernels::KernelError;

/// Gradients produced by [`batch_norm_grad`].
#[derive(Clone, Debug, PartialEq)]
pub struct BatchNormGrads {
    /// Gradient w.r.t. the input, same shape as the input.
    pub dx: TensorValue,
    /// Gradient w.r.t. the scale, shape `(C,)`.
    pub dscale: TensorValue,
    /// Gradient w.r.t. the bias, shape `(C,)`.
    pub dbias: TensorValue,
}

trait BnElem: NdFloat {
    fn from_count(n: usize) -> Self;
}

impl BnElem for f32 {
    fn from_count(n: usize) -> f32 {
        n as f32
    }
}

impl BnElem for f64 {
    fn from_count(n: usize) -> f64 {
        n as f64
    }
}

/// Training-mode batch-norm backward.
///
/// With `x̂ = (x − μ) · inv_std` per channel over `m = N · spatial`
/// elements:
///
/// ```text
/// dBias  = Σ dy
/// dScale = Σ dy · x̂
/// dX     = scale · inv_std · (dy − dBias/m − x̂ · dScale/m)
/// ```
pub fn batch_norm_grad(
    grad_output: &TensorValue,
    input: &TensorValue,
    scale: &TensorValue,
    saved_mean: &TensorValue,
    saved_inv_std: &TensorValue,
) -> Result<BatchNormGrads, KernelError> {
    validate_shapes(grad_output, input, scale, saved_mean, saved_inv_std)?;

    let dtype = input.dtype();
    for (what, value) in [
        ("grad_output", grad_output),
        ("scale", scale),
        ("saved_mean", saved_mean),
        ("saved_inv_std", saved_inv_std),
    ] {
        if value.dtype() != dtype {
            return Err(KernelError::DTypeMismatch {
                what,
                expected: dtype,
                actual: value.dtype(),
            });
        }
    }

    match dtype {
        DType::F32 => {
            let (dx, dscale, dbias) = compute::<f32>(
                grad_output.as_f32().unwrap_or(&[]),
                input.as_f32().unwrap_or(&[]),
                scale.as_f32().unwrap_or(&[]),
                saved_mean.as_f32().unwrap_or(&[]),
                saved_inv_std.as_f32().unwrap_or(&[]),
                input.shape(),
            )?;
            let channels = scale.shape().to_vec();
            Ok(BatchNormGrads {
                dx: TensorValue::f32(input.shape().to_vec(), dx)?,
                dscale: TensorValue::f32(channels.clone(), dscale)?,
                dbias: TensorValue::f32(channels, dbias)?,
            })
        }
        DType::F64 => {
            let (dx, dscale, dbias) = compute::<f64>(
                grad_output.as_f64().unwrap_or(&[]),
                input.as_f64().unwrap_or(&[]),
                scale.as_f64().unwrap_or(&[]),
                saved_mean.as_f64().unwrap_or(&[]),
                saved_inv_std.as_f64().unwrap_or(&[]),
                input.shape(),
            )?;
            let channels = scale.shape().to_vec();
            Ok(BatchNormGrads {
                dx: TensorValue::f64(input.shape().to_vec(), dx)?,
                dscale: TensorValue::f64(channels.clone(), dscale)?,
                dbias: TensorValue::f64(channels, dbias)?,
            })
        }
        dtype => Err(KernelError::UnsupportedDType { dtype }),
    }
}

fn validate_shapes(
    grad_output: &TensorValue,
    input: &TensorValue,
    scale: &TensorValue,
    saved_mean: &TensorValue,
    saved_inv_std: &TensorValue,
) -> Result<(), KernelError> {
    if input.shape().len() < 2 {
        return Err(KernelError::InvalidRank {
            what: "input",
            expected_at_least: 2,
            actual: input.shape().len(),
        });
    }
    if grad_output.shape() != input.shape() {
        return Err(KernelError::ShapeMismatch {
            what: "grad_output",
            expected: input.shape().to_vec(),
            actual: grad_output.shape().to_vec(),
        });
    }
    let channel_shape = [input.shape()[1]];
    for (what, value) in [
        ("scale", scale),
        ("saved_mean", saved_mean),
        ("saved_inv_std", saved_inv_std),
    ] {
        if value.shape() != channel_shape {
            return Err(KernelError::ShapeMismatch {
                what,
                expected: channel_shape.to_vec(),
                actual: value.shape().to_vec(),
            });
        }
    }
    Ok(())
}

#[allow(clippy::type_complexity)]
fn compute<A: BnElem>(
    dy: &[A],
    x: &[A],
    scale: &[A],
    mean: &[A],
    inv_std: &[A],
    shape: &[usize],
) -> Result<(Vec<A>, Vec<A>, Vec<A>), KernelError> {
    let n = shape[0];
    let c = shape[1];
    let spatial: usize = shape[2..].iter().product();
    let to_view = |what: &'static str, data: &[A]| {
        ArrayView3::from_shape((n, c, spatial), data)
            .map(|v| v.to_owned())
            .map_err(|_| KernelError::ShapeMismatch {
                what,
                expected: shape.to_vec(),
                actual: vec![data.len()],
            })
    };
    let dy = to_view("grad_output", dy)?;
    let x = to_view("input", x)?;
    let scale = ArrayView1::from(scale);
    let mean = ArrayView1::from(mean);
    let inv_std = ArrayView1::from(inv_std);

    let m = A::from_count(n * spatial);
    let mut dx = Array3::<A>::zeros((n, c, spatial));
    let mut dscale = vec![A::zero(); c];
    let mut dbias = vec![A::zero(); c];

    for ch in 0..c {
        let dy_ch = dy.index_axis(Axis(1), ch);
        let x_ch = x.index_axis(Axis(1), ch);

        let xhat = x_ch.mapv(|v| (v - mean[ch]) * inv_std[ch]);
        let sum_dy = dy_ch.sum();
        let sum_dy_xhat = (&dy_ch * &xhat).sum();

        let mean_dy = sum_dy / m;
        let mean_dy_xhat = sum_dy_xhat / m;
        let coef = scale[ch] * inv_std[ch];

        let mut dx_ch = dy_ch.to_owned();
        dx_ch.zip_mut_with(&xhat, |d, &xh| {
            *d = (*d - mean_dy - xh * mean_dy_xhat) * coef;
        });
        dx.index_axis_mut(Axis(1), ch).assign(&dx_ch);

        dscale[ch] = sum_dy_xhat;
        dbias[ch] = sum_dy;
    }

    Ok((dx.into_iter().collect(), dscale, dbias))
}
