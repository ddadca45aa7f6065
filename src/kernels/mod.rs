//! Reference driver-side kernels.
//!
//! Between taking the forward leg and posting the backward leg, the driver
//! performs an external gradient computation. These kernels are the
//! host-memory reference versions of that work, exercised by the
//! integration tests so round trips carry real gradients rather than
//! placeholder buffers. They operate directly on [`TensorValue`] buffers.

pub mod batch_norm;

use miette::Diagnostic;
use thiserror::Error;

use crate::bundle::{BundleError, DType, TensorValue};

/// Errors raised by kernel execution.
#[derive(Debug, Error, Diagnostic)]
pub enum KernelError {
    /// A tensor's shape disagrees with what the kernel requires.
    #[error("{what}: expected shape {expected:?}, got {actual:?}")]
    #[diagnostic(code(gradrelay::kernels::shape_mismatch))]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A tensor's rank is below what the kernel requires.
    #[error("{what}: expected rank of at least {expected_at_least}, got {actual}")]
    #[diagnostic(code(gradrelay::kernels::invalid_rank))]
    InvalidRank {
        what: &'static str,
        expected_at_least: usize,
        actual: usize,
    },

    /// A tensor's element type disagrees with its siblings.
    #[error("{what}: expected dtype {expected}, got {actual}")]
    #[diagnostic(code(gradrelay::kernels::dtype_mismatch))]
    DTypeMismatch {
        what: &'static str,
        expected: DType,
        actual: DType,
    },

    /// The kernel has no implementation for this element type.
    #[error("unsupported dtype {dtype}")]
    #[diagnostic(code(gradrelay::kernels::unsupported_dtype))]
    UnsupportedDType { dtype: DType },

    /// No conversion exists between the two element types.
    #[error("no cast from {from} to {to}")]
    #[diagnostic(code(gradrelay::kernels::unsupported_cast))]
    UnsupportedCast { from: DType, to: DType },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bundle(#[from] BundleError),
}

/// Convert a tensor's element type, preserving shape.
///
/// Numeric conversions follow Rust `as` semantics (float-to-int truncates
/// toward zero). Boolean buffers only cast to themselves.
pub fn cast(value: &TensorValue, to: DType) -> Result<TensorValue, KernelError> {
    let shape = value.shape().to_vec();
    let from = value.dtype();
    if from == to {
        return Ok(value.clone());
    }
    let cast = match (from, to) {
        (DType::F32, DType::F64) => {
            let data = value.as_f32().unwrap_or(&[]);
            TensorValue::f64(shape, data.iter().map(|&v| f64::from(v)).collect())?
        }
        (DType::F64, DType::F32) => {
            let data = value.as_f64().unwrap_or(&[]);
            TensorValue::f32(shape, data.iter().map(|&v| v as f32).collect())?
        }
        (DType::I64, DType::F32) => {
            let data = value.as_i64().unwrap_or(&[]);
            TensorValue::f32(shape, data.iter().map(|&v| v as f32).collect())?
        }
        (DType::I64, DType::F64) => {
            let data = value.as_i64().unwrap_or(&[]);
            TensorValue::f64(shape, data.iter().map(|&v| v as f64).collect())?
        }
        (DType::F32, DType::I64) => {
            let data = value.as_f32().unwrap_or(&[]);
            TensorValue::i64(shape, data.iter().map(|&v| v as i64).collect())?
        }
        (DType::F64, DType::I64) => {
            let data = value.as_f64().unwrap_or(&[]);
            TensorValue::i64(shape, data.iter().map(|&v| v as i64).collect())?
        }
        (from, to) => return Err(KernelError::UnsupportedCast { from, to }),
    };
    Ok(cast)
}
