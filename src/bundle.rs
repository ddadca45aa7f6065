//! Transport types for values crossing the executor/driver boundary.
//!
//! A [`ValueBundle`] is an ordered sequence of [`TensorValue`]s. Order is
//! significant: position *i* posted on one side of a hand-off must be
//! consumed as position *i* on the other, because the graph executor binds
//! resumed values positionally to the outputs expected at the yield node.
//!
//! Tensors here are plain host-memory buffers with an explicit shape. The
//! relay never inspects their contents; it only moves them between threads.
//!
//! # Examples
//!
//! ```rust
//! use gradrelay::bundle::{TensorValue, ValueBundle};
//!
//! let activations = TensorValue::f32(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
//! let mask = TensorValue::bool(vec![4], vec![true, true, false, true]).unwrap();
//!
//! let bundle = ValueBundle::from(vec![activations, mask]);
//! assert_eq!(bundle.len(), 2);
//! assert_eq!(bundle[0].shape(), &[2, 2]);
//! ```

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use thiserror::Error;

/// Element type of a [`TensorValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    I64,
    Bool,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
            DType::I64 => write!(f, "i64"),
            DType::Bool => write!(f, "bool"),
        }
    }
}

/// Errors raised while constructing transport values.
#[derive(Debug, Error, Diagnostic)]
pub enum BundleError {
    /// The flat buffer does not match the product of the shape dimensions.
    #[error("shape {shape:?} expects {expected} elements, buffer holds {actual}")]
    #[diagnostic(
        code(gradrelay::bundle::element_count),
        help("The buffer length must equal the product of all shape dimensions.")
    )]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
}

/// Dtype-tagged dense buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }
}

/// One opaque typed value crossing the thread boundary.
///
/// `TensorValue` owns its buffer; once posted on a rendezvous leg it is
/// moved, never shared, so the receiving thread may read it immediately.
/// Callers on the executor side must ensure any device-side computation
/// feeding the buffer has completed before the value is posted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TensorValue {
    shape: Vec<usize>,
    data: TensorData,
}

impl TensorValue {
    fn build(shape: Vec<usize>, data: TensorData) -> Result<Self, BundleError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(BundleError::ElementCount {
                expected,
                actual: data.len(),
                shape,
            });
        }
        Ok(TensorValue { shape, data })
    }

    /// Construct an `f32` tensor; fails if the buffer and shape disagree.
    pub fn f32(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, BundleError> {
        Self::build(shape, TensorData::F32(data))
    }

    /// Construct an `f64` tensor; fails if the buffer and shape disagree.
    pub fn f64(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, BundleError> {
        Self::build(shape, TensorData::F64(data))
    }

    /// Construct an `i64` tensor; fails if the buffer and shape disagree.
    pub fn i64(shape: Vec<usize>, data: Vec<i64>) -> Result<Self, BundleError> {
        Self::build(shape, TensorData::I64(data))
    }

    /// Construct a `bool` tensor; fails if the buffer and shape disagree.
    pub fn bool(shape: Vec<usize>, data: Vec<bool>) -> Result<Self, BundleError> {
        Self::build(shape, TensorData::Bool(data))
    }

    /// A rank-0 `f32` scalar.
    #[must_use]
    pub fn scalar_f32(value: f32) -> Self {
        TensorValue {
            shape: Vec::new(),
            data: TensorData::F32(vec![value]),
        }
    }

    /// Element type of this value.
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self.data {
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
            TensorData::I64(_) => DType::I64,
            TensorData::Bool(_) => DType::Bool,
        }
    }

    /// Shape of this value; empty for scalars.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total element count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Borrow the buffer as `f32`, if that is the element type.
    #[must_use]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the buffer as `f64`, if that is the element type.
    #[must_use]
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            TensorData::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the buffer as `i64`, if that is the element type.
    #[must_use]
    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.data {
            TensorData::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the buffer as `bool`, if that is the element type.
    #[must_use]
    pub fn as_bool(&self) -> Option<&[bool]> {
        match &self.data {
            TensorData::Bool(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered sequence of values passed across the boundary in one hand-off.
///
/// A bundle carries forward outputs on the forward leg and backward inputs
/// on the backward leg. It has no behavior of its own beyond preserving
/// order and value identity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueBundle(Vec<TensorValue>);

impl ValueBundle {
    /// An empty bundle.
    #[must_use]
    pub fn new() -> Self {
        ValueBundle(Vec::new())
    }

    /// Append a value, preserving insertion order.
    pub fn push(&mut self, value: TensorValue) {
        self.0.push(value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value at position `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TensorValue> {
        self.0.get(index)
    }

    /// Iterate values in positional order.
    pub fn iter(&self) -> std::slice::Iter<'_, TensorValue> {
        self.0.iter()
    }

    /// Consume the bundle, yielding its values in positional order.
    #[must_use]
    pub fn into_values(self) -> Vec<TensorValue> {
        self.0
    }
}

impl From<Vec<TensorValue>> for ValueBundle {
    fn from(values: Vec<TensorValue>) -> Self {
        ValueBundle(values)
    }
}

impl FromIterator<TensorValue> for ValueBundle {
    fn from_iter<I: IntoIterator<Item = TensorValue>>(iter: I) -> Self {
        ValueBundle(iter.into_iter().collect())
    }
}

impl IntoIterator for ValueBundle {
    type Item = TensorValue;
    type IntoIter = std::vec::IntoIter<TensorValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValueBundle {
    type Item = &'a TensorValue;
    type IntoIter = std::slice::Iter<'a, TensorValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Index<usize> for ValueBundle {
    type Output = TensorValue;

    fn index(&self, index: usize) -> &TensorValue {
        &self.0[index]
    }
}
