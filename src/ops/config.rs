//! Configuration table for external autograd-style operators.
//!
//! When a graph delegates an operator to an external autograd library, the
//! runtime needs a static description of how that operator's arguments map
//! across the forward/backward boundary: which forward inputs, forward
//! outputs, and output gradients feed the backward op, what its argument
//! list looks like, how output types are inferred, and which defaults apply
//! when the graph omits an argument. This module is that lookup structure —
//! pure data, no algorithm.
//!
//! The table is constructed explicitly (no ambient singleton) and injected
//! wherever gradient-graph construction needs it.
//!
//! # Examples
//!
//! ```rust
//! use gradrelay::ops::config::{ArgValue, ExternalOpConfigs};
//!
//! let configs = ExternalOpConfigs::with_builtins();
//! let bn = configs.get("batch_norm").unwrap();
//!
//! assert_eq!(bn.backward_op_name, "batch_norm_grad");
//! assert_eq!(bn.default_value("eps"), Some(&ArgValue::Float(1e-5)));
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::bundle::DType;

/// Kind of an external operator argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgKind {
    Tensor,
    Int,
    Float,
    Bool,
    IntArray,
    FloatArray,
    BoolArray,
}

/// Default value for a non-tensor argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    BoolArray(Vec<bool>),
}

impl ArgValue {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Where one input of the backward op comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "index", rename_all = "snake_case")]
pub enum GradInputSource {
    /// Gradient of the i-th forward output.
    GradOutput(usize),
    /// The i-th forward input, as saved by the forward pass.
    ForwardInput(usize),
    /// The i-th forward output, as saved by the forward pass.
    ForwardOutput(usize),
}

/// How one forward output's type is inferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "infer", content = "value", rename_all = "snake_case")]
pub enum OutputTypeInfer {
    /// Propagate the type of the i-th forward input.
    PropagateFromInput(usize),
    /// The output has a fixed concrete type.
    Concrete(DType),
}

/// Argument-mapping description for one external operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalOpConfig {
    /// Forward op name, also the table key.
    pub op_name: String,
    /// Name of the corresponding backward op.
    pub backward_op_name: String,
    /// Forward op argument kinds and names, in call order.
    pub forward_args: Vec<(ArgKind, String)>,
    /// Backward op argument kinds and names, in call order.
    pub backward_args: Vec<(ArgKind, String)>,
    /// Source of each backward-op input, in input order.
    pub grad_input_sources: Vec<GradInputSource>,
    /// Type inference for each forward output, in output order.
    pub output_type_infer: Vec<OutputTypeInfer>,
    /// For each backward-op output, the index of the forward input whose
    /// gradient it is.
    pub grad_input_indices: Vec<usize>,
    defaults: FxHashMap<String, ArgValue>,
}

impl ExternalOpConfig {
    pub fn new<S: Into<String>>(op_name: S, backward_op_name: S) -> Self {
        ExternalOpConfig {
            op_name: op_name.into(),
            backward_op_name: backward_op_name.into(),
            forward_args: Vec::new(),
            backward_args: Vec::new(),
            grad_input_sources: Vec::new(),
            output_type_infer: Vec::new(),
            grad_input_indices: Vec::new(),
            defaults: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_forward_arg<S: Into<String>>(mut self, kind: ArgKind, name: S) -> Self {
        self.forward_args.push((kind, name.into()));
        self
    }

    #[must_use]
    pub fn with_backward_arg<S: Into<String>>(mut self, kind: ArgKind, name: S) -> Self {
        self.backward_args.push((kind, name.into()));
        self
    }

    #[must_use]
    pub fn with_grad_input(mut self, source: GradInputSource) -> Self {
        self.grad_input_sources.push(source);
        self
    }

    #[must_use]
    pub fn with_output_type(mut self, infer: OutputTypeInfer) -> Self {
        self.output_type_infer.push(infer);
        self
    }

    #[must_use]
    pub fn with_grad_input_indices(mut self, indices: Vec<usize>) -> Self {
        self.grad_input_indices = indices;
        self
    }

    #[must_use]
    pub fn with_default<S: Into<String>>(mut self, name: S, value: ArgValue) -> Self {
        self.defaults.insert(name.into(), value);
        self
    }

    /// Default value for the named argument, if one is configured.
    #[must_use]
    pub fn default_value(&self, name: &str) -> Option<&ArgValue> {
        self.defaults.get(name)
    }
}

/// Lookup table of external operator configs, keyed by forward op name.
#[derive(Clone, Debug, Default)]
pub struct ExternalOpConfigs {
    configs: FxHashMap<String, ExternalOpConfig>,
}

impl ExternalOpConfigs {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table preloaded with the operators this crate ships reference
    /// kernels for.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register(batch_norm_config());
        table
    }

    /// Insert or replace a config, keyed by its forward op name.
    pub fn register(&mut self, config: ExternalOpConfig) {
        self.configs.insert(config.op_name.clone(), config);
    }

    /// Config for `op_name`, if registered.
    #[must_use]
    pub fn get(&self, op_name: &str) -> Option<&ExternalOpConfig> {
        self.configs.get(op_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Batch normalization: forward `(input, scale, bias) -> (output,
/// saved_mean, saved_inv_std)`, backward consumes the output gradient plus
/// saved statistics and produces gradients for input, scale, and bias. See
/// [`crate::kernels::batch_norm`] for the matching reference kernel.
fn batch_norm_config() -> ExternalOpConfig {
    ExternalOpConfig::new("batch_norm", "batch_norm_grad")
        .with_forward_arg(ArgKind::Tensor, "input")
        .with_forward_arg(ArgKind::Tensor, "scale")
        .with_forward_arg(ArgKind::Tensor, "bias")
        .with_forward_arg(ArgKind::Bool, "training")
        .with_forward_arg(ArgKind::Float, "momentum")
        .with_forward_arg(ArgKind::Float, "eps")
        .with_backward_arg(ArgKind::Tensor, "grad_output")
        .with_backward_arg(ArgKind::Tensor, "input")
        .with_backward_arg(ArgKind::Tensor, "scale")
        .with_backward_arg(ArgKind::Tensor, "saved_mean")
        .with_backward_arg(ArgKind::Tensor, "saved_inv_std")
        .with_backward_arg(ArgKind::Float, "eps")
        .with_grad_input(GradInputSource::GradOutput(0))
        .with_grad_input(GradInputSource::ForwardInput(0))
        .with_grad_input(GradInputSource::ForwardInput(1))
        .with_grad_input(GradInputSource::ForwardOutput(1))
        .with_grad_input(GradInputSource::ForwardOutput(2))
        .with_output_type(OutputTypeInfer::PropagateFromInput(0))
        .with_output_type(OutputTypeInfer::Concrete(DType::F32))
        .with_output_type(OutputTypeInfer::Concrete(DType::F32))
        .with_grad_input_indices(vec![0, 1, 2])
        .with_default("training", ArgValue::Bool(true))
        .with_default("momentum", ArgValue::Float(0.1))
        .with_default("eps", ArgValue::Float(1e-5))
}
