use std::fmt::Debug;
use std::sync::Arc;

use ndarray::ArrayD;
use serde_json::{Map, Value};

use crate::error::ContainerResult;

/// In-memory array values.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Float64(ArrayD<f64>),
    Int64(ArrayD<i64>),
    Utf8(ArrayD<String>),
    /// Nanoseconds since the Unix epoch, UTC. `i64::MIN` marks a missing time.
    Timestamp(ArrayD<i64>),
}

impl ArrayData {
    pub fn shape(&self) -> &[usize] {
        match self {
            ArrayData::Float64(a) => a.shape(),
            ArrayData::Int64(a) | ArrayData::Timestamp(a) => a.shape(),
            ArrayData::Utf8(a) => a.shape(),
        }
    }

    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match self {
            ArrayData::Float64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            ArrayData::Int64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_utf8(&self) -> Option<&ArrayD<String>> {
        match self {
            ArrayData::Utf8(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&ArrayD<i64>> {
        match self {
            ArrayData::Timestamp(a) => Some(a),
            _ => None,
        }
    }
}

/// Loads the values of a lazy array on demand.
pub trait ArrayLoader: Debug + Send + Sync {
    fn load(&self) -> ContainerResult<ArrayData>;
}

/// An array whose shape is known but whose values are read on demand.
#[derive(Debug, Clone)]
pub struct LazyArray {
    pub shape: Vec<usize>,
    pub dtype: String,
    loader: Arc<dyn ArrayLoader>,
}

impl LazyArray {
    pub fn new(shape: Vec<usize>, dtype: impl Into<String>, loader: Arc<dyn ArrayLoader>) -> Self {
        Self {
            shape,
            dtype: dtype.into(),
            loader,
        }
    }

    pub fn load(&self) -> ContainerResult<ArrayData> {
        self.loader.load()
    }
}

#[derive(Debug, Clone)]
pub enum VariableData {
    Loaded(ArrayData),
    Lazy(LazyArray),
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub dims: Vec<String>,
    pub data: VariableData,
    pub attrs: Map<String, Value>,
}

impl Variable {
    pub fn new(dims: &[&str], data: ArrayData) -> Self {
        Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data: VariableData::Loaded(data),
            attrs: Map::new(),
        }
    }

    pub fn lazy(dims: Vec<String>, array: LazyArray) -> Self {
        Self {
            dims,
            data: VariableData::Lazy(array),
            attrs: Map::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn shape(&self) -> Vec<usize> {
        match &self.data {
            VariableData::Loaded(data) => data.shape().to_vec(),
            VariableData::Lazy(array) => array.shape.clone(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.data, VariableData::Lazy(_))
    }

    /// Returns the values, reading them if the variable is lazy.
    pub fn values(&self) -> ContainerResult<ArrayData> {
        match &self.data {
            VariableData::Loaded(data) => Ok(data.clone()),
            VariableData::Lazy(array) => array.load(),
        }
    }

    pub(crate) fn into_loaded(self) -> ContainerResult<Variable> {
        let data = match self.data {
            VariableData::Loaded(data) => data,
            VariableData::Lazy(array) => array.load()?,
        };
        Ok(Variable {
            dims: self.dims,
            data: VariableData::Loaded(data),
            attrs: self.attrs,
        })
    }
}
