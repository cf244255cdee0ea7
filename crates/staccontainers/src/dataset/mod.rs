//! A labeled multi-dimensional array container.

mod variable;

use indexmap::IndexMap;
use serde_json::{Map, Value};

pub use variable::{ArrayData, ArrayLoader, LazyArray, Variable, VariableData};

use crate::error::{ContainerError, ContainerResult};

/// Named dimensions, coordinate variables, data variables and attributes.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub dims: IndexMap<String, usize>,
    pub coords: IndexMap<String, Variable>,
    pub data_vars: IndexMap<String, Variable>,
    pub attrs: Map<String, Value>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_coord(&mut self, name: impl Into<String>, variable: Variable) -> ContainerResult<()> {
        self.register_dims(&variable)?;
        self.coords.insert(name.into(), variable);
        Ok(())
    }

    pub fn add_data_var(
        &mut self,
        name: impl Into<String>,
        variable: Variable,
    ) -> ContainerResult<()> {
        self.register_dims(&variable)?;
        self.data_vars.insert(name.into(), variable);
        Ok(())
    }

    fn register_dims(&mut self, variable: &Variable) -> ContainerResult<()> {
        let shape = variable.shape();
        if shape.len() != variable.dims.len() {
            return Err(ContainerError::internal(format!(
                "variable has {} dimension name(s) for {} axes",
                variable.dims.len(),
                shape.len()
            )));
        }
        for (dim, size) in variable.dims.iter().zip(shape) {
            match self.dims.get(dim) {
                Some(existing) if *existing != size => {
                    return Err(ContainerError::invalid_data(format!(
                        "conflicting sizes for dimension {dim}: {existing} and {size}"
                    )));
                }
                Some(_) => {}
                None => {
                    self.dims.insert(dim.clone(), size);
                }
            }
        }
        Ok(())
    }

    /// Looks up a data variable or, failing that, a coordinate.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.data_vars.get(name).or_else(|| self.coords.get(name))
    }

    pub fn is_lazy(&self) -> bool {
        self.data_vars
            .values()
            .chain(self.coords.values())
            .any(|v| v.is_lazy())
    }

    /// Loads every lazy variable into memory.
    pub fn load(self) -> ContainerResult<Dataset> {
        let Dataset {
            dims,
            coords,
            data_vars,
            attrs,
        } = self;
        let coords = coords
            .into_iter()
            .map(|(k, v)| Ok((k, v.into_loaded()?)))
            .collect::<ContainerResult<_>>()?;
        let data_vars = data_vars
            .into_iter()
            .map(|(k, v)| Ok((k, v.into_loaded()?)))
            .collect::<ContainerResult<_>>()?;
        Ok(Dataset {
            dims,
            coords,
            data_vars,
            attrs,
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn float_variable(dims: &[&str], shape: &[usize]) -> Variable {
        let size = shape.iter().product();
        let data = ArrayD::from_shape_vec(IxDyn(shape), vec![0.0; size]).unwrap();
        Variable::new(dims, ArrayData::Float64(data))
    }

    #[test]
    fn test_dims_are_registered_in_order() {
        let mut dataset = Dataset::new();
        dataset
            .add_data_var("a", float_variable(&["y", "x"], &[2, 3]))
            .unwrap();
        dataset
            .add_coord("x", float_variable(&["x"], &[3]))
            .unwrap();
        assert_eq!(
            dataset.dims.iter().map(|(k, v)| (k.as_str(), *v)).collect::<Vec<_>>(),
            vec![("y", 2), ("x", 3)]
        );
        assert!(dataset.variable("x").is_some());
        assert!(!dataset.is_lazy());
    }

    #[test]
    fn test_conflicting_dims() {
        let mut dataset = Dataset::new();
        dataset
            .add_data_var("a", float_variable(&["x"], &[3]))
            .unwrap();
        let result = dataset.add_data_var("b", float_variable(&["x"], &[4]));
        assert!(matches!(result, Err(ContainerError::InvalidData(_))));
    }
}
