use serde_json::Value;

use crate::error::{ContainerError, ContainerResult};
use crate::model::{Item, ItemCollection};

/// Any STAC document, keyed by its `type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum StacValue {
    Item(Item),
    ItemCollection(ItemCollection),
    Catalog(Value),
    Collection(Value),
}

impl StacValue {
    pub fn from_json(value: Value) -> ContainerResult<Self> {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ContainerError::invalid_data("STAC value has no `type` field"))?;
        match kind {
            "Feature" => Ok(StacValue::Item(serde_json::from_value(value)?)),
            "FeatureCollection" => Ok(StacValue::ItemCollection(serde_json::from_value(value)?)),
            "Catalog" => Ok(StacValue::Catalog(value)),
            "Collection" => Ok(StacValue::Collection(value)),
            other => Err(ContainerError::invalid_data(format!(
                "unknown STAC type: {other}"
            ))),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> ContainerResult<Self> {
        Self::from_json(serde_json::from_slice(bytes)?)
    }
}
