use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ContainerError, ContainerResult};
use crate::model::Asset;

const FEATURE: &str = "Feature";
const FEATURE_COLLECTION: &str = "FeatureCollection";

fn feature_type() -> String {
    FEATURE.to_string()
}

fn feature_collection_type() -> String {
    FEATURE_COLLECTION.to_string()
}

/// A STAC item.
///
/// Field order is the serialization order, which is also the column order
/// when items are flattened into a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type", default = "feature_type")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stac_version: Option<String>,
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub links: Vec<Value>,
    #[serde(default)]
    pub assets: IndexMap<String, Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub stac_extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(flatten)]
    pub extra_fields: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            r#type: feature_type(),
            stac_version: None,
            id: id.into(),
            properties: Map::new(),
            geometry: None,
            links: vec![],
            assets: IndexMap::new(),
            bbox: None,
            stac_extensions: vec![],
            collection: None,
            extra_fields: Map::new(),
        }
    }

    /// The nominal time of the item: `datetime`, or `start_datetime` when `datetime` is null.
    pub fn datetime(&self) -> ContainerResult<Option<DateTime<Utc>>> {
        let value = match self.properties.get("datetime") {
            Some(Value::Null) | None => self.properties.get("start_datetime"),
            other => other,
        };
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => parse_datetime(s).map(Some).ok_or_else(|| {
                ContainerError::invalid_data(format!("item {}: invalid datetime: {s}", self.id))
            }),
            Some(other) => Err(ContainerError::invalid_data(format!(
                "item {}: invalid datetime: {other}",
                self.id
            ))),
        }
    }
}

/// Parses an RFC 3339 timestamp, falling back to naive ISO-8601 forms read as UTC.
pub(crate) fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// An ordered set of items, serialized as a GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub r#type: String,
    pub features: Vec<Item>,
    #[serde(flatten)]
    pub extra_fields: Map<String, Value>,
}

impl ItemCollection {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            r#type: feature_collection_type(),
            features: items,
            extra_fields: Map::new(),
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Item> for ItemCollection {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
