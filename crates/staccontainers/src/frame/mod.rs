//! Geospatial dataframes backed by Arrow record batches.

mod geometry;
mod items;
#[cfg(feature = "lazy-dataframe")]
pub(crate) mod lazy;
pub(crate) mod parquet;
mod table;
pub(crate) mod vector;

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BinaryArray};
use arrow::datatypes::{Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::json;

pub(crate) use geometry::{geometry_to_wkb, wkb_column};
pub(crate) use items::items_to_frame;
#[cfg(feature = "lazy-dataframe")]
pub use lazy::LazyGeoDataFrame;

use crate::error::{ContainerError, ContainerResult};

pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";
pub const EXTENSION_METADATA_KEY: &str = "ARROW:extension:metadata";
pub const WKB_EXTENSION_NAME: &str = "geoarrow.wkb";

/// A table with one WKB geometry column and an optional CRS.
#[derive(Debug, Clone)]
pub struct GeoDataFrame {
    pub batch: RecordBatch,
    pub geometry: String,
    pub crs: Option<String>,
}

impl GeoDataFrame {
    /// Wraps a batch, tagging the geometry field with GeoArrow WKB extension metadata.
    pub fn try_new(
        batch: RecordBatch,
        geometry: impl Into<String>,
        crs: Option<String>,
    ) -> ContainerResult<Self> {
        let geometry = geometry.into();
        let schema = batch.schema();
        if schema.index_of(&geometry).is_err() {
            return Err(ContainerError::invalid_data(format!(
                "no geometry column named {geometry}"
            )));
        }
        let fields = schema
            .fields()
            .iter()
            .map(|f| {
                if f.name() == &geometry {
                    geometry_field(f, crs.as_deref())
                } else {
                    f.clone()
                }
            })
            .collect::<Vec<_>>();
        let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
        let batch = RecordBatch::try_new(Arc::new(schema), batch.columns().to_vec())?;
        Ok(Self {
            batch,
            geometry,
            crs,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// The geometry column as WKB values, if it is stored as binary.
    pub fn geometry_column(&self) -> Option<&BinaryArray> {
        self.column(&self.geometry)?
            .as_any()
            .downcast_ref::<BinaryArray>()
    }
}

fn geometry_field(field: &FieldRef, crs: Option<&str>) -> FieldRef {
    let mut metadata: HashMap<String, String> = field.metadata().clone();
    metadata.insert(EXTENSION_NAME_KEY.to_string(), WKB_EXTENSION_NAME.to_string());
    metadata.insert(
        EXTENSION_METADATA_KEY.to_string(),
        json!({ "crs": crs }).to_string(),
    );
    Arc::new(Field::clone(field).with_metadata(metadata))
}
