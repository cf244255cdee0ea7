//! GeoParquet reading with the `parquet` crate.

use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatchReader;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ContainerError, ContainerResult};
use crate::frame::GeoDataFrame;
use crate::io::{fetch_bytes, StorageOptions};
use crate::options::ReaderOptions;

/// The file metadata key holding GeoParquet metadata.
pub(crate) const GEO_METADATA_KEY: &str = "geo";
const DEFAULT_GEOMETRY: &str = "geometry";
/// The CRS implied when a GeoParquet column omits the `crs` key.
const DEFAULT_GEOPARQUET_CRS: &str = "OGC:CRS84";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ParquetOptions {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub storage_options: Option<Value>,
}

impl ReaderOptions for ParquetOptions {
    const ALLOWED_KEYS: &'static [&'static str] = &["columns", "storage_options"];
}

/// The primary geometry column and its CRS.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GeoColumn {
    pub name: String,
    pub crs: Option<String>,
}

/// Reads the primary column from GeoParquet `geo` metadata, falling back to a
/// column named `geometry` without CRS.
pub(crate) fn geo_column(metadata: Option<&str>) -> ContainerResult<GeoColumn> {
    let Some(metadata) = metadata else {
        return Ok(GeoColumn {
            name: DEFAULT_GEOMETRY.to_string(),
            crs: None,
        });
    };
    let metadata: Value = serde_json::from_str(metadata)?;
    let name = metadata
        .get("primary_column")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_GEOMETRY)
        .to_string();
    let column = metadata
        .get("columns")
        .and_then(|c| c.get(&name))
        .and_then(Value::as_object);
    let crs = match column.map(|c| c.get("crs")) {
        None | Some(None) => Some(DEFAULT_GEOPARQUET_CRS.to_string()),
        Some(Some(crs)) => crs_name(crs),
    };
    Ok(GeoColumn { name, crs })
}

/// Names a PROJJSON CRS by its `AUTHORITY:CODE` identifier.
fn crs_name(crs: &Value) -> Option<String> {
    match crs {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(object) => {
            let id = object.get("id")?;
            let authority = id.get("authority")?.as_str()?;
            let code = match id.get("code")? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(format!("{authority}:{code}"))
        }
        _ => None,
    }
}

pub(crate) fn read_parquet(
    href: &str,
    storage_options: &StorageOptions,
    options: &ParquetOptions,
) -> ContainerResult<GeoDataFrame> {
    let bytes = fetch_bytes(href, storage_options)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let geo = geo_column(
        builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|kv| kv.iter().find(|kv| kv.key == GEO_METADATA_KEY))
            .and_then(|kv| kv.value.as_deref()),
    )?;
    let builder = match &options.columns {
        Some(columns) => {
            let indices = projection(builder.schema(), columns, &geo.name)?;
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
            builder.with_projection(mask)
        }
        None => builder,
    };
    let reader = builder.build()?;
    let schema = reader.schema();
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;
    debug!(
        "read {} row(s) from {href} with geometry column {}",
        batch.num_rows(),
        geo.name
    );
    GeoDataFrame::try_new(batch, geo.name, geo.crs)
}

/// Root column indices for the requested columns. The geometry column is always kept.
fn projection(schema: &Schema, columns: &[String], geometry: &str) -> ContainerResult<Vec<usize>> {
    let mut indices = columns
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(geometry))
        .map(|name| {
            schema
                .index_of(name)
                .map_err(|_| ContainerError::invalid(format!("no such column: {name}")))
        })
        .collect::<ContainerResult<Vec<_>>>()?;
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}
