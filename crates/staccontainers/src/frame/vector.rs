//! Vector files that are not Parquet: GeoJSON and ESRI Shapefile.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::RecordBatchOptions;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use geozero::{CoordDimensions, ToWkb};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use shapefile::dbase::FieldValue;
use shapefile::Shape;

use crate::error::{ContainerError, ContainerResult};
use crate::frame::table::{flatten_object, TableBuilder};
use crate::frame::{wkb_column, GeoDataFrame};
use crate::io::{fetch_bytes, list, StorageOptions};
use crate::options::ReaderOptions;

const GEOMETRY: &str = "geometry";
const GEOJSON_CRS: &str = "EPSG:4326";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VectorOptions {
    #[serde(default)]
    pub storage_options: Option<Value>,
}

impl ReaderOptions for VectorOptions {
    const ALLOWED_KEYS: &'static [&'static str] = &["storage_options"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VectorFormat {
    GeoJson,
    Shapefile,
    Directory,
}

fn sniff(href: &str) -> VectorFormat {
    let path = href.split(['?', '#']).next().unwrap_or(href).to_lowercase();
    if path.ends_with(".shp") {
        VectorFormat::Shapefile
    } else if path.ends_with('/') || is_local_dir(href) {
        VectorFormat::Directory
    } else {
        VectorFormat::GeoJson
    }
}

fn is_local_dir(path: &str) -> bool {
    !path.contains("://") && std::path::Path::new(path).is_dir()
}

pub(crate) fn read_vector(href: &str, storage_options: &StorageOptions) -> ContainerResult<GeoDataFrame> {
    let format = sniff(href);
    debug!("reading {href} as {format:?}");
    match format {
        VectorFormat::Shapefile => read_shapefile(href, storage_options),
        VectorFormat::Directory => {
            let shapefiles = list(href, storage_options)?
                .into_iter()
                .filter(|url| url.path().to_lowercase().ends_with(".shp"))
                .collect::<Vec<_>>();
            match shapefiles.as_slice() {
                [shp] => read_shapefile(shp.as_str(), storage_options),
                [] => Err(ContainerError::invalid_data(format!(
                    "no shapefile found in {href}"
                ))),
                _ => Err(ContainerError::invalid_data(format!(
                    "more than one shapefile found in {href}"
                ))),
            }
        }
        VectorFormat::GeoJson => read_geojson(&fetch_bytes(href, storage_options)?),
    }
}

/// Reads a GeoJSON document. Feature properties are flattened into columns
/// and the geometry column comes last.
pub(crate) fn read_geojson(bytes: &[u8]) -> ContainerResult<GeoDataFrame> {
    let features = match serde_json::from_slice::<geojson::GeoJson>(bytes)? {
        geojson::GeoJson::FeatureCollection(collection) => collection.features,
        geojson::GeoJson::Feature(feature) => vec![feature],
        geojson::GeoJson::Geometry(geometry) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };
    let mut table = TableBuilder::new();
    let mut geometries = vec![];
    for feature in features {
        let properties = feature.properties.unwrap_or_default();
        table.push_row(flatten_object(&properties, None));
        let wkb = match feature.geometry {
            Some(geometry) => {
                let geometry = geo_types::Geometry::<f64>::try_from(geometry)?;
                Some(geometry.to_wkb(CoordDimensions::xy())?)
            }
            None => None,
        };
        geometries.push(wkb);
    }
    frame_from_parts(table, geometries, Some(GEOJSON_CRS.to_string()))
}

fn read_shapefile(href: &str, storage_options: &StorageOptions) -> ContainerResult<GeoDataFrame> {
    let shp = fetch_bytes(href, storage_options)?;
    let dbf = fetch_bytes(&sidecar(href, "dbf"), storage_options)?;
    let crs = match fetch_bytes(&sidecar(href, "prj"), storage_options) {
        Ok(prj) => crs_from_prj(&String::from_utf8_lossy(&prj)),
        Err(e) => {
            debug!("no projection file for {href}: {e}");
            None
        }
    };

    let shapes = shapefile::ShapeReader::new(Cursor::new(shp))?.read()?;
    let mut reader = shapefile::dbase::Reader::new(Cursor::new(dbf))?;
    let names = reader
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .filter(|name| name != "DeletionFlag")
        .collect::<Vec<_>>();
    let records = reader.read()?;
    if records.len() != shapes.len() {
        return Err(ContainerError::invalid_data(format!(
            "{href}: {} shape(s) but {} attribute record(s)",
            shapes.len(),
            records.len()
        )));
    }

    let mut table = TableBuilder::new();
    for record in &records {
        let row = names
            .iter()
            .map(|name| {
                let value = record.get(name).map(field_value).unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        table.push_row(row);
    }
    let geometries = shapes
        .into_iter()
        .map(|shape| match shape {
            Shape::NullShape => Ok(None),
            shape => {
                let geometry = geo_types::Geometry::<f64>::try_from(shape)
                    .map_err(|e| ContainerError::invalid_data(format!("{href}: {e}")))?;
                Ok(Some(geometry.to_wkb(CoordDimensions::xy())?))
            }
        })
        .collect::<ContainerResult<Vec<_>>>()?;
    frame_from_parts(table, geometries, crs)
}

/// The path of a file next to the shapefile, with the extension replaced.
fn sidecar(href: &str, extension: &str) -> String {
    let (path, query) = match href.find('?') {
        Some(i) => href.split_at(i),
        None => (href, ""),
    };
    let stem = path.rfind('.').map_or(path, |i| &path[..i]);
    let extension = if path.ends_with(".SHP") {
        extension.to_uppercase()
    } else {
        extension.to_string()
    };
    format!("{stem}.{extension}{query}")
}

fn field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Character(s) => s.clone().map(Value::String).unwrap_or(Value::Null),
        FieldValue::Memo(s) => Value::String(s.clone()),
        FieldValue::Numeric(n) => n.map(Value::from).unwrap_or(Value::Null),
        FieldValue::Float(n) => n.map(|n| Value::from(f64::from(n))).unwrap_or(Value::Null),
        FieldValue::Double(n) | FieldValue::Currency(n) => Value::from(*n),
        FieldValue::Integer(n) => Value::from(*n),
        FieldValue::Logical(b) => b.map(Value::Bool).unwrap_or(Value::Null),
        FieldValue::Date(d) => d
            .as_ref()
            .map(|d| Value::String(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())))
            .unwrap_or(Value::Null),
        other => {
            debug!("unsupported dBASE field value: {other:?}");
            Value::Null
        }
    }
}

/// Maps a WKT projection to an `EPSG:<code>` name where possible.
///
/// The outermost `AUTHORITY` is the last one in the text. Unprojected WGS 84
/// definitions without an authority are EPSG:4326. Other definitions are
/// returned as WKT.
pub(crate) fn crs_from_prj(wkt: &str) -> Option<String> {
    let wkt = wkt.trim();
    if wkt.is_empty() {
        return None;
    }
    if let Some(start) = wkt.rfind("AUTHORITY[") {
        let rest = &wkt[start + "AUTHORITY[".len()..];
        if let Some(end) = rest.find(']') {
            let outermost = rest[end + 1..].chars().all(|c| c == ']' || c.is_whitespace());
            let parts = rest[..end]
                .split(',')
                .map(|p| p.trim().trim_matches('"'))
                .collect::<Vec<_>>();
            if let (true, [authority, code]) = (outermost, parts.as_slice()) {
                return Some(format!("{}:{code}", authority.to_uppercase()));
            }
        }
    }
    if wkt.starts_with("GEOGCS") && (wkt.contains("WGS_1984") || wkt.contains("WGS 84")) {
        return Some("EPSG:4326".to_string());
    }
    Some(wkt.to_string())
}

fn frame_from_parts(
    mut table: TableBuilder,
    geometries: Vec<Option<Vec<u8>>>,
    crs: Option<String>,
) -> ContainerResult<GeoDataFrame> {
    let rows = table.num_rows();
    // Attribute columns named like the geometry column are replaced.
    table.drop_column(GEOMETRY);
    let mut columns = table.finish(None)?;
    columns.push(wkb_column(GEOMETRY, geometries));
    let (fields, arrays): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
    let batch = RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        arrays,
        &RecordBatchOptions::new().with_row_count(Some(rows)),
    )?;
    GeoDataFrame::try_new(batch, GEOMETRY, crs)
}
