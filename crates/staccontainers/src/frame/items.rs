use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::RecordBatchOptions;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use log::debug;
use serde_json::Value;

use crate::error::{ContainerError, ContainerResult};
use crate::frame::table::{flatten_object, TableBuilder};
use crate::frame::GeoDataFrame;
use crate::model::Item;

const GEOMETRY: &str = "geometry";
const PROPERTIES: &str = "properties";

/// Builds one row per item. Top-level fields come first, then flattened
/// `properties`, then flattened `assets` prefixed with `assets.`.
///
/// A property whose column name is already taken by an item field or an
/// asset column is prefixed with `properties.`.
pub(crate) fn items_to_frame(items: &[Item], crs: &str) -> ContainerResult<GeoDataFrame> {
    let mut fields = TableBuilder::new();
    let mut properties = TableBuilder::new();
    let mut assets = TableBuilder::new();
    for item in items {
        let Value::Object(object) = serde_json::to_value(item)? else {
            return Err(ContainerError::internal("item did not serialize to an object"));
        };
        let mut row = vec![];
        for (key, value) in object {
            match (key.as_str(), value) {
                ("properties", Value::Object(map)) => properties.push_row(flatten_object(&map, None)),
                ("assets", Value::Object(map)) => {
                    assets.push_row(flatten_object(&map, Some("assets")))
                }
                (_, value) => row.push((key, value)),
            }
        }
        fields.push_row(row);
    }
    fields.ensure_column(GEOMETRY);
    debug!(
        "flattened {} item(s) into {} property and {} asset column(s)",
        fields.num_rows(),
        properties.num_columns(),
        assets.num_columns()
    );

    let rows = fields.num_rows();
    let mut columns = fields.finish(Some(GEOMETRY))?;
    let asset_columns = assets.finish(None)?;
    let taken = columns
        .iter()
        .chain(&asset_columns)
        .map(|(field, _)| field.name().clone())
        .collect::<HashSet<_>>();
    for (field, array) in properties.finish(None)? {
        let field = if taken.contains(field.name()) {
            let name = format!("{PROPERTIES}.{}", field.name());
            debug!("property {} is renamed to {name}", field.name());
            Arc::new(field.as_ref().clone().with_name(name))
        } else {
            field
        };
        columns.push((field, array));
    }
    columns.extend(asset_columns);
    let mut seen = HashSet::new();
    if let Some((field, _)) = columns.iter().find(|(field, _)| !seen.insert(field.name().clone())) {
        return Err(ContainerError::invalid_data(format!(
            "duplicate column in item table: {}",
            field.name()
        )));
    }
    let (fields, arrays): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
    let batch = RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        arrays,
        &RecordBatchOptions::new().with_row_count(Some(rows)),
    )?;
    GeoDataFrame::try_new(batch, GEOMETRY, Some(crs.to_string()))
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{DataType, Float64Type, TimeUnit};
    use serde_json::json;

    use super::*;
    use crate::model::{Asset, ItemCollection};

    fn items() -> ItemCollection {
        let mut a = Item::new("a");
        a.geometry = Some(json!({"type": "Point", "coordinates": [1.0, 2.0]}));
        a.properties.insert("datetime".into(), json!("2021-06-01T00:00:00Z"));
        a.properties.insert("eo:cloud_cover".into(), json!(10));
        a.properties.insert("proj".into(), json!({"epsg": 32615}));
        a.assets.insert(
            "data".into(),
            Asset::new("https://example.com/a.tif").with_media_type("image/tiff"),
        );
        let mut b = Item::new("b");
        b.properties.insert("datetime".into(), json!("2021-06-02"));
        b.properties.insert("eo:cloud_cover".into(), json!(2.5));
        b.assets.insert("thumbnail".into(), Asset::new("https://example.com/b.png"));
        ItemCollection::new(vec![a, b])
    }

    #[test]
    fn test_items_to_frame() {
        let frame = items_to_frame(items().items(), "EPSG:4326").unwrap();
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.crs.as_deref(), Some("EPSG:4326"));
        let names = frame.column_names();
        let position = |name: &str| names.iter().position(|n| n == name).unwrap();
        assert!(!names.contains(&"properties".to_string()));
        assert!(!names.contains(&"assets".to_string()));
        assert!(position("id") < position("datetime"));
        assert!(position("links") < position("stac_extensions"));
        assert!(position("stac_extensions") < position("datetime"));
        assert!(position("geometry") < position("datetime"));
        assert!(position("datetime") < position("eo:cloud_cover"));
        assert!(position("proj.epsg") < position("assets.data.href"));
        assert!(position("assets.data.href") < position("assets.thumbnail.href"));

        let ids = frame.column("id").unwrap().as_string::<i32>();
        assert_eq!(ids.value(0), "a");
        assert_eq!(ids.value(1), "b");

        let geometry = frame.geometry_column().unwrap();
        assert!(geometry.is_valid(0));
        assert!(geometry.is_null(1));

        let cloud = frame.column("eo:cloud_cover").unwrap();
        assert_eq!(cloud.data_type(), &DataType::Float64);
        assert_eq!(cloud.as_primitive::<Float64Type>().value(1), 2.5);

        assert_eq!(
            frame.column("datetime").unwrap().data_type(),
            &DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
        );
        let media = frame.column("assets.data.type").unwrap().as_string::<i32>();
        assert_eq!(media.value(0), "image/tiff");
        assert!(media.is_null(1));
    }

    #[test]
    fn test_colliding_property_names() {
        let mut item = Item::new("a");
        item.geometry = Some(json!({"type": "Point", "coordinates": [1.0, 2.0]}));
        item.properties.insert("id".into(), json!("inner"));
        item.properties.insert("geometry".into(), json!("not a shape"));
        item.properties.insert("assets.data.href".into(), json!("elsewhere"));
        item.properties.insert("platform".into(), json!("x"));
        item.assets.insert("data".into(), Asset::new("https://example.com/a.tif"));

        let frame = items_to_frame(&[item], "EPSG:4326").unwrap();
        let names = frame.column_names();
        let unique = names.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), names.len());
        assert!(names.contains(&"properties.id".to_string()));
        assert!(names.contains(&"properties.geometry".to_string()));
        assert!(names.contains(&"properties.assets.data.href".to_string()));
        assert!(names.contains(&"platform".to_string()));

        assert_eq!(frame.column("id").unwrap().as_string::<i32>().value(0), "a");
        let inner = frame.column("properties.id").unwrap().as_string::<i32>();
        assert_eq!(inner.value(0), "inner");
        assert!(frame.geometry_column().unwrap().is_valid(0));
        let href = frame.column("assets.data.href").unwrap().as_string::<i32>();
        assert_eq!(href.value(0), "https://example.com/a.tif");
    }

    #[test]
    fn test_empty_collection() {
        let frame = items_to_frame(&[], "EPSG:4326").unwrap();
        assert_eq!(frame.num_rows(), 0);
        assert_eq!(frame.column_names(), vec!["geometry"]);
    }
}
