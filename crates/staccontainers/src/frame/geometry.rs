use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray};
use arrow::datatypes::{DataType, Field, FieldRef};
use geozero::{CoordDimensions, ToWkb};
use serde_json::Value;

use crate::error::ContainerResult;

/// A nullable binary column of WKB geometries.
pub(crate) fn wkb_column(name: &str, geometries: Vec<Option<Vec<u8>>>) -> (FieldRef, ArrayRef) {
    let array: ArrayRef = Arc::new(BinaryArray::from_iter(geometries));
    (Arc::new(Field::new(name, DataType::Binary, true)), array)
}

/// Encodes a GeoJSON geometry value as WKB. JSON null maps to a missing geometry.
pub(crate) fn geometry_to_wkb(value: &Value) -> ContainerResult<Option<Vec<u8>>> {
    if value.is_null() {
        return Ok(None);
    }
    let geometry = geojson::Geometry::from_json_value(value.clone())?;
    let geometry = geo_types::Geometry::<f64>::try_from(geometry)?;
    Ok(Some(geometry.to_wkb(CoordDimensions::xy())?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_point_to_wkb() {
        let wkb = geometry_to_wkb(&json!({"type": "Point", "coordinates": [1.0, 2.0]}))
            .unwrap()
            .unwrap();
        let mut expected = vec![1u8, 1, 0, 0, 0];
        expected.extend_from_slice(&1.0f64.to_le_bytes());
        expected.extend_from_slice(&2.0f64.to_le_bytes());
        assert_eq!(wkb, expected);
    }

    #[test]
    fn test_null_geometry() {
        assert_eq!(geometry_to_wkb(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(geometry_to_wkb(&json!({"type": "Point"})).is_err());
    }
}
