//! Row-wise JSON records assembled into typed Arrow columns.

use std::sync::Arc;

use arrow::array::{
    new_null_array, ArrayRef, BinaryBuilder, BooleanBuilder, Float64Builder, Int64Builder,
    ListBuilder, StringBuilder, TimestampNanosecondBuilder,
};
use arrow::datatypes::{DataType, Field, FieldRef};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{ContainerError, ContainerResult};
use crate::frame::geometry_to_wkb;
use crate::model::parse_datetime;

/// Columns parsed as UTC timestamps.
pub(crate) const DATETIME_COLUMNS: [&str; 3] = ["datetime", "start_datetime", "end_datetime"];

/// Flattens nested objects into `.`-joined keys. Arrays are kept as values and
/// empty objects produce no column.
pub(crate) fn flatten_object(object: &Map<String, Value>, prefix: Option<&str>) -> Vec<(String, Value)> {
    let mut out = vec![];
    flatten_into(object, prefix, &mut out);
    out
}

fn flatten_into(object: &Map<String, Value>, prefix: Option<&str>, out: &mut Vec<(String, Value)>) {
    for (key, value) in object {
        let name = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(nested, Some(&name), out),
            _ => out.push((name, value.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Null,
    Bool,
    Int,
    Float,
    Utf8,
    Json,
}

impl Scalar {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(_) => Scalar::Bool,
            Value::Number(n) if n.is_i64() => Scalar::Int,
            Value::Number(_) => Scalar::Float,
            Value::String(_) => Scalar::Utf8,
            Value::Array(_) | Value::Object(_) => Scalar::Json,
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Scalar::Null, x) | (x, Scalar::Null) => x,
            (Scalar::Int, Scalar::Float) | (Scalar::Float, Scalar::Int) => Scalar::Float,
            _ => Scalar::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Scalar(Scalar),
    List(Scalar),
}

impl ColumnType {
    fn of(value: &Value) -> Self {
        match value {
            Value::Array(values) => {
                let element = values
                    .iter()
                    .fold(Scalar::Null, |acc, v| acc.merge(Scalar::of(v)));
                if element == Scalar::Json {
                    ColumnType::Scalar(Scalar::Json)
                } else {
                    ColumnType::List(element)
                }
            }
            other => ColumnType::Scalar(Scalar::of(other)),
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (ColumnType::Scalar(a), ColumnType::Scalar(b)) => ColumnType::Scalar(a.merge(b)),
            (ColumnType::List(a), ColumnType::List(b)) => match a.merge(b) {
                Scalar::Json => ColumnType::Scalar(Scalar::Json),
                element => ColumnType::List(element),
            },
            (ColumnType::Scalar(Scalar::Null), list @ ColumnType::List(_))
            | (list @ ColumnType::List(_), ColumnType::Scalar(Scalar::Null)) => list,
            _ => ColumnType::Scalar(Scalar::Json),
        }
    }
}

/// Accumulates rows of named JSON values. Columns are ordered by first appearance.
#[derive(Debug, Default)]
pub(crate) struct TableBuilder {
    columns: IndexMap<String, Vec<Value>>,
    rows: usize,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, row: Vec<(String, Value)>) {
        let rows = self.rows;
        for (name, value) in row {
            let column = self
                .columns
                .entry(name)
                .or_insert_with(|| vec![Value::Null; rows]);
            // A repeated key in one row keeps the last value.
            if column.len() > rows {
                column.pop();
            }
            column.push(value);
        }
        self.rows += 1;
        for column in self.columns.values_mut() {
            column.resize(self.rows, Value::Null);
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Appends an all-null column if it is missing.
    pub fn ensure_column(&mut self, name: &str) {
        if !self.columns.contains_key(name) {
            self.columns
                .insert(name.to_string(), vec![Value::Null; self.rows]);
        }
    }

    pub fn drop_column(&mut self, name: &str) {
        self.columns.shift_remove(name);
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Builds the Arrow columns. The `geometry` column, if named, is encoded as WKB.
    pub fn finish(self, geometry: Option<&str>) -> ContainerResult<Vec<(FieldRef, ArrayRef)>> {
        let rows = self.rows;
        self.columns
            .into_iter()
            .map(|(name, values)| {
                let array = if Some(name.as_str()) == geometry {
                    build_geometry(&values)?
                } else if DATETIME_COLUMNS.contains(&name.as_str()) {
                    build_timestamps(&name, &values)?
                } else {
                    build_column(&values, rows)
                };
                let field = Arc::new(Field::new(name, array.data_type().clone(), true));
                Ok((field, array))
            })
            .collect()
    }
}

fn build_geometry(values: &[Value]) -> ContainerResult<ArrayRef> {
    let mut builder = BinaryBuilder::new();
    for value in values {
        match geometry_to_wkb(value)? {
            Some(wkb) => builder.append_value(wkb),
            None => builder.append_null(),
        }
    }
    Ok(Arc::new(builder.finish()))
}

fn build_timestamps(name: &str, values: &[Value]) -> ContainerResult<ArrayRef> {
    let mut builder = TimestampNanosecondBuilder::new().with_timezone("UTC");
    for value in values {
        match value {
            Value::Null => builder.append_null(),
            Value::String(s) => {
                let nanos = parse_datetime(s)
                    .and_then(|dt| dt.timestamp_nanos_opt())
                    .ok_or_else(|| {
                        ContainerError::invalid_data(format!("invalid {name} value: {s}"))
                    })?;
                builder.append_value(nanos);
            }
            other => {
                return Err(ContainerError::invalid_data(format!(
                    "invalid {name} value: {other}"
                )))
            }
        }
    }
    Ok(Arc::new(builder.finish()))
}

fn build_column(values: &[Value], rows: usize) -> ArrayRef {
    let column_type = values
        .iter()
        .fold(ColumnType::Scalar(Scalar::Null), |acc, v| {
            acc.merge(ColumnType::of(v))
        });
    match column_type {
        ColumnType::Scalar(Scalar::Null) => new_null_array(&DataType::Null, rows),
        ColumnType::Scalar(Scalar::Bool) => {
            let mut builder = BooleanBuilder::with_capacity(rows);
            values.iter().for_each(|v| builder.append_option(v.as_bool()));
            Arc::new(builder.finish())
        }
        ColumnType::Scalar(Scalar::Int) => {
            let mut builder = Int64Builder::with_capacity(rows);
            values.iter().for_each(|v| builder.append_option(v.as_i64()));
            Arc::new(builder.finish())
        }
        ColumnType::Scalar(Scalar::Float) => {
            let mut builder = Float64Builder::with_capacity(rows);
            values.iter().for_each(|v| builder.append_option(v.as_f64()));
            Arc::new(builder.finish())
        }
        ColumnType::Scalar(Scalar::Utf8) | ColumnType::Scalar(Scalar::Json) => {
            let mut builder = StringBuilder::with_capacity(rows, rows * 16);
            values.iter().for_each(|v| builder.append_option(json_text(v)));
            Arc::new(builder.finish())
        }
        ColumnType::List(element) => build_list(values, element),
    }
}

fn build_list(values: &[Value], element: Scalar) -> ArrayRef {
    macro_rules! list {
        ($builder:expr, $get:expr) => {{
            let mut builder = ListBuilder::new($builder);
            for value in values {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            builder.values().append_option($get(item));
                        }
                        builder.append(true);
                    }
                    _ => builder.append(false),
                }
            }
            Arc::new(builder.finish()) as ArrayRef
        }};
    }
    match element {
        Scalar::Bool => list!(BooleanBuilder::new(), Value::as_bool),
        Scalar::Int => list!(Int64Builder::new(), Value::as_i64),
        Scalar::Float => list!(Float64Builder::new(), Value::as_f64),
        // Lists whose elements are all null are kept as lists of strings.
        Scalar::Null | Scalar::Utf8 | Scalar::Json => list!(StringBuilder::new(), json_text),
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int64Type, TimeUnit};
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> Vec<(String, Value)> {
        match value {
            Value::Object(map) => flatten_object(&map, None),
            _ => vec![],
        }
    }

    fn finish(builder: TableBuilder) -> IndexMap<String, ArrayRef> {
        builder
            .finish(None)
            .unwrap()
            .into_iter()
            .map(|(f, a)| (f.name().clone(), a))
            .collect()
    }

    #[test]
    fn test_flatten_object() {
        let object = json!({"a": {"b": 1, "c": {"d": [1, 2]}}, "e": {}, "f": "x"});
        let flat = flatten_object(object.as_object().unwrap(), Some("assets"));
        let names = flat.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["assets.a.b", "assets.a.c.d", "assets.f"]);
        assert_eq!(flat[1].1, json!([1, 2]));
    }

    #[test]
    fn test_union_of_columns() {
        let mut builder = TableBuilder::new();
        builder.push_row(row(json!({"a": 1})));
        builder.push_row(row(json!({"b": "x", "a": 2})));
        builder.push_row(row(json!({})));
        assert_eq!(builder.num_rows(), 3);
        let columns = finish(builder);
        assert_eq!(columns.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        let a = columns["a"].as_primitive::<Int64Type>();
        assert_eq!(a.value(0), 1);
        assert_eq!(a.value(1), 2);
        assert!(a.is_null(2));
        let b = columns["b"].as_string::<i32>();
        assert!(b.is_null(0));
        assert_eq!(b.value(1), "x");
    }

    #[test]
    fn test_type_inference() {
        let mut builder = TableBuilder::new();
        builder.push_row(row(json!({
            "mixed": 1, "flag": true, "text": "a", "bbox": [1, 2], "obj": [{"x": 1}], "none": null
        })));
        builder.push_row(row(json!({
            "mixed": 1.5, "flag": false, "text": 3, "bbox": [3.5, 4], "obj": null, "none": null
        })));
        let columns = finish(builder);
        assert_eq!(columns["mixed"].data_type(), &DataType::Float64);
        assert_eq!(columns["mixed"].as_primitive::<Float64Type>().value(0), 1.0);
        assert_eq!(columns["flag"].data_type(), &DataType::Boolean);
        let text = columns["text"].as_string::<i32>();
        assert_eq!(text.value(0), "a");
        assert_eq!(text.value(1), "3");
        let bbox = columns["bbox"].as_list::<i32>();
        assert_eq!(bbox.value_type(), DataType::Float64);
        assert_eq!(
            bbox.value(1).as_primitive::<Float64Type>().values().to_vec(),
            vec![3.5, 4.0]
        );
        assert_eq!(columns["obj"].as_string::<i32>().value(0), r#"[{"x":1}]"#);
        assert_eq!(columns["none"].data_type(), &DataType::Null);
    }

    #[test]
    fn test_datetime_columns() {
        let mut builder = TableBuilder::new();
        builder.push_row(row(json!({"datetime": "2020-01-01T00:00:00Z"})));
        builder.push_row(row(json!({"datetime": null})));
        let columns = finish(builder);
        assert_eq!(
            columns["datetime"].data_type(),
            &DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
        );
        let values = columns["datetime"].as_primitive::<arrow::datatypes::TimestampNanosecondType>();
        assert_eq!(values.value(0), 1_577_836_800_000_000_000);
        assert!(values.is_null(1));

        let mut builder = TableBuilder::new();
        builder.push_row(row(json!({"datetime": "yesterday"})));
        assert!(builder.finish(None).is_err());
    }

    #[test]
    fn test_geometry_column() {
        let mut builder = TableBuilder::new();
        builder.push_row(row(json!({"id": "a"})));
        builder.push_row(vec![(
            "geometry".to_string(),
            json!({"type": "Point", "coordinates": [0.0, 0.0]}),
        )]);
        builder.ensure_column("geometry");
        let columns = builder.finish(Some("geometry")).unwrap();
        let (field, array) = &columns[1];
        assert_eq!(field.name(), "geometry");
        assert_eq!(array.data_type(), &DataType::Binary);
        assert!(array.is_null(0));
        assert!(array.is_valid(1));
    }
}
