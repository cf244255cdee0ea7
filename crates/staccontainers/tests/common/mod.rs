#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// Writes a single-band float GeoTIFF in EPSG:32615 with the given top-left corner.
pub fn write_geotiff(path: &Path, width: u32, height: u32, values: &[f32], origin: (f64, f64)) {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        let mut image = encoder.new_image::<Gray32Float>(width, height).unwrap();
        let dir = image.encoder();
        dir.write_tag(Tag::Unknown(33550), &[10.0f64, 10.0, 0.0][..])
            .unwrap();
        dir.write_tag(
            Tag::Unknown(33922),
            &[0.0f64, 0.0, 0.0, origin.0, origin.1, 0.0][..],
        )
        .unwrap();
        dir.write_tag(
            Tag::Unknown(34735),
            &[1u16, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32615][..],
        )
        .unwrap();
        dir.write_tag(Tag::Unknown(42113), "-9999").unwrap();
        image.write_data(values).unwrap();
    }
    fs::write(path, buffer.into_inner()).unwrap();
}

/// Little-endian WKB for a 2D point.
pub fn point_wkb(x: f64, y: f64) -> Vec<u8> {
    let mut wkb = vec![1u8, 1, 0, 0, 0];
    wkb.extend_from_slice(&x.to_le_bytes());
    wkb.extend_from_slice(&y.to_le_bytes());
    wkb
}

/// Writes a GeoParquet file whose primary geometry column is `geom` in EPSG:3857.
pub fn write_geoparquet(path: &Path) {
    let batch = RecordBatch::try_from_iter(vec![
        ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
        (
            "name",
            Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef,
        ),
        (
            "geom",
            Arc::new(BinaryArray::from_iter_values(vec![
                point_wkb(0.0, 0.0),
                point_wkb(1.0, 1.0),
                point_wkb(2.0, 2.0),
            ])) as ArrayRef,
        ),
    ])
    .unwrap();
    let geo = r#"{"version":"1.0.0","primary_column":"geom","columns":{"geom":{"encoding":"WKB","geometry_types":["Point"],"crs":{"id":{"authority":"EPSG","code":3857}}}}}"#;
    let properties = WriterProperties::builder()
        .set_key_value_metadata(Some(vec![KeyValue::new(
            "geo".to_string(),
            geo.to_string(),
        )]))
        .build();
    let file = fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(properties)).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn write_json(path: &Path, value: serde_json::Value) {
    fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
}

fn f64_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// The `.zarray` document of an uncompressed little-endian float64 array.
pub fn zarray(shape: &[usize]) -> serde_json::Value {
    serde_json::json!({
        "zarr_format": 2,
        "shape": shape,
        "chunks": shape,
        "dtype": "<f8",
        "compressor": null,
        "fill_value": 0.0,
        "order": "C",
        "filters": null,
        "dimension_separator": "."
    })
}

/// Writes a Zarr v2 group with coordinates `x` (3) and `y` (2) and a
/// variable `temp (y, x)` holding 0..6.
pub fn write_zarr(root: &Path) {
    fs::create_dir_all(root).unwrap();
    write_json(&root.join(".zgroup"), serde_json::json!({"zarr_format": 2}));
    write_json(&root.join(".zattrs"), serde_json::json!({"title": "test"}));
    let arrays: [(&str, Vec<usize>, Vec<&str>, Vec<f64>, &str); 3] = [
        ("x", vec![3], vec!["x"], vec![10.0, 20.0, 30.0], "0"),
        ("y", vec![2], vec!["y"], vec![5.0, 15.0], "0"),
        (
            "temp",
            vec![2, 3],
            vec!["y", "x"],
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            "0.0",
        ),
    ];
    for (name, shape, dims, values, chunk) in arrays {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        write_json(&dir.join(".zarray"), zarray(&shape));
        write_json(
            &dir.join(".zattrs"),
            serde_json::json!({"_ARRAY_DIMENSIONS": dims, "units": "K"}),
        );
        fs::write(dir.join(chunk), f64_bytes(&values)).unwrap();
    }
}

/// A kerchunk reference index for a one-dimensional variable `v (x)` with inline data.
pub fn inline_references(values: &[f64]) -> serde_json::Value {
    use base64::Engine;
    let chunk = base64::engine::general_purpose::STANDARD.encode(f64_bytes(values));
    serde_json::json!({
        "version": 1,
        "refs": {
            ".zgroup": "{\"zarr_format\": 2}",
            "v/.zarray": zarray(&[values.len()]).to_string(),
            "v/.zattrs": "{\"_ARRAY_DIMENSIONS\": [\"x\"]}",
            "v/0": format!("base64:{chunk}")
        }
    })
}
