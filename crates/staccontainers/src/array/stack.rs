//! Stacking the raster assets of many items into one array.

use indexmap::IndexSet;
use log::debug;
use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::array::raster::{read_geotiff, GeoRaster};
use crate::array::RasterStacking;
use crate::dataset::{ArrayData, Dataset, Variable};
use crate::error::{ContainerError, ContainerResult};
use crate::media::{classify, ReaderStrategy};
use crate::model::{Asset, Item};
use crate::options::{load_options, storage_options, OpenOptions, ReaderOptions};

#[derive(Debug, Error)]
pub enum StackError {
    #[error("cannot stack an empty set of items")]
    EmptyInput,
    #[error("no raster assets to stack")]
    NoAssets,
    #[error("asset {key} of item {item} is misaligned: {reason}")]
    Misaligned {
        item: String,
        key: String,
        reason: String,
    },
    #[error("cannot read asset {key} of item {item}: {source}")]
    Read {
        item: String,
        key: String,
        source: Box<ContainerError>,
    },
}

#[derive(Debug, Deserialize)]
struct StackOptions {
    #[serde(default)]
    assets: Option<Vec<String>>,
    #[serde(default)]
    storage_options: Option<Value>,
}

impl ReaderOptions for StackOptions {
    const ALLOWED_KEYS: &'static [&'static str] = &["assets", "storage_options"];
}

fn is_stackable(asset: &Asset) -> bool {
    classify(asset.media_type.as_deref(), &asset.roles, &asset.extra_fields)
        == ReaderStrategy::RasterOpen
        && (asset.roles.is_empty() || asset.has_role("data"))
}

/// Stacks GeoTIFF assets decoded with the `tiff` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiffStacker;

impl RasterStacking for TiffStacker {
    fn stack(&self, items: &[Item], options: &OpenOptions) -> ContainerResult<Dataset> {
        let options: StackOptions = load_options("stack", options)?;
        let storage = storage_options(options.storage_options.as_ref())?;
        if items.is_empty() {
            return Err(StackError::EmptyInput.into());
        }
        let keys: Vec<String> = match options.assets {
            Some(keys) => keys,
            None => items
                .iter()
                .flat_map(|item| item.assets.iter())
                .filter(|(_, asset)| is_stackable(asset))
                .map(|(key, _)| key.clone())
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect(),
        };
        if keys.is_empty() {
            return Err(StackError::NoAssets.into());
        }
        debug!(
            "stacking {} asset(s) across {} item(s)",
            keys.len(),
            items.len()
        );

        let mut grid: Option<GeoRaster> = None;
        let mut rasters = Vec::with_capacity(items.len() * keys.len());
        for item in items {
            for key in &keys {
                let Some(asset) = item.assets.get(key) else {
                    rasters.push(None);
                    continue;
                };
                let raster = read_geotiff(&asset.href, &storage).map_err(|e| StackError::Read {
                    item: item.id.clone(),
                    key: key.clone(),
                    source: Box::new(e),
                })?;
                if let Some(reason) = grid.as_ref().and_then(|g| g.misalignment(&raster)) {
                    return Err(StackError::Misaligned {
                        item: item.id.clone(),
                        key: key.clone(),
                        reason,
                    }
                    .into());
                }
                if grid.is_none() {
                    grid = Some(raster.clone());
                }
                rasters.push(Some(raster));
            }
        }
        let Some(grid) = grid else {
            return Err(StackError::NoAssets.into());
        };

        let (height, width) = (grid.height, grid.width);
        let pixels = height * width;
        let mut values = vec![f64::NAN; items.len() * keys.len() * pixels];
        for (slot, raster) in rasters.iter().enumerate() {
            let Some(raster) = raster else { continue };
            let target = &mut values[slot * pixels..(slot + 1) * pixels];
            for (out, &v) in target.iter_mut().zip(raster.band(0)) {
                *out = match raster.nodata {
                    Some(nodata) if v == nodata => f64::NAN,
                    _ => v,
                };
            }
        }

        let mut times = Vec::with_capacity(items.len());
        for item in items {
            let time = item
                .datetime()?
                .and_then(|t| t.timestamp_nanos_opt())
                .unwrap_or(i64::MIN);
            times.push(time);
        }
        let ids = items.iter().map(|i| i.id.clone()).collect::<Vec<_>>();

        let mut dataset = Dataset::new();
        dataset.add_data_var(
            "data",
            Variable::new(
                &["time", "band", "y", "x"],
                ArrayData::Float64(shaped(&[items.len(), keys.len(), height, width], values)?),
            ),
        )?;
        dataset.add_coord(
            "time",
            Variable::new(&["time"], ArrayData::Timestamp(shaped(&[items.len()], times)?)),
        )?;
        dataset.add_coord(
            "id",
            Variable::new(&["time"], ArrayData::Utf8(shaped(&[items.len()], ids)?)),
        )?;
        dataset.add_coord(
            "band",
            Variable::new(&["band"], ArrayData::Utf8(shaped(&[keys.len()], keys)?)),
        )?;
        dataset.add_coord(
            "x",
            Variable::new(&["x"], ArrayData::Float64(shaped(&[width], grid.transform.x_centers(width))?)),
        )?;
        dataset.add_coord(
            "y",
            Variable::new(&["y"], ArrayData::Float64(shaped(&[height], grid.transform.y_centers(height))?)),
        )?;
        if let Some(crs) = grid.crs {
            dataset.attrs.insert("crs".to_string(), Value::from(crs));
        }
        Ok(dataset)
    }
}

fn shaped<T>(shape: &[usize], values: Vec<T>) -> ContainerResult<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| ContainerError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::geotiff_bytes;

    fn item_with_assets(id: &str, datetime: &str, assets: &[(&str, &str)]) -> Item {
        let mut item = Item::new(id);
        item.properties.insert("datetime".to_string(), json!(datetime));
        for (key, href) in assets {
            item.assets.insert(
                key.to_string(),
                Asset::new(*href)
                    .with_media_type("image/tiff; application=geotiff")
                    .with_role("data"),
            );
        }
        item
    }

    #[test]
    fn test_stack_empty() {
        let error = TiffStacker.stack(&[], &OpenOptions::new()).unwrap_err();
        assert!(matches!(error, ContainerError::Stack(StackError::EmptyInput)));
    }

    #[test]
    fn test_stack_no_assets() {
        let mut item = Item::new("a");
        item.assets.insert(
            "thumbnail".to_string(),
            Asset::new("a.png").with_media_type("image/png"),
        );
        item.assets.insert(
            "overview".to_string(),
            Asset::new("a.tif")
                .with_media_type("image/tiff")
                .with_role("overview"),
        );
        let error = TiffStacker.stack(&[item], &OpenOptions::new()).unwrap_err();
        assert!(matches!(error, ContainerError::Stack(StackError::NoAssets)));
    }

    #[test]
    fn test_stack_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).to_string_lossy().to_string();
        let write = |name: &str, value: f32| {
            let bytes = geotiff_bytes(2, 2, &[value; 4], (0.0, 20.0), 10.0, 32610, None);
            std::fs::write(path(name), bytes).unwrap();
        };
        write("a_red.tif", 1.0);
        write("a_nir.tif", 2.0);
        write("b_red.tif", 3.0);

        let (a_red, a_nir, b_red) = (path("a_red.tif"), path("a_nir.tif"), path("b_red.tif"));
        let items = vec![
            item_with_assets(
                "a",
                "2020-01-01T00:00:00Z",
                &[("red", a_red.as_str()), ("nir", a_nir.as_str())],
            ),
            item_with_assets("b", "2020-01-02T00:00:00Z", &[("red", b_red.as_str())]),
        ];
        let dataset = TiffStacker.stack(&items, &OpenOptions::new()).unwrap();

        let data = dataset.variable("data").unwrap();
        assert_eq!(data.dims, vec!["time", "band", "y", "x"]);
        assert_eq!(data.shape(), vec![2, 2, 2, 2]);
        let values = data.values().unwrap();
        let values = values.as_f64().unwrap();
        assert_eq!(values[[0, 0, 0, 0]], 1.0);
        assert_eq!(values[[0, 1, 1, 1]], 2.0);
        assert_eq!(values[[1, 0, 0, 0]], 3.0);
        assert!(values[[1, 1, 0, 0]].is_nan());

        let bands = dataset.coords["band"].values().unwrap();
        assert_eq!(bands.as_utf8().unwrap().as_slice().unwrap(), &["red", "nir"]);
        let ids = dataset.coords["id"].values().unwrap();
        assert_eq!(ids.as_utf8().unwrap().as_slice().unwrap(), &["a", "b"]);
        let times = dataset.coords["time"].values().unwrap();
        assert_eq!(
            times.as_timestamp().unwrap().as_slice().unwrap(),
            &[1_577_836_800_000_000_000, 1_577_923_200_000_000_000]
        );
        let x = dataset.coords["x"].values().unwrap();
        assert_eq!(x.as_f64().unwrap().as_slice().unwrap(), &[5.0, 15.0]);
        assert_eq!(dataset.attrs["crs"], "EPSG:32610");
    }

    #[test]
    fn test_stack_misaligned() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tif");
        let b = dir.path().join("b.tif");
        std::fs::write(&a, geotiff_bytes(2, 2, &[0.0; 4], (0.0, 0.0), 1.0, 4326, None)).unwrap();
        std::fs::write(&b, geotiff_bytes(2, 1, &[0.0; 2], (0.0, 0.0), 1.0, 4326, None)).unwrap();
        let items = vec![
            item_with_assets("a", "2020-01-01T00:00:00Z", &[("red", a.to_str().unwrap())]),
            item_with_assets("b", "2020-01-02T00:00:00Z", &[("red", b.to_str().unwrap())]),
        ];
        let error = TiffStacker.stack(&items, &OpenOptions::new()).unwrap_err();
        assert!(matches!(
            error,
            ContainerError::Stack(StackError::Misaligned { ref item, .. }) if item == "b"
        ));
    }
}
