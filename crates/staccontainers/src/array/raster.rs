//! The `rasterio` engine: GeoTIFF decoding with the `tiff` crate.

use std::io::Cursor;

use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;
use serde_json::Value;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::dataset::{ArrayData, Dataset, Variable};
use crate::error::{ContainerError, ContainerResult};
use crate::io::{fetch_bytes, StorageOptions};
use crate::options::{load_options, storage_options, OpenOptions, ReaderOptions};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GEOGRAPHIC_TYPE_GEO_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u32 = 3072;
const USER_DEFINED: u32 = 32767;

#[derive(Debug, Deserialize)]
struct RasterOptions {
    #[serde(default)]
    band_as_variable: bool,
    #[serde(default)]
    storage_options: Option<Value>,
}

impl ReaderOptions for RasterOptions {
    const ALLOWED_KEYS: &'static [&'static str] =
        &["engine", "band_as_variable", "storage_options"];
}

/// An affine pixel-to-world mapping without rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GeoTransform {
    pub x0: f64,
    pub dx: f64,
    pub y0: f64,
    pub dy: f64,
}

impl GeoTransform {
    const PIXEL: GeoTransform = GeoTransform {
        x0: 0.0,
        dx: 1.0,
        y0: 0.0,
        dy: 1.0,
    };

    pub fn x_centers(&self, width: usize) -> Vec<f64> {
        (0..width)
            .map(|i| self.x0 + (i as f64 + 0.5) * self.dx)
            .collect()
    }

    pub fn y_centers(&self, height: usize) -> Vec<f64> {
        (0..height)
            .map(|j| self.y0 + (j as f64 + 0.5) * self.dy)
            .collect()
    }
}

/// A decoded GeoTIFF image with band-major pixel values.
#[derive(Debug, Clone)]
pub(crate) struct GeoRaster {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub values: Vec<f64>,
    pub transform: GeoTransform,
    pub crs: Option<String>,
    pub nodata: Option<f64>,
}

impl GeoRaster {
    pub fn band(&self, index: usize) -> &[f64] {
        let n = self.width * self.height;
        &self.values[index * n..(index + 1) * n]
    }

    /// Describes how `other` is laid out differently from `self`, if at all.
    pub fn misalignment(&self, other: &GeoRaster) -> Option<String> {
        if (self.width, self.height) != (other.width, other.height) {
            Some(format!(
                "shape {}x{} differs from {}x{}",
                other.width, other.height, self.width, self.height
            ))
        } else if self.transform != other.transform {
            Some("geotransform differs".to_string())
        } else if self.crs != other.crs {
            Some(format!(
                "CRS {} differs from {}",
                other.crs.as_deref().unwrap_or("none"),
                self.crs.as_deref().unwrap_or("none")
            ))
        } else {
            None
        }
    }
}

pub(crate) fn decode_geotiff(bytes: &[u8]) -> ContainerResult<GeoRaster> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let bands = decoder
        .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
        .unwrap_or(1) as usize;
    let planar = decoder
        .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?
        .unwrap_or(1);
    let scale = decoder
        .find_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let geo_keys = decoder
        .find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u32_vec())
        .transpose()?;
    let nodata = decoder
        .find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))?
        .and_then(|v| v.into_string().ok())
        .and_then(|s| s.trim_matches('\0').trim().parse::<f64>().ok());

    let samples = into_f64(decoder.read_image()?)?;
    let pixels = width * height;
    if samples.len() != pixels * bands {
        return Err(ContainerError::invalid_data(format!(
            "expected {} samples for a {width}x{height} image with {bands} band(s), got {}",
            pixels * bands,
            samples.len()
        )));
    }
    // Band-interleaved pixels are reordered to one plane per band.
    let values = if planar == 2 || bands == 1 {
        samples
    } else {
        let mut values = vec![0.0; samples.len()];
        for (i, v) in samples.into_iter().enumerate() {
            values[(i % bands) * pixels + i / bands] = v;
        }
        values
    };

    let transform = match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) if scale.len() >= 2 && tiepoint.len() >= 6 => GeoTransform {
            x0: tiepoint[3] - tiepoint[0] * scale[0],
            dx: scale[0],
            y0: tiepoint[4] + tiepoint[1] * scale[1],
            dy: -scale[1],
        },
        _ => GeoTransform::PIXEL,
    };

    Ok(GeoRaster {
        width,
        height,
        bands,
        values,
        transform,
        crs: geo_keys.as_deref().and_then(epsg_from_geo_keys),
        nodata,
    })
}

fn into_f64(result: DecodingResult) -> ContainerResult<Vec<f64>> {
    let values = match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(ContainerError::invalid_data(
                "unsupported GeoTIFF sample format",
            ))
        }
    };
    Ok(values)
}

/// Reads the EPSG code from a GeoKey directory, preferring the projected CRS.
fn epsg_from_geo_keys(keys: &[u32]) -> Option<String> {
    let count = *keys.get(3)? as usize;
    let mut geographic = None;
    let mut projected = None;
    for entry in keys.get(4..)?.chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == USER_DEFINED || value == 0 {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE_GEO_KEY => projected = Some(value),
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(value),
            _ => {}
        }
    }
    projected.or(geographic).map(|code| format!("EPSG:{code}"))
}

pub(crate) fn read_geotiff(href: &str, storage_options: &StorageOptions) -> ContainerResult<GeoRaster> {
    let bytes = fetch_bytes(href, storage_options)?;
    decode_geotiff(&bytes)
}

pub(crate) fn open(href: &str, options: &OpenOptions) -> ContainerResult<Dataset> {
    let options: RasterOptions = load_options("rasterio", options)?;
    let storage = storage_options(options.storage_options.as_ref())?;
    let raster = read_geotiff(href, &storage)?;
    raster_dataset(&raster, options.band_as_variable)
}

fn shaped(shape: &[usize], values: Vec<f64>) -> ContainerResult<ArrayD<f64>> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| ContainerError::internal(e.to_string()))
}

pub(crate) fn raster_dataset(raster: &GeoRaster, band_as_variable: bool) -> ContainerResult<Dataset> {
    let mut dataset = Dataset::new();
    let (height, width) = (raster.height, raster.width);
    let fill_value = raster.nodata.map(Value::from);

    if band_as_variable {
        for band in 0..raster.bands {
            let data = shaped(&[height, width], raster.band(band).to_vec())?;
            let mut variable = Variable::new(&["y", "x"], ArrayData::Float64(data));
            if let Some(fill_value) = &fill_value {
                variable = variable.with_attr("_FillValue", fill_value.clone());
            }
            dataset.add_data_var(format!("band_{}", band + 1), variable)?;
        }
    } else {
        let data = shaped(&[raster.bands, height, width], raster.values.clone())?;
        let mut variable = Variable::new(&["band", "y", "x"], ArrayData::Float64(data));
        if let Some(fill_value) = &fill_value {
            variable = variable.with_attr("_FillValue", fill_value.clone());
        }
        dataset.add_data_var("band_data", variable)?;
        let bands = (1..=raster.bands as i64).collect::<Vec<_>>();
        let bands = ArrayD::from_shape_vec(IxDyn(&[raster.bands]), bands)
            .map_err(|e| ContainerError::internal(e.to_string()))?;
        dataset.add_coord("band", Variable::new(&["band"], ArrayData::Int64(bands)))?;
    }

    let x = shaped(&[width], raster.transform.x_centers(width))?;
    let y = shaped(&[height], raster.transform.y_centers(height))?;
    dataset.add_coord("x", Variable::new(&["x"], ArrayData::Float64(x)))?;
    dataset.add_coord("y", Variable::new(&["y"], ArrayData::Float64(y)))?;
    if let Some(crs) = &raster.crs {
        dataset.attrs.insert("crs".to_string(), Value::from(crs.as_str()));
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{geotiff_bytes, rgb_geotiff_bytes};

    #[test]
    fn test_decode_geotiff() {
        let values = (0..6).map(|v| v as f32).collect::<Vec<_>>();
        let bytes = geotiff_bytes(3, 2, &values, (100.0, 200.0), 10.0, 32610, Some("-9999"));
        let raster = decode_geotiff(&bytes).unwrap();
        assert_eq!((raster.width, raster.height, raster.bands), (3, 2, 1));
        assert_eq!(raster.values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(raster.crs.as_deref(), Some("EPSG:32610"));
        assert_eq!(raster.nodata, Some(-9999.0));
        assert_eq!(raster.transform.x_centers(3), vec![105.0, 115.0, 125.0]);
        assert_eq!(raster.transform.y_centers(2), vec![195.0, 185.0]);
    }

    #[test]
    fn test_raster_dataset() {
        let values = vec![1.0f32; 4];
        let bytes = geotiff_bytes(2, 2, &values, (0.0, 2.0), 1.0, 4326, None);
        let raster = decode_geotiff(&bytes).unwrap();
        let dataset = raster_dataset(&raster, false).unwrap();
        let band_data = dataset.variable("band_data").unwrap();
        assert_eq!(band_data.dims, vec!["band", "y", "x"]);
        assert_eq!(band_data.shape(), vec![1, 2, 2]);
        assert!(band_data.attrs.get("_FillValue").is_none());
        let bands = dataset.coords["band"].values().unwrap();
        assert_eq!(bands.as_i64().unwrap().as_slice().unwrap(), &[1]);
        assert_eq!(dataset.attrs["crs"], "EPSG:4326");
    }

    #[test]
    fn test_band_as_variable() {
        let pixels = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let bytes = rgb_geotiff_bytes(2, 1, &pixels);
        let raster = decode_geotiff(&bytes).unwrap();
        assert_eq!(raster.bands, 3);
        assert_eq!(raster.band(0), &[1.0, 4.0]);
        assert_eq!(raster.band(2), &[3.0, 6.0]);

        let dataset = raster_dataset(&raster, true).unwrap();
        assert_eq!(
            dataset.data_vars.keys().collect::<Vec<_>>(),
            vec!["band_1", "band_2", "band_3"]
        );
        assert_eq!(dataset.data_vars["band_2"].dims, vec!["y", "x"]);
        assert!(dataset.coords.get("band").is_none());
    }

    #[test]
    fn test_epsg_from_geo_keys() {
        let keys = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32633];
        assert_eq!(epsg_from_geo_keys(&keys).as_deref(), Some("EPSG:32633"));
        let keys = [1, 1, 0, 1, 2048, 0, 1, 32767];
        assert_eq!(epsg_from_geo_keys(&keys), None);
        assert_eq!(epsg_from_geo_keys(&[1, 1]), None);
    }
}
