use std::str::FromStr;

use log::debug;
use serde_json::Value;
use staccontainers_object_store::{local_path, parse_location};

use crate::array::{raster, zarr};
use crate::dataset::Dataset;
use crate::error::{ContainerError, ContainerResult};
use crate::options::OpenOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Engine {
    Rasterio,
    Zarr,
}

impl FromStr for Engine {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rasterio" => Ok(Engine::Rasterio),
            "zarr" => Ok(Engine::Zarr),
            other => Err(ContainerError::invalid(format!("unknown engine: {other}"))),
        }
    }
}

/// Guesses the engine from the file extension, or from the marker files of a local Zarr store.
pub(crate) fn guess_engine(href: &str) -> Option<Engine> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let path = path.trim_end_matches('/').to_ascii_lowercase();
    if path.ends_with(".tif") || path.ends_with(".tiff") {
        return Some(Engine::Rasterio);
    }
    if path.ends_with(".zarr") {
        return Some(Engine::Zarr);
    }
    let dir = parse_location(href).ok().and_then(|url| local_path(&url))?;
    if [".zgroup", ".zarray", "zarr.json"]
        .iter()
        .any(|marker| dir.join(marker).is_file())
    {
        Some(Engine::Zarr)
    } else {
        None
    }
}

/// Opens `href` with the engine named by the `engine` option, or a guessed one.
pub(crate) fn open_dataset(href: &str, options: &OpenOptions) -> ContainerResult<Dataset> {
    let engine = match options.get("engine") {
        Some(Value::String(name)) => name.parse()?,
        None | Some(Value::Null) => guess_engine(href).ok_or_else(|| {
            ContainerError::NoMatchingEngine {
                href: href.to_string(),
            }
        })?,
        Some(other) => {
            return Err(ContainerError::invalid(format!(
                "engine must be a string: {other}"
            )))
        }
    };
    debug!("opening {href} with the {engine:?} engine");
    match engine {
        Engine::Rasterio => raster::open(href, options),
        Engine::Zarr => zarr::open(href, options),
    }
}
