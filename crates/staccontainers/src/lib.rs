//! Converts STAC items, item collections, assets and searches into array and
//! dataframe containers.
//!
//! Each container kind is behind a Cargo feature. Conversions are plain
//! functions ([`to_xarray`], [`to_geopandas`], [`to_dask_geopandas`]); the
//! [`ext`] traits and the [`patch`] method table expose them as methods.

#[cfg(feature = "array")]
pub mod array;
pub mod capability;
#[cfg(feature = "lazy-dataframe")]
pub mod dask_geopandas;
#[cfg(feature = "array")]
pub mod dataset;
pub mod dispatch;
pub mod error;
pub mod ext;
#[cfg(feature = "dataframe")]
pub mod frame;
#[cfg(feature = "dataframe")]
pub mod geopandas;
mod globals;
mod http;
mod io;
pub mod media;
pub mod model;
pub mod options;
pub mod patch;
pub mod signing;
#[cfg(test)]
mod testing;
#[cfg(feature = "array")]
pub mod xarray;

#[cfg(feature = "lazy-dataframe")]
pub use dask_geopandas::{to_dask_geopandas, DaskGeoPandasOptions};
pub use dispatch::{ObjectKind, StacObject};
pub use error::{ContainerError, ContainerResult, ErrorKind};
#[cfg(feature = "lazy-dataframe")]
pub use frame::LazyGeoDataFrame;
#[cfg(feature = "dataframe")]
pub use frame::GeoDataFrame;
#[cfg(feature = "dataframe")]
pub use geopandas::{to_geopandas, GeoPandasOptions};
pub use io::StorageOptions;
pub use media::{ReaderStrategy, TableReader};
pub use model::{ApiSearch, Asset, Item, ItemCollection, ItemSearch, StacValue};
pub use patch::{call_method, installed_methods, patch, Container};
pub use staccontainers_common::logging::init_logging;
#[cfg(feature = "array")]
pub use xarray::{to_xarray, XarrayOptions};
