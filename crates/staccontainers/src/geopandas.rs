//! Conversion to the eager geospatial dataframe container.

use log::debug;
use serde_json::Value;

use crate::dispatch::{ContainerKind, Dispatcher, ObjectKind, StacObject};
use crate::error::{ContainerError, ContainerResult};
use crate::frame::parquet::{read_parquet, ParquetOptions};
use crate::frame::vector::{read_vector, VectorOptions};
use crate::frame::{items_to_frame, GeoDataFrame};
use crate::globals::GlobalState;
use crate::io::StorageOptions;
use crate::media::{classify, TableReader};
use crate::model::{Asset, TABLE_STORAGE_OPTIONS};
use crate::options::{load_options, storage_options, OpenOptions};

pub const GEOPANDAS: Dispatcher = Dispatcher::new(
    ContainerKind::GeoPandas,
    &[
        ObjectKind::ItemCollection,
        ObjectKind::Asset,
        ObjectKind::ItemSearch,
    ],
);

#[derive(Debug, Clone, Default)]
pub struct GeoPandasOptions {
    /// Overrides the reader chosen from the asset's media type and roles.
    pub reader: Option<TableReader>,
    pub kwargs: OpenOptions,
}

impl GeoPandasOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reader(mut self, reader: TableReader) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }
}

pub fn to_geopandas<'a>(
    obj: impl Into<StacObject<'a>>,
    options: &GeoPandasOptions,
) -> ContainerResult<GeoDataFrame> {
    let obj = obj.into();
    let kind = GEOPANDAS.check(&obj)?;
    match obj {
        StacObject::ItemCollection(collection) => {
            let state = GlobalState::instance()?;
            items_to_frame(collection.items(), &state.config.frame.default_crs)
        }
        StacObject::Asset(asset) => asset_to_geopandas(asset, options),
        StacObject::ItemSearch(search) => {
            let items = search.items()?;
            to_geopandas(&items, options)
        }
        _ => Err(ContainerError::UnsupportedInputType {
            type_name: kind.type_name(),
        }),
    }
}

/// The reader for an asset: the caller's override, or the classified strategy.
pub(crate) fn table_reader(asset: &Asset, reader: Option<TableReader>) -> TableReader {
    let reader = reader.unwrap_or_else(|| {
        classify(asset.media_type.as_deref(), &asset.roles, &asset.extra_fields).for_table()
    });
    debug!("reading {} with the {reader:?} table reader", asset.href);
    reader
}

/// The asset's `table:storage_options`, overridden per key by the caller's `storage_options`.
pub(crate) fn table_storage_options(
    asset: &Asset,
    caller: Option<&Value>,
) -> ContainerResult<StorageOptions> {
    let mut options = storage_options(asset.extra_fields.get(TABLE_STORAGE_OPTIONS))?;
    for (key, value) in storage_options(caller)? {
        options.retain(|(k, _)| k != &key);
        options.push((key, value));
    }
    Ok(options)
}

fn asset_to_geopandas(asset: &Asset, options: &GeoPandasOptions) -> ContainerResult<GeoDataFrame> {
    match table_reader(asset, options.reader) {
        TableReader::Parquet => {
            let parquet: ParquetOptions = load_options("parquet", &options.kwargs)?;
            let storage = table_storage_options(asset, parquet.storage_options.as_ref())?;
            read_parquet(&asset.href, &storage, &parquet)
        }
        TableReader::Generic => {
            let vector: VectorOptions = load_options("vector", &options.kwargs)?;
            let storage = table_storage_options(asset, vector.storage_options.as_ref())?;
            read_vector(&asset.href, &storage)
        }
    }
}
