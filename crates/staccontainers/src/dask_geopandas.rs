//! Conversion to the lazy geospatial dataframe container.

use serde_json::Value;

use crate::dispatch::{ContainerKind, Dispatcher, ObjectKind, StacObject};
use crate::error::{ContainerError, ContainerResult};
use crate::frame::lazy::read_parquet_lazy;
use crate::frame::parquet::ParquetOptions;
use crate::frame::vector::{read_vector, VectorOptions};
use crate::frame::{items_to_frame, LazyGeoDataFrame};
use crate::geopandas::{table_reader, table_storage_options};
use crate::globals::GlobalState;
use crate::media::TableReader;
use crate::model::Asset;
use crate::options::{load_options, OpenOptions};

pub const DASK_GEOPANDAS: Dispatcher = Dispatcher::new(
    ContainerKind::DaskGeoPandas,
    &[
        ObjectKind::ItemCollection,
        ObjectKind::Asset,
        ObjectKind::ItemSearch,
    ],
);

#[derive(Debug, Clone, Default)]
pub struct DaskGeoPandasOptions {
    pub reader: Option<TableReader>,
    pub kwargs: OpenOptions,
}

impl DaskGeoPandasOptions {
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

pub fn to_dask_geopandas<'a>(
    obj: impl Into<StacObject<'a>>,
    options: &DaskGeoPandasOptions,
) -> ContainerResult<LazyGeoDataFrame> {
    let obj = obj.into();
    let kind = DASK_GEOPANDAS.check(&obj)?;
    match obj {
        StacObject::ItemCollection(collection) => {
            let state = GlobalState::instance()?;
            let frame = items_to_frame(collection.items(), &state.config.frame.default_crs)?;
            LazyGeoDataFrame::from_frame(frame)
        }
        StacObject::Asset(asset) => asset_to_dask_geopandas(asset, options),
        StacObject::ItemSearch(search) => {
            let items = search.items()?;
            to_dask_geopandas(&items, options)
        }
        _ => Err(ContainerError::UnsupportedInputType {
            type_name: kind.type_name(),
        }),
    }
}

fn asset_to_dask_geopandas(
    asset: &Asset,
    options: &DaskGeoPandasOptions,
) -> ContainerResult<LazyGeoDataFrame> {
    match table_reader(asset, options.reader) {
        TableReader::Parquet => {
            let parquet: ParquetOptions = load_options("parquet", &options.kwargs)?;
            let storage = table_storage_options(asset, parquet.storage_options.as_ref())?;
            read_parquet_lazy(&asset.href, &storage, &parquet)
        }
        TableReader::Generic => {
            let vector: VectorOptions = load_options("vector", &options.kwargs)?;
            let storage = table_storage_options(asset, vector.storage_options.as_ref())?;
            LazyGeoDataFrame::from_frame(read_vector(&asset.href, &storage)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_collection_is_wrapped() {
        let collection: crate::model::ItemCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "a", "geometry": null, "properties": {"n": 1}},
                {"type": "Feature", "id": "b", "geometry": null, "properties": {"n": 2}}
            ]
        }))
        .unwrap();
        let lazy = to_dask_geopandas(&collection, &DaskGeoPandasOptions::new()).unwrap();
        assert!(lazy.column_names().contains(&"n".to_string()));
        let frame = lazy.collect().unwrap();
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.crs.as_deref(), Some("EPSG:4326"));
    }

    #[test]
    fn test_catalog_is_rejected() {
        let catalog = json!({"type": "Catalog", "id": "c"});
        let error =
            to_dask_geopandas(StacObject::Catalog(&catalog), &DaskGeoPandasOptions::new())
                .unwrap_err();
        assert!(matches!(
            error,
            ContainerError::UnsupportedInputType { type_name: "Catalog" }
        ));
    }
}
