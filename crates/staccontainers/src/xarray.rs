//! Conversion to the labeled array container.

use std::sync::Arc;

use log::debug;
use serde_json::{json, Value};

use crate::array::engine::open_dataset;
use crate::array::reference::{fetch_index, open_references, ReferenceSet};
use crate::capability::{catalog_signer, raster_stacking};
use crate::dataset::Dataset;
use crate::dispatch::{ContainerKind, Dispatcher, ObjectKind, StacObject};
use crate::error::{ContainerError, ContainerResult};
use crate::globals::GlobalState;
use crate::media::{classify, ReaderStrategy};
use crate::model::{Asset, Item, XARRAY_OPEN_KWARGS};
use crate::options::{merge_options, storage_options, OpenOptions};
use crate::signing::Signer;

pub const XARRAY: Dispatcher = Dispatcher::new(
    ContainerKind::Xarray,
    &[
        ObjectKind::Item,
        ObjectKind::ItemCollection,
        ObjectKind::Asset,
        ObjectKind::ItemSearch,
    ],
);

#[derive(Debug, Clone, Default)]
pub struct XarrayOptions {
    /// Overrides the strategy chosen from the asset's media type and roles.
    pub driver: Option<ReaderStrategy>,
    /// Signs reference index URLs instead of the catalog signer.
    pub signer: Option<Arc<dyn Signer>>,
    pub kwargs: OpenOptions,
}

impl XarrayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_driver(mut self, driver: ReaderStrategy) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }
}

pub fn to_xarray<'a>(obj: impl Into<StacObject<'a>>, options: &XarrayOptions) -> ContainerResult<Dataset> {
    let obj = obj.into();
    let kind = XARRAY.check(&obj)?;
    match obj {
        StacObject::Item(item) => items_to_xarray(std::slice::from_ref(item), options),
        StacObject::ItemCollection(collection) => items_to_xarray(collection.items(), options),
        StacObject::Asset(asset) => asset_to_xarray(asset, options),
        StacObject::ItemSearch(search) => {
            let items = search.items()?;
            to_xarray(&items, options)
        }
        StacObject::Catalog(_) | StacObject::Collection(_) => Err(ContainerError::UnsupportedInputType {
            type_name: kind.type_name(),
        }),
    }
}

fn items_to_xarray(items: &[Item], options: &XarrayOptions) -> ContainerResult<Dataset> {
    let stacker = raster_stacking()?;
    stacker.stack(items, &options.kwargs)
}

fn strategy_defaults(strategy: ReaderStrategy) -> OpenOptions {
    let defaults = match strategy {
        ReaderStrategy::SignedReferenceIndexOpen => {
            json!({"engine": "zarr", "consolidated": false, "chunks": {}})
        }
        ReaderStrategy::RasterOpen => json!({"engine": "rasterio"}),
        ReaderStrategy::ZarrOpen => json!({"engine": "zarr"}),
        _ => json!({}),
    };
    match defaults {
        Value::Object(map) => map,
        _ => OpenOptions::new(),
    }
}

/// Merges strategy defaults, the asset's own open options and the caller's options, in that order.
fn open_options(asset: &Asset, strategy: ReaderStrategy, kwargs: &OpenOptions) -> OpenOptions {
    merge_options(vec![
        strategy_defaults(strategy),
        asset
            .extra_object(XARRAY_OPEN_KWARGS)
            .cloned()
            .unwrap_or_default(),
        kwargs.clone(),
    ])
}

fn asset_to_xarray(asset: &Asset, options: &XarrayOptions) -> ContainerResult<Dataset> {
    let strategy = options
        .driver
        .unwrap_or_else(|| classify(asset.media_type.as_deref(), &asset.roles, &asset.extra_fields))
        .for_array();
    debug!("opening {} as {strategy}", asset.href);
    let merged = open_options(asset, strategy, &options.kwargs);
    match strategy {
        ReaderStrategy::SignedReferenceIndexOpen => {
            let signer = match &options.signer {
                Some(signer) => signer.clone(),
                None => catalog_signer(&GlobalState::instance()?.config)?,
            };
            match merged.get("engine").and_then(|e| e.as_str()) {
                Some("zarr") | None => {}
                Some(other) => {
                    return Err(ContainerError::invalid(format!(
                        "reference indexes are opened with the zarr engine, not {other}"
                    )))
                }
            }
            let storage = storage_options(merged.get("storage_options"))?;
            let index = fetch_index(&asset.href, &storage)?;
            let mut references = ReferenceSet::parse(&index)?;
            references.sign(signer.as_ref())?;
            open_references(references, &merged)
        }
        _ => open_dataset(&asset.href, &merged),
    }
}
