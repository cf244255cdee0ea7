//! The closed set of convertible inputs and the per-container registration tables.

use std::fmt;

use log::debug;
use serde_json::Value;

use crate::error::{ContainerError, ContainerResult};
use crate::model::{ApiSearch, Asset, Item, ItemCollection, ItemSearch, StacValue};

/// A borrowed catalog object handed to a converter.
#[derive(Clone, Copy)]
pub enum StacObject<'a> {
    Item(&'a Item),
    ItemCollection(&'a ItemCollection),
    Asset(&'a Asset),
    ItemSearch(&'a dyn ItemSearch),
    Catalog(&'a Value),
    Collection(&'a Value),
}

impl StacObject<'_> {
    pub fn kind(&self) -> ObjectKind {
        match self {
            StacObject::Item(_) => ObjectKind::Item,
            StacObject::ItemCollection(_) => ObjectKind::ItemCollection,
            StacObject::Asset(_) => ObjectKind::Asset,
            StacObject::ItemSearch(_) => ObjectKind::ItemSearch,
            StacObject::Catalog(_) => ObjectKind::Catalog,
            StacObject::Collection(_) => ObjectKind::Collection,
        }
    }
}

impl fmt::Debug for StacObject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StacObject::Item(item) => f.debug_tuple("Item").field(&item.id).finish(),
            StacObject::ItemCollection(c) => f.debug_tuple("ItemCollection").field(&c.len()).finish(),
            StacObject::Asset(asset) => f.debug_tuple("Asset").field(&asset.href).finish(),
            StacObject::ItemSearch(_) => f.write_str("ItemSearch"),
            StacObject::Catalog(_) => f.write_str("Catalog"),
            StacObject::Collection(_) => f.write_str("Collection"),
        }
    }
}

impl<'a> From<&'a Item> for StacObject<'a> {
    fn from(value: &'a Item) -> Self {
        StacObject::Item(value)
    }
}

impl<'a> From<&'a ItemCollection> for StacObject<'a> {
    fn from(value: &'a ItemCollection) -> Self {
        StacObject::ItemCollection(value)
    }
}

impl<'a> From<&'a Asset> for StacObject<'a> {
    fn from(value: &'a Asset) -> Self {
        StacObject::Asset(value)
    }
}

impl<'a> From<&'a ApiSearch> for StacObject<'a> {
    fn from(value: &'a ApiSearch) -> Self {
        StacObject::ItemSearch(value)
    }
}

impl<'a> From<&'a dyn ItemSearch> for StacObject<'a> {
    fn from(value: &'a dyn ItemSearch) -> Self {
        StacObject::ItemSearch(value)
    }
}

impl<'a> From<&'a StacValue> for StacObject<'a> {
    fn from(value: &'a StacValue) -> Self {
        match value {
            StacValue::Item(item) => StacObject::Item(item),
            StacValue::ItemCollection(c) => StacObject::ItemCollection(c),
            StacValue::Catalog(v) => StacObject::Catalog(v),
            StacValue::Collection(v) => StacObject::Collection(v),
        }
    }
}

/// The runtime tag of a [`StacObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Item,
    ItemCollection,
    Asset,
    ItemSearch,
    Catalog,
    Collection,
}

impl ObjectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Item => "Item",
            ObjectKind::ItemCollection => "ItemCollection",
            ObjectKind::Asset => "Asset",
            ObjectKind::ItemSearch => "ItemSearch",
            ObjectKind::Catalog => "Catalog",
            ObjectKind::Collection => "Collection",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContainerKind {
    Xarray,
    GeoPandas,
    DaskGeoPandas,
}

impl ContainerKind {
    /// The method name under which the conversion is installed.
    pub fn method_name(&self) -> &'static str {
        match self {
            ContainerKind::Xarray => "to_xarray",
            ContainerKind::GeoPandas => "to_geopandas",
            ContainerKind::DaskGeoPandas => "to_dask_geopandas",
        }
    }
}

/// The input kinds one container kind accepts.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    pub container: ContainerKind,
    pub registered: &'static [ObjectKind],
}

impl Dispatcher {
    pub const fn new(container: ContainerKind, registered: &'static [ObjectKind]) -> Self {
        Self {
            container,
            registered,
        }
    }

    pub fn supports(&self, kind: ObjectKind) -> bool {
        self.registered.contains(&kind)
    }

    /// Fails with an unsupported input type error for unregistered kinds.
    pub fn check(&self, obj: &StacObject<'_>) -> ContainerResult<ObjectKind> {
        let kind = obj.kind();
        if self.supports(kind) {
            debug!("dispatching {kind} to {}", self.container.method_name());
            Ok(kind)
        } else {
            Err(ContainerError::UnsupportedInputType {
                type_name: kind.type_name(),
            })
        }
    }
}
