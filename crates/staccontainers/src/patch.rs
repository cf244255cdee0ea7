//! An explicit, process-wide method table keyed by object kind.
//!
//! Nothing is installed until [`patch`] is called. Installing twice assigns
//! the same entries again.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use log::debug;
#[cfg(any(feature = "array", feature = "dataframe"))]
use serde_json::Value;

#[cfg(feature = "dataframe")]
use crate::frame::GeoDataFrame;
#[cfg(feature = "lazy-dataframe")]
use crate::frame::LazyGeoDataFrame;
#[cfg(feature = "array")]
use crate::dataset::Dataset;
use crate::dispatch::{ObjectKind, StacObject};
use crate::error::{ContainerError, ContainerResult};
use crate::options::OpenOptions;

/// The result of a dynamically invoked conversion.
#[derive(Debug)]
pub enum Container {
    #[cfg(feature = "array")]
    Dataset(Dataset),
    #[cfg(feature = "dataframe")]
    GeoDataFrame(GeoDataFrame),
    #[cfg(feature = "lazy-dataframe")]
    LazyGeoDataFrame(LazyGeoDataFrame),
}

pub type Method = for<'a> fn(StacObject<'a>, &OpenOptions) -> ContainerResult<Container>;

static METHODS: RwLock<BTreeMap<(ObjectKind, &'static str), Method>> = RwLock::new(BTreeMap::new());

/// Installs a method for every conversion compiled into the crate, on every
/// object kind its converter accepts.
pub fn patch() {
    let mut methods = METHODS.write().unwrap_or_else(PoisonError::into_inner);
    #[cfg(feature = "array")]
    install(&mut methods, crate::xarray::XARRAY, xarray_method);
    #[cfg(feature = "dataframe")]
    install(&mut methods, crate::geopandas::GEOPANDAS, geopandas_method);
    #[cfg(feature = "lazy-dataframe")]
    install(
        &mut methods,
        crate::dask_geopandas::DASK_GEOPANDAS,
        dask_geopandas_method,
    );
    debug!("installed {} conversion method(s)", methods.len());
}

#[cfg(any(feature = "array", feature = "dataframe"))]
fn install(
    methods: &mut BTreeMap<(ObjectKind, &'static str), Method>,
    dispatcher: crate::dispatch::Dispatcher,
    method: Method,
) {
    for kind in dispatcher.registered {
        methods.insert((*kind, dispatcher.container.method_name()), method);
    }
}

/// The names of the methods currently installed on an object kind.
pub fn installed_methods(kind: ObjectKind) -> Vec<&'static str> {
    let methods = METHODS.read().unwrap_or_else(PoisonError::into_inner);
    methods
        .keys()
        .filter(|(k, _)| *k == kind)
        .map(|(_, name)| *name)
        .collect()
}

/// Invokes an installed method by name with JSON keyword arguments.
pub fn call_method<'a>(
    obj: impl Into<StacObject<'a>>,
    name: &str,
    kwargs: &OpenOptions,
) -> ContainerResult<Container> {
    let obj = obj.into();
    let kind = obj.kind();
    let method = {
        let methods = METHODS.read().unwrap_or_else(PoisonError::into_inner);
        methods
            .iter()
            .find(|((k, n), _)| *k == kind && *n == name)
            .map(|(_, method)| *method)
    };
    match method {
        Some(method) => method(obj, kwargs),
        None => Err(ContainerError::MethodNotInstalled {
            kind,
            method: name.to_string(),
        }),
    }
}

/// Splits a string-valued override out of the keyword arguments.
#[cfg(any(feature = "array", feature = "dataframe"))]
fn take_override<T>(kwargs: &OpenOptions, key: &str) -> ContainerResult<(Option<T>, OpenOptions)>
where
    T: std::str::FromStr<Err = ContainerError>,
{
    let mut rest = kwargs.clone();
    let value = match rest.remove(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.parse()?),
        Some(other) => {
            return Err(ContainerError::invalid(format!(
                "`{key}` must be a string: {other}"
            )))
        }
    };
    Ok((value, rest))
}

#[cfg(feature = "array")]
fn xarray_method(obj: StacObject<'_>, kwargs: &OpenOptions) -> ContainerResult<Container> {
    let (driver, kwargs) = take_override(kwargs, "driver")?;
    let options = crate::xarray::XarrayOptions {
        driver,
        signer: None,
        kwargs,
    };
    crate::xarray::to_xarray(obj, &options).map(Container::Dataset)
}

#[cfg(feature = "dataframe")]
fn geopandas_method(obj: StacObject<'_>, kwargs: &OpenOptions) -> ContainerResult<Container> {
    let (reader, kwargs) = take_override(kwargs, "reader")?;
    let options = crate::geopandas::GeoPandasOptions { reader, kwargs };
    crate::geopandas::to_geopandas(obj, &options).map(Container::GeoDataFrame)
}

#[cfg(feature = "lazy-dataframe")]
fn dask_geopandas_method(obj: StacObject<'_>, kwargs: &OpenOptions) -> ContainerResult<Container> {
    let (reader, kwargs) = take_override(kwargs, "reader")?;
    let options = crate::dask_geopandas::DaskGeoPandasOptions { reader, kwargs };
    crate::dask_geopandas::to_dask_geopandas(obj, &options).map(Container::LazyGeoDataFrame)
}
