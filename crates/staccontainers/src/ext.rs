//! Conversion methods on the catalog types, in scope for callers that `use` the traits.

#[cfg(feature = "array")]
use crate::dataset::Dataset;
#[cfg(any(feature = "array", feature = "dataframe"))]
use crate::error::ContainerResult;
#[cfg(feature = "dataframe")]
use crate::frame::GeoDataFrame;
#[cfg(feature = "lazy-dataframe")]
use crate::frame::LazyGeoDataFrame;
#[cfg(any(feature = "array", feature = "dataframe"))]
use crate::model::{ApiSearch, Asset, ItemCollection};

#[cfg(feature = "array")]
pub trait ToXarray {
    fn to_xarray(&self, options: &crate::xarray::XarrayOptions) -> ContainerResult<Dataset>;
}

#[cfg(feature = "dataframe")]
pub trait ToGeoPandas {
    fn to_geopandas(
        &self,
        options: &crate::geopandas::GeoPandasOptions,
    ) -> ContainerResult<GeoDataFrame>;
}

#[cfg(feature = "lazy-dataframe")]
pub trait ToDaskGeoPandas {
    fn to_dask_geopandas(
        &self,
        options: &crate::dask_geopandas::DaskGeoPandasOptions,
    ) -> ContainerResult<LazyGeoDataFrame>;
}

macro_rules! impl_conversion {
    ($trait:ident, $method:ident, $options:ty, $output:ty, $function:path, [$($ty:ty),*]) => {
        $(
            impl $trait for $ty {
                fn $method(&self, options: &$options) -> ContainerResult<$output> {
                    $function(self, options)
                }
            }
        )*
    };
}

#[cfg(feature = "array")]
impl_conversion!(
    ToXarray,
    to_xarray,
    crate::xarray::XarrayOptions,
    Dataset,
    crate::xarray::to_xarray,
    [crate::model::Item, ItemCollection, Asset, ApiSearch]
);

#[cfg(feature = "dataframe")]
impl_conversion!(
    ToGeoPandas,
    to_geopandas,
    crate::geopandas::GeoPandasOptions,
    GeoDataFrame,
    crate::geopandas::to_geopandas,
    [ItemCollection, Asset, ApiSearch]
);

#[cfg(feature = "lazy-dataframe")]
impl_conversion!(
    ToDaskGeoPandas,
    to_dask_geopandas,
    crate::dask_geopandas::DaskGeoPandasOptions,
    LazyGeoDataFrame,
    crate::dask_geopandas::to_dask_geopandas,
    [ItemCollection, Asset, ApiSearch]
);

#[cfg(all(test, feature = "dataframe"))]
mod tests {
    use super::*;
    use crate::geopandas::GeoPandasOptions;

    #[test]
    fn test_to_geopandas_method() {
        let collection = ItemCollection::new(vec![crate::model::Item::new("a")]);
        let frame = collection.to_geopandas(&GeoPandasOptions::new()).unwrap();
        assert_eq!(frame.num_rows(), 1);
    }
}
