//! Readers that produce a [`Dataset`](crate::dataset::Dataset).

pub(crate) mod engine;
pub(crate) mod raster;
pub(crate) mod reference;
#[cfg(feature = "stack")]
pub(crate) mod stack;
pub(crate) mod zarr;

use crate::dataset::Dataset;
use crate::error::ContainerResult;
use crate::model::Item;
use crate::options::OpenOptions;

/// Stacks the raster assets of many items into one `(time, band, y, x)` array.
pub trait RasterStacking: Send + Sync {
    fn stack(&self, items: &[Item], options: &OpenOptions) -> ContainerResult<Dataset>;
}
