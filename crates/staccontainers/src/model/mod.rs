//! Serde models of the STAC documents that can be converted.

mod asset;
mod item;
mod search;
mod value;

pub use asset::{Asset, TABLE_STORAGE_OPTIONS, XARRAY_OPEN_KWARGS};
#[cfg(feature = "dataframe")]
pub(crate) use item::parse_datetime;
pub use item::{Item, ItemCollection};
pub use search::{ApiSearch, ItemSearch};
pub use value::StacValue;
