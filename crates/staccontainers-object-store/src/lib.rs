mod error;
mod location;
mod registry;

pub use error::{StoreError, StoreResult};
pub use location::{local_path, parse_location, store_root};
pub use registry::{get_object_store, list_children, read_bytes, read_range};
