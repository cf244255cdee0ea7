use std::ops::Range;

use bytes::Bytes;
use log::debug;
use staccontainers_object_store::{list_children, parse_location, read_bytes, read_range};
use url::Url;

use crate::error::ContainerResult;
use crate::globals::GlobalState;
use crate::http::{get_bytes, is_http};

/// Storage options as `object_store` configuration pairs.
pub type StorageOptions = Vec<(String, String)>;

/// Reads a whole object. HTTP URLs are fetched as-is so that signed query strings are kept.
pub(crate) fn fetch_bytes(href: &str, storage_options: &StorageOptions) -> ContainerResult<Bytes> {
    if is_http(href) {
        return get_bytes(href, None);
    }
    let url = parse_location(href)?;
    let state = GlobalState::instance()?;
    debug!("reading {url}");
    Ok(state.block_on(read_bytes(&url, storage_options.iter().cloned()))?)
}

pub(crate) fn fetch_range(
    href: &str,
    storage_options: &StorageOptions,
    range: Range<usize>,
) -> ContainerResult<Bytes> {
    if is_http(href) {
        return get_bytes(href, Some(range));
    }
    let url = parse_location(href)?;
    let state = GlobalState::instance()?;
    debug!("reading {url} bytes {}..{}", range.start, range.end);
    Ok(state.block_on(read_range(&url, storage_options.iter().cloned(), range))?)
}

pub(crate) fn list(href: &str, storage_options: &StorageOptions) -> ContainerResult<Vec<Url>> {
    let url = parse_location(href)?;
    let state = GlobalState::instance()?;
    Ok(state.block_on(list_children(&url, storage_options.iter().cloned()))?)
}
