use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use log::debug;
use object_store::path::Path;
use object_store::ObjectStore;
use url::Url;

use crate::error::{StoreError, StoreResult};
use crate::location::store_root;

const ALLOW_HTTP_KEY: &str = "allow_http";

/// Builds the object store serving `url`, configured with the given storage options.
///
/// Option keys are the `object_store` configuration keys for the scheme
/// (for example `aws_region` or `azure_storage_account_name`).
/// Keys that the store does not recognize are ignored.
pub fn get_object_store<I, K, V>(url: &Url, options: I) -> StoreResult<(Arc<dyn ObjectStore>, Path)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut options: Vec<(String, String)> = options
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.into()))
        .collect();
    if url.scheme() == "http" && !options.iter().any(|(k, _)| k == ALLOW_HTTP_KEY) {
        options.push((ALLOW_HTTP_KEY.to_string(), "true".to_string()));
    }
    debug!(
        "building object store for {} with {} option(s)",
        url.scheme(),
        options.len()
    );
    let (store, path) = object_store::parse_url_opts(url, options)?;
    Ok((Arc::from(store), path))
}

pub async fn read_bytes<I, K, V>(url: &Url, options: I) -> StoreResult<Bytes>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let (store, path) = get_object_store(url, options)?;
    Ok(store.get(&path).await?.bytes().await?)
}

pub async fn read_range<I, K, V>(url: &Url, options: I, range: Range<usize>) -> StoreResult<Bytes>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let (store, path) = get_object_store(url, options)?;
    Ok(store.get_range(&path, range).await?)
}

/// Lists the objects below `url`, returned as absolute URLs in lexicographic order.
pub async fn list_children<I, K, V>(url: &Url, options: I) -> StoreResult<Vec<Url>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let (store, path) = get_object_store(url, options)?;
    let root = store_root(url)?;
    let mut locations = store
        .list(Some(&path))
        .map_ok(|meta| meta.location)
        .try_collect::<Vec<_>>()
        .await?;
    locations.sort();
    locations
        .iter()
        .map(|location| {
            root.join(location.as_ref())
                .map_err(|e| StoreError::invalid(format!("{location}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::location::parse_location;

    fn no_options() -> HashMap<String, String> {
        HashMap::new()
    }

    #[tokio::test]
    async fn test_read_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        std::fs::write(&file, b"0123456789").unwrap();
        let url = parse_location(file.to_str().unwrap()).unwrap();

        let bytes = read_bytes(&url, no_options()).await.unwrap();
        assert_eq!(bytes.as_ref(), b"0123456789");

        let bytes = read_range(&url, no_options(), 2..5).await.unwrap();
        assert_eq!(bytes.as_ref(), b"234");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = parse_location(dir.path().join("missing.bin").to_str().unwrap()).unwrap();
        let result = read_bytes(&url, no_options()).await;
        assert!(matches!(result, Err(StoreError::ObjectStore(_))));
    }

    #[tokio::test]
    async fn test_list_children() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.dbf"), b"x").unwrap();
        std::fs::write(dir.path().join("b.shp"), b"x").unwrap();
        let url = parse_location(dir.path().to_str().unwrap()).unwrap();

        let children = list_children(&url, no_options()).await.unwrap();
        let names = children
            .iter()
            .filter_map(|u| u.path_segments().and_then(|mut s| s.next_back()))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["b.dbf", "b.shp"]);
    }

    #[test]
    fn test_http_store_allows_plain_http() {
        let url = Url::parse("http://127.0.0.1:9/a/b.json").unwrap();
        let (_, path) = get_object_store(&url, no_options()).unwrap();
        assert_eq!(path.as_ref(), "a/b.json");
    }
}
