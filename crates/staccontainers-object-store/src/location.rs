use std::path::PathBuf;

use url::Url;

use crate::error::{StoreError, StoreResult};

/// Normalizes an asset href into a URL.
///
/// Anything without a `scheme://` prefix is treated as a local filesystem path
/// and made absolute against the current directory.
pub fn parse_location(href: &str) -> StoreResult<Url> {
    if href.contains("://") || href.starts_with("file:") {
        return Url::parse(href).map_err(|e| StoreError::invalid(format!("{href}: {e}")));
    }
    let path = std::path::absolute(href)?;
    Url::from_file_path(&path)
        .map_err(|()| StoreError::invalid(format!("not an absolute path: {}", path.display())))
}

/// Returns the filesystem path for a `file://` URL.
pub fn local_path(url: &Url) -> Option<PathBuf> {
    if url.scheme() == "file" {
        url.to_file_path().ok()
    } else {
        None
    }
}

/// Returns the URL under which the store serving `url` is registered,
/// i.e. the scheme and authority with an empty path.
pub fn store_root(url: &Url) -> StoreResult<Url> {
    let root = format!("{}://{}/", url.scheme(), url.authority());
    Url::parse(&root).map_err(|e| StoreError::invalid(format!("{root}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_location() {
        let url = parse_location("s3://bucket/path/to/data.parquet").unwrap();
        assert_eq!(url.scheme(), "s3");
        assert_eq!(url.host_str(), Some("bucket"));
        assert!(local_path(&url).is_none());

        let url = parse_location("https://example.com/a.tif").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a.tif");
    }

    #[test]
    fn test_parse_local_location() {
        let url = parse_location("/tmp/data/a.tif").unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(local_path(&url), Some(PathBuf::from("/tmp/data/a.tif")));

        let url = parse_location("relative/a.tif").unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/relative/a.tif"));
    }

    #[test]
    fn test_store_root() {
        let url = parse_location("https://user@example.com:8080/a/b.json?x=1").unwrap();
        assert_eq!(
            store_root(&url).unwrap().as_str(),
            "https://user@example.com:8080/"
        );
        let url = parse_location("/tmp/a.tif").unwrap();
        assert_eq!(store_root(&url).unwrap().as_str(), "file:///");
    }
}
