//! Virtual Zarr stores described by kerchunk reference indexes.

use std::ops::Range;
use std::sync::{Arc, Mutex};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::Bytes;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::{Map, Value};
use zarrs::storage::store::MemoryStore;
use zarrs::storage::{ReadableWritableListableStorage, StoreKey, WritableStorageTraits};

use crate::array::zarr::{read_group, ChunkSource, ZarrOptions};
use crate::dataset::Dataset;
use crate::error::{ContainerError, ContainerResult};
use crate::http::{get_json, is_http};
use crate::io::{fetch_bytes, fetch_range, StorageOptions};
use crate::options::{load_options, storage_options, OpenOptions};
use crate::signing::Signer;

const BASE64_PREFIX: &str = "base64:";
const METADATA_KEYS: [&str; 5] = [".zgroup", ".zarray", ".zattrs", ".zmetadata", "zarr.json"];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reference {
    Inline(Bytes),
    Remote {
        url: String,
        range: Option<Range<usize>>,
    },
}

/// A mapping from store keys to inline data or byte ranges of remote files.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ReferenceSet {
    pub refs: IndexMap<String, Reference>,
}

impl ReferenceSet {
    /// Parses the version 0 (flat) or version 1 (`refs` and `templates`) layout.
    pub fn parse(value: &Value) -> ContainerResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ContainerError::invalid_data("reference index must be an object"))?;
        let empty = Map::new();
        let (refs, templates) = match object.get("version") {
            None => (object, &empty),
            Some(version) if version.as_u64() == Some(1) => {
                if object.contains_key("gen") {
                    warn!("generated references are not supported and are skipped");
                }
                let refs = object
                    .get("refs")
                    .and_then(|r| r.as_object())
                    .ok_or_else(|| ContainerError::invalid_data("reference index has no `refs`"))?;
                let templates = object
                    .get("templates")
                    .and_then(|t| t.as_object())
                    .unwrap_or(&empty);
                (refs, templates)
            }
            Some(other) => {
                return Err(ContainerError::invalid_data(format!(
                    "unsupported reference index version: {other}"
                )))
            }
        };

        let mut set = ReferenceSet::default();
        for (key, value) in refs {
            let reference = match value {
                Value::String(s) => match s.strip_prefix(BASE64_PREFIX) {
                    Some(encoded) => {
                        let decoded = BASE64_STANDARD.decode(encoded).map_err(|e| {
                            ContainerError::invalid_data(format!("reference {key}: {e}"))
                        })?;
                        Reference::Inline(Bytes::from(decoded))
                    }
                    None => Reference::Inline(Bytes::from(s.clone())),
                },
                Value::Object(_) => Reference::Inline(Bytes::from(serde_json::to_vec(value)?)),
                Value::Array(parts) => parse_remote(key, parts, templates)?,
                other => {
                    return Err(ContainerError::invalid_data(format!(
                        "reference {key}: unexpected value {other}"
                    )))
                }
            };
            set.refs.insert(key.clone(), reference);
        }
        Ok(set)
    }

    /// Replaces every remote URL with its signed form.
    pub fn sign(&mut self, signer: &dyn Signer) -> ContainerResult<()> {
        for reference in self.refs.values_mut() {
            if let Reference::Remote { url, .. } = reference {
                *url = signer.sign_url(url)?;
            }
        }
        Ok(())
    }
}

fn parse_remote(key: &str, parts: &[Value], templates: &Map<String, Value>) -> ContainerResult<Reference> {
    let invalid = || ContainerError::invalid_data(format!("reference {key}: invalid remote reference"));
    let url = parts
        .first()
        .and_then(|u| u.as_str())
        .map(|u| render_template(u, templates))
        .ok_or_else(invalid)?;
    let range = match parts {
        [_] => None,
        [_, offset, length] => {
            let offset = offset
                .as_u64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(invalid)?;
            let length = length
                .as_u64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(invalid)?;
            let end = offset.checked_add(length).ok_or_else(invalid)?;
            Some(offset..end)
        }
        _ => return Err(invalid()),
    };
    Ok(Reference::Remote { url, range })
}

fn render_template(url: &str, templates: &Map<String, Value>) -> String {
    let mut url = url.to_string();
    for (name, value) in templates {
        if let Some(value) = value.as_str() {
            url = url
                .replace(&format!("{{{{{name}}}}}"), value)
                .replace(&format!("{{{{ {name} }}}}"), value);
        }
    }
    url
}

fn is_metadata_key(key: &str) -> bool {
    let leaf = key.rsplit('/').next().unwrap_or(key);
    METADATA_KEYS.contains(&leaf)
}

fn resolve(reference: &Reference, storage_options: &StorageOptions) -> ContainerResult<Bytes> {
    match reference {
        Reference::Inline(bytes) => Ok(bytes.clone()),
        Reference::Remote { url, range: None } => fetch_bytes(url, storage_options),
        Reference::Remote {
            url,
            range: Some(range),
        } => fetch_range(url, storage_options, range.clone()),
    }
}

fn store_key(key: &str) -> ContainerResult<StoreKey> {
    StoreKey::new(key.trim_start_matches('/')).map_err(ContainerError::zarr)
}

/// Remote chunks that are fetched into the memory store when their array is read.
struct PendingChunks {
    store: Arc<MemoryStore>,
    pending: Mutex<Vec<(String, Reference)>>,
    storage_options: StorageOptions,
}

impl ChunkSource for PendingChunks {
    fn prepare(&self, array_path: &str) -> ContainerResult<()> {
        let prefix = format!("{}/", array_path.trim_matches('/'));
        let ready = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|e| ContainerError::internal(e.to_string()))?;
            let (ready, rest) = pending
                .drain(..)
                .partition::<Vec<_>, _>(|(key, _)| key.starts_with(&prefix) || prefix == "/");
            *pending = rest;
            ready
        };
        debug!("fetching {} chunk(s) for {array_path}", ready.len());
        for (key, reference) in ready {
            let bytes = resolve(&reference, &self.storage_options)?;
            self.store
                .set(&store_key(&key)?, bytes)
                .map_err(ContainerError::zarr)?;
        }
        Ok(())
    }
}

/// Fetches a reference index. HTTP failures surface as upstream request errors.
pub(crate) fn fetch_index(href: &str, storage_options: &StorageOptions) -> ContainerResult<Value> {
    if is_http(href) {
        get_json(href)
    } else {
        Ok(serde_json::from_slice(&fetch_bytes(href, storage_options)?)?)
    }
}

/// Opens a signed reference set as a Zarr dataset.
pub(crate) fn open_references(references: ReferenceSet, options: &OpenOptions) -> ContainerResult<Dataset> {
    let options: ZarrOptions = load_options("zarr", options)?;
    let storage_options = storage_options(options.storage_options.as_ref())?;
    let store = Arc::new(MemoryStore::new());
    let mut pending = Vec::new();
    let mut has_root = false;
    for (key, reference) in references.refs {
        has_root |= key == ".zgroup" || key == "zarr.json";
        if matches!(reference, Reference::Inline(_)) || is_metadata_key(&key) {
            let bytes = resolve(&reference, &storage_options)?;
            store
                .set(&store_key(&key)?, bytes)
                .map_err(ContainerError::zarr)?;
        } else {
            pending.push((key, reference));
        }
    }
    if !has_root {
        store
            .set(&store_key(".zgroup")?, Bytes::from_static(br#"{"zarr_format":2}"#))
            .map_err(ContainerError::zarr)?;
    }
    let root = match options.group.as_deref().map(|g| g.trim_matches('/')) {
        Some(group) if !group.is_empty() => format!("/{group}"),
        _ => "/".to_string(),
    };
    let source = Arc::new(PendingChunks {
        store: store.clone(),
        pending: Mutex::new(pending),
        storage_options,
    });
    let storage: ReadableWritableListableStorage = store;
    read_group(storage, &root, options.chunks.is_some(), Some(source))
}
