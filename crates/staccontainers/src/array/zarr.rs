//! The `zarr` engine, backed by `zarrs`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use log::debug;
use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;
use serde_json::{Map, Value};
use staccontainers_object_store::{local_path, parse_location};
use tokio::runtime::Handle;
use zarrs::array::Array;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::Group;
use zarrs::node::{Node, NodeMetadata};
use zarrs::storage::storage_adapter::async_to_sync::{AsyncToSyncBlockOn, AsyncToSyncStorageAdapter};
use zarrs::storage::{
    AsyncReadableWritableListableStorage, ReadableWritableListableStorage,
    ReadableWritableListableStorageTraits,
};
use zarrs_object_store::object_store;
use zarrs_object_store::AsyncObjectStore;

use crate::dataset::{ArrayData, ArrayLoader, Dataset, LazyArray, Variable, VariableData};
use crate::error::{ContainerError, ContainerResult};
use crate::globals::GlobalState;
use crate::io::StorageOptions;
use crate::options::{load_options, storage_options, OpenOptions, ReaderOptions};

const ARRAY_DIMENSIONS: &str = "_ARRAY_DIMENSIONS";

type StorageArray = Array<dyn ReadableWritableListableStorageTraits>;

#[derive(Debug, Deserialize)]
pub(crate) struct ZarrOptions {
    #[serde(default)]
    pub group: Option<String>,
    /// Any value keeps data variables lazy, like a chunked open.
    #[serde(default)]
    pub chunks: Option<Value>,
    #[serde(default)]
    pub consolidated: Option<bool>,
    #[serde(default)]
    pub storage_options: Option<Value>,
}

impl ReaderOptions for ZarrOptions {
    const ALLOWED_KEYS: &'static [&'static str] =
        &["engine", "group", "chunks", "consolidated", "storage_options"];
}

/// Makes chunk data available in the store before an array is read.
pub(crate) trait ChunkSource: Send + Sync {
    fn prepare(&self, array_path: &str) -> ContainerResult<()>;
}

struct TokioBlockOn(Handle);

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.0.block_on(future)
    }
}

/// Opens the store holding `href` and returns it with the node path of `href` inside it.
fn open_store(
    href: &str,
    storage_options: &StorageOptions,
) -> ContainerResult<(ReadableWritableListableStorage, String)> {
    let url = parse_location(href)?;
    if let Some(path) = local_path(&url) {
        let store = FilesystemStore::new(&path).map_err(ContainerError::zarr)?;
        return Ok((Arc::new(store), "/".to_string()));
    }
    let mut options = storage_options.clone();
    if url.scheme() == "http" && !options.iter().any(|(k, _)| k == "allow_http") {
        options.push(("allow_http".to_string(), "true".to_string()));
    }
    let (store, prefix) =
        object_store::parse_url_opts(&url, options).map_err(ContainerError::zarr)?;
    let store: AsyncReadableWritableListableStorage = Arc::new(AsyncObjectStore::new(store));
    let handle = GlobalState::instance()?.runtime.handle().inner().clone();
    let store = AsyncToSyncStorageAdapter::new(store, TokioBlockOn(handle));
    let root = if prefix.as_ref().is_empty() {
        "/".to_string()
    } else {
        format!("/{}", prefix.as_ref())
    };
    Ok((Arc::new(store), root))
}

fn join_node_path(root: &str, group: Option<&str>) -> String {
    let root = root.trim_end_matches('/');
    match group.map(|g| g.trim_matches('/')).filter(|g| !g.is_empty()) {
        Some(group) => format!("{root}/{group}"),
        None if root.is_empty() => "/".to_string(),
        None => root.to_string(),
    }
}

fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

fn dimension_names(array: &StorageArray) -> ContainerResult<Vec<String>> {
    if let Some(Value::Array(names)) = array.attributes().get(ARRAY_DIMENSIONS) {
        let names = names
            .iter()
            .filter_map(|n| n.as_str().map(|s| s.to_string()))
            .collect::<Vec<_>>();
        if names.len() == array.shape().len() {
            return Ok(names);
        }
    }
    let metadata = serde_json::to_value(array.metadata())?;
    if let Some(Value::Array(names)) = metadata.get("dimension_names") {
        return Ok(names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                n.as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("dim_{i}"))
            })
            .collect());
    }
    Ok((0..array.shape().len())
        .map(|i| format!("dim_{i}"))
        .collect())
}

fn shape_of(array: &StorageArray) -> Vec<usize> {
    array.shape().iter().map(|&s| s as usize).collect()
}

fn shaped<T>(shape: &[usize], values: Vec<T>) -> ContainerResult<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| ContainerError::invalid_data(e.to_string()))
}

macro_rules! retrieve {
    ($array:expr, $subset:expr, $t:ty) => {
        $array
            .retrieve_array_subset_elements::<$t>($subset)
            .map_err(ContainerError::zarr)?
    };
}

fn read_array(array: &StorageArray) -> ContainerResult<ArrayData> {
    let shape = shape_of(array);
    let subset = array.subset_all();
    let data = match array.data_type().name().as_str() {
        "float64" => ArrayData::Float64(shaped(&shape, retrieve!(array, &subset, f64))?),
        "float32" => {
            let values = retrieve!(array, &subset, f32);
            ArrayData::Float64(shaped(&shape, values.into_iter().map(f64::from).collect())?)
        }
        "int64" => ArrayData::Int64(shaped(&shape, retrieve!(array, &subset, i64))?),
        "int32" => {
            let values = retrieve!(array, &subset, i32);
            ArrayData::Int64(shaped(&shape, values.into_iter().map(i64::from).collect())?)
        }
        "int16" => {
            let values = retrieve!(array, &subset, i16);
            ArrayData::Int64(shaped(&shape, values.into_iter().map(i64::from).collect())?)
        }
        "int8" => {
            let values = retrieve!(array, &subset, i8);
            ArrayData::Int64(shaped(&shape, values.into_iter().map(i64::from).collect())?)
        }
        "uint32" => {
            let values = retrieve!(array, &subset, u32);
            ArrayData::Int64(shaped(&shape, values.into_iter().map(i64::from).collect())?)
        }
        "uint16" => {
            let values = retrieve!(array, &subset, u16);
            ArrayData::Int64(shaped(&shape, values.into_iter().map(i64::from).collect())?)
        }
        "uint8" => {
            let values = retrieve!(array, &subset, u8);
            ArrayData::Int64(shaped(&shape, values.into_iter().map(i64::from).collect())?)
        }
        other => {
            return Err(ContainerError::invalid_data(format!(
                "unsupported zarr data type: {other}"
            )))
        }
    };
    Ok(data)
}

struct ZarrArrayLoader {
    storage: ReadableWritableListableStorage,
    path: String,
    source: Option<Arc<dyn ChunkSource>>,
}

impl fmt::Debug for ZarrArrayLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZarrArrayLoader")
            .field("path", &self.path)
            .finish()
    }
}

impl ArrayLoader for ZarrArrayLoader {
    fn load(&self) -> ContainerResult<ArrayData> {
        if let Some(source) = &self.source {
            source.prepare(&self.path)?;
        }
        let array = Array::open(self.storage.clone(), &self.path).map_err(ContainerError::zarr)?;
        read_array(&array)
    }
}

/// Reads the arrays directly under the group at `root`.
///
/// One-dimensional arrays named after their own dimension become coordinates
/// and are always loaded. Other arrays stay lazy when `lazy` is set.
pub(crate) fn read_group(
    storage: ReadableWritableListableStorage,
    root: &str,
    lazy: bool,
    source: Option<Arc<dyn ChunkSource>>,
) -> ContainerResult<Dataset> {
    let group = Group::open(storage.clone(), root).map_err(ContainerError::zarr)?;
    let node = Node::open(&storage, root).map_err(ContainerError::zarr)?;
    let mut paths = node
        .children()
        .iter()
        .filter(|child| matches!(child.metadata(), NodeMetadata::Array(_)))
        .map(|child| child.path().as_str().to_string())
        .collect::<Vec<_>>();
    paths.sort();

    let mut dataset = Dataset::new();
    dataset.attrs = group.attributes().clone();
    for path in paths {
        let array = Array::open(storage.clone(), &path).map_err(ContainerError::zarr)?;
        let name = leaf_name(&path).to_string();
        let dims = dimension_names(&array)?;
        let attrs = array
            .attributes()
            .iter()
            .filter(|(k, _)| k.as_str() != ARRAY_DIMENSIONS)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Map<_, _>>();
        let is_coord = dims.len() == 1 && dims[0] == name;
        let loader = ZarrArrayLoader {
            storage: storage.clone(),
            path: path.clone(),
            source: source.clone(),
        };
        let data = if lazy && !is_coord {
            let dtype = array.data_type().name();
            VariableData::Lazy(LazyArray::new(shape_of(&array), dtype, Arc::new(loader)))
        } else {
            VariableData::Loaded(loader.load()?)
        };
        let variable = Variable { dims, data, attrs };
        if is_coord {
            dataset.add_coord(name, variable)?;
        } else {
            dataset.add_data_var(name, variable)?;
        }
    }
    debug!(
        "read zarr group {root}: {} coordinate(s), {} data variable(s)",
        dataset.coords.len(),
        dataset.data_vars.len()
    );
    Ok(dataset)
}

pub(crate) fn open(href: &str, options: &OpenOptions) -> ContainerResult<Dataset> {
    let options: ZarrOptions = load_options("zarr", options)?;
    if options.consolidated == Some(true) {
        debug!("consolidated metadata is not required, reading {href} through the store");
    }
    let storage = storage_options(options.storage_options.as_ref())?;
    let (store, root) = open_store(href, &storage)?;
    let root = join_node_path(&root, options.group.as_deref());
    read_group(store, &root, options.chunks.is_some(), None)
}
