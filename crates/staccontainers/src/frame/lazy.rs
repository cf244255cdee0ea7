//! Lazy geospatial dataframes on DataFusion.

use std::sync::Arc;

use arrow::compute::concat_batches;
use datafusion::dataframe::DataFrame;
use datafusion::prelude::{ParquetReadOptions, SessionContext};
use log::debug;
use staccontainers_object_store::{get_object_store, parse_location, store_root};
use url::Url;

use crate::error::ContainerResult;
use crate::frame::parquet::{geo_column, ParquetOptions, GEO_METADATA_KEY};
use crate::frame::GeoDataFrame;
use crate::globals::GlobalState;
use crate::io::StorageOptions;

/// A DataFusion plan whose result is a [`GeoDataFrame`].
#[derive(Debug, Clone)]
pub struct LazyGeoDataFrame {
    pub frame: DataFrame,
    pub geometry: String,
    pub crs: Option<String>,
}

impl LazyGeoDataFrame {
    /// Wraps an eager frame so it can be combined with other lazy plans.
    pub fn from_frame(frame: GeoDataFrame) -> ContainerResult<Self> {
        let ctx = SessionContext::new();
        Ok(Self {
            frame: ctx.read_batch(frame.batch)?,
            geometry: frame.geometry,
            crs: frame.crs,
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Executes the plan on the shared runtime.
    pub fn collect(&self) -> ContainerResult<GeoDataFrame> {
        let state = GlobalState::instance()?;
        let schema = Arc::new(self.frame.schema().as_arrow().clone());
        let batches = state.block_on(self.frame.clone().collect())?;
        let batch = concat_batches(&schema, &batches)?;
        GeoDataFrame::try_new(batch, self.geometry.clone(), self.crs.clone())
    }
}

pub(crate) fn read_parquet_lazy(
    href: &str,
    storage_options: &StorageOptions,
    options: &ParquetOptions,
) -> ContainerResult<LazyGeoDataFrame> {
    let url = parse_location(href)?;
    let ctx = SessionContext::new();
    register_store(&ctx, &url, storage_options)?;
    let state = GlobalState::instance()?;
    // Any extension is accepted since hrefs need not end in `.parquet`.
    let read_options = ParquetReadOptions {
        file_extension: "",
        skip_metadata: Some(false),
        ..Default::default()
    };
    let frame = state.block_on(ctx.read_parquet(url.as_str(), read_options))?;
    let geo = geo_column(
        frame
            .schema()
            .as_arrow()
            .metadata()
            .get(GEO_METADATA_KEY)
            .map(String::as_str),
    )?;
    let frame = match &options.columns {
        Some(columns) => {
            let mut names = columns.iter().map(String::as_str).collect::<Vec<_>>();
            if !names.contains(&geo.name.as_str()) {
                names.push(&geo.name);
            }
            frame.select_columns(&names)?
        }
        None => frame,
    };
    debug!("planned lazy read of {url} with geometry column {}", geo.name);
    Ok(LazyGeoDataFrame {
        frame,
        geometry: geo.name,
        crs: geo.crs,
    })
}

/// Local files are served by the default store; other schemes get one built
/// from the storage options.
fn register_store(
    ctx: &SessionContext,
    url: &Url,
    storage_options: &StorageOptions,
) -> ContainerResult<()> {
    if url.scheme() == "file" {
        return Ok(());
    }
    let (store, _) = get_object_store(url, storage_options.iter().cloned())?;
    ctx.register_object_store(&store_root(url)?, store);
    Ok(())
}
