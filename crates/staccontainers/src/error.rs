use staccontainers_common::error::CommonError;
use staccontainers_object_store::StoreError;
use thiserror::Error;

use crate::capability::Capability;
use crate::dispatch::ObjectKind;

pub type ContainerResult<T> = Result<T, ContainerError>;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("{capability} is not available: enable the `{}` feature of staccontainers", .capability.feature())]
    MissingOptionalDependency { capability: Capability },
    #[error("unsupported input type: {type_name}")]
    UnsupportedInputType { type_name: &'static str },
    #[error(transparent)]
    UpstreamRequestFailure(#[from] reqwest::Error),
    #[error("no engine can open {href}: pass an explicit `engine` option")]
    NoMatchingEngine { href: String },
    #[error("`{method}` is not installed on {}: call `patch()` first", .kind.type_name())]
    MethodNotInstalled { kind: ObjectKind, method: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "array")]
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
    #[cfg(feature = "array")]
    #[error(transparent)]
    Zarr(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "stack")]
    #[error(transparent)]
    Stack(#[from] crate::array::stack::StackError),
    #[cfg(feature = "dataframe")]
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
    #[cfg(feature = "dataframe")]
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[cfg(feature = "dataframe")]
    #[error(transparent)]
    Shapefile(#[from] shapefile::Error),
    #[cfg(feature = "dataframe")]
    #[error(transparent)]
    Dbase(#[from] shapefile::dbase::Error),
    #[cfg(feature = "dataframe")]
    #[error(transparent)]
    GeoJson(#[from] geojson::Error),
    #[cfg(feature = "dataframe")]
    #[error(transparent)]
    Geozero(#[from] geozero::error::GeozeroError),
    #[cfg(feature = "lazy-dataframe")]
    #[error(transparent)]
    DataFusion(#[from] datafusion::error::DataFusionError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// The coarse category of a [`ContainerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingOptionalDependency,
    UnsupportedInputType,
    UpstreamRequestFailure,
    UpstreamReadFailure,
    Usage,
    Internal,
}

impl ContainerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ContainerError::InvalidArgument(message.into())
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        ContainerError::InvalidData(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ContainerError::Internal(message.into())
    }

    #[cfg(feature = "array")]
    pub(crate) fn zarr<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ContainerError::Zarr(Box::new(error))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::MissingOptionalDependency { .. } => ErrorKind::MissingOptionalDependency,
            ContainerError::UnsupportedInputType { .. } => ErrorKind::UnsupportedInputType,
            ContainerError::UpstreamRequestFailure(_) => ErrorKind::UpstreamRequestFailure,
            ContainerError::NoMatchingEngine { .. }
            | ContainerError::MethodNotInstalled { .. }
            | ContainerError::InvalidArgument(_) => ErrorKind::Usage,
            ContainerError::Internal(_) => ErrorKind::Internal,
            _ => ErrorKind::UpstreamReadFailure,
        }
    }
}

impl From<CommonError> for ContainerError {
    fn from(error: CommonError) -> Self {
        match error {
            CommonError::InvalidConfig(message) | CommonError::InvalidArgument(message) => {
                ContainerError::InvalidArgument(message)
            }
            CommonError::Runtime(error) => ContainerError::Internal(error.to_string()),
            CommonError::InternalError(message) => ContainerError::Internal(message),
        }
    }
}
