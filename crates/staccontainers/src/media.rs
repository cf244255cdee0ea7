//! Choosing a reader strategy from an asset's media type and roles.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::ContainerError;

pub const JSON: &str = "application/json";
pub const TIFF: &str = "image/tiff";
pub const ZARR: [&str; 3] = [
    "application/vnd+zarr",
    "application/vnd.zarr",
    "application/x-zarr",
];
pub const PARQUET: [&str; 2] = ["application/x-parquet", "application/vnd.apache.parquet"];
pub const VECTOR: [&str; 6] = [
    "application/geo+json",
    "application/x-shapefile",
    "x-gis/x-shapefile",
    "application/geopackage+sqlite3",
    "application/vnd.flatgeobuf",
    "application/x-flatgeobuf",
];

const INDEX_ROLE: &str = "index";

/// How an asset is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderStrategy {
    RasterOpen,
    ZarrOpen,
    SignedReferenceIndexOpen,
    TabularParquetOpen,
    TabularGenericOpen,
    GenericArrayOpen,
}

impl ReaderStrategy {
    /// Projects the strategy onto the readers of the dataframe containers.
    pub fn for_table(self) -> TableReader {
        match self {
            ReaderStrategy::TabularParquetOpen => TableReader::Parquet,
            _ => TableReader::Generic,
        }
    }

    /// Projects the strategy onto the readers of the array container.
    pub fn for_array(self) -> ReaderStrategy {
        match self {
            ReaderStrategy::TabularParquetOpen | ReaderStrategy::TabularGenericOpen => {
                ReaderStrategy::GenericArrayOpen
            }
            other => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReaderStrategy::RasterOpen => "raster",
            ReaderStrategy::ZarrOpen => "zarr",
            ReaderStrategy::SignedReferenceIndexOpen => "reference",
            ReaderStrategy::TabularParquetOpen => "parquet",
            ReaderStrategy::TabularGenericOpen => "table",
            ReaderStrategy::GenericArrayOpen => "generic",
        }
    }
}

impl fmt::Display for ReaderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ReaderStrategy {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raster" => Ok(ReaderStrategy::RasterOpen),
            "zarr" => Ok(ReaderStrategy::ZarrOpen),
            "reference" => Ok(ReaderStrategy::SignedReferenceIndexOpen),
            "parquet" => Ok(ReaderStrategy::TabularParquetOpen),
            "table" => Ok(ReaderStrategy::TabularGenericOpen),
            "generic" => Ok(ReaderStrategy::GenericArrayOpen),
            other => Err(ContainerError::invalid(format!(
                "unknown reader strategy: {other}"
            ))),
        }
    }
}

/// The readers available to the dataframe containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableReader {
    Parquet,
    Generic,
}

impl FromStr for TableReader {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(TableReader::Parquet),
            "generic" | "table" => Ok(TableReader::Generic),
            other => Err(ContainerError::invalid(format!("unknown table reader: {other}"))),
        }
    }
}

/// Returns the lowercase media type without parameters.
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Classifies an asset. The first matching rule wins and unknown media types
/// fall back to the generic array reader.
pub fn classify(
    media_type: Option<&str>,
    roles: &[String],
    _extra_fields: &Map<String, Value>,
) -> ReaderStrategy {
    let Some(media_type) = media_type else {
        return ReaderStrategy::GenericArrayOpen;
    };
    let essence = essence(media_type);
    let essence = essence.as_str();
    if essence == JSON && roles.iter().any(|r| r == INDEX_ROLE) {
        ReaderStrategy::SignedReferenceIndexOpen
    } else if essence == TIFF {
        ReaderStrategy::RasterOpen
    } else if ZARR.contains(&essence) {
        ReaderStrategy::ZarrOpen
    } else if PARQUET.contains(&essence) {
        ReaderStrategy::TabularParquetOpen
    } else if VECTOR.contains(&essence) {
        ReaderStrategy::TabularGenericOpen
    } else {
        ReaderStrategy::GenericArrayOpen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn check(media_type: Option<&str>, r: &[&str]) -> ReaderStrategy {
        classify(media_type, &roles(r), &Map::new())
    }

    #[test]
    fn test_classify_rules() {
        assert_eq!(
            check(Some("application/json"), &["index"]),
            ReaderStrategy::SignedReferenceIndexOpen
        );
        assert_eq!(
            check(Some("application/json; charset=utf-8"), &["data", "index"]),
            ReaderStrategy::SignedReferenceIndexOpen
        );
        assert_eq!(
            check(
                Some("image/tiff; application=geotiff; profile=cloud-optimized"),
                &["data"]
            ),
            ReaderStrategy::RasterOpen
        );
        assert_eq!(check(Some("image/tiff"), &[]), ReaderStrategy::RasterOpen);
        assert_eq!(
            check(Some("application/vnd+zarr"), &[]),
            ReaderStrategy::ZarrOpen
        );
        assert_eq!(
            check(Some("application/x-zarr"), &[]),
            ReaderStrategy::ZarrOpen
        );
        assert_eq!(
            check(Some("application/x-parquet"), &["data"]),
            ReaderStrategy::TabularParquetOpen
        );
        assert_eq!(
            check(Some("application/vnd.apache.parquet"), &[]),
            ReaderStrategy::TabularParquetOpen
        );
        assert_eq!(
            check(Some("application/geo+json"), &[]),
            ReaderStrategy::TabularGenericOpen
        );
    }

    #[test]
    fn test_classify_fallback() {
        assert_eq!(check(None, &[]), ReaderStrategy::GenericArrayOpen);
        assert_eq!(check(None, &["index"]), ReaderStrategy::GenericArrayOpen);
        assert_eq!(
            check(Some("application/json"), &["metadata"]),
            ReaderStrategy::GenericArrayOpen
        );
        assert_eq!(
            check(Some("application/x-netcdf"), &["data"]),
            ReaderStrategy::GenericArrayOpen
        );
        assert_eq!(check(Some(""), &[]), ReaderStrategy::GenericArrayOpen);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(
            check(Some("Application/JSON"), &["index"]),
            ReaderStrategy::SignedReferenceIndexOpen
        );
        assert_eq!(check(Some("IMAGE/TIFF"), &[]), ReaderStrategy::RasterOpen);
    }

    #[test]
    fn test_projections() {
        assert_eq!(
            ReaderStrategy::TabularParquetOpen.for_table(),
            TableReader::Parquet
        );
        assert_eq!(ReaderStrategy::RasterOpen.for_table(), TableReader::Generic);
        assert_eq!(
            ReaderStrategy::GenericArrayOpen.for_table(),
            TableReader::Generic
        );
        assert_eq!(
            ReaderStrategy::TabularParquetOpen.for_array(),
            ReaderStrategy::GenericArrayOpen
        );
        assert_eq!(
            ReaderStrategy::ZarrOpen.for_array(),
            ReaderStrategy::ZarrOpen
        );
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(
            "Zarr".parse::<ReaderStrategy>().unwrap(),
            ReaderStrategy::ZarrOpen
        );
        assert!("netcdf".parse::<ReaderStrategy>().is_err());
        assert_eq!("parquet".parse::<TableReader>().unwrap(), TableReader::Parquet);
    }
}
