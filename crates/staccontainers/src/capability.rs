use std::fmt;
use std::sync::Arc;

use log::debug;
use staccontainers_common::config::AppConfig;

use crate::error::{ContainerError, ContainerResult};
use crate::signing::Signer;

/// An optional capability backed by a Cargo feature of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    RasterStacking,
    DataFrame,
    DistributedDataFrame,
    MultidimensionalArray,
    CatalogSigning,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::RasterStacking,
        Capability::DataFrame,
        Capability::DistributedDataFrame,
        Capability::MultidimensionalArray,
        Capability::CatalogSigning,
    ];

    /// The Cargo feature that enables this capability.
    pub fn feature(&self) -> &'static str {
        match self {
            Capability::RasterStacking => "stack",
            Capability::DataFrame => "dataframe",
            Capability::DistributedDataFrame => "lazy-dataframe",
            Capability::MultidimensionalArray => "array",
            Capability::CatalogSigning => "signing",
        }
    }

    /// The crate that does the actual work once the capability is enabled.
    pub fn provider(&self) -> &'static str {
        match self {
            Capability::RasterStacking => "tiff",
            Capability::DataFrame => "arrow",
            Capability::DistributedDataFrame => "datafusion",
            Capability::MultidimensionalArray => "zarrs",
            Capability::CatalogSigning => "reqwest",
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Capability::RasterStacking => cfg!(feature = "stack"),
            Capability::DataFrame => cfg!(feature = "dataframe"),
            Capability::DistributedDataFrame => cfg!(feature = "lazy-dataframe"),
            Capability::MultidimensionalArray => cfg!(feature = "array"),
            Capability::CatalogSigning => cfg!(feature = "signing"),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::RasterStacking => "raster stacking",
            Capability::DataFrame => "dataframe",
            Capability::DistributedDataFrame => "distributed dataframe",
            Capability::MultidimensionalArray => "multidimensional array",
            Capability::CatalogSigning => "catalog signing",
        };
        write!(f, "{name}")
    }
}

/// Proof that a capability is compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityHandle {
    pub capability: Capability,
    pub provider: &'static str,
}

pub fn resolve(capability: Capability) -> ContainerResult<CapabilityHandle> {
    if capability.is_available() {
        debug!("resolved {capability} via {}", capability.provider());
        Ok(CapabilityHandle {
            capability,
            provider: capability.provider(),
        })
    } else {
        Err(ContainerError::MissingOptionalDependency { capability })
    }
}

#[cfg(feature = "stack")]
pub fn raster_stacking() -> ContainerResult<&'static dyn crate::array::RasterStacking> {
    resolve(Capability::RasterStacking)?;
    Ok(&crate::array::stack::TiffStacker)
}

#[cfg(all(feature = "array", not(feature = "stack")))]
pub fn raster_stacking() -> ContainerResult<&'static dyn crate::array::RasterStacking> {
    Err(ContainerError::MissingOptionalDependency {
        capability: Capability::RasterStacking,
    })
}

/// Returns a fresh signer for catalog asset URLs.
#[cfg(feature = "signing")]
pub fn catalog_signer(config: &AppConfig) -> ContainerResult<Arc<dyn Signer>> {
    resolve(Capability::CatalogSigning)?;
    Ok(Arc::new(crate::signing::PlanetaryComputerSigner::new(
        &config.signing,
    )))
}

#[cfg(not(feature = "signing"))]
pub fn catalog_signer(_config: &AppConfig) -> ContainerResult<Arc<dyn Signer>> {
    Err(ContainerError::MissingOptionalDependency {
        capability: Capability::CatalogSigning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_matches_features() {
        for capability in Capability::ALL {
            let result = resolve(capability);
            if capability.is_available() {
                let handle = result.unwrap();
                assert_eq!(handle.capability, capability);
                assert_eq!(handle.provider, capability.provider());
            } else {
                assert!(matches!(
                    result,
                    Err(ContainerError::MissingOptionalDependency { capability: c }) if c == capability
                ));
            }
        }
    }

    #[cfg(feature = "signing")]
    #[test]
    fn test_catalog_signer_available() {
        let config = AppConfig::load_defaults().unwrap();
        assert!(catalog_signer(&config).is_ok());
    }

    #[cfg(not(feature = "signing"))]
    #[test]
    fn test_catalog_signer_missing() {
        let config = AppConfig::load_defaults().unwrap();
        let error = catalog_signer(&config).err().unwrap();
        assert!(error.to_string().contains("`signing` feature"));
    }
}
