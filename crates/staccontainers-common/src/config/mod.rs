mod application;

/// The prefix of environment variables that override the default configuration.
pub const STAC_CONTAINERS_ENV_VAR_PREFIX: &str = "STAC_CONTAINERS__";

pub use application::*;
