use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::config::STAC_CONTAINERS_ENV_VAR_PREFIX;
use crate::error::{CommonError, CommonResult};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub runtime: RuntimeConfig,
    pub http: HttpConfig,
    pub signing: SigningConfig,
    pub frame: FrameConfig,
}

impl AppConfig {
    pub fn load() -> CommonResult<Self> {
        Self::figment()
            .admerge(
                Env::prefixed(STAC_CONTAINERS_ENV_VAR_PREFIX)
                    .map(|p| p.as_str().replace("__", ".").into()),
            )
            .extract()
            .map_err(CommonError::from)
    }

    /// Loads the embedded defaults only, ignoring the environment.
    pub fn load_defaults() -> CommonResult<Self> {
        Self::figment()
            .extract()
            .map_err(CommonError::from)
    }

    fn figment() -> Figment {
        Figment::from(Toml::string(DEFAULT_CONFIG))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub stack_size: usize,
    pub worker_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    pub token_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    pub default_crs: String,
}
