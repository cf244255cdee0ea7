use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::debug;
use staccontainers_common::config::AppConfig;
use staccontainers_common::runtime::RuntimeManager;

use crate::error::{ContainerError, ContainerResult};

static GLOBALS: OnceLock<GlobalState> = OnceLock::new();

/// Process-wide state created on first use and never torn down.
pub(crate) struct GlobalState {
    pub config: Arc<AppConfig>,
    pub runtime: RuntimeManager,
    pub http: reqwest::Client,
}

impl GlobalState {
    pub fn instance() -> ContainerResult<&'static GlobalState> {
        if let Some(state) = GLOBALS.get() {
            return Ok(state);
        }
        let state = Self::try_new()?;
        // Another thread may have won the race; its state is kept and ours is dropped.
        let _ = GLOBALS.set(state);
        GLOBALS
            .get()
            .ok_or_else(|| ContainerError::internal("global state not initialized"))
    }

    fn try_new() -> ContainerResult<Self> {
        let config = AppConfig::load()?;
        let runtime = RuntimeManager::try_new(&config.runtime)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .build()?;
        debug!(
            "initialized global state with {} runtime worker thread(s)",
            config.runtime.worker_threads
        );
        Ok(Self {
            config: Arc::new(config),
            runtime,
            http,
        })
    }

    /// Drives a future on the shared runtime from synchronous code.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
