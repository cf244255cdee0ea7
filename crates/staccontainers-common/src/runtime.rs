use std::future::Future;

use tokio::runtime::{Handle, Runtime};

use crate::config::RuntimeConfig;
use crate::error::{CommonError, CommonResult};

/// Owns the tokio runtime that drives the async crates behind the blocking API.
#[derive(Debug)]
pub struct RuntimeManager {
    runtime: Runtime,
}

impl RuntimeManager {
    pub fn try_new(config: &RuntimeConfig) -> CommonResult<Self> {
        if config.worker_threads == 0 {
            return Err(CommonError::invalid("runtime worker threads must be positive"));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_stack_size(config.stack_size)
            .thread_name("staccontainers")
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: self.runtime.handle().clone(),
        }
    }

    /// Runs a future to completion on the runtime, blocking the current thread.
    ///
    /// This must not be called from within an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    inner: Handle,
}

impl RuntimeHandle {
    pub fn inner(&self) -> &Handle {
        &self.inner
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.inner.block_on(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on() {
        let config = RuntimeConfig {
            stack_size: 2 * 1024 * 1024,
            worker_threads: 1,
        };
        let manager = RuntimeManager::try_new(&config).unwrap();
        assert_eq!(manager.block_on(async { 1 + 1 }), 2);
        let handle = manager.handle();
        let value = handle.block_on(async { tokio::task::spawn(async { 40 + 2 }).await });
        assert_eq!(value.unwrap(), 42);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = RuntimeConfig {
            stack_size: 2 * 1024 * 1024,
            worker_threads: 0,
        };
        assert!(matches!(
            RuntimeManager::try_new(&config),
            Err(CommonError::InvalidArgument(_))
        ));
    }
}
