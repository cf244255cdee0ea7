use std::io::Write;
use std::sync::Mutex;

use log::debug;

use crate::error::{CommonError, CommonResult};

enum LoggingStatus {
    Uninitialized,
    Initialized,
    Failed,
}

static LOGGING_STATUS: Mutex<LoggingStatus> = Mutex::new(LoggingStatus::Uninitialized);

/// Installs the `env_logger` backend for the `log` facade.
///
/// The filter is read from `RUST_LOG` and defaults to `info`.
/// Conversions never call this; applications opt in once at startup.
/// Calling it again after a successful initialization is a no-op.
pub fn init_logging() -> CommonResult<()> {
    let mut status = LOGGING_STATUS
        .lock()
        .map_err(|e| CommonError::internal(e.to_string()))?;

    match *status {
        LoggingStatus::Uninitialized => {
            let logger =
                env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                    .format(move |buf, record| {
                        let level = record.level();
                        let target = record.target();
                        let style = buf.default_level_style(level);
                        let timestamp = buf.timestamp();
                        let args = record.args();
                        writeln!(buf, "[{timestamp} {style}{level}{style:#} {target}] {args}")
                    })
                    .build();
            let max_level = logger.filter();
            match log::set_boxed_logger(Box::new(logger)) {
                Ok(()) => {
                    log::set_max_level(max_level);
                    *status = LoggingStatus::Initialized;
                    debug!("logging initialized");
                    Ok(())
                }
                Err(e) => {
                    *status = LoggingStatus::Failed;
                    Err(CommonError::internal(e.to_string()))
                }
            }
        }
        LoggingStatus::Initialized => Ok(()),
        LoggingStatus::Failed => Err(CommonError::internal(
            "logging failed to initialize previously",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging().unwrap();
        init_logging().unwrap();
    }
}
