//! Logging initialization
//!
//! Configurable `tracing` output with optional file rotation.
//!
//! | Output Target | Guard Required | Why |
//! |---------------|----------------|-----|
//! | `Stderr` | No | Direct writes, no buffering |
//! | `FileOnly` | **Yes** | Non-blocking I/O buffers logs |
//! | `Both` | **Yes** | File component needs flushing |
//! | `None` | No | No logging |
//!
//! If the guard is dropped early, pending file logs may be lost.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogOutput, LogRotation, LoggingConfig};

/// Guard that flushes file logs on drop; hold it for the life of the process
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    _stderr_guard: Option<WorkerGuard>,
}

impl LoggingConfig {
    /// Install the global subscriber
    ///
    /// `RUST_LOG` takes precedence over `level`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File logging is configured without a directory, or it cannot be created
    /// - A global subscriber is already set
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.output {
            LogOutput::None => Ok(None),
            LogOutput::Stderr => {
                install(self.structured, filter, io::stderr)?;
                Ok(None)
            }
            LogOutput::FileOnly => {
                let appender = self.file_appender()?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                install(self.structured, filter, writer)?;
                Ok(Some(LoggingGuard {
                    _file_guard: guard,
                    _stderr_guard: None,
                }))
            }
            LogOutput::Both => {
                let appender = self.file_appender()?;
                let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
                let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(io::stderr());
                install(self.structured, filter, file_writer.and(stderr_writer))?;
                Ok(Some(LoggingGuard {
                    _file_guard: file_guard,
                    _stderr_guard: Some(stderr_guard),
                }))
            }
        }
    }

    fn file_appender(&self) -> io::Result<RollingFileAppender> {
        let dir = self.directory.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "File logging requires logging.directory",
            )
        })?;
        std::fs::create_dir_all(dir)?;
        Ok(rolling_appender(self.rotation, dir, &self.file_prefix))
    }
}

fn rolling_appender(rotation: LogRotation, dir: &Path, prefix: &str) -> RollingFileAppender {
    match rotation {
        LogRotation::Minute => tracing_appender::rolling::minutely(dir, prefix),
        LogRotation::Hourly => tracing_appender::rolling::hourly(dir, prefix),
        LogRotation::Daily => tracing_appender::rolling::daily(dir, prefix),
        LogRotation::Never => tracing_appender::rolling::never(dir, prefix),
    }
}

fn install<W>(structured: bool, filter: EnvFilter, writer: W) -> io::Result<()>
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::registry().with(filter);

    if structured {
        subscriber
            .with(fmt::layer().json().with_writer(writer))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(writer))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}
