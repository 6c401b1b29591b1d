use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord, Notice};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::{Builder, Handle, Runtime};

/// Builder for planner telemetry sinks.
pub struct PlannerTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
    min_level: LogLevel,
}

impl PlannerTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            event_publisher: None,
            min_level: LogLevel::Debug,
        }
    }

    /// Sets the log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Drops log records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<PlannerTelemetry> {
        PlannerTelemetry::new(
            self.module,
            self.log_path,
            self.event_publisher,
            self.min_level,
        )
    }
}

/// Telemetry handle for the planner runtime.
#[derive(Clone)]
pub struct PlannerTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for PlannerTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannerTelemetry")
            .field("module", &self.inner.module)
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    event: Option<EventHandle>,
}

struct EventHandle {
    publisher: Arc<dyn EventPublisher>,
    // Built on first use outside tokio; never created inside a runtime.
    runtime: Mutex<Option<Runtime>>,
}

impl EventHandle {
    fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher,
            runtime: Mutex::new(None),
        }
    }

    /// Publishes before returning, so the record is on the bus when the
    /// calling operation completes.
    fn publish(&self, record: EventRecord) -> Result<()> {
        if Handle::try_current().is_ok() {
            return futures::executor::block_on(self.publisher.publish(record));
        }
        let mut slot = self.runtime.lock();
        let runtime = match slot.take() {
            Some(runtime) => runtime,
            None => Builder::new_current_thread().enable_all().build()?,
        };
        let result = runtime.block_on(self.publisher.publish(record));
        *slot = Some(runtime);
        result
    }
}

impl Drop for EventHandle {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl PlannerTelemetry {
    fn new(
        module: impl Into<String>,
        log_path: Option<PathBuf>,
        event_publisher: Option<Arc<dyn EventPublisher>>,
        min_level: LogLevel,
    ) -> Result<Self> {
        let logger = if let Some(path) = log_path {
            Some(JsonLogger::with_min_level(path, min_level)?)
        } else {
            None
        };
        let event = if let Some(publisher) = event_publisher {
            Some(EventHandle::new(publisher))
        } else {
            None
        };
        Ok(Self {
            inner: Arc::new(TelemetryInner {
                module: module.into(),
                logger,
                event,
            }),
        })
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> PlannerTelemetryBuilder {
        PlannerTelemetryBuilder::new(module)
    }

    /// Logs structured metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: &Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            if logger.enabled(level) {
                let record =
                    LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
                logger.log(&record)?;
            }
        }
        Ok(())
    }

    /// Emits an event on the bus.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(handle) = &self.inner.event {
            handle.publish(EventRecord::new(&self.inner.module, event_type, payload))?;
        }
        Ok(())
    }

    /// Emits a user notice on the bus.
    pub fn notify(&self, notice: &Notice) -> Result<()> {
        if let Some(handle) = &self.inner.event {
            handle.publish(EventRecord::notice(&self.inner.module, notice))?;
        }
        Ok(())
    }
}
