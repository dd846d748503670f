use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use factguard_logging::{JsonLogger, LogLevel, LogRecord, LogSink};
use serde_json::Value;

/// Builder configuring telemetry for the verification pipeline.
pub struct FactCheckTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FactCheckTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Info,
            sinks: Vec::new(),
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Adds an extra sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> Result<FactCheckTelemetry> {
        let mut sinks = self.sinks;
        if let Some(path) = self.log_path {
            sinks.push(Arc::new(JsonLogger::new(path)?));
        }
        Ok(FactCheckTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                min_level: self.min_level,
                sinks,
            }),
        })
    }
}

/// Telemetry handle for pipeline stages.
#[derive(Clone)]
pub struct FactCheckTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for FactCheckTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactCheckTelemetry")
            .field("module", &self.inner.module)
            .field("min_level", &self.inner.min_level)
            .field("sinks", &self.inner.sinks.len())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    min_level: LogLevel,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FactCheckTelemetry {
    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> FactCheckTelemetryBuilder {
        FactCheckTelemetryBuilder::new(module)
    }

    /// Logs a structured record to every sink and mirrors it to `tracing`.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        self.emit(level, message, None, metadata)
    }

    /// Logs a record correlated with one request.
    pub fn log_request(
        &self,
        request_id: &str,
        level: LogLevel,
        message: &str,
        metadata: Value,
    ) -> Result<()> {
        self.emit(level, message, Some(request_id), metadata)
    }

    fn emit(
        &self,
        level: LogLevel,
        message: &str,
        request_id: Option<&str>,
        metadata: Value,
    ) -> Result<()> {
        if level < self.inner.min_level {
            return Ok(());
        }
        let mut record =
            LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
        if let Some(id) = request_id {
            record = record.with_request_id(id);
        }
        let fields = Value::Object(record.metadata.clone());
        let id = request_id.unwrap_or("-");
        match level {
            LogLevel::Debug => tracing::debug!(request_id = id, %fields, "{message}"),
            LogLevel::Info => tracing::info!(request_id = id, %fields, "{message}"),
            LogLevel::Warn => tracing::warn!(request_id = id, %fields, "{message}"),
            LogLevel::Error => tracing::error!(request_id = id, %fields, "{message}"),
        }
        for sink in &self.inner.sinks {
            sink.write(&record)?;
        }
        Ok(())
    }
}
