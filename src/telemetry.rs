use std::collections::BTreeMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use log::warn;
use serde::{Deserialize, Serialize};

pub const TELEMETRY_ENV: &str = "CONVFIXTURE_TELEMETRY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub duration_ms: f64,
    pub timestamp_ms: u128,
    pub tags: BTreeMap<String, String>,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            duration_ms,
            timestamp_ms: current_timestamp_ms(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent) -> Result<()>;
}

/// One JSON object per line, appended and flushed after every event.
#[derive(Debug)]
pub struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl TelemetrySink for JsonlSink {
    fn record(&self, event: TelemetryEvent) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("telemetry writer lock poisoned"))?;
        serde_json::to_writer(&mut *writer, &event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Collects stage timings. With no sink every call is a no-op.
#[derive(Default)]
pub struct Telemetry {
    sink: Option<Box<dyn TelemetrySink>>,
}

impl Telemetry {
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn with_sink(sink: impl TelemetrySink + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    /// JSONL telemetry if `var` names a path, disabled otherwise.
    pub fn from_env(var: &str) -> Result<Self> {
        let path = match std::env::var_os(var) {
            Some(value) => PathBuf::from(value),
            None => return Ok(Self::disabled()),
        };
        Ok(Self::with_sink(JsonlSink::new(path)?))
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn record(&self, event: TelemetryEvent) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.record(event) {
                warn!("telemetry record failed: {err:?}");
            }
        }
    }

    /// Time `f` and record it as `name`.
    pub fn time<T>(&self, name: &str, tags: &[(&str, String)], f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        if self.is_enabled() {
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            let event = tags
                .iter()
                .fold(TelemetryEvent::new(name, duration_ms), |event, (k, v)| {
                    event.with_tag(*k, v.clone())
                });
            self.record(event);
        }
        value
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn current_timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or_default()
}
