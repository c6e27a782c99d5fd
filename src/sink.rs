//! Telemetry data file
//! Records are appended as `ts,did,hdl,sub,value` lines; the `ts,did,hdl,data` header is
//! only written to a new or empty file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use csv::{Writer, WriterBuilder};
use log::info;
use thiserror::Error;

use crate::core::bluetooth::types::TelemetryRecord;
use crate::utils::ensure_directory_exists;

const HEADER: [&str; 4] = ["ts", "did", "hdl", "data"];

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("data file lock poisoned")]
    Poisoned,
}

/// Append-only record stream
pub trait TelemetrySink: Send {
    fn append(&mut self, record: &TelemetryRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError>;
}

pub type SharedSink = Arc<Mutex<Box<dyn TelemetrySink>>>;

pub fn shared(sink: impl TelemetrySink + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink)))
}

pub struct CsvSink {
    path: PathBuf,
    writer: Writer<File>,
}

impl CsvSink {
    /// Opens `path` for appending, creating it and its directory when needed.
    pub async fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory_exists(parent).await?;
        }

        let write_header = match std::fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        if write_header {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        info!("Writing telemetry to {:?}", path);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for CsvSink {
    fn append(&mut self, record: &TelemetryRecord) -> Result<(), SinkError> {
        self.writer.write_record([
            format!("{}.{:06}", record.timestamp.secs, record.timestamp.micros),
            record.device.to_string(),
            record.handle.to_string(),
            record.channel.to_string(),
            format!("{:.2}", record.value),
        ])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::types::{DeviceId, Timestamp};

    fn record(channel: u8, value: f64) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: Timestamp::new(1_520_000_000, 1_500),
            device: DeviceId::new("112233aabbcc"),
            handle: 0x2b,
            channel,
            value,
        }
    }

    #[tokio::test]
    async fn new_file_gets_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("out.csv");

        let mut sink = CsvSink::open(&path).await.unwrap();
        sink.append(&record(0, 21.456)).unwrap();
        sink.append(&record(1, 40.0)).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "ts,did,hdl,data\n\
             1520000000.001500,112233aabbcc,43,0,21.46\n\
             1520000000.001500,112233aabbcc,43,1,40.00\n"
        );
    }

    #[tokio::test]
    async fn existing_file_is_appended_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "ts,did,hdl,data\n1,a,1,0,1.00\n").unwrap();

        let mut sink = CsvSink::open(&path).await.unwrap();
        sink.append(&record(0, -3.0)).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("ts,did,hdl,data").count(), 1);
        assert!(content.ends_with("112233aabbcc,43,0,-3.00\n"));
    }

    #[tokio::test]
    async fn empty_file_gets_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "").unwrap();

        let mut sink = CsvSink::open(&path).await.unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.path(), path.as_path());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ts,did,hdl,data\n");
    }

    #[tokio::test]
    async fn unusable_path_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        assert!(CsvSink::open(blocker.join("out.csv")).await.is_err());
    }
}
