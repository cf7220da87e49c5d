//! Record sinks: where finished companies go.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use prospector_shared::{CompanyResult, ProspectorError, Result};

/// Consumer of per-company results, called in input order.
pub trait RecordSink: Send {
    fn write(&mut self, record: &CompanyResult) -> Result<()>;

    /// Flush anything buffered. Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Line shape written by [`JsonLinesSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    /// The CRM contract: name, title, department, role, channels.
    #[default]
    Contract,
    /// Everything: candidates, verification detail, buyer group.
    Full,
}

/// One JSON document per line.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
    format: RecordFormat,
}

impl JsonLinesSink {
    /// Create (truncate) `path`, creating parent directories as needed.
    pub fn create(path: &Path, format: RecordFormat) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProspectorError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| ProspectorError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            format,
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn write(&mut self, record: &CompanyResult) -> Result<()> {
        let line = match self.format {
            RecordFormat::Contract => serde_json::to_string(&record.sink_record()),
            RecordFormat::Full => serde_json::to_string(record),
        }
        .map_err(|e| ProspectorError::Sink(format!("failed to serialize record: {e}")))?;

        writeln!(self.writer, "{line}").map_err(|e| ProspectorError::io(&self.path, e))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| ProspectorError::io(&self.path, e))
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<CompanyResult>,
    pub finished: bool,
}

impl RecordSink for MemorySink {
    fn write(&mut self, record: &CompanyResult) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
