// src/data.rs - Append-only segment log sinks
use crate::error::LogError;
use crate::segment::Segment;
use chrono::{DateTime, Local};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const CSV_HEADER: [&str; 4] = ["person_id", "action", "duration_seconds", "timestamp"];

/// How a segment's end time is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampStyle {
    /// End time is epoch seconds, rendered as local `%Y-%m-%d %H:%M:%S`.
    #[default]
    Wallclock,
    /// End time is stream-relative seconds, rendered with two decimals.
    Seconds,
}

impl TimestampStyle {
    pub fn render(&self, seconds: f64) -> String {
        match self {
            TimestampStyle::Wallclock => {
                let secs = seconds.floor();
                let nanos = ((seconds - secs) * 1e9) as u32;
                DateTime::from_timestamp(secs as i64, nanos)
                    .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| format!("{:.2}", seconds))
            }
            TimestampStyle::Seconds => format!("{:.2}", seconds),
        }
    }
}

/// One row of the segment log; field order is part of the format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub person_id: String,
    pub action: String,
    pub duration_seconds: String,
    pub timestamp: String,
}

impl SegmentRecord {
    pub fn new(segment: &Segment, style: TimestampStyle) -> Self {
        Self {
            person_id: segment.track_id.to_string(),
            action: segment.label.clone(),
            duration_seconds: format!("{:.2}", segment.duration),
            timestamp: style.render(segment.end_time),
        }
    }
}

/// Destination for closed segments. Each append is flushed before returning.
pub trait SegmentSink {
    fn append(&mut self, segment: &Segment) -> Result<(), LogError>;

    fn records_written(&self) -> usize;
}

impl<S: SegmentSink + ?Sized> SegmentSink for Box<S> {
    fn append(&mut self, segment: &Segment) -> Result<(), LogError> {
        (**self).append(segment)
    }

    fn records_written(&self) -> usize {
        (**self).records_written()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Csv,
    JsonLines,
}

impl LogFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Csv => "csv",
            LogFormat::JsonLines => "jsonl",
        }
    }
}

/// Opens the file sink for `format` at `path`, creating parent directories.
pub fn open_log(
    format: LogFormat,
    path: &Path,
    style: TimestampStyle,
) -> Result<Box<dyn SegmentSink>, LogError> {
    Ok(match format {
        LogFormat::Csv => Box::new(CsvSegmentLog::create(path, style)?),
        LogFormat::JsonLines => Box::new(JsonLinesSegmentLog::create(path, style)?),
    })
}

fn create_file(path: &Path) -> Result<File, LogError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

pub struct CsvSegmentLog {
    path: PathBuf,
    writer: Writer<File>,
    style: TimestampStyle,
    written: usize,
}

impl CsvSegmentLog {
    /// Truncates `path` and writes the header row.
    pub fn create(path: impl AsRef<Path>, style: TimestampStyle) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = create_file(&path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;

        Ok(Self {
            path,
            writer,
            style,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentSink for CsvSegmentLog {
    fn append(&mut self, segment: &Segment) -> Result<(), LogError> {
        self.writer.serialize(SegmentRecord::new(segment, self.style))?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.written
    }
}

/// One JSON object per line.
pub struct JsonLinesSegmentLog {
    path: PathBuf,
    writer: BufWriter<File>,
    style: TimestampStyle,
    written: usize,
}

impl JsonLinesSegmentLog {
    pub fn create(path: impl AsRef<Path>, style: TimestampStyle) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = create_file(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            style,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentSink for JsonLinesSegmentLog {
    fn append(&mut self, segment: &Segment) -> Result<(), LogError> {
        serde_json::to_writer(&mut self.writer, &SegmentRecord::new(segment, self.style))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.written
    }
}

/// Keeps segments in memory, for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryLog {
    segments: Vec<Segment>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl SegmentSink for MemoryLog {
    fn append(&mut self, segment: &Segment) -> Result<(), LogError> {
        self.segments.push(segment.clone());
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.segments.len()
    }
}
