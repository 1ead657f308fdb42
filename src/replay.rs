// src/replay.rs - Recorded observation streams, one JSON frame per line
use crate::error::ReplayError;
use crate::observation::Frame;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Yields every `frame_skip`-th frame (1-based) of a JSON-lines stream.
pub struct FrameReader<R: BufRead> {
    source: String,
    lines: Lines<R>,
    line_number: usize,
    frame_count: usize,
    frames_skipped: usize,
    frame_skip: usize,
}

impl FrameReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, frame_skip: usize) -> Result<Self, ReplayError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ReplayError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file), frame_skip).named(path.display().to_string()))
    }
}

impl<R: BufRead> FrameReader<R> {
    pub fn from_reader(reader: R, frame_skip: usize) -> Self {
        Self {
            source: "<stream>".to_string(),
            lines: reader.lines(),
            line_number: 0,
            frame_count: 0,
            frames_skipped: 0,
            frame_skip: frame_skip.max(1),
        }
    }

    fn named(mut self, source: String) -> Self {
        self.source = source;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Frames read so far, including skipped ones.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frames_skipped(&self) -> usize {
        self.frames_skipped
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<Frame, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(ReplayError::Read(e))),
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            self.frame_count += 1;
            if self.frame_count % self.frame_skip != 0 {
                self.frames_skipped += 1;
                continue;
            }

            let frame = serde_json::from_str::<Frame>(&line).map_err(|source| ReplayError::Parse {
                line: self.line_number,
                source,
            });
            if let Ok(frame) = &frame {
                debug!(
                    "Frame {} at {:.3}s with {} bodies",
                    self.frame_count,
                    frame.timestamp,
                    frame.bodies.len()
                );
            }
            return Some(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(n: usize) -> String {
        (0..n)
            .map(|i| format!(r#"{{"timestamp": {}, "bodies": []}}"#, i as f64 * 0.1))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_frame_skip_keeps_every_nth() {
        let reader = FrameReader::from_reader(Cursor::new(stream(6)), 2);
        let timestamps: Vec<f64> = reader.map(|f| f.unwrap().timestamp).collect();
        assert_eq!(timestamps.len(), 3);
        assert!((timestamps[0] - 0.1).abs() < 1e-9);
        assert!((timestamps[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let text = format!("\n{}\n\n", stream(2));
        let reader = FrameReader::from_reader(Cursor::new(text), 1);
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let text = format!("{}\nnot json\n", stream(1));
        let mut reader = FrameReader::from_reader(Cursor::new(text), 1);
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap() {
            Err(ReplayError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other.map(|f| f.timestamp)),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FrameReader::open("/nonexistent/frames.jsonl", 1),
            Err(ReplayError::Open { .. })
        ));
    }
}
