//! Line-delimited record files
//!
//! One file per entity kind, UTF-8, one JSON object per line, no enclosing
//! array. Blank lines are tolerated on read (skipped, not malformed);
//! unparseable lines are surfaced per-line so one bad record never poisons
//! the rest of the file.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::api::models::EntityRecord;
use crate::migrate::schema::{self, EntityKind};

/// File path for a kind's records under a run directory.
pub fn kind_path(dir: &Path, kind: EntityKind) -> PathBuf {
    dir.join(format!("{}.ndjson", kind.as_str()))
}

/// Kinds with a record file present, in registry declaration order.
pub fn discover_kinds(dir: &Path) -> Vec<EntityKind> {
    schema::all_kinds()
        .iter()
        .copied()
        .filter(|kind| kind_path(dir, *kind).is_file())
        .collect()
}

/// Appending writer for one kind's record file.
pub struct RecordWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl RecordWriter {
    /// Create (truncate) the file for a kind. A kind with zero matches still
    /// gets its empty file, distinguishing "no matches" from "not exported".
    pub fn create(dir: &Path, kind: EntityKind) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        let path = kind_path(dir, kind);
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self { path, writer: BufWriter::new(file), written: 0 })
    }

    pub fn append(&mut self, record: &EntityRecord) -> Result<()> {
        let line = serde_json::to_string(record.payload())
            .context("failed to serialize record")?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return how many records were written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(self.written)
    }
}

/// One parsed line of a record file.
#[derive(Debug, Clone)]
pub enum ParsedLine {
    Record(EntityRecord),
    /// Line that failed to parse; carried so the import can record a
    /// per-record FAILED outcome instead of dropping it silently.
    Invalid { line: usize, message: String },
}

/// Read a kind's record file. Blank lines are skipped without an entry.
pub fn read_records(path: &Path) -> Result<Vec<ParsedLine>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut parsed = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => match EntityRecord::from_payload(value) {
                Ok(record) => parsed.push(ParsedLine::Record(record)),
                Err(err) => {
                    parsed.push(ParsedLine::Invalid { line: line_no, message: err.to_string() })
                }
            },
            Err(err) => {
                parsed.push(ParsedLine::Invalid { line: line_no, message: err.to_string() })
            }
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordWriter::create(dir.path(), EntityKind::Domain).unwrap();
        let record = EntityRecord::from_payload(json!({"name": "Finance"})).unwrap();
        writer.append(&record).unwrap();
        assert_eq!(writer.finish().unwrap(), 1);

        let parsed = read_records(&kind_path(dir.path(), EntityKind::Domain)).unwrap();
        assert_eq!(parsed.len(), 1);
        match &parsed[0] {
            ParsedLine::Record(r) => assert_eq!(r.name(), "Finance"),
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_lines_are_skipped_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domains.ndjson");
        fs::write(&path, "{\"name\":\"a\"}\n\n   \n{\"name\":\"b\"}\n").unwrap();

        let parsed = read_records(&path).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.iter().all(|p| matches!(p, ParsedLine::Record(_))));
    }

    #[test]
    fn test_malformed_line_is_reported_with_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domains.ndjson");
        fs::write(&path, "{\"name\":\"a\"}\nnot json\n{\"name\":\"b\"}\n").unwrap();

        let parsed = read_records(&path).unwrap();
        assert_eq!(parsed.len(), 3);
        match &parsed[1] {
            ParsedLine::Invalid { line, .. } => assert_eq!(*line, 2),
            other => panic!("expected invalid line, got {other:?}"),
        }
    }

    #[test]
    fn test_discover_kinds_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tables.ndjson"), "").unwrap();
        fs::write(dir.path().join("domains.ndjson"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let kinds = discover_kinds(dir.path());
        assert_eq!(kinds, vec![EntityKind::Domain, EntityKind::Table]);
    }
}
