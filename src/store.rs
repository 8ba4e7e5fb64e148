use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::record::{FaceRecord, Gender, Race};

/// One row of the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "Gender")]
    pub gender: Gender,
    #[serde(rename = "Race", default)]
    pub race: Option<Race>,
}

impl StoredRecord {
    pub fn from_record(record: &FaceRecord, subject: Option<&str>) -> Self {
        Self {
            name: subject.filter(|s| !s.is_empty()).map(str::to_string),
            age: record.age(),
            gender: record.gender(),
            race: record.race(),
        }
    }
}

/// Durable backing of a `RecordSink`: whole-store reads and writes.
pub trait RecordStore {
    /// All rows, oldest first. A store that does not exist yet is empty.
    fn load(&self) -> Result<Vec<StoredRecord>, StoreError>;

    /// Replace the whole store with `rows`. On error the previous contents
    /// must still be readable.
    fn save(&mut self, rows: &[StoredRecord]) -> Result<(), StoreError>;

    /// Delete the store. Deleting a missing store succeeds.
    fn remove(&mut self) -> Result<(), StoreError>;
}

/// CSV file with a `Name,Age,Gender,Race` header. `Name` and `Race` columns
/// are only written when at least one row has a value for them.
#[derive(Debug, Clone)]
pub struct CsvFileStore {
    path: PathBuf,
}

impl CsvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordStore for CsvFileStore {
    fn load(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut reader = csv::Reader::from_reader(file);
        let rows = reader.deserialize().collect::<Result<Vec<StoredRecord>, _>>()?;
        Ok(rows)
    }

    fn save(&mut self, rows: &[StoredRecord]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        write_csv(&mut tmp, rows)?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        debug!("Wrote {} rows to {:?}", rows.len(), self.path);
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

fn write_csv<W: io::Write>(writer: W, rows: &[StoredRecord]) -> Result<(), StoreError> {
    let with_name = rows.iter().any(|r| r.name.is_some());
    let with_race = rows.iter().any(|r| r.race.is_some());

    let mut header = Vec::with_capacity(4);
    if with_name {
        header.push("Name");
    }
    header.extend(["Age", "Gender"]);
    if with_race {
        header.push("Race");
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&header)?;
    for row in rows {
        let mut fields = Vec::with_capacity(header.len());
        if with_name {
            fields.push(row.name.clone().unwrap_or_default());
        }
        fields.push(row.age.to_string());
        fields.push(row.gender.to_string());
        if with_race {
            fields.push(row.race.map(|r| r.to_string()).unwrap_or_default());
        }
        csv_writer.write_record(&fields)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Store kept in memory, for tests and embedders that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Option<Vec<StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self) -> bool {
        self.rows.is_some()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self.rows.clone().unwrap_or_default())
    }

    fn save(&mut self, rows: &[StoredRecord]) -> Result<(), StoreError> {
        self.rows = Some(rows.to_vec());
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StoreError> {
        self.rows = None;
        Ok(())
    }
}

/// Appends analysis results to a record store.
///
/// Appending is positional: existing rows are kept as they are and new rows
/// go after them, with no merging of repeated faces.
pub struct RecordSink<S> {
    store: S,
}

impl<S: RecordStore> RecordSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Append `records`, labelled with `subject` if given. Returns the
    /// number of rows in the store afterwards.
    pub fn append(&mut self, records: &[FaceRecord], subject: Option<&str>) -> Result<usize, StoreError> {
        let mut rows = self.store.load()?;
        if records.is_empty() {
            return Ok(rows.len());
        }

        rows.extend(records.iter().map(|r| StoredRecord::from_record(r, subject)));
        self.store.save(&rows)?;
        Ok(rows.len())
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.remove()
    }

    pub fn rows(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.store.load()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
