//! CSV ledger of processed invoices.
//!
//! One row per saved extraction, columns named after the fields. The ledger
//! only ever grows: rows are appended, and a result carrying fields the file
//! does not know about widens the file instead of dropping values.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::models::record::ExtractionResult;

type Result<T> = std::result::Result<T, LedgerError>;

/// Contents of a ledger file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LedgerTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Every value of one column, empty cells included.
    pub fn column_values(&self, name: &str) -> Vec<&str> {
        let Some(index) = self.column(name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
            .collect()
    }
}

/// Append-only CSV ledger at a fixed path.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one result as a row.
    pub fn append(&self, result: &ExtractionResult) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| LedgerError::Poisoned)?;

        let names: Vec<String> = result.names().map(str::to_string).collect();
        let values: Vec<String> = result.values().map(str::to_string).collect();

        let existing = if self.has_content()? {
            Some(self.read_unlocked()?)
        } else {
            None
        };

        match existing {
            None => {
                self.write_table(&LedgerTable {
                    headers: names,
                    rows: vec![values],
                })?;
                info!("Created ledger {}", self.path.display());
            }
            Some(table) if table.headers == names => {
                let file = OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .map_err(|e| self.io_error(e))?;
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file);
                writer.write_record(&values)?;
                writer.flush().map_err(|e| self.io_error(e))?;
                debug!("Appended row {} to {}", table.len() + 1, self.path.display());
            }
            Some(table) => {
                let widened = widen(table, &names, &values);
                self.write_table(&widened)?;
                info!(
                    "Rewrote ledger {} with {} columns",
                    self.path.display(),
                    widened.headers.len()
                );
            }
        }

        Ok(())
    }

    /// Read the whole ledger. A missing file reads as an empty table.
    pub fn read(&self) -> Result<LedgerTable> {
        let _guard = self.lock.lock().map_err(|_| LedgerError::Poisoned)?;
        if !self.exists() {
            return Ok(LedgerTable::default());
        }
        self.read_unlocked()
    }

    fn read_unlocked(&self) -> Result<LedgerTable> {
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        Ok(LedgerTable { headers, rows })
    }

    /// Replace the whole file with `table`.
    ///
    /// Rows are written to a temporary file in the same directory, which is
    /// then renamed over the ledger. A failed write leaves the old file as it
    /// was.
    fn write_table(&self, table: &LedgerTable) -> Result<()> {
        self.create_parent()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        let mut writer = csv::Writer::from_writer(temp);
        writer.write_record(&table.headers)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }

        let temp = writer
            .into_inner()
            .map_err(|e| self.io_error(e.into_error()))?;
        temp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn has_content(&self) -> Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn create_parent(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))
            }
            _ => Ok(()),
        }
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Union of the existing and new columns, existing order first.
fn widen(table: LedgerTable, names: &[String], values: &[String]) -> LedgerTable {
    let mut headers = table.headers;
    for name in names {
        if !headers.contains(name) {
            headers.push(name.clone());
        }
    }

    let width = headers.len();
    let mut rows: Vec<Vec<String>> = table
        .rows
        .into_iter()
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    let mut row = vec![String::new(); width];
    for (name, value) in names.iter().zip(values) {
        if let Some(index) = headers.iter().position(|h| h == name) {
            row[index] = value.clone();
        }
    }
    rows.push(row);

    LedgerTable { headers, rows }
}
