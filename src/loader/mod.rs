//! Sheet loading.
//!
//! Reads the `UserDetails`, `CookingSessions` and `OrderDetails` sheets
//! (exported as CSV) into untyped string tables. Cells are trimmed and
//! empty cells become `None`; typing happens in the cleaner.

use crate::config::InputConfig;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// A sheet as read from disk, before any typing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Sheet name, used in error messages.
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Parse a sheet from any CSV source with a header row.
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .with_context(|| format!("Failed to read header row of {}", name))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Failed to read row {} of {}", i + 1, name))?;
            let row = record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            rows.push(row);
        }

        debug!("{}: read {} rows, {} columns", name, rows.len(), headers.len());

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    /// Read a sheet from a CSV file. The file stem becomes the sheet name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open sheet: {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sheet");

        Self::from_reader(name, file)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The three source sheets of one export.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub users: RawTable,
    pub sessions: RawTable,
    pub orders: RawTable,
}

/// Load all three sheets from a directory.
pub fn load_dataset(dir: &Path, config: &InputConfig) -> Result<RawDataset> {
    if !dir.is_dir() {
        anyhow::bail!("Input directory does not exist: {}", dir.display());
    }

    info!("Reading sheets from {}", dir.display());

    let users = RawTable::from_path(&dir.join(&config.users_file))?;
    let sessions = RawTable::from_path(&dir.join(&config.sessions_file))?;
    let orders = RawTable::from_path(&dir.join(&config.orders_file))?;

    for sheet in [&users, &sessions, &orders] {
        if sheet.is_empty() {
            warn!("{} has no data rows", sheet.name);
        }
    }

    info!(
        "Sheets read: {} users, {} sessions, {} orders",
        users.len(),
        sessions.len(),
        orders.len()
    );

    Ok(RawDataset {
        users,
        sessions,
        orders,
    })
}
