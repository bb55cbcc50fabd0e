//! Resume ledger
//!
//! `titles.csv` in the output directory lists every finished episode and
//! `failures.log` every episode that failed. Together with the media files
//! already on disk they decide what a rerun skips. Each row is flushed and
//! synced before the call returns, so an interrupted run never loses a
//! recorded completion.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{HarvestError, Result};
use crate::parser::{episode_code, parse_episode_code};
use crate::types::{FailureRecord, LedgerEntry};

/// Completed-episodes ledger file name
pub const LEDGER_FILE: &str = "titles.csv";

/// Failure log file name
pub const FAILURE_LOG_FILE: &str = "failures.log";

const LEDGER_HEADER: [&str; 3] = ["EP_CODE", "Episode Title", "Filename"];

/// Persistent record of finished and failed episodes
#[derive(Debug)]
pub struct Ledger {
    ledger_path: PathBuf,
    failure_path: PathBuf,
    done: HashSet<String>,
}

impl Ledger {
    /// Open the ledger in `out_dir`, creating the directory if needed.
    ///
    /// The done-set is built from the codes in `titles.csv` plus the codes
    /// found in the names of `.mp4` files already in the directory.
    ///
    /// # Errors
    /// Returns `HarvestError::Filesystem` or `HarvestError::Csv` if the
    /// directory cannot be created or the ledger cannot be read.
    pub fn open(out_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(out_dir).map_err(|e| HarvestError::filesystem(out_dir, e))?;

        let ledger_path = out_dir.join(LEDGER_FILE);
        let failure_path = out_dir.join(FAILURE_LOG_FILE);

        let mut done = read_ledger_codes(&ledger_path)?;
        let recorded = done.len();
        done.extend(scan_media_codes(out_dir)?);
        debug!(
            "Ledger opened: {} recorded, {} found on disk only",
            recorded,
            done.len() - recorded
        );

        Ok(Self {
            ledger_path,
            failure_path,
            done,
        })
    }

    /// Whether `code` is already finished, compared case-insensitively
    pub fn is_done(&self, code: &str) -> bool {
        self.done.contains(&code.to_uppercase())
    }

    /// Number of finished episodes known at this point
    pub fn done_count(&self) -> usize {
        self.done.len()
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    pub fn failure_path(&self) -> &Path {
        &self.failure_path
    }

    /// Append a completed episode to `titles.csv`.
    ///
    /// The header is written when the file is new. An entry whose code is
    /// already in the done-set is not written twice.
    pub fn record_success(&mut self, entry: &LedgerEntry) -> Result<()> {
        let key = entry.code.to_uppercase();
        if self.done.contains(&key) && self.contains_row(&key)? {
            debug!("{} already in ledger", entry.code);
            return Ok(());
        }

        let file = open_append(&self.ledger_path)?;
        let needs_header = file
            .metadata()
            .map_err(|e| HarvestError::filesystem(&self.ledger_path, e))?
            .len()
            == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(LEDGER_HEADER)?;
        }
        writer.serialize(entry)?;
        sync(writer, &self.ledger_path)?;

        self.done.insert(key);
        Ok(())
    }

    /// Append a failed episode to `failures.log`.
    pub fn record_failure(&self, record: &FailureRecord) -> Result<()> {
        let file = open_append(&self.failure_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(record)?;
        sync(writer, &self.failure_path)
    }

    /// Read every completed entry back from `titles.csv`.
    ///
    /// Columns are taken by position, so headerless ledgers read the same
    /// way. A missing trailing column reads as empty.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        if !self.ledger_path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.ledger_path)?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let column = |index: usize| record.get(index).unwrap_or("").trim().to_string();
            let code = column(0);
            if code.is_empty() || code.eq_ignore_ascii_case(LEDGER_HEADER[0]) {
                continue;
            }
            entries.push(LedgerEntry {
                code,
                title: column(1),
                filename: column(2),
            });
        }
        Ok(entries)
    }

    /// Read every failure back from `failures.log`.
    pub fn failures(&self) -> Result<Vec<FailureRecord>> {
        if !self.failure_path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&self.failure_path)?;
        reader
            .deserialize()
            .collect::<std::result::Result<Vec<FailureRecord>, _>>()
            .map_err(HarvestError::from)
    }

    /// Whether `titles.csv` already holds a row for `key`.
    ///
    /// Codes that only came from a file scan have no row yet.
    fn contains_row(&self, key: &str) -> Result<bool> {
        Ok(read_ledger_codes(&self.ledger_path)?.contains(key))
    }
}

/// Codes in the first column of `titles.csv`, upper-cased
fn read_ledger_codes(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut codes = HashSet::new();
    for record in reader.records() {
        let record = record?;
        let Some(code) = record.get(0).map(str::trim) else {
            continue;
        };
        if code.is_empty() || code.eq_ignore_ascii_case(LEDGER_HEADER[0]) {
            continue;
        }
        codes.insert(code.to_uppercase());
    }
    Ok(codes)
}

/// Episode codes found in the names of `.mp4` files in `dir`
fn scan_media_codes(dir: &Path) -> Result<HashSet<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| HarvestError::filesystem(dir, e))?;

    let mut codes = HashSet::new();
    for entry in entries {
        let path = entry.map_err(|e| HarvestError::filesystem(dir, e))?.path();
        let is_media = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
        if !is_media {
            continue;
        }
        let code = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(parse_episode_code)
            .map(|(season, episode)| episode_code(season, episode));
        if let Some(code) = code {
            codes.insert(code);
        }
    }
    Ok(codes)
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| HarvestError::filesystem(path, e))
}

/// Flush the writer and sync the file to disk
fn sync(writer: csv::Writer<File>, path: &Path) -> Result<()> {
    let file = writer
        .into_inner()
        .map_err(|e| HarvestError::filesystem(path, e.into_error()))?;
    file.sync_data().map_err(|e| HarvestError::filesystem(path, e))
}
