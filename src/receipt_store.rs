use crate::aggregate::AggregateMap;
use crate::error::{Result, TallyError};
use crate::heuristics::ReceiptRecord;
use crate::pdf_extract::is_receipt_document;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receipt documents directly inside `dir`, sorted by file name.
pub fn list_receipts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TallyError::MissingInput(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_receipt_document(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    info!(dir = %dir.display(), count = files.len(), "Receipt documents found");
    Ok(files)
}

/// Write the extracted records as a JSON array, in processing order.
pub fn save_records(path: &Path, records: &[ReceiptRecord]) -> Result<()> {
    write_json(path, &records)?;
    info!(path = %path.display(), records = records.len(), "Saved extracted records");
    Ok(())
}

pub fn load_records(path: &Path) -> Result<Vec<ReceiptRecord>> {
    read_json(path)
}

/// Write the per-company totals as a JSON object of numbers.
pub fn save_totals(path: &Path, totals: &AggregateMap) -> Result<()> {
    write_json(path, totals)?;
    info!(path = %path.display(), companies = totals.len(), "Saved aggregated totals");
    Ok(())
}

pub fn load_totals(path: &Path) -> Result<AggregateMap> {
    read_json(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(TallyError::MissingInput(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
