use crate::errors::{AppError, AppResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Read the address list: one per line, trimmed, blank lines skipped
///
/// A missing or empty file is an input error; the run must not start.
pub fn read_addresses(path: &Path) -> AppResult<Vec<String>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            AppError::Input(format!("File {} not found", path.display()))
        }
        _ => AppError::Io(e),
    })?;

    let mut addresses = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(AppError::Io)?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            addresses.push(trimmed.to_string());
        }
    }

    if addresses.is_empty() {
        return Err(AppError::Input(format!(
            "No valid addresses found in {}",
            path.display()
        )));
    }

    info!("Loaded {} addresses from {}", addresses.len(), path.display());
    Ok(addresses)
}
