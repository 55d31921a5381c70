use std::{
    io::{self, ErrorKind, Write},
    path::Path,
};

use atomic_write_file::AtomicWriteFile;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO({0})")]
    Io(#[from] io::Error),
    #[error("Json({0})")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == ErrorKind::NotFound)
    }
}

/// Reads a JSON document.
///
/// # Errors
/// If the file could not be read or parsed.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Writes a JSON document, replacing the file atomically.
///
/// # Errors
/// If it failed to serialize or write the file.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut file = AtomicWriteFile::open(path)?;
    let contents = serde_json::to_string_pretty(value)?;

    write!(file, "{contents}")?;
    file.commit()?;

    Ok(())
}

/// Like [save], but only logs the outcome.
pub fn save_ok<T: Serialize>(path: &Path, value: &T) {
    match save(path, value) {
        Ok(()) => tracing::debug!("Successfully saved {path:?}"),
        Err(e) => tracing::error!("Failed to save {path:?}: {e}"),
    }
}

/// Loads a JSON document. When it is missing, `seed` is written in its place
/// and returned. Any other failure is logged and also falls back to `seed`,
/// leaving the broken file alone.
pub fn load_or_seed<T: Serialize + DeserializeOwned>(path: &Path, seed: impl FnOnce() -> T) -> T {
    match load(path) {
        Ok(value) => {
            tracing::debug!("Successfully loaded {path:?}");
            value
        }
        Err(e) if e.is_not_found() => {
            tracing::warn!("Could not locate {path:?}, creating new file.");
            let value = seed();
            save_ok(path, &value);
            value
        }
        Err(e) => {
            tracing::error!("Failed to load {path:?}, using defaults: {e}");
            seed()
        }
    }
}

/// Loads a snapshot, falling back to the default value without writing
/// anything.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load(path) {
        Ok(value) => value,
        Err(e) if e.is_not_found() => T::default(),
        Err(e) => {
            tracing::warn!("Ignoring unreadable snapshot {path:?}: {e}");
            T::default()
        }
    }
}
