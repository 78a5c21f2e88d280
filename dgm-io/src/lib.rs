//! Thin wrappers around file reads and writes. Every error carries the offending path, since dgm
//! shuffles config, keystore and artifact files between user-supplied locations and the bare
//! `std::io` messages do not say which file failed.
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum IoError {
    #[error("File read error at path {path}")]
    FileReadError {
        #[source]
        source: std::io::Error,
        path: String,
    },

    #[error("File write error at path {path}")]
    FileWriteError {
        #[source]
        source: std::io::Error,
        path: String,
    },

    #[error("JSON parse error at path {path}")]
    SerdeJsonError {
        #[source]
        source: serde_json::Error,
        path: String,
    },

    #[error("TOML deserialize error at path {path}")]
    TomlDeError {
        #[source]
        source: toml::de::Error,
        path: String,
    },

    #[error("TOML serialize error at path {path}")]
    TomlSerError {
        #[source]
        source: toml::ser::Error,
        path: String,
    },

    #[error("Directory creation error at path {path}")]
    DirCreationError {
        #[source]
        source: std::io::Error,
        path: String,
    },
}

pub fn read_json<T: for<'a> Deserialize<'a>>(path: &Path) -> Result<T, IoError> {
    let json_str = fs::read_to_string(path)
        .map_err(|e| IoError::FileReadError { source: e, path: path.display().to_string() })?;
    let res = serde_json::from_str::<T>(&json_str)
        .map_err(|e| IoError::SerdeJsonError { source: e, path: path.display().to_string() })?;
    Ok(res)
}

pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), IoError> {
    let data = serde_json::to_string_pretty(data)
        .map_err(|e| IoError::SerdeJsonError { source: e, path: path.display().to_string() })?;
    fs::write(path, data)
        .map_err(|e| IoError::FileWriteError { source: e, path: path.display().to_string() })?;
    Ok(())
}

pub fn read_toml<T: for<'a> Deserialize<'a>>(path: &Path) -> Result<T, IoError> {
    let toml_str = fs::read_to_string(path)
        .map_err(|e| IoError::FileReadError { source: e, path: path.display().to_string() })?;
    let res = toml::from_str(&toml_str)
        .map_err(|e| IoError::TomlDeError { source: e, path: path.display().to_string() })?;
    Ok(res)
}

/// Serializes `data` to `path`, creating missing parent directories first.
pub fn write_toml<T: Serialize>(path: &Path, data: &T) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let data = toml::to_string(data)
        .map_err(|e| IoError::TomlSerError { source: e, path: path.display().to_string() })?;
    fs::write(path, data)
        .map_err(|e| IoError::FileWriteError { source: e, path: path.display().to_string() })?;
    Ok(())
}

pub fn create_dir_all(path: &Path) -> Result<(), IoError> {
    fs::create_dir_all(path)
        .map_err(|e| IoError::DirCreationError { source: e, path: path.display().to_string() })?;
    Ok(())
}
