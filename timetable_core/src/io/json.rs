use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::models::Course;

/// Reads and deserializes a JSON file, reporting the JSON path of the first
/// field that fails to deserialize.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;
    parse_json_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Deserializes a JSON string with path-aware errors.
pub fn parse_json_str<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(json_str);
    serde_path_to_error::deserialize(de).map_err(|e| {
        let path = e.path().to_string();
        anyhow::anyhow!("at '{}': {}", path, e.into_inner())
    })
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_schedule(path: &Path) -> Result<Vec<Course>> {
    read_json(path)
}

pub fn write_schedule(path: &Path, schedule: &[Course]) -> Result<()> {
    write_json(path, schedule)
}
