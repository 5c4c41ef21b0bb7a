// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Project data serialization and deserialization.
//!
//! The project sidecar is `config.json` inside the project folder. Whole
//! projects can also be exported to and imported from YAML or JSON.

use crate::models::project::ProjectData;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Sidecar file name inside a project folder.
pub const SIDECAR_FILE: &str = "config.json";

/// Path of the sidecar for the project in `folder`.
pub fn sidecar_path(folder: &Path) -> PathBuf {
    folder.join(SIDECAR_FILE)
}

/// Read the project sidecar of `folder`. A missing sidecar is an empty project.
pub fn read_project(folder: &Path) -> Result<ProjectData> {
    let path = sidecar_path(folder);
    if !path.exists() {
        log::info!("No sidecar in {}, starting a new project", folder.display());
        return Ok(ProjectData::new());
    }
    import_json(&path)
}

/// Write the project sidecar of `folder`, stamping `updatedAt`.
pub fn write_project(folder: &Path, data: &mut ProjectData) -> Result<()> {
    data.touch();
    let path = sidecar_path(folder);
    let json = serde_json::to_string_pretty(data)?;

    // Write next to the target and rename so a crash never leaves half a file.
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, json)
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    std::fs::rename(&staging, &path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    log::debug!("Saved {} details to {}", data.detail_count(), path.display());
    Ok(())
}

/// Export project data to YAML format.
pub fn export_yaml(data: &ProjectData, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Export project data to JSON format.
pub fn export_json(data: &ProjectData, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Export by file extension (`yaml`, `yml` or `json`).
pub fn export(data: &ProjectData, path: &Path) -> Result<()> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => export_yaml(data, path),
        Some("json") => export_json(data, path),
        other => bail!("Unsupported export extension: {:?}", other),
    }
}

/// Import by file extension (`yaml`, `yml` or `json`).
pub fn import(path: &Path) -> Result<ProjectData> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => import_yaml(path),
        Some("json") => import_json(path),
        other => bail!("Unsupported import extension: {:?}", other),
    }
}

/// Import project data from YAML format.
pub fn import_yaml(path: &Path) -> Result<ProjectData> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let data = serde_yaml::from_str(&yaml)
        .with_context(|| format!("Invalid project YAML in {}", path.display()))?;
    Ok(data)
}

/// Import project data from JSON format.
pub fn import_json(path: &Path) -> Result<ProjectData> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let data = serde_json::from_str(&json)
        .with_context(|| format!("Invalid project JSON in {}", path.display()))?;
    Ok(data)
}
