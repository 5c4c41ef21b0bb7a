// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Project state management.
//!
//! A project is a folder of page images. Its persisted state maps every
//! image path to the OCR details recorded for it.

use super::detail::{DetailId, TextDetail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Version written into new sidecar files.
pub const PROJECT_VERSION: &str = "1.0.0";

/// Per-image state stored in the project sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_image_path: Option<String>,
    #[serde(default)]
    pub ocr_result: Vec<TextDetail>,
}

/// Complete project data for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    #[serde(default)]
    pub images: BTreeMap<String, ImageRecord>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

fn default_version() -> String {
    PROJECT_VERSION.to_string()
}

/// Current time as an RFC 3339 string.
pub fn timestamp_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

impl Default for ProjectData {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectData {
    /// Create an empty project.
    pub fn new() -> Self {
        let now = timestamp_now();
        Self {
            images: BTreeMap::new(),
            version: default_version(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Details recorded for `image_path` (empty when unknown).
    pub fn details(&self, image_path: &str) -> &[TextDetail] {
        self.images
            .get(image_path)
            .map(|r| r.ocr_result.as_slice())
            .unwrap_or(&[])
    }

    /// Store the detail list of an image. Returns false when nothing changed.
    pub fn set_details(&mut self, image_path: &str, details: &[TextDetail]) -> bool {
        let record = self.images.entry(image_path.to_string()).or_default();
        if record.ocr_result == details {
            return false;
        }
        record.ocr_result = details.to_vec();
        true
    }

    pub fn set_processed_image(&mut self, image_path: &str, processed: Option<String>) {
        self.images
            .entry(image_path.to_string())
            .or_default()
            .processed_image_path = processed;
    }

    pub fn processed_image(&self, image_path: &str) -> Option<&str> {
        self.images
            .get(image_path)
            .and_then(|r| r.processed_image_path.as_deref())
    }

    /// Patch a detail of any image by id. Returns false when the detail is gone.
    pub fn update_detail<F>(&mut self, image_path: &str, id: &DetailId, mutator: F) -> bool
    where
        F: FnOnce(&mut TextDetail),
    {
        let Some(record) = self.images.get_mut(image_path) else {
            return false;
        };
        match record.ocr_result.iter_mut().find(|d| &d.id == id) {
            Some(detail) => {
                mutator(detail);
                detail.id = id.clone();
                true
            }
            None => false,
        }
    }

    /// The image a detail belongs to.
    pub fn image_of(&self, id: &DetailId) -> Option<&str> {
        self.images
            .iter()
            .find(|(_, record)| record.ocr_result.iter().any(|d| &d.id == id))
            .map(|(path, _)| path.as_str())
    }

    /// Mark the project as modified now.
    pub fn touch(&mut self) {
        self.updated_at = timestamp_now();
    }

    /// Total number of details across all images.
    pub fn detail_count(&self) -> usize {
        self.images.values().map(|r| r.ocr_result.len()).sum()
    }
}
