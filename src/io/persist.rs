// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Debounced project persistence.
//!
//! Changes are recorded in memory immediately and written to the sidecar
//! once no further change arrived for the quiet period. `flush_now` writes
//! any pending change at once (shutdown, folder switch).

use super::serialization::{read_project, write_project};
use crate::models::detail::{DetailId, TextDetail};
use crate::models::project::ProjectData;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// The open project and its pending write.
#[derive(Debug)]
pub struct ProjectStore {
    folder: PathBuf,
    data: ProjectData,
    debounce: Duration,
    /// Time of the most recent unsaved change.
    dirty_since: Option<Instant>,
}

impl ProjectStore {
    /// Open the project in `folder`, reading its sidecar if there is one.
    pub fn open(folder: &Path, debounce: Duration) -> Result<Self> {
        let data = read_project(folder)?;
        log::info!(
            "Opened project {} ({} images, {} details)",
            folder.display(),
            data.images.len(),
            data.detail_count()
        );
        Ok(Self {
            folder: folder.to_path_buf(),
            data,
            debounce,
            dirty_since: None,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn data(&self) -> &ProjectData {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    fn mark_dirty(&mut self, now: Instant) {
        self.dirty_since = Some(now);
    }

    /// Record the detail list of `image`.
    pub fn record_details(&mut self, image: &str, details: &[TextDetail], now: Instant) {
        if self.data.set_details(image, details) {
            self.mark_dirty(now);
        }
    }

    /// Replace the whole project, for example with an imported one.
    pub fn replace_data(&mut self, data: ProjectData, now: Instant) {
        self.data = data;
        self.mark_dirty(now);
    }

    pub fn set_processed_image(&mut self, image: &str, processed: Option<String>, now: Instant) {
        self.data.set_processed_image(image, processed);
        self.mark_dirty(now);
    }

    /// Whether any image still holds the detail.
    pub fn contains_detail(&self, id: &DetailId) -> bool {
        self.data.image_of(id).is_some()
    }

    /// Patch one stored detail wherever it lives. Returns false when it no
    /// longer exists.
    pub fn update_detail<F>(&mut self, id: &DetailId, mutator: F, now: Instant) -> bool
    where
        F: FnOnce(&mut TextDetail),
    {
        let Some(image) = self.data.image_of(id).map(str::to_string) else {
            return false;
        };
        let found = self.data.update_detail(&image, id, mutator);
        if found {
            self.mark_dirty(now);
        }
        found
    }

    /// Write when the quiet period has passed. Returns true when a write happened.
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        match self.dirty_since {
            Some(at) if now.saturating_duration_since(at) >= self.debounce => self.flush_now(),
            _ => Ok(false),
        }
    }

    /// Write any pending change immediately.
    pub fn flush_now(&mut self) -> Result<bool> {
        if self.dirty_since.is_none() {
            return Ok(false);
        }
        // Cleared first: a failed write is reported once, not retried every frame.
        self.dirty_since = None;
        write_project(&self.folder, &mut self.data)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serialization::sidecar_path;
    use crate::models::detail::BoundingBox;

    const QUIET: Duration = Duration::from_millis(500);

    fn detail(text: &str) -> TextDetail {
        TextDetail::new(
            text.to_string(),
            String::new(),
            BoundingBox {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 10.0,
                max_y: 10.0,
            },
        )
    }

    #[test]
    fn test_writes_after_quiet_period() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path(), QUIET).unwrap();
        let start = Instant::now();

        store.record_details("a.png", &[detail("one")], start);
        store.record_details("a.png", &[detail("two")], start + Duration::from_millis(300));

        assert!(!store.poll(start + Duration::from_millis(600)).unwrap());
        assert!(!sidecar_path(dir.path()).exists());

        assert!(store.poll(start + Duration::from_millis(800)).unwrap());
        let reopened = ProjectStore::open(dir.path(), QUIET).unwrap();
        assert_eq!(reopened.data().details("a.png")[0].original_text, "two");
    }

    #[test]
    fn test_flush_now_writes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path(), QUIET).unwrap();
        store.record_details("a.png", &[detail("x")], Instant::now());

        assert!(store.flush_now().unwrap());
        assert!(!store.is_dirty());
        assert!(!store.flush_now().unwrap());
        assert!(sidecar_path(dir.path()).exists());
    }

    #[test]
    fn test_unchanged_details_do_not_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path(), QUIET).unwrap();
        let details = vec![detail("x")];
        store.record_details("a.png", &details, Instant::now());
        store.flush_now().unwrap();

        store.record_details("a.png", &details, Instant::now());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_update_of_missing_detail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path(), QUIET).unwrap();
        let gone = DetailId::from("gone");
        assert!(!store.update_detail(&gone, |d| d.clear_audio(), Instant::now()));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_update_finds_detail_on_any_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path(), QUIET).unwrap();
        let d = detail("x");
        let id = d.id.clone();
        store.record_details("b.png", &[d], Instant::now());
        store.flush_now().unwrap();

        assert!(store.contains_detail(&id));
        assert!(store.update_detail(
            &id,
            |d| d.audio_reference = Some("audio_files/x.mp3".to_string()),
            Instant::now()
        ));
        assert!(store.is_dirty());
        assert_eq!(
            store.data().details("b.png")[0].audio_reference.as_deref(),
            Some("audio_files/x.mp3")
        );
    }
}
