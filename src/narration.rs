// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Routing between the synthesis queue, the canvas and the project.
//!
//! A finished clip lands on the detail wherever it lives: in the editor
//! when its page is shown, otherwise directly in the project store. Text
//! edits and project switches cancel synthesis that would be stale.

use crate::canvas::editor::CanvasEditor;
use crate::io::persist::ProjectStore;
use crate::models::detail::{DetailId, TextDetail};
use crate::services::audio::{AudioOutcome, AudioPipeline, SynthesisError};
use std::time::Instant;

/// Owns the synthesis queue and applies its results.
pub struct Narration {
    pipeline: AudioPipeline,
}

impl Narration {
    pub fn new(pipeline: AudioPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &AudioPipeline {
        &self.pipeline
    }

    pub fn enqueue(&mut self, detail: &TextDetail) -> Result<(), SynthesisError> {
        self.pipeline.enqueue(detail)
    }

    /// Queue synthesis for a detail of the shown page. Unknown ids are ignored.
    pub fn generate(&mut self, editor: &CanvasEditor, id: &DetailId) -> Result<(), SynthesisError> {
        match editor.details().find(id) {
            Some(detail) => self.pipeline.enqueue(detail),
            None => Ok(()),
        }
    }

    /// Queue every detail of the shown page. Returns how many had no text.
    pub fn generate_all(&mut self, editor: &CanvasEditor) -> usize {
        let details = editor.details().snapshot();
        details
            .iter()
            .filter(|detail| self.pipeline.enqueue(detail).is_err())
            .count()
    }

    /// Replace a translation. The old narration no longer matches it.
    pub fn edit_translation(&mut self, editor: &mut CanvasEditor, index: usize, text: String) -> bool {
        if let Some(detail) = editor.details().get(index) {
            let id = detail.id.clone();
            self.pipeline.cancel(&id);
        }
        editor.update_detail(index, |d| {
            d.translated_text = text;
            d.clear_audio();
        })
    }

    pub fn detail_removed(&mut self, id: &DetailId) {
        self.pipeline.cancel(id);
    }

    /// Forget all synthesis, for a project switch.
    pub fn cancel_all(&mut self) {
        self.pipeline.cancel_all();
    }

    /// Apply finished clips. Returns the failures.
    pub fn poll(
        &mut self,
        editor: &mut CanvasEditor,
        mut store: Option<&mut ProjectStore>,
        now: Instant,
    ) -> Vec<(DetailId, SynthesisError)> {
        let Some(folder) = store.as_deref().map(|s| s.folder().to_path_buf()) else {
            return Vec::new();
        };
        let outcomes = {
            let details = editor.details();
            let store = store.as_deref();
            self.pipeline.poll(&folder, |id| {
                details.find(id).is_some() || store.is_some_and(|s| s.contains_detail(id))
            })
        };

        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                AudioOutcome::Ready {
                    id,
                    reference,
                    duration_seconds,
                } => {
                    let apply = |d: &mut TextDetail| {
                        d.audio_reference = Some(reference.clone());
                        d.audio_duration_seconds = Some(duration_seconds);
                    };
                    // Details of other pages are patched in the project directly.
                    if !editor.update_detail_by_id(&id, apply) {
                        if let Some(store) = store.as_deref_mut() {
                            store.update_detail(&id, apply, now);
                        }
                    }
                }
                AudioOutcome::Failed { id, error } => failures.push((id, error)),
            }
        }
        editor.set_scanning(self.pipeline.active_ids().clone());
        failures
    }
}
