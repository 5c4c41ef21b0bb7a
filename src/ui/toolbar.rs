// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar with interaction modes, history, zoom, compare and playback controls.

use crate::canvas::interaction::ModeToggles;

/// Result of toolbar interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolbarAction {
    None,
    Undo,
    Redo,
    ZoomIn,
    ZoomOut,
    SetZoom(f64),
    ResetView,
    ToggleCompare,
    SetCompareSplit(f64),
    PlayPage,
    PlayAll,
    SkipCue,
    StopPlayback,
}

/// State the toolbar displays.
pub struct ToolbarState {
    pub zoom: f64,
    pub zoom_bounds: (f64, f64),
    pub can_undo: bool,
    pub can_redo: bool,
    pub has_image: bool,
    /// The shown page has a processed image loaded.
    pub has_processed: bool,
    pub comparing: bool,
    pub compare_split: f64,
    /// One-based cue and playlist length while narration plays.
    pub playback: Option<(usize, usize)>,
}

/// Display the toolbar. Mode toggles are edited in place.
pub fn show(ui: &mut egui::Ui, toggles: &mut ModeToggles, state: &ToolbarState) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;
        ui.add_enabled_ui(state.has_image, |ui| {
            if ui
                .selectable_label(toggles.waiting_region, "▭ New Region")
                .on_hover_text("Drag to draw a region (or hold Shift)")
                .clicked()
            {
                toggles.waiting_region = !toggles.waiting_region;
                if toggles.waiting_region {
                    toggles.brush = false;
                }
            }
            if ui
                .selectable_label(toggles.brush, "🖌 Reorder Brush")
                .on_hover_text("Paint over regions to move them to the front")
                .clicked()
            {
                toggles.brush = !toggles.brush;
                if toggles.brush {
                    toggles.waiting_region = false;
                }
            }

            ui.separator();

            if ui
                .add_enabled(state.can_undo, egui::Button::new("↶"))
                .on_hover_text("Undo (Ctrl+Z)")
                .clicked()
            {
                action = ToolbarAction::Undo;
            }
            if ui
                .add_enabled(state.can_redo, egui::Button::new("↷"))
                .on_hover_text("Redo (Ctrl+Shift+Z)")
                .clicked()
            {
                action = ToolbarAction::Redo;
            }

            ui.separator();

            if ui.button("−").clicked() {
                action = ToolbarAction::ZoomOut;
            }
            let mut percent = state.zoom * 100.0;
            let (min, max) = state.zoom_bounds;
            let slider = egui::Slider::new(&mut percent, min * 100.0..=max * 100.0)
                .logarithmic(true)
                .suffix("%")
                .max_decimals(0);
            if ui.add(slider).changed() {
                action = ToolbarAction::SetZoom(percent / 100.0);
            }
            if ui.button("+").clicked() {
                action = ToolbarAction::ZoomIn;
            }
            if ui.button("Fit").on_hover_text("Reset view").clicked() {
                action = ToolbarAction::ResetView;
            }

            ui.separator();

            if ui
                .add_enabled(
                    state.has_processed,
                    egui::SelectableLabel::new(state.comparing, "◧ Compare"),
                )
                .on_hover_text("Show the processed page beside the source")
                .on_disabled_hover_text("No processed image for this page")
                .clicked()
            {
                action = ToolbarAction::ToggleCompare;
            }
            if state.comparing {
                let mut split = state.compare_split * 100.0;
                let slider = egui::Slider::new(&mut split, 0.0..=100.0)
                    .suffix("%")
                    .max_decimals(0)
                    .show_value(false);
                if ui.add(slider).on_hover_text("Divider position").changed() {
                    action = ToolbarAction::SetCompareSplit(split / 100.0);
                }
            }
        });

        ui.separator();

        match state.playback {
            Some((cue, total)) => {
                if ui.button("⏹").on_hover_text("Stop narration").clicked() {
                    action = ToolbarAction::StopPlayback;
                }
                if ui.button("⏭").on_hover_text("Next region").clicked() {
                    action = ToolbarAction::SkipCue;
                }
                ui.label(format!("{}/{}", cue, total));
            }
            None => {
                if ui
                    .add_enabled(state.has_image, egui::Button::new("▶ Page"))
                    .on_hover_text("Narrate this page in reading order")
                    .clicked()
                {
                    action = ToolbarAction::PlayPage;
                }
                if ui
                    .button("▶ All")
                    .on_hover_text("Narrate every page of the folder")
                    .clicked()
                {
                    action = ToolbarAction::PlayAll;
                }
            }
        }

        ui.separator();

        let hint = if toggles.waiting_region {
            "Drag on the page to mark a new text region"
        } else if toggles.brush {
            "Paint over regions in the order they should be read"
        } else {
            "Right-drag or Alt+drag to pan, wheel to zoom, right-click for options"
        };
        ui.label(egui::RichText::new(hint).italics().weak());
    });

    action
}
