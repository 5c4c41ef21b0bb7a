// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Detail properties panel.
//!
//! Lists the details of the current page in reading order with their
//! translated text, voice and audio state, plus the hand-drawn regions
//! waiting to be accepted.

use crate::canvas::shapes::PendingId;
use crate::models::detail::{DetailId, TextDetail};
use crate::util::geometry::CanvasRect;
use std::collections::HashSet;

/// Voices offered in the voice picker: (voice name, label). The empty name
/// means the configured default voice.
pub const VOICES: &[(&str, &str)] = &[
    ("", "Default"),
    ("zh-CN-XiaoxiaoNeural", "Xiaoxiao (F)"),
    ("zh-CN-XiaomeiNeural", "Xiaomei (F)"),
    ("zh-CN-XiaoyiNeural", "Xiaoyi (F)"),
    ("zh-CN-YunhaoNeural", "Yunhao (M)"),
    ("zh-CN-YunfengNeural", "Yunfeng (M)"),
    ("zh-CN-YunxiNeural", "Yunxi (M)"),
];

/// Result of properties panel interaction.
#[derive(Debug, PartialEq)]
pub enum PropertiesAction {
    None,
    SelectDetail(usize),
    EditTranslation(usize, String),
    SetVoice(usize, Option<String>),
    GenerateAudio(DetailId),
    GenerateAll,
    DeleteDetail(usize),
    AcceptPending(PendingId),
    DiscardPending(PendingId),
}

fn voice_label(voice: Option<&str>) -> &'static str {
    let voice = voice.unwrap_or("");
    VOICES
        .iter()
        .find(|(name, _)| *name == voice)
        .map(|(_, label)| *label)
        .unwrap_or("Custom")
}

/// Action of a translation field this frame. A typed edit wins over the
/// focus change that came with it; the app selects the edited detail too.
fn translation_action(
    index: usize,
    text: String,
    changed: bool,
    gained_focus: bool,
) -> Option<PropertiesAction> {
    if changed {
        Some(PropertiesAction::EditTranslation(index, text))
    } else if gained_focus {
        Some(PropertiesAction::SelectDetail(index))
    } else {
        None
    }
}

/// Display the properties panel.
pub fn show(
    ui: &mut egui::Ui,
    details: &[TextDetail],
    selected: Option<usize>,
    generating: &HashSet<DetailId>,
    pending: &[(PendingId, CanvasRect)],
) -> PropertiesAction {
    let mut action = PropertiesAction::None;

    ui.horizontal(|ui| {
        ui.heading("Details");
        ui.label(egui::RichText::new(format!("{}", details.len())).weak());
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui
                .add_enabled(!details.is_empty(), egui::Button::new("🔊 All"))
                .on_hover_text("Generate audio for every detail")
                .clicked()
            {
                action = PropertiesAction::GenerateAll;
            }
        });
    });
    ui.separator();

    if !pending.is_empty() {
        ui.label(egui::RichText::new("Drawn regions").strong());
        for (id, rect) in pending {
            ui.horizontal(|ui| {
                ui.label(format!("{:.0}×{:.0}", rect.width, rect.height));
                if ui.small_button("Accept").clicked() {
                    action = PropertiesAction::AcceptPending(*id);
                }
                if ui.small_button("Discard").clicked() {
                    action = PropertiesAction::DiscardPending(*id);
                }
            });
        }
        ui.separator();
    }

    if details.is_empty() {
        ui.label(egui::RichText::new("No text regions on this page").weak());
        return action;
    }

    egui::ScrollArea::vertical().show(ui, |ui| {
        for (index, detail) in details.iter().enumerate() {
            let is_selected = selected == Some(index);
            let frame = egui::Frame::group(ui.style()).fill(if is_selected {
                ui.visuals().selection.bg_fill.linear_multiply(0.3)
            } else {
                egui::Color32::TRANSPARENT
            });

            frame.show(ui, |ui| {
                ui.horizontal(|ui| {
                    if ui
                        .selectable_label(is_selected, format!("#{}", index + 1))
                        .clicked()
                    {
                        action = PropertiesAction::SelectDetail(index);
                    }
                    let audio = if generating.contains(&detail.id) {
                        "⏳ generating".to_string()
                    } else {
                        match detail.audio_duration_seconds {
                            Some(seconds) => format!("🔊 {:.1}s", seconds),
                            None => "no audio".to_string(),
                        }
                    };
                    ui.label(egui::RichText::new(audio).weak());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("🗑").on_hover_text("Delete").clicked() {
                            action = PropertiesAction::DeleteDetail(index);
                        }
                        if ui
                            .small_button("🔊")
                            .on_hover_text("Generate audio")
                            .clicked()
                        {
                            action = PropertiesAction::GenerateAudio(detail.id.clone());
                        }
                    });
                });

                if !detail.original_text.is_empty() {
                    egui::CollapsingHeader::new("Original")
                        .id_source(("original", detail.id.as_str()))
                        .show(ui, |ui| {
                            ui.label(&detail.original_text);
                        });
                }

                let mut text = detail.translated_text.clone();
                let edit = ui.add(
                    egui::TextEdit::multiline(&mut text)
                        .id_source(("translation", detail.id.as_str()))
                        .desired_rows(2)
                        .desired_width(f32::INFINITY)
                        .hint_text("Translation"),
                );
                if let Some(edited) =
                    translation_action(index, text, edit.changed(), edit.gained_focus())
                {
                    action = edited;
                }

                let current = detail.voice_role.as_deref();
                egui::ComboBox::from_id_source(("voice", detail.id.as_str()))
                    .selected_text(voice_label(current))
                    .show_ui(ui, |ui| {
                        for (name, label) in VOICES {
                            let chosen = current.unwrap_or("") == *name;
                            if ui.selectable_label(chosen, *label).clicked() && !chosen {
                                let voice = (!name.is_empty()).then(|| name.to_string());
                                action = PropertiesAction::SetVoice(index, voice);
                            }
                        }
                    });
            });
        }
    });

    action
}
