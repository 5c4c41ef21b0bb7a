// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawing canvas for page display and region annotation.
//!
//! This module feeds egui pointer input into the canvas editor and paints
//! the page texture plus the editor's display list through the viewport
//! transform. In compare mode the processed page fills the area right of
//! the divider.

use crate::canvas::compare::CompareView;
use crate::canvas::editor::CanvasEditor;
use crate::canvas::interaction::{
    InteractionMode, InteractionOutcome, Modifiers, PointerButton, PointerEvent,
};
use crate::canvas::shapes::{DrawCommand, Rgba, TextAnchor};
use crate::canvas::viewport::ViewportTransform;
use crate::util::geometry::{CanvasRect, Point};
use std::time::Instant;

/// Result of one canvas frame.
pub struct CanvasFrame {
    /// Screen rectangle of the canvas.
    pub rect: egui::Rect,
    /// Gestures resolved this frame.
    pub outcomes: Vec<InteractionOutcome>,
}

/// Display the canvas and handle pointer interaction. `compare` carries the
/// processed page texture when one is loaded.
pub fn show(
    ui: &mut egui::Ui,
    editor: &mut CanvasEditor,
    texture: Option<&egui::TextureHandle>,
    compare: Option<(&egui::TextureHandle, &CompareView)>,
) -> CanvasFrame {
    let available = ui.available_size();
    let (response, painter) = ui.allocate_painter(available, egui::Sense::click_and_drag());
    let rect = response.rect;
    editor.set_surface_size(rect.width() as f64, rect.height() as f64);

    painter.rect_filled(rect, 0.0, egui::Color32::from_gray(40));

    let outcomes = if texture.is_some() {
        handle_input(ui, editor, rect, response.hovered())
    } else {
        Vec::new()
    };

    match texture.filter(|_| editor.session().background().is_some()) {
        Some(texture) => {
            if response.hovered() {
                ui.ctx().set_cursor_icon(cursor_for(editor.mode()));
            }
            let transform = editor.transform();
            let image = to_screen_rect(&transform, rect.min, &editor.image_rect().bounds());
            match compare.filter(|(_, view)| view.is_enabled()) {
                Some((processed, view)) => paint_compare(&painter, rect, image, texture, processed, view),
                None => paint_texture(&painter, image, texture),
            }
            for command in editor.display_list() {
                paint(&painter, &transform, rect.min, &command);
            }
        }
        None => {
            painter.text(
                rect.center() - egui::vec2(0.0, 20.0),
                egui::Align2::CENTER_CENTER,
                "Mangavox",
                egui::FontId::proportional(32.0),
                egui::Color32::from_gray(200),
            );
            painter.text(
                rect.center() + egui::vec2(0.0, 20.0),
                egui::Align2::CENTER_CENTER,
                "File → Open Folder... to start translating",
                egui::FontId::proportional(14.0),
                egui::Color32::from_gray(150),
            );
        }
    }

    CanvasFrame { rect, outcomes }
}

/// Forward this frame's pointer events to the editor.
fn handle_input(
    ui: &egui::Ui,
    editor: &mut CanvasEditor,
    rect: egui::Rect,
    hovered: bool,
) -> Vec<InteractionOutcome> {
    let now = Instant::now();
    let local = |pos: egui::Pos2| Point::new((pos.x - rect.min.x) as f64, (pos.y - rect.min.y) as f64);
    let (events, scroll, hover) = ui.input(|i| (i.events.clone(), i.raw_scroll_delta, i.pointer.hover_pos()));

    let mut outcomes = Vec::new();
    for event in events {
        match event {
            egui::Event::PointerButton {
                pos,
                button,
                pressed,
                modifiers,
            } => {
                let Some(button) = map_button(button) else {
                    continue;
                };
                let pointer = PointerEvent {
                    screen: local(pos),
                    button,
                    modifiers: Modifiers {
                        alt: modifiers.alt,
                        shift: modifiers.shift,
                    },
                    at: now,
                };
                // Popups and menus above the canvas own presses on their area.
                let on_canvas = hovered
                    && rect.contains(pos)
                    && ui
                        .ctx()
                        .layer_id_at(pos)
                        .map_or(true, |layer| layer == ui.layer_id());
                let gesture_active = editor.mode() != InteractionMode::Idle;
                match route_button(pressed, on_canvas, gesture_active) {
                    ButtonRoute::Press => {
                        editor.pointer_down(pointer);
                    }
                    ButtonRoute::Release => outcomes.push(editor.pointer_up(pointer)),
                    ButtonRoute::Ignore => {}
                }
            }
            egui::Event::PointerMoved(pos) => editor.pointer_move(local(pos)),
            _ => {}
        }
    }

    if hovered && scroll.y != 0.0 {
        if let Some(pos) = hover {
            // Wheel up zooms in.
            editor.wheel(-scroll.y as f64, local(pos));
        }
    }

    outcomes.retain(|o| *o != InteractionOutcome::None);
    outcomes
}

/// Where a button event goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonRoute {
    Press,
    Release,
    Ignore,
}

/// Presses start gestures only on the uncovered canvas; releases only
/// resolve a gesture that is in flight, wherever the pointer ended up.
fn route_button(pressed: bool, on_canvas: bool, gesture_active: bool) -> ButtonRoute {
    match (pressed, on_canvas, gesture_active) {
        (true, true, _) => ButtonRoute::Press,
        (false, _, true) => ButtonRoute::Release,
        _ => ButtonRoute::Ignore,
    }
}

fn paint_texture(painter: &egui::Painter, image: egui::Rect, texture: &egui::TextureHandle) {
    painter.image(
        texture.id(),
        image,
        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        egui::Color32::WHITE,
    );
}

/// Source left of the divider, processed page right of it.
fn paint_compare(
    painter: &egui::Painter,
    canvas: egui::Rect,
    image: egui::Rect,
    original: &egui::TextureHandle,
    processed: &egui::TextureHandle,
    view: &CompareView,
) {
    let local = CanvasRect::new(
        (image.min.x - canvas.min.x) as f64,
        (image.min.y - canvas.min.y) as f64,
        image.width() as f64,
        image.height() as f64,
    );
    let panes = view.panes(&local, canvas.width() as f64);
    let to_screen = |pane: CanvasRect| {
        egui::Rect::from_min_size(
            canvas.min + egui::vec2(pane.left as f32, pane.top as f32),
            egui::vec2(pane.width as f32, pane.height as f32),
        )
    };

    for (pane, texture) in [(panes.original, original), (panes.processed, processed)] {
        if let Some(pane) = pane {
            let clip = to_screen(pane).intersect(painter.clip_rect());
            paint_texture(&painter.with_clip_rect(clip), image, texture);
        }
    }

    let x = canvas.min.x + panes.divider_x as f32;
    painter.line_segment(
        [egui::pos2(x, image.min.y), egui::pos2(x, image.max.y)],
        egui::Stroke::new(2.0, egui::Color32::WHITE),
    );
}

fn cursor_for(mode: InteractionMode) -> egui::CursorIcon {
    match mode {
        InteractionMode::Idle => egui::CursorIcon::Default,
        InteractionMode::Panning => egui::CursorIcon::Grabbing,
        InteractionMode::DrawingRegion => egui::CursorIcon::Crosshair,
        InteractionMode::GestureSelecting => egui::CursorIcon::PointingHand,
    }
}

fn map_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

fn color(c: Rgba) -> egui::Color32 {
    let [r, g, b, a] = c.0;
    egui::Color32::from_rgba_unmultiplied(r, g, b, a)
}

fn to_screen(transform: &ViewportTransform, origin: egui::Pos2, p: Point) -> egui::Pos2 {
    let s = transform.to_screen(p);
    origin + egui::vec2(s.x as f32, s.y as f32)
}

fn to_screen_rect(transform: &ViewportTransform, origin: egui::Pos2, r: &CanvasRect) -> egui::Rect {
    egui::Rect::from_min_max(
        to_screen(transform, origin, Point::new(r.left, r.top)),
        to_screen(transform, origin, Point::new(r.right(), r.bottom())),
    )
}

/// Paint one display-list command. Sizes scale with the zoom.
fn paint(
    painter: &egui::Painter,
    transform: &ViewportTransform,
    origin: egui::Pos2,
    command: &DrawCommand,
) {
    let scale = transform.scale as f32;
    match command {
        DrawCommand::FillRect { rect, color: c } => {
            painter.rect_filled(to_screen_rect(transform, origin, rect), 0.0, color(*c));
        }
        DrawCommand::StrokeRect {
            rect,
            width,
            color: c,
        } => {
            painter.rect_stroke(
                to_screen_rect(transform, origin, rect),
                0.0,
                egui::Stroke::new(*width as f32 * scale, color(*c)),
            );
        }
        DrawCommand::FillCircle {
            center,
            radius,
            color: c,
        } => {
            painter.circle_filled(
                to_screen(transform, origin, *center),
                *radius as f32 * scale,
                color(*c),
            );
        }
        DrawCommand::Text {
            pos,
            anchor,
            size,
            color: c,
            text,
        } => {
            let align = match anchor {
                TextAnchor::Center => egui::Align2::CENTER_CENTER,
                TextAnchor::LeftCenter => egui::Align2::LEFT_CENTER,
            };
            painter.text(
                to_screen(transform, origin, *pos),
                align,
                text,
                egui::FontId::proportional(*size as f32 * scale),
                color(*c),
            );
        }
        DrawCommand::ScanBand {
            rect,
            x,
            half_width,
            color: c,
        } => {
            let clip = to_screen_rect(transform, origin, rect);
            let band = CanvasRect::new(x - half_width, rect.top, half_width * 2.0, rect.height);
            painter
                .with_clip_rect(clip.intersect(painter.clip_rect()))
                .rect_filled(to_screen_rect(transform, origin, &band), 0.0, color(*c));
        }
        DrawCommand::Polyline {
            points,
            width,
            color: c,
        } => {
            let points = points
                .iter()
                .map(|p| to_screen(transform, origin, *p))
                .collect();
            painter.add(egui::Shape::line(
                points,
                egui::Stroke::new(*width as f32 * scale, color(*c)),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_under_popup_is_ignored() {
        assert_eq!(route_button(true, false, false), ButtonRoute::Ignore);
        assert_eq!(route_button(true, true, false), ButtonRoute::Press);
    }

    #[test]
    fn test_release_without_gesture_is_ignored() {
        // A click on a menu item releases over the canvas with nothing in flight.
        assert_eq!(route_button(false, true, false), ButtonRoute::Ignore);
        assert_eq!(route_button(false, false, false), ButtonRoute::Ignore);
    }

    #[test]
    fn test_release_off_canvas_ends_gesture() {
        assert_eq!(route_button(false, false, true), ButtonRoute::Release);
        assert_eq!(route_button(false, true, true), ButtonRoute::Release);
    }
}
