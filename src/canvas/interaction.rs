// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Pointer interaction state machine.
//!
//! Exactly one of pan, draw-new-region and gesture-select can be active.
//! Pointer-down picks the mode, pointer-move drives it and pointer-up
//! resolves it and always returns the machine to idle.

use super::events::ShapeHit;
use super::session::CanvasSession;
use super::shapes::PendingId;
use super::viewport::Viewport;
use crate::config::CanvasConfig;
use crate::models::detail::{BoundingBox, DetailId};
use crate::util::geometry::{canvas_to_image, CanvasRect, Point};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub alt: bool,
    pub shift: bool,
}

/// A press or release in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub screen: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
    pub at: Instant,
}

/// User-selected modes that change what a primary press does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeToggles {
    /// Next primary press draws a new region.
    pub waiting_region: bool,
    /// Primary presses paint over regions to reorder them.
    pub brush: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum InteractionState {
    Idle,
    Panning {
        button: PointerButton,
        last: Point,
        pressed_at: Instant,
        moved: bool,
    },
    DrawingRegion {
        /// Press position in canvas object space.
        origin: Point,
    },
    GestureSelecting {
        hits: Vec<DetailId>,
    },
}

/// Which mode is active, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    Idle,
    Panning,
    DrawingRegion,
    GestureSelecting,
}

/// A kept hand-drawn region.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnRegion {
    pub pending_id: PendingId,
    pub canvas: CanvasRect,
    /// Image-pixel geometry, absent when the region misses the image.
    pub image: Option<BoundingBox>,
}

/// What a pointer-up resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    None,
    ContextMenu {
        screen: Point,
        hit: Option<ShapeHit>,
    },
    RegionDrawn(DrawnRegion),
    /// Details painted by the brush, in first-hit order.
    Reordered(Vec<DetailId>),
}

/// Interaction controller.
#[derive(Debug)]
pub struct Interaction {
    state: InteractionState,
    pub toggles: ModeToggles,
    min_region_size: f64,
    context_menu_threshold: Duration,
}

impl Interaction {
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            state: InteractionState::Idle,
            toggles: ModeToggles::default(),
            min_region_size: config.min_region_size,
            context_menu_threshold: Duration::from_millis(config.context_menu_ms),
        }
    }

    pub fn mode(&self) -> InteractionMode {
        match self.state {
            InteractionState::Idle => InteractionMode::Idle,
            InteractionState::Panning { .. } => InteractionMode::Panning,
            InteractionState::DrawingRegion { .. } => InteractionMode::DrawingRegion,
            InteractionState::GestureSelecting { .. } => InteractionMode::GestureSelecting,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == InteractionState::Idle
    }

    /// Start a gesture. Returns false when one is already in flight or the
    /// press does not start any mode.
    pub fn pointer_down(
        &mut self,
        event: PointerEvent,
        viewport: &Viewport,
        session: &mut CanvasSession,
    ) -> bool {
        if !self.is_idle() {
            log::debug!("Ignoring press while {:?} is active", self.mode());
            return false;
        }

        let primary = event.button == PointerButton::Primary;
        let pans = event.button == PointerButton::Secondary || (primary && event.modifiers.alt);

        self.state = if pans {
            InteractionState::Panning {
                button: event.button,
                last: event.screen,
                pressed_at: event.at,
                moved: false,
            }
        } else if primary && (self.toggles.waiting_region || event.modifiers.shift) {
            let origin = viewport.screen_to_object(event.screen);
            session.begin_draft(origin);
            InteractionState::DrawingRegion { origin }
        } else if primary && self.toggles.brush {
            let mut hits = Vec::new();
            record_hits(&mut hits, viewport.screen_to_object(event.screen), session);
            session.push_brush_point(viewport.screen_to_object(event.screen));
            InteractionState::GestureSelecting { hits }
        } else {
            return false;
        };
        true
    }

    pub fn pointer_move(
        &mut self,
        screen: Point,
        viewport: &mut Viewport,
        session: &mut CanvasSession,
    ) {
        match &mut self.state {
            InteractionState::Idle => {}
            InteractionState::Panning { last, moved, .. } => {
                let (dx, dy) = (screen.x - last.x, screen.y - last.y);
                if dx != 0.0 || dy != 0.0 {
                    *moved = true;
                    *last = screen;
                    viewport.pan(dx, dy);
                }
            }
            InteractionState::DrawingRegion { origin } => {
                let current = viewport.screen_to_object(screen);
                session.update_draft(CanvasRect::from_corners(*origin, current));
            }
            InteractionState::GestureSelecting { hits } => {
                let point = viewport.screen_to_object(screen);
                session.push_brush_point(point);
                record_hits(hits, point, session);
            }
        }
    }

    /// Resolve the active gesture and return to idle.
    pub fn pointer_up(
        &mut self,
        event: PointerEvent,
        viewport: &Viewport,
        session: &mut CanvasSession,
    ) -> InteractionOutcome {
        let state = std::mem::replace(&mut self.state, InteractionState::Idle);
        match state {
            InteractionState::Idle => InteractionOutcome::None,
            InteractionState::Panning {
                button,
                pressed_at,
                moved,
                ..
            } => {
                let held = event.at.saturating_duration_since(pressed_at);
                if button == PointerButton::Secondary
                    && !moved
                    && held < self.context_menu_threshold
                {
                    let hit = session.hit_test(viewport.screen_to_object(event.screen));
                    InteractionOutcome::ContextMenu {
                        screen: event.screen,
                        hit,
                    }
                } else {
                    InteractionOutcome::None
                }
            }
            InteractionState::DrawingRegion { origin } => {
                let current = viewport.screen_to_object(event.screen);
                session.update_draft(CanvasRect::from_corners(origin, current));
                match session.finish_draft(self.min_region_size) {
                    Some(pending) => {
                        let image = canvas_to_image(&pending.rect, &session.image_rect());
                        log::info!(
                            "Drew region {:?} at {:.1},{:.1} {:.1}x{:.1}",
                            pending.id,
                            pending.rect.left,
                            pending.rect.top,
                            pending.rect.width,
                            pending.rect.height
                        );
                        InteractionOutcome::RegionDrawn(DrawnRegion {
                            pending_id: pending.id,
                            canvas: pending.rect,
                            image,
                        })
                    }
                    None => InteractionOutcome::None,
                }
            }
            InteractionState::GestureSelecting { hits } => {
                session.clear_brush_path();
                session.clear_highlights();
                if hits.is_empty() {
                    InteractionOutcome::None
                } else {
                    InteractionOutcome::Reordered(hits)
                }
            }
        }
    }

    /// Abandon the active gesture without resolving it.
    pub fn cancel(&mut self, session: &mut CanvasSession) {
        match std::mem::replace(&mut self.state, InteractionState::Idle) {
            InteractionState::DrawingRegion { .. } => session.cancel_draft(),
            InteractionState::GestureSelecting { .. } => {
                session.clear_brush_path();
                session.clear_highlights();
            }
            _ => {}
        }
    }
}

fn record_hits(hits: &mut Vec<DetailId>, point: Point, session: &mut CanvasSession) {
    for id in session.markers_at(point) {
        if !hits.contains(&id) {
            session.set_highlight(&id, true);
            hits.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::events::EventBus;
    use crate::canvas::session::ImageSource;
    use crate::canvas::shapes::ShapeKind;
    use crate::models::detail::TextDetail;

    struct Rig {
        interaction: Interaction,
        viewport: Viewport,
        session: CanvasSession,
        start: Instant,
    }

    impl Rig {
        fn new() -> Self {
            let config = CanvasConfig::default();
            let mut viewport = Viewport::new(&config, EventBus::new());
            viewport.set_surface_size(1000.0, 855.0);
            let mut session = CanvasSession::new();
            session.load_image(
                ImageSource {
                    width: 1000,
                    height: 800,
                },
                viewport.surface_size(),
                config.toolbar_reserve,
            );
            Self {
                interaction: Interaction::new(&config),
                viewport,
                session,
                start: Instant::now(),
            }
        }

        fn event(&self, x: f64, y: f64, button: PointerButton, ms: u64) -> PointerEvent {
            PointerEvent {
                screen: Point::new(x, y),
                button,
                modifiers: Modifiers::default(),
                at: self.start + Duration::from_millis(ms),
            }
        }

        fn drag(
            &mut self,
            from: (f64, f64),
            to: (f64, f64),
            button: PointerButton,
            modifiers: Modifiers,
        ) -> InteractionOutcome {
            let mut down = self.event(from.0, from.1, button, 0);
            down.modifiers = modifiers;
            self.interaction
                .pointer_down(down, &self.viewport, &mut self.session);
            self.interaction
                .pointer_move(Point::new(to.0, to.1), &mut self.viewport, &mut self.session);
            let up = self.event(to.0, to.1, button, 400);
            self.interaction
                .pointer_up(up, &self.viewport, &mut self.session)
        }
    }

    fn shift() -> Modifiers {
        Modifiers {
            shift: true,
            alt: false,
        }
    }

    #[test]
    fn test_tiny_region_is_discarded() {
        let mut rig = Rig::new();
        let outcome = rig.drag(
            (100.0, 100.0),
            (105.0, 103.0),
            PointerButton::Primary,
            shift(),
        );
        assert_eq!(outcome, InteractionOutcome::None);
        assert_eq!(rig.session.count(ShapeKind::PendingRegion), 0);
        assert!(rig.interaction.is_idle());
    }

    #[test]
    fn test_region_keeps_canvas_geometry() {
        let mut rig = Rig::new();
        let outcome = rig.drag(
            (100.0, 100.0),
            (160.0, 180.0),
            PointerButton::Primary,
            shift(),
        );
        let InteractionOutcome::RegionDrawn(region) = outcome else {
            panic!("expected a drawn region, got {:?}", outcome);
        };
        assert_eq!(region.canvas, CanvasRect::new(100.0, 100.0, 60.0, 80.0));
        assert!(region.image.is_some());
        assert_eq!(rig.session.count(ShapeKind::PendingRegion), 1);
    }

    #[test]
    fn test_waiting_mode_draws_without_shift() {
        let mut rig = Rig::new();
        rig.interaction.toggles.waiting_region = true;
        let outcome = rig.drag(
            (160.0, 180.0),
            (100.0, 100.0),
            PointerButton::Primary,
            Modifiers::default(),
        );
        assert!(matches!(outcome, InteractionOutcome::RegionDrawn(_)));
    }

    #[test]
    fn test_secondary_drag_pans() {
        let mut rig = Rig::new();
        let outcome = rig.drag(
            (10.0, 10.0),
            (40.0, 25.0),
            PointerButton::Secondary,
            Modifiers::default(),
        );
        assert_eq!(outcome, InteractionOutcome::None);
        let t = rig.viewport.transform();
        assert_eq!((t.translate_x, t.translate_y), (30.0, 15.0));
    }

    #[test]
    fn test_alt_primary_pans() {
        let mut rig = Rig::new();
        rig.drag(
            (10.0, 10.0),
            (0.0, 0.0),
            PointerButton::Primary,
            Modifiers {
                alt: true,
                shift: false,
            },
        );
        assert_eq!(rig.viewport.transform().translate_x, -10.0);
    }

    #[test]
    fn test_quick_secondary_click_requests_context_menu() {
        let mut rig = Rig::new();
        let down = rig.event(50.0, 60.0, PointerButton::Secondary, 0);
        assert!(rig
            .interaction
            .pointer_down(down, &rig.viewport, &mut rig.session));
        let up = rig.event(50.0, 60.0, PointerButton::Secondary, 100);
        let outcome = rig.interaction.pointer_up(up, &rig.viewport, &mut rig.session);
        assert_eq!(
            outcome,
            InteractionOutcome::ContextMenu {
                screen: Point::new(50.0, 60.0),
                hit: None,
            }
        );
    }

    #[test]
    fn test_long_secondary_press_is_not_a_menu() {
        let mut rig = Rig::new();
        let down = rig.event(50.0, 60.0, PointerButton::Secondary, 0);
        rig.interaction
            .pointer_down(down, &rig.viewport, &mut rig.session);
        let up = rig.event(50.0, 60.0, PointerButton::Secondary, 300);
        assert_eq!(
            rig.interaction.pointer_up(up, &rig.viewport, &mut rig.session),
            InteractionOutcome::None
        );
    }

    #[test]
    fn test_brush_records_hits_once_in_order() {
        let mut rig = Rig::new();
        let image = rig.session.image_rect();
        let scale = image.scale();
        let details: Vec<TextDetail> = (0..3)
            .map(|i| {
                let x = 100.0 + i as f64 * 200.0;
                TextDetail::new(
                    String::new(),
                    String::new(),
                    BoundingBox {
                        min_x: x,
                        min_y: 100.0,
                        max_x: x + 100.0,
                        max_y: 200.0,
                    },
                )
            })
            .collect();
        rig.session.render_regions(&details);
        rig.interaction.toggles.brush = true;

        let at = |i: usize| {
            Point::new(
                image.x + (150.0 + i as f64 * 200.0) * scale,
                image.y + 150.0 * scale,
            )
        };
        let down = rig.event(at(2).x, at(2).y, PointerButton::Primary, 0);
        rig.interaction
            .pointer_down(down, &rig.viewport, &mut rig.session);
        for point in [at(0), at(2), at(0)] {
            rig.interaction
                .pointer_move(point, &mut rig.viewport, &mut rig.session);
        }
        let up = rig.event(at(0).x, at(0).y, PointerButton::Primary, 500);
        let outcome = rig.interaction.pointer_up(up, &rig.viewport, &mut rig.session);

        assert_eq!(
            outcome,
            InteractionOutcome::Reordered(vec![details[2].id.clone(), details[0].id.clone()])
        );
        assert!(rig
            .session
            .display_list()
            .iter()
            .all(|c| !matches!(c, crate::canvas::shapes::DrawCommand::Polyline { .. })));
    }

    #[test]
    fn test_no_second_gesture_while_active() {
        let mut rig = Rig::new();
        let down = rig.event(0.0, 0.0, PointerButton::Secondary, 0);
        assert!(rig
            .interaction
            .pointer_down(down, &rig.viewport, &mut rig.session));
        let mut second = rig.event(0.0, 0.0, PointerButton::Primary, 10);
        second.modifiers = shift();
        assert!(!rig
            .interaction
            .pointer_down(second, &rig.viewport, &mut rig.session));
        assert_eq!(rig.interaction.mode(), InteractionMode::Panning);
    }

    #[test]
    fn test_plain_primary_starts_nothing() {
        let mut rig = Rig::new();
        let down = rig.event(0.0, 0.0, PointerButton::Primary, 0);
        assert!(!rig
            .interaction
            .pointer_down(down, &rig.viewport, &mut rig.session));
        assert!(rig.interaction.is_idle());
    }
}
