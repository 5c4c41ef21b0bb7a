// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The annotation canvas as one unit.
//!
//! `CanvasEditor` wires the viewport, the session, the interaction modes
//! and the detail list together. Every detail write goes through here so
//! that a change triggers a region rebuild, a history capture and a dirty
//! flag for persistence exactly once.

use super::events::{CanvasEvent, EventBus};
use super::interaction::{
    Interaction, InteractionMode, InteractionOutcome, ModeToggles, PointerEvent,
};
use super::session::{CanvasSession, ImageSource};
use super::shapes::{DrawCommand, PendingId};
use super::viewport::{Viewport, ViewportTransform};
use crate::config::AppConfig;
use crate::models::detail::{DetailId, TextDetail};
use crate::models::detail_list::DetailList;
use crate::models::history::DetailHistory;
use crate::util::geometry::{try_canvas_to_image, ImageRect, Point};
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Canvas editor state.
#[derive(Debug)]
pub struct CanvasEditor {
    bus: EventBus,
    viewport: Viewport,
    session: CanvasSession,
    interaction: Interaction,
    details: DetailList,
    history: DetailHistory,
    image: Option<ImageSource>,
    toolbar_reserve: f64,
    observed_revision: u64,
    dirty: bool,
}

impl CanvasEditor {
    pub fn new(config: &AppConfig) -> Self {
        let bus = EventBus::new();
        let details = DetailList::default();
        let mut history = DetailHistory::new(
            config.history.max_size,
            Duration::from_millis(config.history.debounce_ms),
        );
        history.reset(details.snapshot());

        Self {
            viewport: Viewport::new(&config.canvas, bus.clone()),
            session: CanvasSession::new(),
            interaction: Interaction::new(&config.canvas),
            observed_revision: details.revision(),
            details,
            history,
            image: None,
            toolbar_reserve: config.canvas.toolbar_reserve,
            dirty: false,
            bus,
        }
    }

    pub fn subscribe(&self) -> Receiver<CanvasEvent> {
        self.bus.subscribe()
    }

    pub fn details(&self) -> &DetailList {
        &self.details
    }

    pub fn image(&self) -> Option<ImageSource> {
        self.image
    }

    pub fn image_rect(&self) -> ImageRect {
        self.session.image_rect()
    }

    pub fn session(&self) -> &CanvasSession {
        &self.session
    }

    pub fn transform(&self) -> ViewportTransform {
        self.viewport.transform()
    }

    pub fn zoom(&self) -> f64 {
        self.viewport.zoom()
    }

    pub fn zoom_bounds(&self) -> (f64, f64) {
        self.viewport.zoom_bounds()
    }

    /// No history capture or region rebuild is waiting.
    pub fn is_settled(&self) -> bool {
        self.history.is_settled() && !self.session.has_queued_regions()
    }

    pub fn mode(&self) -> InteractionMode {
        self.interaction.mode()
    }

    pub fn toggles(&self) -> ModeToggles {
        self.interaction.toggles
    }

    pub fn set_toggles(&mut self, toggles: ModeToggles) {
        self.interaction.toggles = toggles;
    }

    /// Record the drawable surface size. Before any pan or zoom the image
    /// follows the surface; afterwards only a view reset moves it.
    pub fn set_surface_size(&mut self, width: f64, height: f64) {
        if !self.viewport.set_surface_size(width, height) {
            return;
        }
        let Some(source) = self.image else {
            return;
        };
        if self.viewport.is_at_rest() {
            let placement = self
                .viewport
                .fit_placement(source.width as f64, source.height as f64);
            self.session.set_placement(placement);
            self.session.request_regions(self.details.snapshot());
        }
    }

    /// Show a new page with its saved details.
    pub fn load_image(&mut self, source: ImageSource, details: Vec<TextDetail>) -> ImageRect {
        self.interaction.cancel(&mut self.session);
        self.viewport
            .reset_to_fit(source.width as f64, source.height as f64);
        let rect = self
            .session
            .load_image(source, self.viewport.surface_size(), self.toolbar_reserve);
        self.image = Some(source);

        self.details.replace(details);
        self.history.reset(self.details.snapshot());
        self.observed_revision = self.details.revision();
        self.dirty = false;
        self.session.request_regions(self.details.snapshot());
        rect
    }

    /// Remove the page and every overlay.
    pub fn clear(&mut self) {
        self.interaction.cancel(&mut self.session);
        self.session.clear();
        self.image = None;
        self.details.replace(Vec::new());
        self.history.reset(self.details.snapshot());
        self.observed_revision = self.details.revision();
        self.dirty = false;
    }

    /// Replace every detail.
    pub fn replace_details(&mut self, details: Vec<TextDetail>) {
        self.details.replace(details);
        self.sync_details();
    }

    pub fn update_detail<F>(&mut self, index: usize, mutator: F) -> bool
    where
        F: FnOnce(&mut TextDetail),
    {
        let changed = self.details.update(index, mutator);
        self.sync_details();
        changed
    }

    pub fn update_detail_by_id<F>(&mut self, id: &DetailId, mutator: F) -> bool
    where
        F: FnOnce(&mut TextDetail),
    {
        let changed = self.details.update_by_id(id, mutator);
        self.sync_details();
        changed
    }

    pub fn delete_detail(&mut self, index: usize) -> Option<TextDetail> {
        let removed = self.details.delete(index);
        self.sync_details();
        removed
    }

    /// Note a detail write: queue a rebuild, feed history, mark dirty.
    fn sync_details(&mut self) {
        if self.details.revision() == self.observed_revision {
            return;
        }
        self.observed_revision = self.details.revision();
        self.history.observe(&self.details, Instant::now());
        self.session.request_regions(self.details.snapshot());
        self.dirty = true;
    }

    /// Take the latest list if it changed since the last call.
    pub fn take_dirty(&mut self) -> Option<Arc<Vec<TextDetail>>> {
        std::mem::take(&mut self.dirty).then(|| self.details.snapshot())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let restored = self.history.undo(&mut self.details);
        self.sync_details();
        restored
    }

    pub fn redo(&mut self) -> bool {
        let restored = self.history.redo(&mut self.details);
        self.sync_details();
        restored
    }

    pub fn pointer_down(&mut self, event: PointerEvent) -> bool {
        self.interaction
            .pointer_down(event, &self.viewport, &mut self.session)
    }

    pub fn pointer_move(&mut self, screen: Point) {
        self.interaction
            .pointer_move(screen, &mut self.viewport, &mut self.session);
    }

    /// Resolve the active gesture. Context menus and reorders are published
    /// on the bus; the outcome is returned as well.
    pub fn pointer_up(&mut self, event: PointerEvent) -> InteractionOutcome {
        let outcome = self
            .interaction
            .pointer_up(event, &self.viewport, &mut self.session);

        match &outcome {
            InteractionOutcome::ContextMenu { screen, hit } => {
                self.bus.publish(CanvasEvent::ContextMenuRequested {
                    screen: *screen,
                    hit: hit.clone(),
                });
            }
            InteractionOutcome::Reordered(hits) => {
                if self.details.reorder_hits_first(hits) {
                    self.sync_details();
                    let order = self.details.items().iter().map(|d| d.id.clone()).collect();
                    log::info!("Reordered {} painted regions to the front", hits.len());
                    self.bus.publish(CanvasEvent::RegionsReordered { order });
                }
            }
            InteractionOutcome::RegionDrawn(_) | InteractionOutcome::None => {}
        }
        outcome
    }

    /// Abandon the active gesture.
    pub fn cancel_gesture(&mut self) {
        self.interaction.cancel(&mut self.session);
    }

    pub fn wheel(&mut self, delta_y: f64, pointer: Point) -> bool {
        self.viewport.wheel(delta_y, pointer)
    }

    pub fn zoom_in(&mut self) -> bool {
        self.viewport.zoom_in()
    }

    pub fn zoom_out(&mut self) -> bool {
        self.viewport.zoom_out()
    }

    pub fn set_zoom(&mut self, level: f64) -> bool {
        self.viewport.set_zoom(level, None)
    }

    /// Identity transform and load-time placement.
    pub fn reset_to_fit(&mut self) {
        let Some(source) = self.image else {
            return;
        };
        let placement = self
            .viewport
            .reset_to_fit(source.width as f64, source.height as f64);
        self.session.set_placement(placement);
        self.session.request_regions(self.details.snapshot());
    }

    /// Turn a pending region into a new empty detail at its image geometry.
    pub fn accept_pending(&mut self, id: PendingId) -> Result<DetailId> {
        let pending = self
            .session
            .pending_regions()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("no pending region {:?}", id))?;
        let bbox = try_canvas_to_image(&pending.rect, &self.session.image_rect())
            .context("drawn region cannot be mapped onto the page")?;
        self.session.remove_pending(id);

        let detail = TextDetail::manual(bbox);
        let detail_id = detail.id.clone();
        self.details.push(detail);
        self.sync_details();
        log::info!("Accepted drawn region as detail {}", detail_id);
        Ok(detail_id)
    }

    pub fn discard_pending(&mut self, id: PendingId) -> bool {
        self.session.remove_pending(id).is_some()
    }

    /// Details whose markers show the scan animation.
    pub fn set_scanning(&mut self, ids: HashSet<DetailId>) {
        self.session.set_scanning(ids);
    }

    /// Once per frame: settle history, run a queued region rebuild and
    /// advance animations. Returns true while something animates.
    pub fn tick(&mut self, dt: f64, now: Instant) -> bool {
        self.history.poll(now);
        self.session.flush_regions();
        self.session.tick(dt)
    }

    /// Whether anything asked for a redraw since the last call.
    pub fn take_render_request(&mut self) -> bool {
        let viewport = self.viewport.take_render_request();
        let session = self.session.take_render_request();
        viewport || session
    }

    pub fn display_list(&self) -> Vec<DrawCommand> {
        self.session.display_list()
    }
}
