// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Pan and zoom state of the canvas.
//!
//! The viewport owns the affine transform from canvas object space to
//! screen space. Mutations only raise a render request; the frame loop
//! takes the request once, so several mutations in one frame coalesce.

use super::events::{CanvasEvent, EventBus};
use crate::config::CanvasConfig;
use crate::util::geometry::{fit_placement, ImageRect, Point};

/// Changes smaller than this are treated as no change.
pub const ZOOM_EPSILON: f64 = 1e-3;

/// Scale plus translation, mapping object space to screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl ViewportTransform {
    pub const IDENTITY: ViewportTransform = ViewportTransform {
        scale: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.translate_x,
            p.y * self.scale + self.translate_y,
        )
    }

    pub fn to_object(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.translate_x) / self.scale,
            (p.y - self.translate_y) / self.scale,
        )
    }
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Viewport controller.
#[derive(Debug)]
pub struct Viewport {
    transform: ViewportTransform,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
    toolbar_reserve: f64,
    surface: (f64, f64),
    render_requested: bool,
    bus: EventBus,
}

impl Viewport {
    pub fn new(config: &CanvasConfig, bus: EventBus) -> Self {
        let config = config.clone().sanitized();
        let mut viewport = Self {
            transform: ViewportTransform::IDENTITY,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_step: config.zoom_step,
            toolbar_reserve: config.toolbar_reserve,
            surface: (0.0, 0.0),
            render_requested: false,
            bus,
        };
        viewport.transform = viewport.rest_transform();
        viewport
    }

    /// The transform a view reset returns to: no translation, unit zoom
    /// clamped into the zoom bounds.
    fn rest_transform(&self) -> ViewportTransform {
        ViewportTransform {
            scale: 1.0_f64.clamp(self.min_zoom, self.max_zoom),
            ..ViewportTransform::IDENTITY
        }
    }

    /// Whether no pan or zoom happened since the last reset.
    pub fn is_at_rest(&self) -> bool {
        self.transform == self.rest_transform()
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn zoom(&self) -> f64 {
        self.transform.scale
    }

    pub fn zoom_bounds(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    pub fn surface_size(&self) -> (f64, f64) {
        self.surface
    }

    /// Record the drawable surface size. Returns true when it changed.
    pub fn set_surface_size(&mut self, width: f64, height: f64) -> bool {
        if (self.surface.0 - width).abs() < 0.5 && (self.surface.1 - height).abs() < 0.5 {
            return false;
        }
        self.surface = (width, height);
        self.request_render();
        true
    }

    /// Screen position to canvas object space.
    pub fn screen_to_object(&self, p: Point) -> Point {
        self.transform.to_object(p)
    }

    /// Zoom to `target`, keeping `pivot` (screen space) fixed.
    ///
    /// The target is clamped to the zoom bounds; a change below
    /// [`ZOOM_EPSILON`] is ignored. Returns true when the zoom changed.
    pub fn set_zoom(&mut self, target: f64, pivot: Option<Point>) -> bool {
        if !target.is_finite() {
            return false;
        }
        let clamped = target.clamp(self.min_zoom, self.max_zoom);
        if (clamped - self.transform.scale).abs() < ZOOM_EPSILON {
            return false;
        }

        let pivot = pivot.unwrap_or_else(|| self.center());
        let anchor = self.transform.to_object(pivot);
        self.transform = ViewportTransform {
            scale: clamped,
            translate_x: pivot.x - anchor.x * clamped,
            translate_y: pivot.y - anchor.y * clamped,
        };

        self.request_render();
        self.bus.publish(CanvasEvent::ZoomChanged { level: clamped });
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.transform.scale + self.zoom_step, None)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.transform.scale - self.zoom_step, None)
    }

    /// Zoom by a wheel delta around the pointer.
    pub fn wheel(&mut self, delta_y: f64, pointer: Point) -> bool {
        let target = self.transform.scale * 0.999_f64.powf(delta_y);
        self.set_zoom(target, Some(pointer))
    }

    /// Shift the view by a screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        self.transform.translate_x += dx;
        self.transform.translate_y += dy;
        self.request_render();
        self.bus.publish(CanvasEvent::Panned { dx, dy });
    }

    /// Reset the transform and compute the fit placement for an image of
    /// `ow x oh` pixels. The caller stores the placement.
    pub fn reset_to_fit(&mut self, ow: f64, oh: f64) -> ImageRect {
        let rest = self.rest_transform();
        let zoom_changed = (rest.scale - self.transform.scale).abs() >= ZOOM_EPSILON;
        self.transform = rest;
        self.request_render();
        if zoom_changed {
            self.bus.publish(CanvasEvent::ZoomChanged { level: rest.scale });
        }
        self.fit_placement(ow, oh)
    }

    /// Fit placement for the current surface size, without touching the transform.
    pub fn fit_placement(&self, ow: f64, oh: f64) -> ImageRect {
        fit_placement(self.surface.0, self.surface.1, self.toolbar_reserve, ow, oh)
    }

    fn center(&self) -> Point {
        Point::new(self.surface.0 / 2.0, self.surface.1 / 2.0)
    }

    pub fn request_render(&mut self) {
        self.render_requested = true;
    }

    /// Take the pending render request, clearing it.
    pub fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;

    fn viewport() -> (Viewport, Receiver<CanvasEvent>) {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut vp = Viewport::new(&CanvasConfig::default(), bus);
        vp.set_surface_size(1000.0, 800.0);
        (vp, rx)
    }

    #[test]
    fn test_zoom_is_clamped() {
        let (mut vp, _rx) = viewport();
        for target in [-5.0, 0.0, 0.05, 3.0, 19.99, 25.0, 1e9] {
            vp.set_zoom(target, None);
            let (min, max) = vp.zoom_bounds();
            assert!(vp.zoom() >= min && vp.zoom() <= max, "zoom {}", vp.zoom());
        }
    }

    #[test]
    fn test_unchanged_zoom_emits_nothing() {
        let (mut vp, rx) = viewport();
        assert!(vp.set_zoom(2.0, None));
        assert_eq!(rx.try_recv().unwrap(), CanvasEvent::ZoomChanged { level: 2.0 });

        assert!(!vp.set_zoom(2.0005, None));
        assert!(!vp.set_zoom(2.0, None));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_zoom_keeps_pivot_fixed() {
        let (mut vp, _rx) = viewport();
        vp.pan(37.0, -12.0);
        let pivot = Point::new(300.0, 200.0);
        let before = vp.screen_to_object(pivot);

        vp.set_zoom(3.5, Some(pivot));
        let after = vp.screen_to_object(pivot);

        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_without_pivot_uses_center() {
        let (mut vp, _rx) = viewport();
        let center = Point::new(500.0, 400.0);
        let before = vp.screen_to_object(center);
        vp.zoom_in();
        let after = vp.screen_to_object(center);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((vp.zoom() - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_pan_accumulates_translation() {
        let (mut vp, rx) = viewport();
        vp.pan(10.0, 5.0);
        vp.pan(-4.0, 1.0);
        let t = vp.transform();
        assert_eq!((t.translate_x, t.translate_y), (6.0, 6.0));
        assert_eq!(t.scale, 1.0);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_render_requests_coalesce() {
        let (mut vp, _rx) = viewport();
        vp.take_render_request();
        vp.pan(1.0, 1.0);
        vp.set_zoom(2.0, None);
        vp.pan(1.0, 1.0);
        assert!(vp.take_render_request());
        assert!(!vp.take_render_request());
    }

    #[test]
    fn test_reset_to_fit_restores_identity() {
        let (mut vp, _rx) = viewport();
        let initial = vp.fit_placement(2000.0, 3000.0);
        vp.set_zoom(4.0, Some(Point::new(10.0, 10.0)));
        vp.pan(-300.0, 120.0);

        let placement = vp.reset_to_fit(2000.0, 3000.0);
        assert_eq!(vp.transform(), ViewportTransform::IDENTITY);
        assert_eq!(placement, initial);
    }

    #[test]
    fn test_reset_at_unit_zoom_is_silent() {
        let (mut vp, rx) = viewport();
        vp.pan(20.0, 0.0);
        rx.try_iter().count();

        vp.reset_to_fit(100.0, 100.0);
        assert!(vp.is_at_rest());
        assert!(rx.try_recv().is_err());

        vp.set_zoom(3.0, None);
        rx.try_iter().count();
        vp.reset_to_fit(100.0, 100.0);
        assert_eq!(rx.try_recv().unwrap(), CanvasEvent::ZoomChanged { level: 1.0 });
    }

    #[test]
    fn test_reset_respects_zoom_bounds() {
        let config = CanvasConfig {
            min_zoom: 2.0,
            max_zoom: 8.0,
            ..CanvasConfig::default()
        };
        let mut vp = Viewport::new(&config, EventBus::new());
        vp.set_surface_size(1000.0, 800.0);
        assert_eq!(vp.zoom(), 2.0);

        vp.set_zoom(5.0, None);
        vp.reset_to_fit(100.0, 100.0);
        assert_eq!(vp.zoom(), 2.0);
        assert!(vp.is_at_rest());
    }

    #[test]
    fn test_non_finite_bounds_do_not_panic() {
        let config = CanvasConfig {
            min_zoom: f64::NAN,
            max_zoom: f64::NAN,
            zoom_step: f64::INFINITY,
            ..CanvasConfig::default()
        };
        let mut vp = Viewport::new(&config, EventBus::new());
        vp.set_surface_size(1000.0, 800.0);
        assert!(vp.set_zoom(2.0, None));
        assert_eq!(vp.zoom(), 2.0);
        vp.zoom_in();
        assert!(vp.zoom().is_finite());
        assert_eq!(vp.zoom_bounds(), (0.1, 20.0));
    }

    #[test]
    fn test_transform_roundtrip() {
        let t = ViewportTransform {
            scale: 2.5,
            translate_x: -40.0,
            translate_y: 13.0,
        };
        let p = Point::new(123.0, -7.5);
        let back = t.to_object(t.to_screen(p));
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
    }
}
