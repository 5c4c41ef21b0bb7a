// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawable shape variants placed over the page image.
//!
//! Shapes live in canvas object space and are disposable: they are rebuilt
//! from the detail list and the image placement whenever either changes.
//! Each variant renders itself into a display list of [`DrawCommand`]s that
//! the UI layer maps through the viewport transform.

use crate::models::detail::DetailId;
use crate::util::geometry::{CanvasRect, Point};

/// RGBA color, non-premultiplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba([r, g, b, 255])
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba([r, g, b, a])
    }
}

/// Marker outline at rest.
pub const MARKER_STROKE: Rgba = Rgba::rgb(0xEF, 0x44, 0x44);
/// Marker outline while painted over by the brush.
pub const MARKER_HIGHLIGHT: Rgba = Rgba::rgb(0x9C, 0xA3, 0xAF);
const MARKER_FILL: Rgba = Rgba::rgba(0, 0, 0, 102);
const BADGE_FILL: Rgba = Rgba::rgb(128, 128, 128);
/// Default accent of a pending region.
pub const PENDING_ACCENT: Rgba = Rgba::rgb(0x00, 0x7B, 0xFF);
const PENDING_FILL: Rgba = Rgba::rgba(0, 123, 255, 26);
const SCAN_BAND: Rgba = Rgba::rgba(255, 255, 255, 128);

const STROKE_WIDTH: f64 = 2.0;
const BADGE_RADIUS: f64 = 14.0;
const LABEL_SIZE: f64 = 14.0;
const SCAN_HALF_WIDTH: f64 = 10.0;

/// Discriminant of a shape variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    RegionMarker,
    Badge,
    PendingRegion,
}

/// Identity of a pending region placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(pub u64);

/// Scan-line sweep advanced by the session's animation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanAnimation {
    /// Progress through the current sweep, `0.0..1.0`.
    progress: f64,
}

impl ScanAnimation {
    /// Duration of one sweep in seconds.
    pub const PERIOD: f64 = 1.0;

    pub fn new() -> Self {
        Self { progress: 0.0 }
    }

    /// Advance by `dt` seconds, wrapping at the end of a sweep.
    pub fn advance(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.progress = (self.progress + dt / Self::PERIOD).fract();
    }

    /// Horizontal offset of the scan line relative to the shape's center,
    /// from `-width` to `+width` with ease-in-out.
    pub fn offset(&self, width: f64) -> f64 {
        let p = self.progress;
        let eased = if p < 0.5 {
            2.0 * p * p
        } else {
            1.0 - (-2.0 * p + 2.0).powi(2) / 2.0
        };
        -width + width * 2.0 * eased
    }
}

impl Default for ScanAnimation {
    fn default() -> Self {
        Self::new()
    }
}

/// Text alignment for [`DrawCommand::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    LeftCenter,
    Center,
}

/// One primitive drawing operation in canvas object space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        rect: CanvasRect,
        color: Rgba,
    },
    StrokeRect {
        rect: CanvasRect,
        width: f64,
        color: Rgba,
    },
    FillCircle {
        center: Point,
        radius: f64,
        color: Rgba,
    },
    Text {
        pos: Point,
        anchor: TextAnchor,
        size: f64,
        color: Rgba,
        text: String,
    },
    /// A soft vertical band centered at `x`, clipped to `rect`.
    ScanBand {
        rect: CanvasRect,
        x: f64,
        half_width: f64,
        color: Rgba,
    },
    Polyline {
        points: Vec<Point>,
        width: f64,
        color: Rgba,
    },
}

/// Outline of a detected text region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMarker {
    pub rect: CanvasRect,
    pub detail_id: DetailId,
    pub highlighted: bool,
    pub scan: Option<ScanAnimation>,
}

/// Numbered circle at a region's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub rect: CanvasRect,
    pub detail_id: DetailId,
    pub number: usize,
}

/// Placeholder for a hand-drawn region awaiting recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRegion {
    pub id: PendingId,
    pub rect: CanvasRect,
    pub label: String,
    pub accent: Rgba,
    pub scan: ScanAnimation,
}

/// A drawable shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    RegionMarker(RegionMarker),
    Badge(Badge),
    PendingRegion(PendingRegion),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::RegionMarker(_) => ShapeKind::RegionMarker,
            Shape::Badge(_) => ShapeKind::Badge,
            Shape::PendingRegion(_) => ShapeKind::PendingRegion,
        }
    }

    /// Geometry in canvas object space.
    pub fn geometry(&self) -> CanvasRect {
        match self {
            Shape::RegionMarker(m) => m.rect,
            Shape::Badge(b) => b.rect,
            Shape::PendingRegion(p) => p.rect,
        }
    }

    /// Detail behind a region marker or badge.
    pub fn detail_id(&self) -> Option<&DetailId> {
        match self {
            Shape::RegionMarker(m) => Some(&m.detail_id),
            Shape::Badge(b) => Some(&b.detail_id),
            Shape::PendingRegion(_) => None,
        }
    }

    /// Containment test in canvas object space.
    pub fn contains(&self, point: Point) -> bool {
        self.geometry().contains(point)
    }

    /// Advance any running animation. Returns true when the shape is animated.
    pub fn advance(&mut self, dt: f64) -> bool {
        match self {
            Shape::RegionMarker(RegionMarker {
                scan: Some(scan), ..
            }) => {
                scan.advance(dt);
                true
            }
            Shape::PendingRegion(p) => {
                p.scan.advance(dt);
                true
            }
            _ => false,
        }
    }

    /// Append this shape's drawing operations to `out`.
    pub fn render(&self, out: &mut Vec<DrawCommand>) {
        match self {
            Shape::RegionMarker(marker) => render_marker(marker, out),
            Shape::Badge(badge) => render_badge(badge, out),
            Shape::PendingRegion(pending) => render_pending(pending, out),
        }
    }
}

fn render_marker(marker: &RegionMarker, out: &mut Vec<DrawCommand>) {
    let rect = marker.rect;
    let stroke = if marker.highlighted {
        MARKER_HIGHLIGHT
    } else {
        MARKER_STROKE
    };

    out.push(DrawCommand::FillRect {
        rect,
        color: MARKER_FILL,
    });
    out.push(DrawCommand::StrokeRect {
        rect,
        width: STROKE_WIDTH,
        color: stroke,
    });
    if let Some(scan) = &marker.scan {
        push_scan(rect, scan, out);
    }
}

fn render_badge(badge: &Badge, out: &mut Vec<DrawCommand>) {
    let center = Point::new(badge.rect.left, badge.rect.top);
    out.push(DrawCommand::FillCircle {
        center,
        radius: BADGE_RADIUS,
        color: BADGE_FILL,
    });
    out.push(DrawCommand::Text {
        pos: center,
        anchor: TextAnchor::Center,
        size: LABEL_SIZE,
        color: Rgba::WHITE,
        text: badge.number.to_string(),
    });
}

fn render_pending(pending: &PendingRegion, out: &mut Vec<DrawCommand>) {
    let rect = pending.rect;
    out.push(DrawCommand::FillRect {
        rect,
        color: PENDING_FILL,
    });
    out.push(DrawCommand::StrokeRect {
        rect,
        width: STROKE_WIDTH,
        color: pending.accent,
    });
    if !pending.label.is_empty() {
        out.push(DrawCommand::Text {
            pos: Point::new(rect.left + 2.0, rect.top + 10.0),
            anchor: TextAnchor::LeftCenter,
            size: LABEL_SIZE,
            color: Rgba::BLACK,
            text: pending.label.clone(),
        });
    }
    push_scan(rect, &pending.scan, out);
}

fn push_scan(rect: CanvasRect, scan: &ScanAnimation, out: &mut Vec<DrawCommand>) {
    if !rect.has_area() {
        return;
    }
    let center = rect.left + rect.width / 2.0;
    out.push(DrawCommand::ScanBand {
        rect,
        x: center + scan.offset(rect.width),
        half_width: SCAN_HALF_WIDTH,
        color: SCAN_BAND,
    });
}
