// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides the coordinate transformations between original
//! image pixels and canvas object space, plus the standard "fit" placement
//! of an image inside the drawable surface.

use crate::models::detail::BoundingBox;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in canvas object space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corner points, in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Placement of the background image within the drawable surface.
///
/// `(x, y)` is the top-left corner in canvas object space, `(w, h)` the
/// displayed size and `(ow, oh)` the original pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub ow: f64,
    pub oh: f64,
}

impl ImageRect {
    /// The placement used before any image is loaded.
    pub const ZERO: ImageRect = ImageRect {
        x: 0.0,
        y: 0.0,
        w: 0.0,
        h: 0.0,
        ow: 0.0,
        oh: 0.0,
    };

    /// True once an image has been placed with a visible size.
    pub fn is_placed(&self) -> bool {
        self.w > 0.0 && self.h > 0.0 && self.ow > 0.0 && self.oh > 0.0
    }

    /// Displayed bounds in canvas object space.
    pub fn bounds(&self) -> CanvasRect {
        CanvasRect::new(self.x, self.y, self.w, self.h)
    }

    /// Uniform display scale (displayed / original).
    pub fn scale(&self) -> f64 {
        if self.ow > 0.0 {
            self.w / self.ow
        } else {
            0.0
        }
    }
}

/// Reasons a coordinate conversion cannot produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("no image is placed on the canvas")]
    ImageNotPlaced,
    #[error("rectangle has no area ({width}x{height})")]
    EmptyRect { width: f64, height: f64 },
    #[error("rectangle does not overlap the image")]
    NoOverlap,
}

/// Compute the standard fit placement of an image of `ow x oh` pixels.
///
/// The available area is the surface minus `reserve_bottom` (the toolbar
/// strip). The image is never upscaled and is centered in the area.
pub fn fit_placement(
    surface_width: f64,
    surface_height: f64,
    reserve_bottom: f64,
    ow: f64,
    oh: f64,
) -> ImageRect {
    let available_height = (surface_height - reserve_bottom).max(0.0);
    if ow <= 0.0 || oh <= 0.0 || surface_width <= 0.0 || available_height <= 0.0 {
        return ImageRect {
            ow: ow.max(0.0),
            oh: oh.max(0.0),
            ..ImageRect::ZERO
        };
    }

    let scale = (surface_width / ow).min(available_height / oh).min(1.0);
    let w = ow * scale;
    let h = oh * scale;

    ImageRect {
        x: (surface_width - w) / 2.0,
        y: (available_height - h) / 2.0,
        w,
        h,
        ow,
        oh,
    }
}

/// Convert a point in original image pixels to canvas object space.
pub fn image_point_to_canvas(point: Point, image: &ImageRect) -> Option<Point> {
    if image.ow <= 0.0 || image.oh <= 0.0 {
        return None;
    }
    Some(Point {
        x: image.x + point.x * (image.w / image.ow),
        y: image.y + point.y * (image.h / image.oh),
    })
}

/// Convert an image-space bounding box to a canvas rectangle.
///
/// Returns `None` before an image is loaded; callers skip the overlay.
pub fn image_to_canvas(bbox: &BoundingBox, image: &ImageRect) -> Option<CanvasRect> {
    let min = image_point_to_canvas(Point::new(bbox.min_x, bbox.min_y), image)?;
    let max = image_point_to_canvas(Point::new(bbox.max_x, bbox.max_y), image)?;
    Some(CanvasRect::new(min.x, min.y, max.x - min.x, max.y - min.y))
}

/// Convert a canvas rectangle to an image-space bounding box.
///
/// `image` must be the image object's current placement. The result is
/// clamped into `[0, ow] x [0, oh]`.
pub fn try_canvas_to_image(
    rect: &CanvasRect,
    image: &ImageRect,
) -> Result<BoundingBox, GeometryError> {
    if !rect.has_area() {
        return Err(GeometryError::EmptyRect {
            width: rect.width,
            height: rect.height,
        });
    }
    if !image.is_placed() {
        return Err(GeometryError::ImageNotPlaced);
    }

    let sx = image.ow / image.w;
    let sy = image.oh / image.h;

    let min_x = ((rect.left - image.x) * sx).clamp(0.0, image.ow);
    let min_y = ((rect.top - image.y) * sy).clamp(0.0, image.oh);
    let max_x = ((rect.right() - image.x) * sx).clamp(0.0, image.ow);
    let max_y = ((rect.bottom() - image.y) * sy).clamp(0.0, image.oh);

    if max_x <= min_x || max_y <= min_y {
        return Err(GeometryError::NoOverlap);
    }

    Ok(BoundingBox {
        min_x,
        min_y,
        max_x,
        max_y,
    })
}

/// Like [`try_canvas_to_image`], with the error recovered as `None`.
pub fn canvas_to_image(rect: &CanvasRect, image: &ImageRect) -> Option<BoundingBox> {
    match try_canvas_to_image(rect, image) {
        Ok(bbox) => Some(bbox),
        Err(e) => {
            log::debug!("canvas_to_image skipped: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed() -> ImageRect {
        fit_placement(1200.0, 855.0, 55.0, 1600.0, 2400.0)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_fit_placement_is_uniform_and_centered() {
        let rect = placed();
        assert!(close(rect.w / rect.ow, rect.h / rect.oh));
        assert!(close(rect.h, 800.0));
        assert!(close(rect.x, (1200.0 - rect.w) / 2.0));
        assert!(close(rect.y, 0.0));
    }

    #[test]
    fn test_fit_placement_never_upscales() {
        let rect = fit_placement(2000.0, 2000.0, 55.0, 400.0, 300.0);
        assert!(close(rect.w, 400.0));
        assert!(close(rect.h, 300.0));
        assert!(close(rect.x, 800.0));
    }

    #[test]
    fn test_image_canvas_roundtrip() {
        let rect = placed();
        let bbox = BoundingBox {
            min_x: 120.5,
            min_y: 33.0,
            max_x: 900.25,
            max_y: 2100.0,
        };

        let canvas = image_to_canvas(&bbox, &rect).unwrap();
        let back = canvas_to_image(&canvas, &rect).unwrap();

        assert!((back.min_x - bbox.min_x).abs() < 1e-6);
        assert!((back.min_y - bbox.min_y).abs() < 1e-6);
        assert!((back.max_x - bbox.max_x).abs() < 1e-6);
        assert!((back.max_y - bbox.max_y).abs() < 1e-6);
    }

    #[test]
    fn test_image_to_canvas_without_image() {
        let bbox = BoundingBox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 10.0,
            max_y: 10.0,
        };
        assert!(image_to_canvas(&bbox, &ImageRect::ZERO).is_none());
    }

    #[test]
    fn test_canvas_to_image_clamps_to_image_bounds() {
        let rect = placed();
        let oversized = CanvasRect::new(rect.x - 50.0, rect.y - 50.0, rect.w + 500.0, rect.h + 500.0);

        let bbox = canvas_to_image(&oversized, &rect).unwrap();
        assert_eq!(bbox.min_x, 0.0);
        assert_eq!(bbox.min_y, 0.0);
        assert_eq!(bbox.max_x, rect.ow);
        assert_eq!(bbox.max_y, rect.oh);
    }

    #[test]
    fn test_canvas_to_image_rejects_empty_and_outside() {
        let rect = placed();
        let empty = CanvasRect::new(rect.x + 10.0, rect.y + 10.0, 0.0, 40.0);
        assert!(matches!(
            try_canvas_to_image(&empty, &rect),
            Err(GeometryError::EmptyRect { .. })
        ));

        let outside = CanvasRect::new(rect.x + rect.w + 10.0, rect.y, 30.0, 30.0);
        assert_eq!(
            try_canvas_to_image(&outside, &rect),
            Err(GeometryError::NoOverlap)
        );

        let any = CanvasRect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(
            try_canvas_to_image(&any, &ImageRect::ZERO),
            Err(GeometryError::ImageNotPlaced)
        );
    }

    #[test]
    fn test_rect_from_corners_any_order() {
        let r = CanvasRect::from_corners(Point::new(160.0, 180.0), Point::new(100.0, 100.0));
        assert_eq!(r, CanvasRect::new(100.0, 100.0, 60.0, 80.0));
        assert!(r.contains(Point::new(100.0, 180.0)));
        assert!(!r.contains(Point::new(99.9, 150.0)));
    }
}
