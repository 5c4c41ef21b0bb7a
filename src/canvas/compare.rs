// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Side-by-side view of the source page and the service's processed page.
//!
//! Both images share the page placement. A vertical divider, positioned as
//! a fraction of the surface width, shows the source on its left and the
//! processed image on its right.

use crate::util::geometry::CanvasRect;

const DEFAULT_SPLIT: f64 = 0.5;

/// Compare toggle and divider position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareView {
    enabled: bool,
    split: f64,
}

impl Default for CompareView {
    fn default() -> Self {
        Self {
            enabled: false,
            split: DEFAULT_SPLIT,
        }
    }
}

/// Screen areas of the two halves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparePanes {
    pub original: Option<CanvasRect>,
    pub processed: Option<CanvasRect>,
    pub divider_x: f64,
}

impl CompareView {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flip the view. The divider returns to the middle.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.split = DEFAULT_SPLIT;
        self.enabled
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn split(&self) -> f64 {
        self.split
    }

    pub fn set_split(&mut self, split: f64) {
        if split.is_finite() {
            self.split = split.clamp(0.0, 1.0);
        }
    }

    /// Split `image` (screen space) at the divider of a surface
    /// `surface_width` wide. The divider never leaves the image.
    pub fn panes(&self, image: &CanvasRect, surface_width: f64) -> ComparePanes {
        let divider_x = (surface_width * self.split).clamp(image.left, image.right().max(image.left));
        let left = divider_x - image.left;
        let right = image.right() - divider_x;

        let original = (left > 0.0).then(|| CanvasRect::new(image.left, image.top, left, image.height));
        let processed = (right > 0.0).then(|| CanvasRect::new(divider_x, image.top, right, image.height));
        ComparePanes {
            original,
            processed,
            divider_x,
        }
    }
}
