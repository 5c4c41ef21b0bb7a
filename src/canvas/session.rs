// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The drawable surface: background image placement plus overlay shapes.
//!
//! The session is the only owner of the [`ImageRect`]. Region markers and
//! badges are derived from the detail list and rebuilt on demand; pending
//! regions and the in-progress draft are owned here directly.

use super::events::ShapeHit;
use super::shapes::{
    Badge, DrawCommand, PendingId, PendingRegion, RegionMarker, Rgba, ScanAnimation, Shape,
    ShapeKind, PENDING_ACCENT,
};
use crate::models::detail::{DetailId, TextDetail};
use crate::util::geometry::{fit_placement, image_to_canvas, CanvasRect, ImageRect, Point};
use std::collections::HashSet;
use std::sync::Arc;

const BRUSH_COLOR: Rgba = Rgba::rgba(244, 114, 182, 230);
const BRUSH_WIDTH: f64 = 3.0;

/// Label shown on pending region placeholders.
pub const PENDING_LABEL: &str = "OCR";

/// Native size of a background image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSource {
    pub width: u32,
    pub height: u32,
}

/// The background image object. Always locked and never selectable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Background {
    pub source: ImageSource,
    pub selectable: bool,
    pub locked: bool,
}

/// Canvas session.
#[derive(Debug, Default)]
pub struct CanvasSession {
    image_rect: ImageRect,
    background: Option<Background>,
    shapes: Vec<Shape>,
    draft: Option<PendingRegion>,
    brush_path: Vec<Point>,
    scanning: HashSet<DetailId>,
    queued_regions: Option<Arc<Vec<TextDetail>>>,
    next_pending: u64,
    render_requested: bool,
}

impl CanvasSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image_rect(&self) -> ImageRect {
        self.image_rect
    }

    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn count(&self, kind: ShapeKind) -> usize {
        self.shapes.iter().filter(|s| s.kind() == kind).count()
    }

    /// Clear everything and place a new background image at the fit placement.
    pub fn load_image(
        &mut self,
        source: ImageSource,
        surface: (f64, f64),
        toolbar_reserve: f64,
    ) -> ImageRect {
        self.clear();
        self.image_rect = fit_placement(
            surface.0,
            surface.1,
            toolbar_reserve,
            source.width as f64,
            source.height as f64,
        );
        self.background = Some(Background {
            source,
            selectable: false,
            locked: true,
        });
        log::info!(
            "Placed {}x{} image at ({:.1}, {:.1}) size {:.1}x{:.1}",
            source.width,
            source.height,
            self.image_rect.x,
            self.image_rect.y,
            self.image_rect.w,
            self.image_rect.h
        );
        self.image_rect
    }

    /// Move the background to a new placement (view reset, surface resize).
    ///
    /// Pending regions keep their position relative to the image.
    pub fn set_placement(&mut self, placement: ImageRect) {
        let old = self.image_rect;
        if old == placement {
            return;
        }
        if old.is_placed() && placement.is_placed() {
            let ratio = placement.w / old.w;
            for shape in &mut self.shapes {
                if let Shape::PendingRegion(p) = shape {
                    p.rect = CanvasRect::new(
                        placement.x + (p.rect.left - old.x) * ratio,
                        placement.y + (p.rect.top - old.y) * ratio,
                        p.rect.width * ratio,
                        p.rect.height * ratio,
                    );
                }
            }
        }
        self.image_rect = placement;
        self.render_requested = true;
    }

    /// Remove every shape and the background.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.draft = None;
        self.brush_path.clear();
        self.queued_regions = None;
        self.background = None;
        self.image_rect = ImageRect::ZERO;
        self.render_requested = true;
    }

    /// Rebuild region markers and badges from `details`.
    ///
    /// Idempotent. Nothing is added until an image is placed.
    pub fn render_regions(&mut self, details: &[TextDetail]) {
        self.shapes
            .retain(|s| !matches!(s.kind(), ShapeKind::RegionMarker | ShapeKind::Badge));

        if !self.image_rect.is_placed() {
            self.render_requested = true;
            return;
        }

        let mut added = Vec::with_capacity(details.len() * 2);
        for (index, detail) in details.iter().enumerate() {
            let Some(rect) = image_to_canvas(&detail.bounding_box, &self.image_rect) else {
                continue;
            };
            let scan = self
                .scanning
                .contains(&detail.id)
                .then(ScanAnimation::new);
            added.push(Shape::RegionMarker(RegionMarker {
                rect,
                detail_id: detail.id.clone(),
                highlighted: false,
                scan,
            }));
            added.push(Shape::Badge(Badge {
                rect,
                detail_id: detail.id.clone(),
                number: index + 1,
            }));
        }

        // Regions sit below pending placeholders.
        let pending = std::mem::take(&mut self.shapes);
        self.shapes = added;
        self.shapes.extend(pending);
        self.render_requested = true;
    }

    /// Queue a region rebuild. Requests made before the next
    /// [`flush_regions`](Self::flush_regions) collapse into the latest one.
    pub fn request_regions(&mut self, details: Arc<Vec<TextDetail>>) {
        self.queued_regions = Some(details);
    }

    /// Run the queued rebuild, if any. Returns true when one ran.
    pub fn flush_regions(&mut self) -> bool {
        let mut rebuilt = false;
        while let Some(details) = self.queued_regions.take() {
            self.render_regions(&details);
            rebuilt = true;
        }
        rebuilt
    }

    pub fn has_queued_regions(&self) -> bool {
        self.queued_regions.is_some()
    }

    /// Mark which details show the scan-line animation.
    pub fn set_scanning(&mut self, ids: HashSet<DetailId>) {
        if ids == self.scanning {
            return;
        }
        for shape in &mut self.shapes {
            if let Shape::RegionMarker(marker) = shape {
                let wanted = ids.contains(&marker.detail_id);
                match (wanted, marker.scan.is_some()) {
                    (true, false) => marker.scan = Some(ScanAnimation::new()),
                    (false, true) => marker.scan = None,
                    _ => {}
                }
            }
        }
        self.scanning = ids;
        self.render_requested = true;
    }

    /// Advance all animations by `dt` seconds. Returns true while any shape animates.
    pub fn tick(&mut self, dt: f64) -> bool {
        let mut animated = false;
        for shape in &mut self.shapes {
            animated |= shape.advance(dt);
        }
        if let Some(draft) = &mut self.draft {
            draft.scan.advance(dt);
            animated = true;
        }
        if animated {
            self.render_requested = true;
        }
        animated
    }

    /// Topmost shape under `point` (canvas object space).
    pub fn hit_test(&self, point: Point) -> Option<ShapeHit> {
        self.shapes
            .iter()
            .rev()
            .find(|s| s.contains(point))
            .map(|s| ShapeHit {
                kind: s.kind(),
                detail_id: s.detail_id().cloned(),
            })
    }

    /// Details whose region marker contains `point`, in stacking order.
    pub fn markers_at(&self, point: Point) -> Vec<DetailId> {
        self.shapes
            .iter()
            .filter_map(|s| match s {
                Shape::RegionMarker(m) if m.rect.contains(point) => Some(m.detail_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn set_highlight(&mut self, id: &DetailId, highlighted: bool) {
        for shape in &mut self.shapes {
            if let Shape::RegionMarker(m) = shape {
                if &m.detail_id == id && m.highlighted != highlighted {
                    m.highlighted = highlighted;
                    self.render_requested = true;
                }
            }
        }
    }

    pub fn clear_highlights(&mut self) {
        for shape in &mut self.shapes {
            if let Shape::RegionMarker(m) = shape {
                m.highlighted = false;
            }
        }
        self.render_requested = true;
    }

    /// Start a draft region at `start`.
    pub fn begin_draft(&mut self, start: Point) {
        self.draft = Some(PendingRegion {
            id: PendingId(0),
            rect: CanvasRect::new(start.x, start.y, 0.0, 0.0),
            label: PENDING_LABEL.to_string(),
            accent: PENDING_ACCENT,
            scan: ScanAnimation::new(),
        });
        self.render_requested = true;
    }

    pub fn update_draft(&mut self, rect: CanvasRect) {
        if let Some(draft) = &mut self.draft {
            draft.rect = rect;
            self.render_requested = true;
        }
    }

    /// Finish the draft: keep it as a pending region when it exceeds
    /// `min_size` on both axes, otherwise drop it.
    pub fn finish_draft(&mut self, min_size: f64) -> Option<PendingRegion> {
        let mut draft = self.draft.take()?;
        self.render_requested = true;
        if draft.rect.width > min_size && draft.rect.height > min_size {
            self.next_pending += 1;
            draft.id = PendingId(self.next_pending);
            self.shapes.push(Shape::PendingRegion(draft.clone()));
            Some(draft)
        } else {
            None
        }
    }

    pub fn cancel_draft(&mut self) {
        if self.draft.take().is_some() {
            self.render_requested = true;
        }
    }

    pub fn pending_regions(&self) -> impl Iterator<Item = &PendingRegion> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::PendingRegion(p) => Some(p),
            _ => None,
        })
    }

    pub fn remove_pending(&mut self, id: PendingId) -> Option<PendingRegion> {
        let index = self
            .shapes
            .iter()
            .position(|s| matches!(s, Shape::PendingRegion(p) if p.id == id))?;
        self.render_requested = true;
        match self.shapes.remove(index) {
            Shape::PendingRegion(p) => Some(p),
            _ => None,
        }
    }

    pub fn push_brush_point(&mut self, point: Point) {
        self.brush_path.push(point);
        self.render_requested = true;
    }

    pub fn clear_brush_path(&mut self) {
        if !self.brush_path.is_empty() {
            self.brush_path.clear();
            self.render_requested = true;
        }
    }

    /// Overlay drawing operations in canvas object space, bottom to top.
    pub fn display_list(&self) -> Vec<DrawCommand> {
        let mut out = Vec::new();
        for shape in &self.shapes {
            shape.render(&mut out);
        }
        if let Some(draft) = &self.draft {
            Shape::PendingRegion(draft.clone()).render(&mut out);
        }
        if self.brush_path.len() > 1 {
            out.push(DrawCommand::Polyline {
                points: self.brush_path.clone(),
                width: BRUSH_WIDTH,
                color: BRUSH_COLOR,
            });
        }
        out
    }

    pub fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::detail::BoundingBox;

    fn details(n: usize) -> Vec<TextDetail> {
        (0..n)
            .map(|i| {
                let x = 100.0 + i as f64 * 200.0;
                TextDetail::new(
                    format!("t{}", i),
                    String::new(),
                    BoundingBox {
                        min_x: x,
                        min_y: 100.0,
                        max_x: x + 150.0,
                        max_y: 300.0,
                    },
                )
            })
            .collect()
    }

    fn loaded() -> CanvasSession {
        let mut session = CanvasSession::new();
        session.load_image(
            ImageSource {
                width: 1600,
                height: 1200,
            },
            (1000.0, 855.0),
            55.0,
        );
        session
    }

    fn geometry(session: &CanvasSession) -> Vec<(ShapeKind, CanvasRect)> {
        session
            .shapes()
            .iter()
            .map(|s| (s.kind(), s.geometry()))
            .collect()
    }

    #[test]
    fn test_load_image_places_locked_background() {
        let session = loaded();
        let rect = session.image_rect();
        assert!(rect.is_placed());
        assert!((rect.w / rect.ow - rect.h / rect.oh).abs() < 1e-9);
        let bg = session.background().unwrap();
        assert!(bg.locked);
        assert!(!bg.selectable);
    }

    #[test]
    fn test_render_regions_is_idempotent() {
        let mut session = loaded();
        let list = details(3);

        session.render_regions(&list);
        let once = geometry(&session);
        session.render_regions(&list);
        let twice = geometry(&session);

        assert_eq!(once, twice);
        assert_eq!(session.count(ShapeKind::RegionMarker), 3);
        assert_eq!(session.count(ShapeKind::Badge), 3);
    }

    #[test]
    fn test_badges_are_numbered_in_order() {
        let mut session = loaded();
        session.render_regions(&details(3));
        let numbers: Vec<usize> = session
            .shapes()
            .iter()
            .filter_map(|s| match s {
                Shape::Badge(b) => Some(b.number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_no_regions_before_image() {
        let mut session = CanvasSession::new();
        session.render_regions(&details(2));
        assert!(session.shapes().is_empty());
    }

    #[test]
    fn test_rebuild_keeps_pending_regions() {
        let mut session = loaded();
        session.begin_draft(Point::new(10.0, 10.0));
        session.update_draft(CanvasRect::new(10.0, 10.0, 50.0, 50.0));
        session.finish_draft(10.0).unwrap();

        session.render_regions(&details(2));
        session.render_regions(&details(1));
        assert_eq!(session.count(ShapeKind::PendingRegion), 1);
        assert_eq!(session.count(ShapeKind::RegionMarker), 1);
    }

    #[test]
    fn test_queued_rebuilds_collapse_to_latest() {
        let mut session = loaded();
        session.request_regions(Arc::new(details(1)));
        session.request_regions(Arc::new(details(4)));

        assert!(session.flush_regions());
        assert_eq!(session.count(ShapeKind::RegionMarker), 4);
        assert!(!session.flush_regions());
    }

    #[test]
    fn test_small_draft_is_discarded() {
        let mut session = loaded();
        session.begin_draft(Point::new(100.0, 100.0));
        session.update_draft(CanvasRect::new(100.0, 100.0, 5.0, 3.0));
        assert!(session.finish_draft(10.0).is_none());
        assert!(session.shapes().is_empty());
        assert!(session.display_list().is_empty());
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut session = loaded();
        let list = details(1);
        session.render_regions(&list);
        let rect = session.shapes()[0].geometry();

        let hit = session
            .hit_test(Point::new(rect.left + 1.0, rect.top + 1.0))
            .unwrap();
        assert_eq!(hit.kind, ShapeKind::Badge);
        assert_eq!(hit.detail_id.as_ref(), Some(&list[0].id));
        assert!(session.hit_test(Point::new(-50.0, -50.0)).is_none());
    }

    #[test]
    fn test_scanning_markers_animate() {
        let mut session = loaded();
        let list = details(2);
        session.render_regions(&list);
        assert!(!session.tick(0.1));

        session.set_scanning(HashSet::from([list[1].id.clone()]));
        assert!(session.tick(0.1));

        session.render_regions(&list);
        assert!(session.tick(0.1));

        session.clear();
        assert!(!session.tick(0.1));
    }

    #[test]
    fn test_set_placement_moves_pending_with_image() {
        let mut session = loaded();
        let before = session.image_rect();
        session.begin_draft(Point::new(before.x, before.y));
        session.update_draft(CanvasRect::new(before.x, before.y, 40.0, 40.0));
        session.finish_draft(10.0);

        let mut after = before;
        after.x += 25.0;
        session.set_placement(after);

        let pending = session.pending_regions().next().unwrap();
        assert_eq!(pending.rect.left, after.x);
        assert_eq!(pending.rect.width, 40.0);
    }

    #[test]
    fn test_clear_resets_image_rect() {
        let mut session = loaded();
        session.render_regions(&details(2));
        session.clear();
        assert_eq!(session.image_rect(), ImageRect::ZERO);
        assert!(session.shapes().is_empty());
        assert!(session.background().is_none());
    }
}
