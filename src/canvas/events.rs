// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Canvas events published to toolbars and panels.
//!
//! The bus is created together with the canvas editor and handed to the
//! components that publish. Subscribers receive events through a channel
//! and drain it once per frame.

use super::shapes::ShapeKind;
use crate::models::detail::DetailId;
use crate::util::geometry::Point;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Shape found under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeHit {
    pub kind: ShapeKind,
    /// Detail behind a region marker or badge.
    pub detail_id: Option<DetailId>,
}

/// Something observable happened on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    ZoomChanged { level: f64 },
    Panned { dx: f64, dy: f64 },
    ContextMenuRequested { screen: Point, hit: Option<ShapeHit> },
    RegionsReordered { order: Vec<DetailId> },
}

/// Single-threaded publish/subscribe bus.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Rc<RefCell<Vec<Sender<CanvasEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<CanvasEvent> {
        let (sender, receiver) = channel();
        self.subscribers.borrow_mut().push(sender);
        receiver
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&self, event: CanvasEvent) {
        log::trace!("canvas event: {:?}", event);
        self.subscribers
            .borrow_mut()
            .retain(|s| s.send(event.clone()).is_ok());
    }
}
