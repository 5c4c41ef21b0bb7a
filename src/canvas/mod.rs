// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The interactive annotation canvas, independent of the GUI toolkit.

pub mod compare;
pub mod editor;
pub mod events;
pub mod interaction;
pub mod session;
pub mod shapes;
pub mod viewport;
