// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data model: text details, their per-image collection and the project.

pub mod detail;
pub mod detail_list;
pub mod history;
pub mod project;
