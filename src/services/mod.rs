// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Boundaries to the OCR service, speech synthesis and clip playback.

pub mod audio;
pub mod detector;
pub mod playback;
