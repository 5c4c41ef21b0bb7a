// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Text region detection boundary.
//!
//! A [`Detector`] turns a page image into text regions and streams them as
//! partial [`Detection`] batches. The bundled [`FileDetector`] replays a
//! saved OCR service response, either a plain JSON document or the
//! service's framed stream (1 status byte, 4 byte big-endian length, data).

use crate::models::detail::{BoundingBox, TextDetail};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use thiserror::Error;

/// Frame status codes of the service stream.
const FRAME_JSON: u8 = 0;
const FRAME_STATUS: u8 = 1;
const FRAME_ERROR: u8 = 2;
const FRAME_HEADER: usize = 5;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("failed to read OCR response {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed OCR response: {0}")]
    Malformed(String),
    #[error("OCR service reported an error: {0}")]
    Service(String),
    #[error("OCR response contained no result")]
    NoResult,
}

/// One detected region in image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub bounding_box: BoundingBox,
    pub original_text: String,
    pub translated_text: String,
}

/// A (possibly partial) detection result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub regions: Vec<Region>,
    /// Rendered page produced by the service, if announced.
    pub processed_image: Option<String>,
}

/// Progress reported while a detection runs.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    Status(String),
    Batch(Detection),
    /// The service finished rendering the translated page.
    ProcessedImage(String),
}

/// Detection backend.
pub trait Detector: Send {
    /// Detect text in `image`, reporting progress through `sink`.
    fn detect(
        &self,
        image: &Path,
        sink: &mut dyn FnMut(DetectionEvent),
    ) -> Result<(), DetectionError>;
}

/// Replays a saved OCR service response.
#[derive(Debug, Clone)]
pub struct FileDetector {
    response: PathBuf,
    target_lang: String,
}

impl FileDetector {
    pub fn new(response: PathBuf, target_lang: impl Into<String>) -> Self {
        Self {
            response,
            target_lang: target_lang.into(),
        }
    }
}

impl Detector for FileDetector {
    fn detect(
        &self,
        image: &Path,
        sink: &mut dyn FnMut(DetectionEvent),
    ) -> Result<(), DetectionError> {
        log::info!(
            "Reading OCR response {} for {}",
            self.response.display(),
            image.display()
        );
        let bytes = std::fs::read(&self.response).map_err(|source| DetectionError::Io {
            path: self.response.clone(),
            source,
        })?;

        let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
        if matches!(first, Some(b'{')) {
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| DetectionError::Malformed(e.to_string()))?;
            sink(DetectionEvent::Batch(parse_response(&value, &self.target_lang)?));
            Ok(())
        } else {
            replay_frames(&bytes, &self.target_lang, sink)
        }
    }
}

/// Decode a framed service stream, forwarding every complete frame.
pub fn replay_frames(
    mut bytes: &[u8],
    target_lang: &str,
    sink: &mut dyn FnMut(DetectionEvent),
) -> Result<(), DetectionError> {
    let mut got_result = false;
    let mut folder: Option<String> = None;

    while bytes.len() >= FRAME_HEADER {
        let size = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        let Some(data) = bytes.get(FRAME_HEADER..FRAME_HEADER + size) else {
            return Err(DetectionError::Malformed(format!(
                "truncated frame: {} of {} bytes",
                bytes.len() - FRAME_HEADER,
                size
            )));
        };
        let text = String::from_utf8_lossy(data);

        match bytes[0] {
            FRAME_JSON => {
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| DetectionError::Malformed(e.to_string()))?;
                let mut detection = parse_response(&value, target_lang)?;
                if detection.processed_image.is_none() {
                    detection.processed_image = folder.as_deref().map(final_image);
                }
                got_result = true;
                sink(DetectionEvent::Batch(detection));
            }
            FRAME_STATUS => {
                if let Some(name) = text.strip_prefix("rendering_folder:") {
                    folder = Some(name.to_string());
                } else if let Some(name) = text.strip_prefix("final_ready:") {
                    let name = folder.get_or_insert_with(|| name.to_string());
                    sink(DetectionEvent::ProcessedImage(final_image(name)));
                } else {
                    sink(DetectionEvent::Status(text.to_string()));
                }
            }
            FRAME_ERROR => return Err(DetectionError::Service(text.to_string())),
            // Queue position updates.
            _ => {}
        }
        bytes = &bytes[FRAME_HEADER + size..];
    }

    if got_result {
        Ok(())
    } else {
        Err(DetectionError::NoResult)
    }
}

fn final_image(folder: &str) -> String {
    format!("result/{}/final.png", folder)
}

/// Parse one JSON result document.
///
/// Accepts the service's `translations` array or an already converted
/// `details` array.
pub fn parse_response(value: &Value, target_lang: &str) -> Result<Detection, DetectionError> {
    let processed_image = value
        .get("debug_folder")
        .and_then(Value::as_str)
        .map(final_image);

    if let Some(items) = value.get("translations").and_then(Value::as_array) {
        let regions = items
            .iter()
            .map(|item| parse_translation(item, target_lang))
            .collect();
        return Ok(Detection {
            regions,
            processed_image,
        });
    }

    if let Some(items) = value.get("details") {
        let details: Vec<TextDetail> = serde_json::from_value(items.clone())
            .map_err(|e| DetectionError::Malformed(e.to_string()))?;
        let regions = details
            .into_iter()
            .map(|d| Region {
                bounding_box: d.bounding_box,
                original_text: d.original_text,
                translated_text: d.translated_text,
            })
            .collect();
        return Ok(Detection {
            regions,
            processed_image,
        });
    }

    log::warn!("OCR response has neither translations nor details");
    Ok(Detection {
        regions: Vec::new(),
        processed_image,
    })
}

fn parse_translation(item: &Value, target_lang: &str) -> Region {
    let coord = |key: &str| item.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    let text = item.get("text");

    let translated_text = clean_translation(&pick_text(text, Some(target_lang), None));
    let original_text = [item.get("origin_text"), item.get("source")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| Some(pick_text(text, None, Some(target_lang))).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| translated_text.clone());

    Region {
        bounding_box: BoundingBox {
            min_x: coord("minX"),
            min_y: coord("minY"),
            max_x: coord("maxX"),
            max_y: coord("maxY"),
        },
        original_text,
        translated_text,
    }
}

/// Pick a text from a string or a `{lang: text}` map.
///
/// With a map: the `preferred` language if present, else the first entry
/// whose language is not `excluded`, else any string value.
pub fn pick_text(field: Option<&Value>, preferred: Option<&str>, excluded: Option<&str>) -> String {
    match field {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => {
            if let Some(s) = preferred.and_then(|lang| map.get(lang)).and_then(Value::as_str) {
                return s.to_string();
            }
            let allowed = |lang: &str| match excluded {
                Some(ex) => !lang.eq_ignore_ascii_case(ex),
                None => true,
            };
            map.iter()
                .find(|(lang, v)| allowed(lang) && v.is_string())
                .or_else(|| map.iter().find(|(_, v)| v.is_string()))
                .and_then(|(_, v)| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string())
        }
        _ => String::new(),
    }
}

/// Keep CJK ideographs, ASCII letters and digits; everything else becomes
/// a space, and whitespace runs collapse to one space.
pub fn clean_translation(text: &str) -> String {
    let kept: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() || ('\u{4e00}'..='\u{9fa5}').contains(&c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Merge a detection batch into the current list.
///
/// Boxes are clamped to the image. A region whose clamped box equals the
/// box of the detail at the same index keeps that detail's id, voice and
/// audio, so unchanged shapes survive streaming updates.
pub fn merge_detections(
    existing: &[TextDetail],
    regions: &[Region],
    image_size: (u32, u32),
) -> Vec<TextDetail> {
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);
    regions
        .iter()
        .enumerate()
        .map(|(index, region)| {
            let bbox = region.bounding_box.clamped(w, h);
            match existing.get(index) {
                Some(current) if current.bounding_box == bbox => TextDetail {
                    original_text: region.original_text.clone(),
                    translated_text: region.translated_text.clone(),
                    ..current.clone()
                },
                _ => TextDetail::new(
                    region.original_text.clone(),
                    region.translated_text.clone(),
                    bbox,
                ),
            }
        })
        .collect()
}

/// Message from a detection worker.
#[derive(Debug)]
pub enum DetectionMessage {
    Event(DetectionEvent),
    Failed(DetectionError),
    Finished,
}

/// Run `detector` on a background thread.
pub fn spawn_detection(detector: Box<dyn Detector>, image: PathBuf) -> Receiver<DetectionMessage> {
    let (sender, receiver) = channel();
    std::thread::spawn(move || {
        let mut forward = |event: DetectionEvent| {
            let _ = sender.send(DetectionMessage::Event(event));
        };
        let result = detector.detect(&image, &mut forward);
        let last = match result {
            Ok(()) => DetectionMessage::Finished,
            Err(e) => DetectionMessage::Failed(e),
        };
        let _ = sender.send(last);
    });
    receiver
}
