// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Text detail data structures.
//!
//! A text detail is one detected (or hand-drawn) text region of a page,
//! with its original and translated text, its bounding box in original
//! image pixels, and the audio generated for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a text detail.
///
/// Generated once when the detail is created and carried through every
/// reorder, edit and serialization round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetailId(String);

impl DetailId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DetailId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DetailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn generated_id() -> DetailId {
    DetailId::generate()
}

/// Bounding box in original image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Clamp every edge into `[0, width] x [0, height]`.
    ///
    /// Non-finite coordinates become 0.
    pub fn clamped(&self, width: f64, height: f64) -> Self {
        fn clamp(value: f64, max: f64) -> f64 {
            if !value.is_finite() {
                return 0.0;
            }
            value.clamp(0.0, max.max(0.0))
        }

        Self {
            min_x: clamp(self.min_x, width),
            min_y: clamp(self.min_y, height),
            max_x: clamp(self.max_x, width),
            max_y: clamp(self.max_y, height),
        }
    }
}

/// One editable OCR/translation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredDetail")]
pub struct TextDetail {
    pub id: DetailId,
    pub original_text: String,
    pub translated_text: String,
    #[serde(flatten)]
    pub bounding_box: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_duration_seconds: Option<f64>,
}

/// Every shape a detail record is read in: our own sidecars, converted
/// service results (`text` + `originText`) and nested `boundingBox`es.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDetail {
    #[serde(default = "generated_id")]
    id: DetailId,
    #[serde(default)]
    original_text: Option<String>,
    #[serde(default)]
    origin_text: Option<String>,
    #[serde(default)]
    translated_text: Option<String>,
    /// Translated text in converted service results.
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    bounding_box: Option<BoundingBox>,
    #[serde(default)]
    min_x: f64,
    #[serde(default)]
    min_y: f64,
    #[serde(default)]
    max_x: f64,
    #[serde(default)]
    max_y: f64,
    #[serde(default)]
    voice_role: Option<String>,
    #[serde(default, alias = "audioPath")]
    audio_reference: Option<String>,
    #[serde(default)]
    audio_duration_seconds: Option<f64>,
}

impl From<StoredDetail> for TextDetail {
    fn from(raw: StoredDetail) -> Self {
        let bounding_box = raw.bounding_box.unwrap_or(BoundingBox {
            min_x: raw.min_x,
            min_y: raw.min_y,
            max_x: raw.max_x,
            max_y: raw.max_y,
        });
        Self {
            id: raw.id,
            original_text: raw.original_text.or(raw.origin_text).unwrap_or_default(),
            translated_text: raw.translated_text.or(raw.text).unwrap_or_default(),
            bounding_box,
            voice_role: raw.voice_role,
            audio_reference: raw.audio_reference,
            audio_duration_seconds: raw.audio_duration_seconds,
        }
    }
}

impl TextDetail {
    /// Create a detail for a detected region with a fresh id.
    pub fn new(original_text: String, translated_text: String, bounding_box: BoundingBox) -> Self {
        Self {
            id: DetailId::generate(),
            original_text,
            translated_text,
            bounding_box,
            voice_role: None,
            audio_reference: None,
            audio_duration_seconds: None,
        }
    }

    /// Create an empty detail for a region the user drew by hand.
    pub fn manual(bounding_box: BoundingBox) -> Self {
        Self::new(String::new(), String::new(), bounding_box)
    }

    /// Text to narrate: the translation, falling back to the original.
    pub fn narration_text(&self) -> &str {
        let translated = self.translated_text.trim();
        if translated.is_empty() {
            self.original_text.trim()
        } else {
            translated
        }
    }

    /// Forget any generated audio.
    pub fn clear_audio(&mut self) {
        self.audio_reference = None;
        self.audio_duration_seconds = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = DetailId::generate();
        let b = DetailId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_detail_json_roundtrip_keeps_id() {
        let mut detail = TextDetail::new(
            "こんにちは".to_string(),
            "Hello".to_string(),
            BoundingBox {
                min_x: 10.0,
                min_y: 20.0,
                max_x: 110.0,
                max_y: 60.0,
            },
        );
        detail.voice_role = Some("zh-CN-XiaoxiaoNeural".to_string());

        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains("\"minX\":10.0"));
        assert!(json.contains("\"translatedText\":\"Hello\""));
        assert!(!json.contains("audioReference"));

        let back: TextDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(back, detail);
    }

    #[test]
    fn test_detail_accepts_legacy_field_names() {
        let json = r#"{"id":"abc","text":"译","minX":1,"minY":2,"maxX":3,"maxY":4,"audioPath":"a.mp3"}"#;
        let detail: TextDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.id, DetailId::from("abc"));
        assert_eq!(detail.translated_text, "译");
        assert!(detail.original_text.is_empty());
        assert_eq!(detail.audio_reference.as_deref(), Some("a.mp3"));
        assert_eq!(detail.bounding_box.max_y, 4.0);
    }

    #[test]
    fn test_converted_record_with_text_and_origin_text() {
        let json = r#"{
            "text": "你好 旧",
            "translatedText": "你好",
            "originText": "こんにちは",
            "minX": 5, "minY": 6, "maxX": 50, "maxY": 60,
            "textColor": {"fg": [0], "bg": [255]}
        }"#;
        let detail: TextDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.original_text, "こんにちは");
        assert_eq!(detail.translated_text, "你好");
        assert_eq!(detail.bounding_box.max_x, 50.0);
    }

    #[test]
    fn test_nested_bounding_box() {
        let json = r#"{"originText":"a","boundingBox":{"minX":1,"minY":2,"maxX":3,"maxY":4}}"#;
        let detail: TextDetail = serde_json::from_str(json).unwrap();
        assert_eq!(
            detail.bounding_box,
            BoundingBox {
                min_x: 1.0,
                min_y: 2.0,
                max_x: 3.0,
                max_y: 4.0,
            }
        );
    }

    #[test]
    fn test_missing_id_is_generated() {
        let json = r#"{"text":"x","minX":0,"minY":0,"maxX":1,"maxY":1}"#;
        let detail: TextDetail = serde_json::from_str(json).unwrap();
        assert!(!detail.id.as_str().is_empty());
    }

    #[test]
    fn test_bounding_box_clamp() {
        let bbox = BoundingBox {
            min_x: -5.0,
            min_y: f64::NAN,
            max_x: 900.0,
            max_y: 40.0,
        };
        let clamped = bbox.clamped(800.0, 600.0);
        assert_eq!(clamped.min_x, 0.0);
        assert_eq!(clamped.min_y, 0.0);
        assert_eq!(clamped.max_x, 800.0);
        assert_eq!(clamped.max_y, 40.0);
    }

    #[test]
    fn test_narration_text_falls_back_to_original() {
        let mut detail = TextDetail::manual(BoundingBox::default());
        detail.original_text = " 原文 ".to_string();
        assert_eq!(detail.narration_text(), "原文");
        detail.translated_text = "Translated".to_string();
        assert_eq!(detail.narration_text(), "Translated");
    }
}
