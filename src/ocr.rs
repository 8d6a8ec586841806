//! OCR and detection boundary types
//!
//! The identification core never runs OCR or vision inference itself. Any
//! engine that can produce an [`OcrExtraction`] per card region is
//! interchangeable, and the upstream vision-model detector is consumed only
//! through [`DetectedRegion`].

use serde::{Deserialize, Serialize};

/// Text extracted from one card region by an external OCR engine.
///
/// `type_text` is confined to the top region of the card and `title_text`
/// to the bottom region; `full_text` covers the whole region. Per-line
/// confidences are carried for diagnostics only and never feed matching
/// thresholds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrExtraction {
    #[serde(rename = "fullText")]
    pub full_text: String,
    #[serde(rename = "typeText")]
    pub type_text: String,
    #[serde(rename = "titleText")]
    pub title_text: String,
    #[serde(rename = "perLineConfidence", default)]
    pub line_confidences: Vec<f32>,
}

impl OcrExtraction {
    pub fn new(full_text: &str, type_text: &str, title_text: &str) -> Self {
        OcrExtraction {
            full_text: full_text.to_string(),
            type_text: type_text.to_string(),
            title_text: title_text.to_string(),
            line_confidences: Vec::new(),
        }
    }

    /// Whether the OCR pass produced any usable text at all. Distinguishes
    /// the "no OCR content" rejection reason from "text matching failed".
    pub fn has_content(&self) -> bool {
        [&self.full_text, &self.type_text, &self.title_text]
            .iter()
            .any(|s| !s.trim().is_empty())
    }

    /// Mean per-line confidence, for diagnostics
    pub fn mean_confidence(&self) -> Option<f32> {
        if self.line_confidences.is_empty() {
            return None;
        }
        Some(self.line_confidences.iter().sum::<f32>() / self.line_confidences.len() as f32)
    }
}

/// One candidate card region reported by the vision-model detection service.
///
/// The detector returns zero or more of these per captured frame; the core
/// consumes the structured output and never calls the service directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedRegion {
    /// Bounding quadrilateral, clockwise from top-left, in capture pixels
    #[serde(rename = "quad")]
    pub quad: [[f32; 2]; 4],
    /// Card type label as reported by the detector, if any
    #[serde(rename = "typeLabel", default)]
    pub type_label: Option<String>,
    /// Raw text the detector extracted from the region
    #[serde(rename = "rawText", default)]
    pub raw_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_content() {
        assert!(!OcrExtraction::default().has_content());
        assert!(!OcrExtraction::new("  ", "\n", "").has_content());
        assert!(OcrExtraction::new("", "", "Solar Furnace").has_content());
        assert!(OcrExtraction::new("Refinery Solar Furnace", "", "").has_content());
    }

    #[test]
    fn test_mean_confidence() {
        let mut ocr = OcrExtraction::new("a", "b", "c");
        assert_eq!(ocr.mean_confidence(), None);

        ocr.line_confidences = vec![0.8, 0.6];
        assert!((ocr.mean_confidence().unwrap() - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_extraction_wire_names() {
        let json = r#"{
            "fullText": "Refinery Solar Furnace",
            "typeText": "Refinery",
            "titleText": "Solar Furnace",
            "perLineConfidence": [0.91, 0.87]
        }"#;
        let ocr: OcrExtraction = serde_json::from_str(json).unwrap();
        assert_eq!(ocr.title_text, "Solar Furnace");
        assert_eq!(ocr.line_confidences.len(), 2);
    }

    #[test]
    fn test_detected_region_contract() {
        let json = r#"{
            "quad": [[10.0, 12.0], [210.0, 14.0], [208.0, 310.0], [9.0, 306.0]],
            "typeLabel": "refinery",
            "rawText": "Refinery\nSolar Furnace"
        }"#;
        let region: DetectedRegion = serde_json::from_str(json).unwrap();
        assert_eq!(region.type_label.as_deref(), Some("refinery"));
        assert_eq!(region.quad[0], [10.0, 12.0]);

        // Labels and text are optional in the detector output.
        let minimal: DetectedRegion =
            serde_json::from_str(r#"{"quad": [[0,0],[1,0],[1,1],[0,1]]}"#).unwrap();
        assert!(minimal.type_label.is_none());
        assert!(minimal.raw_text.is_empty());
    }
}
