//! Single-document responses of the report API.

use serde::{Deserialize, Serialize};

use crate::event::ProgressEvent;

/// Response of the synchronous `POST /api/upload` endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub report_id: String,
    pub filename: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Biomarker {
    pub test_name: String,
    pub value: f64,
    pub unit: String,
    pub reference_range: String,
    #[serde(default)]
    pub flag: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deficiency {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub normal_range: String,
    pub severity: String,
    /// Measured value as a percentage of the normal range.
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub title: String,
    pub severity: String,
    pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: u32,
    pub name: String,
    pub emoji: String,
    pub nutrient: String,
    pub amount: String,
    pub category: String,
    pub quantity: u32,
    pub instacart_url: String,
}

/// Full analysis document from `GET /api/reports/{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_id: String,
    pub status: String,
    #[serde(default)]
    pub biomarkers: Vec<Biomarker>,
    #[serde(default)]
    pub deficiencies: Vec<Deficiency>,
    #[serde(default)]
    pub explanations: Vec<Explanation>,
    #[serde(default)]
    pub cart_items: Vec<CartItem>,
    #[serde(default)]
    pub shop_all_url: String,
    #[serde(default)]
    pub ocr_confidence: f64,
    #[serde(default)]
    pub ocr_method: String,
    /// The same steps that were streamed while the analysis ran.
    #[serde(default)]
    pub reasoning_steps: Vec<ProgressEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProgressKind;
    use serde_json::json;

    #[test]
    fn decodes_report_document() {
        let doc = json!({
            "report_id": "abc",
            "status": "analyzed",
            "biomarkers": [
                {"test_name": "Vitamin D", "value": 18.0, "unit": "ng/mL", "reference_range": "30-100", "flag": "L"}
            ],
            "deficiencies": [
                {"name": "Vitamin D", "value": 18.0, "unit": "ng/mL", "normal_range": "30-100", "severity": "moderate", "percentage": 60.0}
            ],
            "explanations": [],
            "cart_items": [
                {"id": 1, "name": "Salmon", "emoji": "🐟", "nutrient": "Vitamin D", "amount": "1 lb",
                 "category": "Seafood", "quantity": 1, "instacart_url": "https://example.test/salmon"}
            ],
            "shop_all_url": "https://example.test/all",
            "ocr_confidence": 0.93,
            "ocr_method": "pdfplumber",
            "reasoning_steps": [
                {"step_number": 1, "action": "tool_call", "tool_name": "extract_text_from_pdf",
                 "reasoning": "Calling extract_text_from_pdf", "result_summary": "2 pages"}
            ]
        });
        let report: AnalysisReport = serde_json::from_value(doc).expect("decode");
        assert_eq!(report.biomarkers[0].flag.as_deref(), Some("L"));
        assert_eq!(report.cart_items[0].quantity, 1);
        assert_eq!(report.reasoning_steps[0].kind, ProgressKind::ToolInvocation);
    }

    #[test]
    fn optional_collections_default_to_empty() {
        let report: AnalysisReport =
            serde_json::from_value(json!({"report_id": "abc", "status": "analyzed"}))
                .expect("decode");
        assert!(report.biomarkers.is_empty());
        assert!(report.reasoning_steps.is_empty());
    }
}
