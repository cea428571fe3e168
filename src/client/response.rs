//! Decoded response bodies.
//!
//! Every field is required. A body that omits a field, carries the wrong
//! type, or reports a negative count fails to decode.

use serde::{Deserialize, Serialize};

/// Response of the `label_values` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValuesResponse {
    /// Total number of series matched by the selector.
    pub series_count_total: u64,
    /// Per-label breakdown, in server order.
    pub labels: Vec<LabelValuesLabel>,
}

/// Breakdown of a single label name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValuesLabel {
    /// Label name this entry describes.
    pub label_name: String,
    /// Number of distinct values of the label.
    pub label_values_count: u64,
    /// Number of series carrying the label.
    pub series_count: u64,
    /// Series count per observed value.
    pub cardinality: Vec<LabelValueCardinality>,
}

/// Series count of a single label value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValueCardinality {
    /// The label value.
    pub label_value: String,
    /// Number of series with this value.
    pub series_count: u64,
}

/// Response of the `label_names` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelNamesResponse {
    /// Sum of value counts over all label names.
    pub label_values_count_total: u64,
    /// Number of distinct label names.
    pub label_names_count: u64,
    /// Value count per label name, in server order.
    pub cardinality: Vec<LabelNamesCardinality>,
}

/// Value count of a single label name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelNamesCardinality {
    /// The label name.
    pub label_name: String,
    /// Number of distinct values of the label.
    pub label_values_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_label_values() {
        let body = r#"{
            "series_count_total": 100,
            "labels": [{
                "label_name": "job",
                "label_values_count": 2,
                "series_count": 100,
                "cardinality": [
                    {"label_value": "a", "series_count": 60},
                    {"label_value": "b", "series_count": 40}
                ]
            }]
        }"#;

        let response: LabelValuesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.series_count_total, 100);
        assert_eq!(response.labels.len(), 1);
        assert_eq!(response.labels[0].label_name, "job");
        assert_eq!(response.labels[0].cardinality[1].label_value, "b");
        assert_eq!(response.labels[0].cardinality[1].series_count, 40);
    }

    #[test]
    fn test_decode_label_names() {
        let body = r#"{
            "label_values_count_total": 12,
            "label_names_count": 2,
            "cardinality": [
                {"label_name": "instance", "label_values_count": 10},
                {"label_name": "job", "label_values_count": 2}
            ]
        }"#;

        let response: LabelNamesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.label_names_count, 2);
        assert_eq!(response.cardinality[0].label_name, "instance");
        assert_eq!(response.cardinality[0].label_values_count, 10);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let body = r#"{"labels": []}"#;
        assert!(serde_json::from_str::<LabelValuesResponse>(body).is_err());
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let body = r#"{"series_count_total": -1, "labels": []}"#;
        assert!(serde_json::from_str::<LabelValuesResponse>(body).is_err());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let body = r#"{"series_count_total": 3, "labels": [], "status": "success"}"#;
        let response: LabelValuesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.series_count_total, 3);
    }
}
