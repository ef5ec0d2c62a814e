use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// Ordered mapping of semantic field names to values pulled out of cleaned
/// text. Insertion order is the rule application order and survives
/// serialization.
pub type FieldMap = IndexMap<String, String>;

/// The assembled result of one document scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    /// File name of the source image as given by the caller.
    pub original_file_name: String,
    /// Size of the binarized pixel buffer, rendered as `"N.NN KB"`.
    #[serde(rename = "size", serialize_with = "serialize_size_kb")]
    pub size_kb: f64,
    /// When the record was assembled.
    pub processed_at: DateTime<Utc>,
    /// Verbatim OCR output, kept for audit.
    pub raw_text: String,
    pub cleaned_text: String,
    pub fields: FieldMap,
    /// Best-effort LLM reply; absent when refinement is disabled or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_fields: Option<String>,
}

fn serialize_size_kb<S>(kb: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("{kb:.2} KB"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ScanRecord {
        let mut fields = FieldMap::new();
        fields.insert("full_name".to_string(), "JEAN DUPONT".to_string());
        ScanRecord {
            original_file_name: "card.jpg".to_string(),
            size_kb: 12.3456,
            processed_at: Utc::now(),
            raw_text: "JEAN # DUPONT".to_string(),
            cleaned_text: "JEAN DUPONT".to_string(),
            fields,
            improved_fields: None,
        }
    }

    #[test]
    fn record_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(sample_record()).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("originalFileName"));
        assert!(obj.contains_key("processedAt"));
        assert!(obj.contains_key("rawText"));
        assert!(obj.contains_key("cleanedText"));
        assert!(obj.contains_key("fields"));
    }

    #[test]
    fn size_renders_as_kb_string() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["size"], "12.35 KB");
    }

    #[test]
    fn absent_refinement_is_omitted() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert!(value.get("improvedFields").is_none());

        let record = ScanRecord {
            improved_fields: Some("a,b\n1,2".to_string()),
            ..sample_record()
        };
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(value["improvedFields"], "a,b\n1,2");
    }

    #[test]
    fn field_order_survives_serialization() {
        let mut fields = FieldMap::new();
        fields.insert("full_name".to_string(), "JEAN DUPONT".to_string());
        fields.insert("date_of_birth".to_string(), "12.09.1980".to_string());
        fields.insert("place_of_birth".to_string(), "PARIS".to_string());
        let record = ScanRecord {
            fields,
            ..sample_record()
        };
        let json = serde_json::to_string(&record).unwrap();
        let name = json.find("full_name").unwrap();
        let dob = json.find("date_of_birth").unwrap();
        let place = json.find("place_of_birth").unwrap();
        assert!(name < dob && dob < place);
    }
}
