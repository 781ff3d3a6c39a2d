//! The persisted sample document: `{"sample": [row, ...]}`.

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;
use tabular::Row;
use uuid::Uuid;

pub const SAMPLE_CONTENT_TYPE: &str = "application/json";

pub fn sample_object_path(dataset_id: Uuid) -> String {
    format!("datasets_samples/{dataset_id}_sample.json")
}

pub fn encode_sample(rows: &[Row]) -> Result<JsonValue> {
    Ok(serde_json::json!({ "sample": serde_json::to_value(rows)? }))
}

/// Accepts the wrapped document, a bare row array, or either one as a JSON string.
pub fn decode_sample(value: JsonValue) -> Result<Vec<Row>> {
    let value = match value {
        JsonValue::String(s) => serde_json::from_str(&s).context("sample is not valid JSON")?,
        other => other,
    };
    let rows = match value {
        JsonValue::Object(mut obj) => match obj.remove("sample") {
            Some(rows) => rows,
            None => bail!("sample document has no `sample` field"),
        },
        arr @ JsonValue::Array(_) => arr,
        JsonValue::Null => return Ok(Vec::new()),
        other => bail!("unexpected sample shape: {other}"),
    };
    serde_json::from_value(rows).context("sample rows are not flat objects")
}

pub fn decode_sample_bytes(bytes: &[u8]) -> Result<Vec<Row>> {
    let value: JsonValue = serde_json::from_slice(bytes).context("sample is not valid JSON")?;
    decode_sample(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabular::CellValue;

    fn rows() -> Vec<Row> {
        let mut r = Row::new();
        r.insert("name".into(), CellValue::text("Ana"));
        r.insert("total".into(), CellValue::from(3));
        vec![r]
    }

    #[test]
    fn wrapped_bare_and_stringified_forms_decode_alike() {
        let wrapped = encode_sample(&rows()).unwrap();
        assert_eq!(wrapped, json!({"sample": [{"name": "Ana", "total": 3}]}));

        assert_eq!(decode_sample(wrapped.clone()).unwrap(), rows());
        assert_eq!(decode_sample(json!([{"name": "Ana", "total": 3}])).unwrap(), rows());
        assert_eq!(decode_sample(JsonValue::String(wrapped.to_string())).unwrap(), rows());
        assert!(decode_sample(JsonValue::Null).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_sample(JsonValue::String("{not json".into())).is_err());
        assert!(decode_sample(json!({"rows": []})).is_err());
        assert!(decode_sample(json!([[1, 2]])).is_err());
        assert!(decode_sample_bytes(b"\xff").is_err());
    }

    #[test]
    fn object_path_uses_dataset_id() {
        let id = Uuid::nil();
        assert_eq!(
            sample_object_path(id),
            "datasets_samples/00000000-0000-0000-0000-000000000000_sample.json"
        );
    }
}
