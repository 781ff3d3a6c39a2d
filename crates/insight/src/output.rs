//! The report shape the AI backend must return, and its validator.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Rendered verbatim into every prompt.
pub const AI_OUTPUT_SCHEMA: &str = r#"{
  "summary": "string",
  "insights": [{"text": "string", "confidence": "low|medium|high"}],
  "charts": [
    {"type": "bar|line|pie|table|scatter", "title": "string", "columns": ["string"],
     "data_rows": [["string|number"]], "description": "string", "config": {}}
  ],
  "kpis": [{"label": "string", "value": "number|string|null", "unit": "string"}],
  "meta": {"rows_sampled": "number", "schema": [{"name": "string", "type": "string"}], "warnings": ["string"]}
}"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```(?:json)?(.*?)```").expect("static regex"))
}

/// Drops a Markdown code fence if present, then keeps the outermost `{...}` span.
pub fn sanitize_json_text(text: &str) -> &str {
    let inner = fence_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(text);

    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if end >= start => inner[start..=end].trim(),
        _ => inner.trim(),
    }
}

struct Checker {
    errors: Vec<SchemaViolation>,
}

impl Checker {
    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(SchemaViolation {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn object<'a>(&mut self, v: &'a JsonValue, path: &str) -> Option<&'a Map<String, JsonValue>> {
        let obj = v.as_object();
        if obj.is_none() {
            self.fail(path, "must be an object");
        }
        obj
    }

    fn array<'a>(&mut self, v: &'a JsonValue, path: &str) -> Option<&'a Vec<JsonValue>> {
        let arr = v.as_array();
        if arr.is_none() {
            self.fail(path, "must be an array");
        }
        arr
    }

    fn required<'a>(&mut self, obj: &'a Map<String, JsonValue>, key: &str, path: &str) -> Option<&'a JsonValue> {
        let v = obj.get(key);
        if v.is_none() {
            self.fail(&format!("{path}/{key}"), "is required");
        }
        v
    }

    fn string(&mut self, v: &JsonValue, path: &str) {
        if !v.is_string() {
            self.fail(path, "must be a string");
        }
    }

    fn optional_string(&mut self, obj: &Map<String, JsonValue>, key: &str, path: &str) {
        if let Some(v) = obj.get(key) {
            if !(v.is_string() || v.is_null()) {
                self.fail(&format!("{path}/{key}"), "must be a string or null");
            }
        }
    }

    fn string_array(&mut self, v: &JsonValue, path: &str) {
        if let Some(items) = self.array(v, path) {
            for (i, item) in items.iter().enumerate() {
                self.string(item, &format!("{path}/{i}"));
            }
        }
    }

    fn insights(&mut self, v: &JsonValue) {
        let Some(items) = self.array(v, "/insights") else { return };
        for (i, item) in items.iter().enumerate() {
            let path = format!("/insights/{i}");
            let Some(obj) = self.object(item, &path) else { continue };
            if let Some(text) = self.required(obj, "text", &path) {
                self.string(text, &format!("{path}/text"));
            }
            self.optional_string(obj, "confidence", &path);
        }
    }

    fn charts(&mut self, v: &JsonValue) {
        let Some(items) = self.array(v, "/charts") else { return };
        for (i, item) in items.iter().enumerate() {
            let path = format!("/charts/{i}");
            let Some(obj) = self.object(item, &path) else { continue };

            for key in ["type", "title"] {
                if let Some(s) = self.required(obj, key, &path) {
                    self.string(s, &format!("{path}/{key}"));
                }
            }
            if let Some(cols) = self.required(obj, "columns", &path) {
                self.string_array(cols, &format!("{path}/columns"));
            }
            self.optional_string(obj, "description", &path);

            let rows = obj.get("data_rows");
            let config = obj.get("config").filter(|c| !c.is_null());
            if rows.is_none() && config.is_none() {
                self.fail(&path, "requires data_rows or config");
            }
            if let Some(rows) = rows {
                self.data_rows(rows, &format!("{path}/data_rows"));
            }
            if let Some(config) = config {
                self.object(config, &format!("{path}/config"));
            }
        }
    }

    fn data_rows(&mut self, v: &JsonValue, path: &str) {
        let Some(rows) = self.array(v, path) else { return };
        for (r, row) in rows.iter().enumerate() {
            let row_path = format!("{path}/{r}");
            let Some(cells) = self.array(row, &row_path) else { continue };
            for (c, cell) in cells.iter().enumerate() {
                if !(cell.is_string() || cell.is_number()) {
                    self.fail(&format!("{row_path}/{c}"), "must be a string or number");
                }
            }
        }
    }

    fn kpis(&mut self, v: &JsonValue) {
        let Some(items) = self.array(v, "/kpis") else { return };
        for (i, item) in items.iter().enumerate() {
            let path = format!("/kpis/{i}");
            let Some(obj) = self.object(item, &path) else { continue };
            if let Some(label) = self.required(obj, "label", &path) {
                self.string(label, &format!("{path}/label"));
            }
            if let Some(value) = self.required(obj, "value", &path) {
                if !(value.is_number() || value.is_string() || value.is_null()) {
                    self.fail(&format!("{path}/value"), "must be a number, string or null");
                }
            }
            self.optional_string(obj, "unit", &path);
        }
    }

    fn meta(&mut self, v: &JsonValue) {
        let Some(obj) = self.object(v, "/meta") else { return };
        if let Some(n) = self.required(obj, "rows_sampled", "/meta") {
            if !n.is_number() {
                self.fail("/meta/rows_sampled", "must be a number");
            }
        }
        if let Some(schema) = obj.get("schema") {
            if let Some(items) = self.array(schema, "/meta/schema") {
                for (i, item) in items.iter().enumerate() {
                    let path = format!("/meta/schema/{i}");
                    let Some(col) = self.object(item, &path) else { continue };
                    for key in ["name", "type"] {
                        if let Some(s) = self.required(col, key, &path) {
                            self.string(s, &format!("{path}/{key}"));
                        }
                    }
                }
            }
        }
        if let Some(warnings) = obj.get("warnings").filter(|w| !w.is_null()) {
            self.string_array(warnings, "/meta/warnings");
        }
    }
}

/// Checks `value` against the report shape, collecting every violation.
pub fn validate_report(value: &JsonValue) -> Result<(), Vec<SchemaViolation>> {
    let mut c = Checker { errors: Vec::new() };

    if let Some(root) = c.object(value, "") {
        if let Some(summary) = c.required(root, "summary", "") {
            c.string(summary, "/summary");
        }
        if let Some(v) = c.required(root, "insights", "") {
            c.insights(v);
        }
        if let Some(v) = c.required(root, "charts", "") {
            c.charts(v);
        }
        if let Some(v) = c.required(root, "kpis", "") {
            c.kpis(v);
        }
        if let Some(v) = c.required(root, "meta", "") {
            c.meta(v);
        }
    }

    if c.errors.is_empty() {
        Ok(())
    } else {
        Err(c.errors)
    }
}

/// Appends `warnings` to `meta.warnings`, skipping ones already present.
pub fn merge_warnings(report: &mut JsonValue, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    let Some(meta) = report.get_mut("meta").and_then(JsonValue::as_object_mut) else {
        return;
    };
    let entry = meta
        .entry("warnings")
        .or_insert_with(|| JsonValue::Array(Vec::new()));
    if entry.is_null() {
        *entry = JsonValue::Array(Vec::new());
    }
    if let Some(list) = entry.as_array_mut() {
        for w in warnings {
            if !list.iter().any(|x| x.as_str() == Some(w.as_str())) {
                list.push(JsonValue::String(w.clone()));
            }
        }
    }
}
