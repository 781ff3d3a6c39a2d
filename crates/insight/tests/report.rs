use insight::pii::{detect, redact};
use insight::{
    build_prompt, merge_warnings, sanitize_json_text, scrub_sample, validate_report, PromptContext, PII_SENTINEL,
    PII_WARNING,
};
use serde_json::{json, Value};
use tabular::{extract, CellValue, ExtractOptions};

const CUSTOMERS: &str = "name,email,amount\nJoao,joao@x.com,10\nMaria,,25\nAna,,40\n";

fn report_json() -> Value {
    json!({
        "summary": "Three customers, one repeat buyer.",
        "insights": [{"text": "Ana spends the most", "confidence": "high"}],
        "charts": [{"type": "bar", "title": "Amount by customer", "columns": ["name", "amount"],
                    "data_rows": [["Joao", 10], ["Maria", 25], ["Ana", 40]]}],
        "kpis": [{"label": "Total", "value": 75, "unit": "BRL"}],
        "meta": {"rows_sampled": 3, "schema": [{"name": "amount", "type": "number"}], "warnings": []}
    })
}

#[test]
fn test_pii_row_is_redacted_and_others_untouched() {
    let out = extract(CUSTOMERS.as_bytes(), "customers.csv", ExtractOptions::default()).unwrap();
    let flagged: Vec<bool> = out.sample.iter().map(detect).collect();
    assert_eq!(flagged, vec![true, false, false]);

    let redacted = redact(&out.sample[0]);
    assert_eq!(redacted["email"], CellValue::text(PII_SENTINEL));
    assert_eq!(redacted["name"], out.sample[0]["name"]);
    assert_eq!(redacted["amount"], out.sample[0]["amount"]);
}

#[test]
fn test_prompt_never_carries_raw_pii() {
    let out = extract(CUSTOMERS.as_bytes(), "customers.csv", ExtractOptions::default()).unwrap();
    let mut warnings = Vec::new();
    let scrubbed = scrub_sample(&out.sample, &mut warnings);
    assert_eq!(warnings, vec![PII_WARNING.to_string()]);

    let params = json!({});
    let text = build_prompt(&PromptContext {
        columns: &out.columns,
        sample: &scrubbed,
        parameters: &params,
        business: None,
        dataset: None,
        language: "en",
    });
    assert!(!text.contains("joao@x.com"));
    assert!(text.contains(PII_SENTINEL));
}

#[test]
fn test_fenced_valid_report_parses_and_validates() {
    let text = format!("```json\n{}\n```", report_json());
    let parsed: Value = serde_json::from_str(sanitize_json_text(&text)).unwrap();
    assert_eq!(parsed, report_json());
    assert!(validate_report(&parsed).is_ok());
}

#[test]
fn test_missing_kpis_is_a_violation() {
    let mut v = report_json();
    v.as_object_mut().unwrap().remove("kpis");
    let errs = validate_report(&v).unwrap_err();
    assert!(errs.iter().any(|e| e.path == "/kpis" && e.message == "is required"));
}

#[test]
fn test_warnings_merge_into_meta() {
    let mut v = report_json();
    merge_warnings(&mut v, &[PII_WARNING.to_string()]);
    assert_eq!(v["meta"]["warnings"], json!([PII_WARNING]));
    assert!(validate_report(&v).is_ok());
}

fn customers_workbook() -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, name) in ["name", "cpf", "amount"].into_iter().enumerate() {
        sheet.write_string(0, col as u16, name).unwrap();
    }
    sheet.write_string(1, 0, "Joao").unwrap();
    sheet.write_number(1, 1, 12345678909.0).unwrap();
    sheet.write_number(1, 2, 10.0).unwrap();
    workbook.save_to_buffer().unwrap()
}

#[test]
fn test_numeric_cpf_in_spreadsheet_is_redacted() {
    let out = extract(&customers_workbook(), "customers.xlsx", ExtractOptions::default()).unwrap();
    assert_eq!(out.sample[0]["cpf"], CellValue::from(12345678909));

    let mut warnings = Vec::new();
    let scrubbed = scrub_sample(&out.sample, &mut warnings);
    assert_eq!(scrubbed[0]["cpf"], CellValue::text(PII_SENTINEL));
    assert_eq!(scrubbed[0]["name"], out.sample[0]["name"]);
    assert_eq!(scrubbed[0]["amount"], CellValue::from(10));
    assert_eq!(warnings, vec![PII_WARNING.to_string()]);

    // same verdict as the CSV rendition of the row
    let csv = extract(b"name,cpf,amount\nJoao,12345678909,10\n", "customers.csv", ExtractOptions::default()).unwrap();
    let mut csv_warnings = Vec::new();
    assert_eq!(scrub_sample(&csv.sample, &mut csv_warnings)[0]["cpf"], scrubbed[0]["cpf"]);
    assert_eq!(csv_warnings, warnings);
}
