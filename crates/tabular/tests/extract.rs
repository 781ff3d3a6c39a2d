use tabular::{extract, Cardinality, CellValue, ColumnType, ExtractError, ExtractOptions, Subtype};

const CUSTOMERS: &str = "name,email,amount\nJoao,joao@x.com,10\nMaria,maria@y.com.br,25\nAna,ana@z.org,40\n";

#[test]
fn test_customer_csv_schema() {
    let out = extract(CUSTOMERS.as_bytes(), "customers.csv", ExtractOptions::default()).unwrap();

    assert_eq!(out.row_count, 3);
    assert_eq!(out.sample.len(), 3);

    let names: Vec<&str> = out.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["name", "email", "amount"]);

    let email = &out.columns[1];
    assert_eq!(email.column_type, ColumnType::Email);
    assert_eq!(email.cardinality, Cardinality::Low);
    assert_eq!(email.subtype, None);

    let amount = &out.columns[2];
    assert_eq!(amount.column_type, ColumnType::Number);
    assert_eq!(amount.subtype, Some(Subtype::Integer));
    assert_eq!(amount.null_ratio, 0.0);

    // sample rows are kept raw
    assert_eq!(out.sample[0]["email"], CellValue::text("joao@x.com"));
}

#[test]
fn test_header_only_csv_is_empty_not_error() {
    let out = extract(b"name,email,amount\n", "empty.csv", ExtractOptions::default()).unwrap();
    assert!(out.columns.is_empty());
    assert!(out.sample.is_empty());
    assert_eq!(out.row_count, 0);
}

#[test]
fn test_extraction_is_deterministic() {
    let a = extract(CUSTOMERS.as_bytes(), "c.csv", ExtractOptions::default()).unwrap();
    let b = extract(CUSTOMERS.as_bytes(), "c.csv", ExtractOptions::default()).unwrap();
    assert_eq!(a.columns, b.columns);
    assert_eq!(
        serde_json::to_string(&a.columns).unwrap(),
        serde_json::to_string(&b.columns).unwrap()
    );
}

#[test]
fn test_inspection_window_bounds_inference() {
    // 10 numeric rows followed by 40 text rows; only the numeric prefix is inspected.
    let mut csv = String::from("v\n");
    for i in 0..10 {
        csv.push_str(&format!("{i}\n"));
    }
    for i in 0..40 {
        csv.push_str(&format!("label{i}\n"));
    }

    let opts = ExtractOptions { sample_rows: 5, max_inspect: 10 };
    let out = extract(csv.as_bytes(), "v.csv", opts).unwrap();

    assert_eq!(out.row_count, 50);
    assert_eq!(out.sample.len(), 5);
    assert_eq!(out.columns[0].column_type, ColumnType::Number);
    assert_eq!(out.columns[0].unique_count, 10);
}

#[test]
fn test_semicolon_csv_with_comma_decimals() {
    let csv = "produto;preco\nCafe;12,50\nPao;0,75\nLeite;5,00\n";
    let out = extract(csv.as_bytes(), "precos.csv", ExtractOptions::default()).unwrap();

    assert_eq!(out.columns.len(), 2);
    assert_eq!(out.columns[1].column_type, ColumnType::Number);
    assert_eq!(out.columns[1].subtype, Some(Subtype::Decimal));
}

#[test]
fn test_empty_column_is_null_type() {
    let csv = "a,b\n1,\n2,\n";
    let out = extract(csv.as_bytes(), "x.csv", ExtractOptions::default()).unwrap();
    assert_eq!(out.columns[1].column_type, ColumnType::Null);
    assert_eq!(out.columns[1].null_ratio, 1.0);
    assert_eq!(out.columns[1].unique_count, 0);
}

#[test]
fn test_invalid_utf8_csv_is_parse_error() {
    let err = extract(b"a,b\n\xff\xfe,1\n", "bad.csv", ExtractOptions::default()).unwrap_err();
    assert!(matches!(err, ExtractError::Csv(_)));
}

#[test]
fn test_unreadable_workbook_is_parse_error() {
    let err = extract(b"not a workbook", "report.xlsx", ExtractOptions::default()).unwrap_err();
    assert!(matches!(err, ExtractError::Spreadsheet(_)));
}

#[test]
fn test_repeated_header_does_not_lose_a_column() {
    let csv = "email,amount,email\njoao@x.com,10,j@work.com\nmaria@y.com,25,\n";
    let out = extract(csv.as_bytes(), "contacts.csv", ExtractOptions::default()).unwrap();

    let names: Vec<&str> = out.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["email", "amount", "email_2"]);
    assert_eq!(out.sample[0]["email"], CellValue::text("joao@x.com"));
    assert_eq!(out.sample[0]["email_2"], CellValue::text("j@work.com"));
}
