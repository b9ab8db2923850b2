// Unit tests for the device report and the email list import

use super::*;
use crate::types::DeviceFields;
use pretty_assertions::assert_eq;

fn record(email: &str, fields: &[(&str, &str)]) -> DeviceRecord {
    let fields: DeviceFields = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    DeviceRecord::new(email, fields)
}

fn mapping() -> BTreeMap<String, String> {
    [("displayName", "Device"), ("operatingSystem", "OS")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn write_email_book(path: &Path, sheets: &[(&str, bool)]) {
    let mut workbook = Workbook::new();
    for (name, hidden) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        sheet.write_string(0, 0, "Name").unwrap();
        sheet.write_string(0, 1, "Email").unwrap();
        sheet.write_string(1, 0, "Alice").unwrap();
        sheet.write_string(1, 1, "  Alice@Example.COM ").unwrap();
        sheet.write_string(2, 0, "Nobody").unwrap();
        sheet.write_string(3, 0, "Bob").unwrap();
        sheet.write_string(3, 1, "bob@example.com").unwrap();
        if *hidden {
            sheet.set_hidden(true);
        }
    }
    workbook.save(path).unwrap();
}

#[test]
fn test_table_columns_and_order() {
    let records = vec![
        record("a@x.com", &[("displayName", "LAPTOP-1"), ("operatingSystem", "Windows")]),
        record(
            "a@x.com",
            &[("displayName", "PHONE-1"), ("operatingSystem", "iOS"), ("ownership", "Corporate")],
        ),
    ];
    let table = DeviceTable::from_records(&records, &mapping(), &[]);

    assert_eq!(table.columns, vec!["Email", "Device", "OS", "ownership"]);
    assert_eq!(
        table.rows,
        vec![
            vec!["a@x.com", "LAPTOP-1", "Windows", ""],
            vec!["a@x.com", "PHONE-1", "iOS", "Corporate"],
        ]
    );
}

#[test]
fn test_os_exclusion_after_rename() {
    let records = vec![
        record("a@x.com", &[("operatingSystem", "Windows")]),
        record("b@x.com", &[("operatingSystem", "Android")]),
    ];
    let table = DeviceTable::from_records(&records, &mapping(), &["Android".to_string()]);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0][0], "a@x.com");

    // Without a mapping to "OS" nothing is filtered
    let table = DeviceTable::from_records(&records, &BTreeMap::new(), &["Android".to_string()]);
    assert_eq!(table.rows.len(), 2);
}

#[test]
fn test_column_widths() {
    let table = DeviceTable {
        columns: vec!["Email".to_string(), "设备".to_string()],
        rows: vec![vec!["someone.with.long.name@example.com".to_string(), "x".to_string()]],
    };
    // Wide characters count by display width
    assert_eq!(table.column_widths(false), vec![9.0, 8.0]);
    assert_eq!(table.column_widths(true), vec![34.0, 8.0]);
}

#[test]
fn test_report_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export").join("device_list.xlsx");
    let records = vec![
        record("a@x.com", &[("displayName", "LAPTOP-1"), ("operatingSystem", "Windows")]),
        record("a@x.com", &[("displayName", "PHONE-1"), ("operatingSystem", "Android")]),
    ];
    let table = DeviceTable::from_records(&records, &mapping(), &["Android".to_string()]);
    write_device_report(&table, &path, true).unwrap();

    let (header, rows) = read_visible_sheet(&path).unwrap();
    assert_eq!(header, vec!["Email", "Device", "OS"]);
    assert_eq!(rows, vec![vec!["a@x.com", "LAPTOP-1", "Windows"]]);
}

#[test]
fn test_read_email_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("email_list.xlsx");
    write_email_book(&path, &[("emails", false), ("archive", true)]);

    let emails = read_email_list(&path).unwrap();
    assert_eq!(emails, vec!["alice@example.com", "bob@example.com"]);
}

#[test]
fn test_two_visible_sheets_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("email_list.xlsx");
    write_email_book(&path, &[("first", false), ("second", false)]);

    let err = read_email_list(&path).unwrap_err();
    assert!(matches!(err, Error::VisibleSheets { count: 2, .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_missing_email_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("email_list.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Name").unwrap();
    workbook.save(&path).unwrap();

    assert!(matches!(
        read_email_list(&path),
        Err(Error::MissingColumn { .. })
    ));
}

#[test]
fn test_parse_email_arg() {
    assert_eq!(
        parse_email_arg(" A@x.com,,b@X.com , "),
        vec!["a@x.com", "b@x.com"]
    );
}
