//! Device row markup to field mapping

use lazy_static::lazy_static;
use scraper::{Html, Selector};

use crate::types::DeviceFields;

/// Attribute that names a cell independently of its visible header
pub const FIELD_KEY_ATTR: &str = "data-automation-key";

lazy_static! {
    static ref CELL: Option<Selector> = Selector::parse("div.ms-DetailsRow-cell").ok();
}

/// Parse one rendered row into `data-automation-key -> text`.
///
/// Cells without the key attribute are skipped, so rows that render fewer
/// cells simply yield fewer fields. When a key repeats, the later cell wins.
pub fn device_fields(markup: &str) -> DeviceFields {
    let mut fields = DeviceFields::new();
    let Some(cell) = CELL.as_ref() else {
        return fields;
    };

    let fragment = Html::parse_fragment(markup);
    for element in fragment.select(cell) {
        let Some(key) = element.value().attr(FIELD_KEY_ATTR) else {
            continue;
        };
        let value: String = element.text().map(str::trim).collect();
        fields.insert(key.to_string(), value);
    }
    fields
}
