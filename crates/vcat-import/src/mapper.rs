//! Header-to-field mapping and cell cleaning.
//!
//! A mapping is resolved once per document from its header row. Each header
//! is tried against the registry in order:
//!
//! 1. exact label (`"CATNO"`)
//! 2. label, ignoring case
//! 3. column name, ignoring case (`"product_code"`)
//! 4. any header starting with `image` maps to the image URL
//!
//! The first header to claim a field keeps it; a later duplicate column for
//! the same field is ignored rather than overwriting the earlier one.
//! Headers that match nothing are ignored.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use vcat_core::{CatalogField, FieldKind, FieldSpec, FieldValue, RowValues};

/// One spreadsheet row: cell texts aligned with the document headers.
pub type RawRow = Vec<String>;

const TRUTHY: [&str; 5] = ["1", "true", "yes", "y", "x"];

/// Scale of every stored price column.
const NUMBER_SCALE: u32 = 4;

/// Largest magnitude a price column holds (`NUMERIC(14,4)`).
const NUMBER_LIMIT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 4);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// `(field, header index)` in registry order.
    columns: Vec<(CatalogField, usize)>,
}

impl FieldMapping {
    #[must_use]
    pub fn resolve(headers: &[String]) -> Self {
        let registry = CatalogField::registry();
        let mut columns: Vec<(CatalogField, usize)> = Vec::new();

        for (index, header) in headers.iter().enumerate() {
            let header = header.trim();
            if header.is_empty() {
                continue;
            }
            let Some(field) = match_header(registry, header) else {
                tracing::debug!(header, "unmapped column ignored");
                continue;
            };
            if columns.iter().any(|(f, _)| *f == field) {
                tracing::debug!(header, field = %field, "column already mapped; ignored");
                continue;
            }
            columns.push((field, index));
        }

        columns.sort_by_key(|(field, _)| *field);
        Self { columns }
    }

    /// Mapped fields in registry order; the write shape of every row.
    #[must_use]
    pub fn fields(&self) -> Vec<CatalogField> {
        self.columns.iter().map(|(field, _)| *field).collect()
    }

    #[must_use]
    pub fn contains(&self, field: CatalogField) -> bool {
        self.columns.iter().any(|(f, _)| *f == field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Clean every mapped cell of `raw`. Missing trailing cells count as blank.
    #[must_use]
    pub fn clean_row(&self, raw: &[String]) -> RowValues {
        self.columns
            .iter()
            .map(|(field, index)| {
                let cell = raw.get(*index).map_or("", String::as_str);
                (*field, clean_value(field.kind(), cell))
            })
            .collect()
    }
}

fn match_header(registry: &[FieldSpec], header: &str) -> Option<CatalogField> {
    let lower = header.to_lowercase();
    registry
        .iter()
        .find(|spec| spec.label == header)
        .or_else(|| registry.iter().find(|spec| spec.label.to_lowercase() == lower))
        .or_else(|| registry.iter().find(|spec| spec.name == lower))
        .map(|spec| spec.field)
        .or_else(|| lower.starts_with("image").then_some(CatalogField::ImageUrl))
}

/// Typecast one cell.
///
/// Numbers tolerate currency symbols and thousands separators and are
/// rounded to four decimal places; anything unparseable or too large to
/// store becomes zero. Text that is an integral decimal (`"12.0"`) is
/// reduced to its integer form.
#[must_use]
pub fn clean_value(kind: FieldKind, raw: &str) -> FieldValue {
    let raw = raw.trim();
    match kind {
        FieldKind::Text => FieldValue::Text(normalize_integral(raw)),
        FieldKind::Binary => FieldValue::Text(raw.to_string()),
        FieldKind::Number => FieldValue::Number(parse_number(raw)),
        FieldKind::Boolean => {
            let lower = raw.to_lowercase();
            FieldValue::Boolean(TRUTHY.contains(&lower.as_str()))
        }
    }
}

fn parse_number(raw: &str) -> Decimal {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if stripped.is_empty() {
        return Decimal::ZERO;
    }
    let Ok(number) =
        Decimal::from_str(&stripped).or_else(|_| Decimal::from_scientific(&stripped))
    else {
        tracing::warn!(value = raw, "unparseable number; using 0");
        return Decimal::ZERO;
    };
    let number =
        number.round_dp_with_strategy(NUMBER_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if number.abs() > NUMBER_LIMIT {
        tracing::warn!(value = raw, "number out of range; using 0");
        return Decimal::ZERO;
    }
    number
}

fn normalize_integral(raw: &str) -> String {
    if raw.contains('.') {
        if let Ok(n) = Decimal::from_str(raw) {
            if n.fract().is_zero() {
                return n.trunc().normalize().to_string();
            }
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn resolve_applies_rules_in_order() {
        let mapping = FieldMapping::resolve(&headers(&[
            "CATNO",
            "short description",
            "size_1",
            "Image Link",
            "Warehouse Bin",
        ]));

        assert!(mapping.contains(CatalogField::ProductCode));
        assert!(mapping.contains(CatalogField::Name));
        assert!(mapping.contains(CatalogField::Size(1)));
        assert!(mapping.contains(CatalogField::ImageUrl));
        assert_eq!(mapping.fields().len(), 4);
    }

    #[test]
    fn first_header_claims_a_field() {
        let mapping = FieldMapping::resolve(&headers(&["CATNO", "product_code"]));
        let row = mapping.clean_row(&headers(&["A100", "B200"]));
        assert_eq!(row[&CatalogField::ProductCode], FieldValue::Text("A100".to_string()));
    }

    #[test]
    fn fields_follow_registry_order_not_header_order() {
        let mapping = FieldMapping::resolve(&headers(&["size_1", "CATNO"]));
        assert_eq!(
            mapping.fields(),
            vec![CatalogField::ProductCode, CatalogField::Size(1)]
        );
    }

    #[test]
    fn clean_row_treats_missing_cells_as_blank() {
        let mapping = FieldMapping::resolve(&headers(&["CATNO", "COST1"]));
        let row = mapping.clean_row(&headers(&["A100"]));
        assert_eq!(row[&CatalogField::Cost(1)], FieldValue::Number(Decimal::ZERO));
    }

    #[test]
    fn numbers_strip_currency_formatting() {
        assert_eq!(
            clean_value(FieldKind::Number, " $1,234.50 "),
            FieldValue::Number(Decimal::new(123_450, 2))
        );
        assert_eq!(clean_value(FieldKind::Number, ""), FieldValue::Number(Decimal::ZERO));
        assert_eq!(
            clean_value(FieldKind::Number, "n/a"),
            FieldValue::Number(Decimal::ZERO)
        );
    }

    #[test]
    fn numbers_round_to_four_places() {
        assert_eq!(
            clean_value(FieldKind::Number, "1.23456"),
            FieldValue::Number(Decimal::new(12_346, 4))
        );
    }

    #[test]
    fn numbers_too_large_to_store_become_zero() {
        assert_eq!(
            clean_value(FieldKind::Number, "12,345,678,901.00"),
            FieldValue::Number(Decimal::ZERO)
        );
        assert_eq!(
            clean_value(FieldKind::Number, "-12345678901"),
            FieldValue::Number(Decimal::ZERO)
        );
        assert_eq!(
            clean_value(FieldKind::Number, "9,999,999,999.9999"),
            FieldValue::Number(NUMBER_LIMIT)
        );
        assert_eq!(NUMBER_LIMIT.to_string(), "9999999999.9999");
    }

    #[test]
    fn integral_text_drops_spreadsheet_float_suffix() {
        assert_eq!(clean_value(FieldKind::Text, "12.0"), FieldValue::Text("12".to_string()));
        assert_eq!(clean_value(FieldKind::Text, "12.5"), FieldValue::Text("12.5".to_string()));
        assert_eq!(clean_value(FieldKind::Text, "0042"), FieldValue::Text("0042".to_string()));
        assert_eq!(clean_value(FieldKind::Text, "1.0.2"), FieldValue::Text("1.0.2".to_string()));
    }

    #[test]
    fn booleans_accept_common_truthy_tokens() {
        for token in ["1", "TRUE", "yes", "Y", "x"] {
            assert_eq!(clean_value(FieldKind::Boolean, token), FieldValue::Boolean(true));
        }
        assert_eq!(clean_value(FieldKind::Boolean, "no"), FieldValue::Boolean(false));
        assert_eq!(clean_value(FieldKind::Boolean, ""), FieldValue::Boolean(false));
    }

    #[test]
    fn binary_cells_are_kept_verbatim() {
        assert_eq!(
            clean_value(FieldKind::Binary, " https://cdn.example/1.0.png "),
            FieldValue::Text("https://cdn.example/1.0.png".to_string())
        );
    }
}
