//! Catalog field registry and the typed values a spreadsheet row is cleaned
//! into before it reaches the store.
//!
//! The registry is the single source of truth for which template columns an
//! import may write, how each one is labelled in vendor spreadsheets, and
//! what kind of value it holds.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of (size, unit, quantity, cost, list) descriptor slots per template.
pub const SLOT_COUNT: usize = 3;

/// The kind of value a catalog field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    /// Cell holds a URL that is resolved to binary content by the image pass.
    Binary,
}

/// A writable product-template field.
///
/// Slot fields carry their 1-based slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CatalogField {
    Name,
    Description,
    CategOne,
    CategTwo,
    Unspsc,
    ProductUrl,
    Weblink,
    WeblinkTitle,
    UpcCode,
    UpnCode,
    ProductCode,
    MfrNum,
    MfrName,
    VendorName,
    ImageUrl,
    SaleOk,
    PurchaseOk,
    Size(u8),
    Unit(u8),
    UnitQty(u8),
    Cost(u8),
    List(u8),
}

/// Registry entry describing one catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: CatalogField,
    /// Internal name; also the `product_templates` column name.
    pub name: &'static str,
    /// Human label as printed in vendor spreadsheet headers.
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn spec(
    field: CatalogField,
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        field,
        name,
        label,
        kind,
    }
}

static REGISTRY: [FieldSpec; 32] = [
    spec(CatalogField::Name, "name", "SHORT DESCRIPTION", FieldKind::Text),
    spec(CatalogField::Description, "description", "LONG DESCRIPTION", FieldKind::Text),
    spec(CatalogField::CategOne, "categ_one", "CATEGORY1", FieldKind::Text),
    spec(CatalogField::CategTwo, "categ_two", "CATEGORY2", FieldKind::Text),
    spec(CatalogField::Unspsc, "unspsc", "UNSPSC Code", FieldKind::Text),
    spec(CatalogField::ProductUrl, "product_url", "PRODUCT URL", FieldKind::Text),
    spec(CatalogField::Weblink, "weblink", "ADDITIONAL WEBLINK", FieldKind::Text),
    spec(CatalogField::WeblinkTitle, "weblink_title", "ADDITIONAL WEBLINK_TITLE", FieldKind::Text),
    spec(CatalogField::UpcCode, "upc_code", "UPC", FieldKind::Text),
    spec(CatalogField::UpnCode, "upn_code", "UPN", FieldKind::Text),
    spec(CatalogField::ProductCode, "product_code", "CATNO", FieldKind::Text),
    spec(CatalogField::MfrNum, "mfr_num", "MFRNO", FieldKind::Text),
    spec(CatalogField::MfrName, "mfr_name", "MFRNAME", FieldKind::Text),
    spec(CatalogField::VendorName, "vendor_name", "Vendor Name", FieldKind::Text),
    spec(CatalogField::ImageUrl, "image_url", "IMAGE", FieldKind::Binary),
    spec(CatalogField::SaleOk, "sale_ok", "Can be Sold", FieldKind::Boolean),
    spec(CatalogField::PurchaseOk, "purchase_ok", "Can be Purchased", FieldKind::Boolean),
    spec(CatalogField::Size(1), "size_1", "SIZE_1", FieldKind::Text),
    spec(CatalogField::Unit(1), "unit_1", "UNIT_1", FieldKind::Text),
    spec(CatalogField::UnitQty(1), "unitqty_1", "UNITQTY_1", FieldKind::Text),
    spec(CatalogField::Cost(1), "cost_1", "COST1", FieldKind::Number),
    spec(CatalogField::List(1), "list_1", "LIST1", FieldKind::Number),
    spec(CatalogField::Size(2), "size_2", "SIZE_2", FieldKind::Text),
    spec(CatalogField::Unit(2), "unit_2", "UNIT_2", FieldKind::Text),
    spec(CatalogField::UnitQty(2), "unitqty_2", "UNITQTY_2", FieldKind::Text),
    spec(CatalogField::Cost(2), "cost_2", "COST2", FieldKind::Number),
    spec(CatalogField::List(2), "list_2", "LIST2", FieldKind::Number),
    spec(CatalogField::Size(3), "size_3", "SIZE_3", FieldKind::Text),
    spec(CatalogField::Unit(3), "unit_3", "UNIT_3", FieldKind::Text),
    spec(CatalogField::UnitQty(3), "unitqty_3", "UNITQTY_3", FieldKind::Text),
    spec(CatalogField::Cost(3), "cost_3", "COST3", FieldKind::Number),
    spec(CatalogField::List(3), "list_3", "LIST3", FieldKind::Number),
];

impl CatalogField {
    /// All registered fields, in registry order.
    #[must_use]
    pub fn registry() -> &'static [FieldSpec] {
        &REGISTRY
    }

    /// Registry entry for this field.
    ///
    /// # Panics
    ///
    /// Panics for slot fields outside `1..=SLOT_COUNT`, which the registry
    /// never hands out.
    #[must_use]
    pub fn spec(self) -> &'static FieldSpec {
        REGISTRY
            .iter()
            .find(|s| s.field == self)
            .expect("every constructed CatalogField is registered")
    }

    #[must_use]
    pub fn column(self) -> &'static str {
        self.spec().name
    }

    #[must_use]
    pub fn kind(self) -> FieldKind {
        self.spec().kind
    }

    /// Fields that feed variant synthesis and price lists for `slot`.
    #[must_use]
    pub fn slot_fields(slot: u8) -> [CatalogField; 5] {
        [
            CatalogField::Size(slot),
            CatalogField::Unit(slot),
            CatalogField::UnitQty(slot),
            CatalogField::Cost(slot),
            CatalogField::List(slot),
        ]
    }
}

impl fmt::Display for CatalogField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A cleaned, typed cell value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
    Boolean(bool),
}

impl FieldValue {
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            FieldValue::Text(s) => s,
            FieldValue::Number(_) | FieldValue::Boolean(_) => "",
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Decimal {
        match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(_) | FieldValue::Boolean(_) => Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> bool {
        matches!(self, FieldValue::Boolean(true))
    }

    /// The empty value for a field kind: blank text, zero, or `false`.
    #[must_use]
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text | FieldKind::Binary => FieldValue::Text(String::new()),
            FieldKind::Number => FieldValue::Number(Decimal::ZERO),
            FieldKind::Boolean => FieldValue::Boolean(false),
        }
    }
}

/// One spreadsheet row after mapping and type cleaning.
pub type RowValues = BTreeMap<CatalogField, FieldValue>;

/// One (size, unit, quantity, cost, list-price) descriptor of a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSlot {
    pub size: String,
    pub unit: String,
    pub unitqty: String,
    pub cost: Decimal,
    pub list: Decimal,
}

impl VariantSlot {
    /// A slot produces a variant only when its size is non-blank.
    #[must_use]
    pub fn is_sized(&self) -> bool {
        !self.size.trim().is_empty()
    }
}

/// Derived variant code: catalog code, unit and quantity concatenated.
#[must_use]
pub fn derived_variant_code(catalog_code: &str, unit: &str, unitqty: &str) -> String {
    let mut code = String::with_capacity(catalog_code.len() + unit.len() + unitqty.len());
    code.push_str(catalog_code);
    code.push_str(unit);
    code.push_str(unitqty);
    code
}

/// Combination signature: the attribute-value ids sorted ascending and
/// joined with commas.
#[must_use]
pub fn combination_signature(ids: &[i64]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Values every newly created template receives regardless of the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefaults {
    pub category: String,
    pub uom: String,
    pub uom_po: String,
    pub product_type: String,
    pub tracking: String,
    pub sale_line_warn: String,
    pub purchase_line_warn: String,
}

impl Default for TemplateDefaults {
    fn default() -> Self {
        Self {
            category: "All".to_string(),
            uom: "Units".to_string(),
            uom_po: "Units".to_string(),
            product_type: "consu".to_string(),
            tracking: "none".to_string(),
            sale_line_warn: "no-message".to_string(),
            purchase_line_warn: "no-message".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_columns_are_unique() {
        let mut names: Vec<&str> = CatalogField::registry().iter().map(|s| s.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn slot_fields_resolve_to_numbered_columns() {
        let cols: Vec<&str> = CatalogField::slot_fields(2)
            .iter()
            .map(|f| f.column())
            .collect();
        assert_eq!(cols, vec!["size_2", "unit_2", "unitqty_2", "cost_2", "list_2"]);
    }

    #[test]
    fn derived_code_concatenates_code_unit_and_quantity() {
        assert_eq!(derived_variant_code("A100", "EA", "1"), "A100EA1");
        assert_eq!(derived_variant_code("A100", "", ""), "A100");
    }

    #[test]
    fn combination_signature_sorts_numerically() {
        assert_eq!(combination_signature(&[12, 3, 100]), "3,12,100");
        assert_eq!(combination_signature(&[7]), "7");
        assert_eq!(combination_signature(&[]), "");
    }

    #[test]
    fn combination_signature_ignores_duplicate_links() {
        assert_eq!(combination_signature(&[5, 5, 2]), "2,5");
    }

    #[test]
    fn blank_size_slot_is_not_sized() {
        let slot = VariantSlot {
            size: "   ".to_string(),
            ..VariantSlot::default()
        };
        assert!(!slot.is_sized());
    }

    #[test]
    fn empty_value_matches_kind() {
        assert_eq!(FieldValue::empty(FieldKind::Number), FieldValue::Number(Decimal::ZERO));
        assert_eq!(FieldValue::empty(FieldKind::Binary), FieldValue::Text(String::new()));
        assert_eq!(FieldValue::empty(FieldKind::Boolean), FieldValue::Boolean(false));
    }

    #[test]
    fn field_value_serializes_with_kind_tag() {
        let json = serde_json::to_string(&FieldValue::Boolean(true)).unwrap();
        assert_eq!(json, r#"{"kind":"boolean","value":true}"#);
    }
}
