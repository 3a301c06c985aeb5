//! Row types read from the catalog store and the inputs written to it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use vcat_core::{CatalogField, FieldValue, RowValues, TemplateDefaults, VariantSlot, SLOT_COUNT};

// ---------------------------------------------------------------------------
// Import bookkeeping
// ---------------------------------------------------------------------------

/// Lifecycle of one source document.
///
/// `pending → importing(batch) → done`, or `importing(batch) → failed(batch)`.
/// A failed document resumes from its persisted `batch` on the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStatus {
    Pending,
    Importing,
    Done,
    Failed,
}

impl AttachmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentStatus::Pending => "pending",
            AttachmentStatus::Importing => "importing",
            AttachmentStatus::Done => "done",
            AttachmentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AttachmentStatus::Pending),
            "importing" => Ok(AttachmentStatus::Importing),
            "done" => Ok(AttachmentStatus::Done),
            "failed" => Ok(AttachmentStatus::Failed),
            other => Err(format!("unknown attachment status \"{other}\"")),
        }
    }
}

/// A row from the `import_attachments` table: one source document plus its
/// batch cursor.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AttachmentRow {
    pub id: i64,
    pub name: String,
    /// Hex SHA-256 of the document bytes.
    pub checksum: String,
    pub status: String,
    /// Number of windows fully committed.
    pub batch: i32,
    pub row_count: i32,
    pub error_message: Option<String>,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttachmentRow {
    /// Parsed `status`; `None` only if the column holds an unknown value.
    #[must_use]
    pub fn state(&self) -> Option<AttachmentStatus> {
        self.status.parse().ok()
    }
}

/// A row from the `import_runs` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ImportRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub windows_committed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Columns selected for [`TemplateRow`]; the stored image bytes are excluded.
pub const TEMPLATE_COLUMNS: &str = "id, product_code, name, description, categ_one, categ_two, \
     unspsc, product_url, weblink, weblink_title, upc_code, upn_code, mfr_num, mfr_name, \
     vendor_name, image_url, sale_ok, purchase_ok, \
     size_1, unit_1, unitqty_1, cost_1, list_1, \
     size_2, unit_2, unitqty_2, cost_2, list_2, \
     size_3, unit_3, unitqty_3, cost_3, list_3, \
     categ_name, uom_name, uom_po_name, product_type, tracking, sale_line_warn, \
     purchase_line_warn, list_price, standard_price, is_published, dropship, \
     image_updated, image_failed, active, to_remove, attachment_id";

/// A row from the `product_templates` table.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct TemplateRow {
    pub id: i64,
    pub product_code: String,
    pub name: String,
    pub description: String,
    pub categ_one: String,
    pub categ_two: String,
    pub unspsc: String,
    pub product_url: String,
    pub weblink: String,
    pub weblink_title: String,
    pub upc_code: String,
    pub upn_code: String,
    pub mfr_num: String,
    pub mfr_name: String,
    pub vendor_name: String,
    pub image_url: String,
    pub sale_ok: bool,
    pub purchase_ok: bool,
    pub size_1: String,
    pub unit_1: String,
    pub unitqty_1: String,
    pub cost_1: Decimal,
    pub list_1: Decimal,
    pub size_2: String,
    pub unit_2: String,
    pub unitqty_2: String,
    pub cost_2: Decimal,
    pub list_2: Decimal,
    pub size_3: String,
    pub unit_3: String,
    pub unitqty_3: String,
    pub cost_3: Decimal,
    pub list_3: Decimal,
    pub categ_name: String,
    pub uom_name: String,
    pub uom_po_name: String,
    pub product_type: String,
    pub tracking: String,
    pub sale_line_warn: String,
    pub purchase_line_warn: String,
    pub list_price: Decimal,
    pub standard_price: Decimal,
    pub is_published: bool,
    pub dropship: bool,
    pub image_updated: bool,
    pub image_failed: bool,
    pub active: bool,
    pub to_remove: bool,
    pub attachment_id: Option<i64>,
}

impl TemplateRow {
    /// Descriptor slot `n` (1-based).
    ///
    /// # Panics
    ///
    /// Panics if `n` is outside `1..=SLOT_COUNT`.
    #[must_use]
    pub fn slot(&self, n: u8) -> VariantSlot {
        let (size, unit, unitqty, cost, list) = match n {
            1 => (&self.size_1, &self.unit_1, &self.unitqty_1, self.cost_1, self.list_1),
            2 => (&self.size_2, &self.unit_2, &self.unitqty_2, self.cost_2, self.list_2),
            3 => (&self.size_3, &self.unit_3, &self.unitqty_3, self.cost_3, self.list_3),
            _ => panic!("slot {n} out of range 1..={SLOT_COUNT}"),
        };
        VariantSlot {
            size: size.clone(),
            unit: unit.clone(),
            unitqty: unitqty.clone(),
            cost,
            list,
        }
    }

    #[must_use]
    pub fn slots(&self) -> [VariantSlot; SLOT_COUNT] {
        [self.slot(1), self.slot(2), self.slot(3)]
    }

    /// Current value of a registry field.
    #[must_use]
    pub fn value(&self, field: CatalogField) -> FieldValue {
        if let Some(text) = self.text_ref(field) {
            return FieldValue::Text(text.clone());
        }
        match field {
            CatalogField::SaleOk => FieldValue::Boolean(self.sale_ok),
            CatalogField::PurchaseOk => FieldValue::Boolean(self.purchase_ok),
            CatalogField::Cost(n) | CatalogField::List(n) => {
                let slot = self.slot(n);
                FieldValue::Number(if matches!(field, CatalogField::Cost(_)) {
                    slot.cost
                } else {
                    slot.list
                })
            }
            _ => FieldValue::empty(field.kind()),
        }
    }

    /// Overwrite a registry field with a cleaned value.
    pub fn set_value(&mut self, field: CatalogField, value: &FieldValue) {
        if let Some(text) = self.text_mut(field) {
            value.as_text().clone_into(text);
            return;
        }
        match field {
            CatalogField::SaleOk => self.sale_ok = value.as_bool(),
            CatalogField::PurchaseOk => self.purchase_ok = value.as_bool(),
            CatalogField::Cost(1) => self.cost_1 = value.as_number(),
            CatalogField::Cost(2) => self.cost_2 = value.as_number(),
            CatalogField::Cost(3) => self.cost_3 = value.as_number(),
            CatalogField::List(1) => self.list_1 = value.as_number(),
            CatalogField::List(2) => self.list_2 = value.as_number(),
            CatalogField::List(3) => self.list_3 = value.as_number(),
            _ => {}
        }
    }

    /// Apply every value of a cleaned row.
    pub fn apply(&mut self, values: &RowValues) {
        for (field, value) in values {
            self.set_value(*field, value);
        }
    }

    fn text_ref(&self, field: CatalogField) -> Option<&String> {
        let text = match field {
            CatalogField::Name => &self.name,
            CatalogField::Description => &self.description,
            CatalogField::CategOne => &self.categ_one,
            CatalogField::CategTwo => &self.categ_two,
            CatalogField::Unspsc => &self.unspsc,
            CatalogField::ProductUrl => &self.product_url,
            CatalogField::Weblink => &self.weblink,
            CatalogField::WeblinkTitle => &self.weblink_title,
            CatalogField::UpcCode => &self.upc_code,
            CatalogField::UpnCode => &self.upn_code,
            CatalogField::ProductCode => &self.product_code,
            CatalogField::MfrNum => &self.mfr_num,
            CatalogField::MfrName => &self.mfr_name,
            CatalogField::VendorName => &self.vendor_name,
            CatalogField::ImageUrl => &self.image_url,
            CatalogField::Size(1) => &self.size_1,
            CatalogField::Size(2) => &self.size_2,
            CatalogField::Size(3) => &self.size_3,
            CatalogField::Unit(1) => &self.unit_1,
            CatalogField::Unit(2) => &self.unit_2,
            CatalogField::Unit(3) => &self.unit_3,
            CatalogField::UnitQty(1) => &self.unitqty_1,
            CatalogField::UnitQty(2) => &self.unitqty_2,
            CatalogField::UnitQty(3) => &self.unitqty_3,
            _ => return None,
        };
        Some(text)
    }

    fn text_mut(&mut self, field: CatalogField) -> Option<&mut String> {
        let text = match field {
            CatalogField::Name => &mut self.name,
            CatalogField::Description => &mut self.description,
            CatalogField::CategOne => &mut self.categ_one,
            CatalogField::CategTwo => &mut self.categ_two,
            CatalogField::Unspsc => &mut self.unspsc,
            CatalogField::ProductUrl => &mut self.product_url,
            CatalogField::Weblink => &mut self.weblink,
            CatalogField::WeblinkTitle => &mut self.weblink_title,
            CatalogField::UpcCode => &mut self.upc_code,
            CatalogField::UpnCode => &mut self.upn_code,
            CatalogField::ProductCode => &mut self.product_code,
            CatalogField::MfrNum => &mut self.mfr_num,
            CatalogField::MfrName => &mut self.mfr_name,
            CatalogField::VendorName => &mut self.vendor_name,
            CatalogField::ImageUrl => &mut self.image_url,
            CatalogField::Size(1) => &mut self.size_1,
            CatalogField::Size(2) => &mut self.size_2,
            CatalogField::Size(3) => &mut self.size_3,
            CatalogField::Unit(1) => &mut self.unit_1,
            CatalogField::Unit(2) => &mut self.unit_2,
            CatalogField::Unit(3) => &mut self.unit_3,
            CatalogField::UnitQty(1) => &mut self.unitqty_1,
            CatalogField::UnitQty(2) => &mut self.unitqty_2,
            CatalogField::UnitQty(3) => &mut self.unitqty_3,
            _ => return None,
        };
        Some(text)
    }
}

/// A template row to insert: the cleaned sheet values plus the universal
/// defaults every new template starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTemplate {
    pub values: RowValues,
    pub defaults: TemplateDefaults,
}

impl NewTemplate {
    #[must_use]
    pub fn product_code(&self) -> &str {
        self.values
            .get(&CatalogField::ProductCode)
            .map_or("", FieldValue::as_text)
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AttributeValueRow {
    pub id: i64,
    pub attribute_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AttributeLineRow {
    pub id: i64,
    pub template_id: i64,
    pub attribute_id: i64,
    pub active: bool,
}

/// Per-template instantiation of a shared attribute value.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TemplateAttributeValueRow {
    pub id: i64,
    pub line_id: i64,
    pub template_id: i64,
    pub attribute_value_id: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NewTemplateAttributeValue {
    pub line_id: i64,
    pub template_id: i64,
    pub attribute_value_id: i64,
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// A row from the `product_variants` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct VariantRow {
    pub id: i64,
    pub template_id: i64,
    pub default_code: String,
    pub size: String,
    pub unit: String,
    pub unitqty: String,
    pub standard_price: Decimal,
    pub base_list_price: Decimal,
    /// Sorted, comma-joined template-attribute-value ids.
    pub combination_indices: String,
    pub is_published: bool,
    pub active: bool,
    pub to_remove: bool,
    pub attachment_id: Option<i64>,
}

pub const VARIANT_COLUMNS: &str = "id, template_id, default_code, size, unit, unitqty, \
     standard_price, base_list_price, combination_indices, is_published, active, to_remove, \
     attachment_id";

/// Variant upsert input; conflicts on `default_code`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub template_id: i64,
    pub default_code: String,
    pub size: String,
    pub unit: String,
    pub unitqty: String,
    pub standard_price: Decimal,
    pub base_list_price: Decimal,
    pub attachment_id: i64,
}

// ---------------------------------------------------------------------------
// Vendors and price lists
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PartnerRow {
    pub id: i64,
    pub name: String,
}

/// A row from the `vendor_prices` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct VendorPriceRow {
    pub id: i64,
    pub partner_id: i64,
    pub template_id: i64,
    pub variant_id: Option<i64>,
    pub sequence: i32,
    pub product_code: String,
    pub mfr_name: String,
    pub mfr_num: String,
    pub currency_code: String,
    pub min_qty: Decimal,
    pub price: Decimal,
    pub delay_days: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVendorPrice {
    pub partner_id: i64,
    pub template_id: i64,
    /// `None` for a template-level entry.
    pub variant_id: Option<i64>,
    pub product_code: String,
    pub mfr_name: String,
    pub mfr_num: String,
    pub currency_code: String,
    pub price: Decimal,
}

// ---------------------------------------------------------------------------
// Lifecycle and images
// ---------------------------------------------------------------------------

/// Rows touched by a lifecycle pass, split by table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleCounts {
    pub templates: u64,
    pub variants: u64,
}

/// A template waiting for its image to be (re)fetched.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ImagePendingRow {
    pub id: i64,
    pub image_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_status_parses_every_variant() {
        for status in [
            AttachmentStatus::Pending,
            AttachmentStatus::Importing,
            AttachmentStatus::Done,
            AttachmentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<AttachmentStatus>(), Ok(status));
        }
        assert!("archived".parse::<AttachmentStatus>().is_err());
    }

    #[test]
    fn set_value_round_trips_through_value() {
        let mut row = TemplateRow::default();
        row.set_value(CatalogField::Size(2), &FieldValue::Text("Large".to_string()));
        row.set_value(CatalogField::Cost(3), &FieldValue::Number(Decimal::new(425, 2)));
        row.set_value(CatalogField::SaleOk, &FieldValue::Boolean(true));

        assert_eq!(row.size_2, "Large");
        assert_eq!(row.cost_3, Decimal::new(425, 2));
        assert_eq!(row.value(CatalogField::Size(2)), FieldValue::Text("Large".to_string()));
        assert_eq!(row.value(CatalogField::Cost(3)), FieldValue::Number(Decimal::new(425, 2)));
        assert_eq!(row.value(CatalogField::SaleOk), FieldValue::Boolean(true));
    }

    #[test]
    fn slot_collects_numbered_columns() {
        let row = TemplateRow {
            size_1: "Small".to_string(),
            unit_1: "EA".to_string(),
            unitqty_1: "1".to_string(),
            cost_1: Decimal::from(5),
            list_1: Decimal::from(10),
            ..TemplateRow::default()
        };
        let slot = row.slot(1);
        assert_eq!(slot.size, "Small");
        assert_eq!(slot.unit, "EA");
        assert_eq!(slot.cost, Decimal::from(5));
        assert!(!row.slot(2).is_sized());
    }

    #[test]
    fn new_template_reports_product_code() {
        let mut values = RowValues::new();
        values.insert(CatalogField::ProductCode, FieldValue::Text("A100".to_string()));
        let row = NewTemplate {
            values,
            defaults: TemplateDefaults::default(),
        };
        assert_eq!(row.product_code(), "A100");
    }
}
