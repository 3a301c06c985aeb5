//! In-memory catalog store.
//!
//! Backs `--dry-run` imports and the engine's scenario tests. A transaction
//! works on a private copy of the state and swaps it in on commit, so a
//! rolled-back window leaves nothing behind. Concurrent transactions are not
//! isolated from each other: the last commit wins.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use vcat_core::{CatalogField, FieldValue, RowValues};

use crate::rows::{
    AttachmentRow, AttachmentStatus, AttributeLineRow, AttributeValueRow, ImagePendingRow,
    ImportRunRow, LifecycleCounts, NewTemplate, NewTemplateAttributeValue, NewVariant,
    NewVendorPrice, PartnerRow, TemplateAttributeValueRow, TemplateRow, VariantRow,
    VendorPriceRow,
};
use crate::store::{CatalogStore, CatalogTx};
use crate::DbError;

/// An operation that can be armed to fail once with [`DbError::Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertTemplates,
    UpdateTemplates,
    UpsertVariants,
    InsertVendorPrices,
    /// Moving an importing attachment's batch cursor forward.
    AdvanceCursor,
}

type CommitFn = dyn Fn(&CatalogState) + Send + Sync;

#[derive(Clone)]
struct CommitHook(Arc<CommitFn>);

impl std::fmt::Debug for CommitHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CommitHook")
    }
}

/// Full contents of an in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    last_id: i64,
    pub import_runs: Vec<ImportRunRow>,
    pub attachments: Vec<AttachmentRow>,
    pub templates: Vec<TemplateRow>,
    pub attributes: Vec<(i64, String)>,
    pub attribute_values: Vec<AttributeValueRow>,
    pub attribute_lines: Vec<AttributeLineRow>,
    pub template_attribute_values: Vec<TemplateAttributeValueRow>,
    pub variants: Vec<VariantRow>,
    /// `(variant_id, template_attribute_value_id)` links.
    pub combinations: BTreeSet<(i64, i64)>,
    pub partners: Vec<PartnerRow>,
    pub vendor_prices: Vec<VendorPriceRow>,
    pub images: BTreeMap<i64, Vec<u8>>,
}

impl CatalogState {
    /// Next id; shared by every table and strictly increasing.
    pub fn allocate_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    #[must_use]
    pub fn template(&self, id: i64) -> Option<&TemplateRow> {
        self.templates.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn template_by_code(&self, code: &str) -> Option<&TemplateRow> {
        self.templates.iter().find(|t| t.product_code == code)
    }

    #[must_use]
    pub fn variant_by_code(&self, code: &str) -> Option<&VariantRow> {
        self.variants.iter().find(|v| v.default_code == code)
    }

    #[must_use]
    pub fn variants_of(&self, template_id: i64) -> Vec<&VariantRow> {
        self.variants
            .iter()
            .filter(|v| v.template_id == template_id)
            .collect()
    }

    #[must_use]
    pub fn vendor_prices_of(&self, template_id: i64) -> Vec<&VendorPriceRow> {
        let variant_ids: BTreeSet<i64> = self
            .variants_of(template_id)
            .iter()
            .map(|v| v.id)
            .collect();
        self.vendor_prices
            .iter()
            .filter(|p| {
                p.template_id == template_id
                    || p.variant_id.is_some_and(|id| variant_ids.contains(&id))
            })
            .collect()
    }

    fn template_mut(&mut self, id: i64) -> Option<&mut TemplateRow> {
        self.templates.iter_mut().find(|t| t.id == id)
    }

    fn attachment_mut(&mut self, id: i64) -> Result<&mut AttachmentRow, DbError> {
        self.attachments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(DbError::NotFound)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Catalog store held entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
    faults: Arc<Mutex<Vec<FailPoint>>>,
    on_commit: Arc<Mutex<Option<CommitHook>>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a prepared state.
    #[must_use]
    pub fn from_state(state: CatalogState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        }
    }

    /// Copy of the last committed state.
    #[must_use]
    pub fn snapshot(&self) -> CatalogState {
        lock(&self.state).clone()
    }

    /// Make the next call of `point` fail inside its transaction.
    pub fn fail_next(&self, point: FailPoint) {
        lock(&self.faults).push(point);
    }

    /// Run `hook` with the new state after every commit. The hook runs while
    /// the catalog is locked and must not call back into it.
    pub fn on_commit(&self, hook: impl Fn(&CatalogState) + Send + Sync + 'static) {
        *lock(&self.on_commit) = Some(CommitHook(Arc::new(hook)));
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    type Tx = MemoryCatalogTx;

    async fn begin(&self) -> Result<MemoryCatalogTx, DbError> {
        Ok(MemoryCatalogTx {
            working: lock(&self.state).clone(),
            shared: Arc::clone(&self.state),
            faults: Arc::clone(&self.faults),
            on_commit: Arc::clone(&self.on_commit),
        })
    }
}

/// A transaction over a private copy of the catalog.
#[derive(Debug)]
pub struct MemoryCatalogTx {
    working: CatalogState,
    shared: Arc<Mutex<CatalogState>>,
    faults: Arc<Mutex<Vec<FailPoint>>>,
    on_commit: Arc<Mutex<Option<CommitHook>>>,
}

impl MemoryCatalogTx {
    fn trip(&self, point: FailPoint) -> Result<(), DbError> {
        let mut faults = lock(&self.faults);
        if let Some(pos) = faults.iter().position(|p| *p == point) {
            faults.remove(pos);
            return Err(DbError::Constraint(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

/// Write the `shape` fields of `values` onto `row`, blanking absent ones.
fn apply_shape(row: &mut TemplateRow, shape: &[CatalogField], values: &RowValues) {
    for field in shape {
        match values.get(field) {
            Some(value) => row.set_value(*field, value),
            None => row.set_value(*field, &FieldValue::empty(field.kind())),
        }
    }
}

#[async_trait]
impl CatalogTx for MemoryCatalogTx {
    async fn commit(self) -> Result<(), DbError> {
        let mut shared = lock(&self.shared);
        *shared = self.working;
        if let Some(CommitHook(hook)) = lock(&self.on_commit).as_ref() {
            hook(&shared);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), DbError> {
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Import runs
    // -----------------------------------------------------------------------

    async fn create_import_run(&mut self, trigger_source: &str) -> Result<ImportRunRow, DbError> {
        let row = ImportRunRow {
            id: self.working.allocate_id(),
            public_id: Uuid::new_v4(),
            trigger_source: trigger_source.to_string(),
            status: "queued".to_string(),
            started_at: None,
            completed_at: None,
            windows_committed: 0,
            error_message: None,
            created_at: Utc::now(),
        };
        self.working.import_runs.push(row.clone());
        Ok(row)
    }

    async fn start_import_run(&mut self, id: i64) -> Result<(), DbError> {
        let run = self
            .working
            .import_runs
            .iter_mut()
            .find(|r| r.id == id && r.status == "queued")
            .ok_or(DbError::InvalidImportRunTransition {
                id,
                expected_status: "queued",
            })?;
        run.status = "running".to_string();
        run.started_at = Some(Utc::now());
        Ok(())
    }

    async fn finish_import_run(
        &mut self,
        id: i64,
        windows_committed: i32,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let run = self
            .working
            .import_runs
            .iter_mut()
            .find(|r| r.id == id && r.status == "running")
            .ok_or(DbError::InvalidImportRunTransition {
                id,
                expected_status: "running",
            })?;
        run.status = if error_message.is_some() {
            "failed"
        } else {
            "succeeded"
        }
        .to_string();
        run.completed_at = Some(Utc::now());
        run.windows_committed = windows_committed;
        run.error_message = error_message.map(ToString::to_string);
        Ok(())
    }

    async fn list_import_runs(&mut self, limit: i64) -> Result<Vec<ImportRunRow>, DbError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .working
            .import_runs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    // -----------------------------------------------------------------------
    // Attachments
    // -----------------------------------------------------------------------

    async fn register_attachment(
        &mut self,
        name: &str,
        checksum: &str,
        row_count: i32,
    ) -> Result<AttachmentRow, DbError> {
        let now = Utc::now();
        if let Some(existing) = self
            .working
            .attachments
            .iter_mut()
            .find(|a| a.name == name && a.checksum == checksum)
        {
            existing.row_count = row_count;
            if existing.state() == Some(AttachmentStatus::Done) {
                existing.status = AttachmentStatus::Pending.as_str().to_string();
                existing.batch = 0;
                existing.reconciled_at = None;
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = AttachmentRow {
            id: self.working.allocate_id(),
            name: name.to_string(),
            checksum: checksum.to_string(),
            status: AttachmentStatus::Pending.as_str().to_string(),
            batch: 0,
            row_count,
            error_message: None,
            reconciled_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.attachments.push(row.clone());
        Ok(row)
    }

    async fn get_attachment(&mut self, id: i64) -> Result<AttachmentRow, DbError> {
        self.working.attachment_mut(id).map(|a| a.clone())
    }

    async fn set_attachment_state(
        &mut self,
        id: i64,
        status: AttachmentStatus,
        batch: i32,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        if status == AttachmentStatus::Importing
            && batch > self.working.attachment_mut(id)?.batch
        {
            self.trip(FailPoint::AdvanceCursor)?;
        }
        let row = self.working.attachment_mut(id)?;
        row.status = status.as_str().to_string();
        row.batch = batch;
        row.error_message = error_message.map(ToString::to_string);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn list_attachments(&mut self, limit: i64) -> Result<Vec<AttachmentRow>, DbError> {
        let mut rows = self.working.attachments.clone();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn list_unreconciled_attachments(&mut self) -> Result<Vec<i64>, DbError> {
        Ok(self
            .working
            .attachments
            .iter()
            .filter(|a| a.state() == Some(AttachmentStatus::Done) && a.reconciled_at.is_none())
            .map(|a| a.id)
            .collect())
    }

    async fn mark_attachments_reconciled(&mut self, ids: &[i64]) -> Result<u64, DbError> {
        let now = Utc::now();
        let mut count = 0;
        for row in &mut self.working.attachments {
            if ids.contains(&row.id) {
                row.reconciled_at = Some(now);
                row.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    async fn template_ids_by_code(
        &mut self,
        codes: &[String],
    ) -> Result<BTreeMap<String, i64>, DbError> {
        Ok(self
            .working
            .templates
            .iter()
            .filter(|t| codes.contains(&t.product_code))
            .map(|t| (t.product_code.clone(), t.id))
            .collect())
    }

    async fn insert_templates(
        &mut self,
        attachment_id: i64,
        shape: &[CatalogField],
        rows: &[NewTemplate],
    ) -> Result<Vec<(i64, String)>, DbError> {
        self.trip(FailPoint::InsertTemplates)?;

        let mut inserted = Vec::with_capacity(rows.len());
        for new in rows {
            let code = new.product_code();
            if self.working.template_by_code(code).is_some() {
                return Err(DbError::Constraint(
                    "product_templates_product_code_key".to_string(),
                ));
            }

            let d = &new.defaults;
            let mut row = TemplateRow {
                id: self.working.allocate_id(),
                sale_ok: true,
                purchase_ok: true,
                categ_name: d.category.clone(),
                uom_name: d.uom.clone(),
                uom_po_name: d.uom_po.clone(),
                product_type: d.product_type.clone(),
                tracking: d.tracking.clone(),
                sale_line_warn: d.sale_line_warn.clone(),
                purchase_line_warn: d.purchase_line_warn.clone(),
                is_published: true,
                active: true,
                attachment_id: Some(attachment_id),
                ..TemplateRow::default()
            };
            apply_shape(&mut row, shape, &new.values);
            inserted.push((row.id, row.product_code.clone()));
            self.working.templates.push(row);
        }
        Ok(inserted)
    }

    async fn update_templates(
        &mut self,
        attachment_id: i64,
        shape: &[CatalogField],
        rows: &[(i64, RowValues)],
    ) -> Result<u64, DbError> {
        self.trip(FailPoint::UpdateTemplates)?;

        let mut count = 0;
        for (id, values) in rows {
            if let Some(FieldValue::Text(code)) = values.get(&CatalogField::ProductCode) {
                if self
                    .working
                    .template_by_code(code)
                    .is_some_and(|t| t.id != *id)
                {
                    return Err(DbError::Constraint(
                        "product_templates_product_code_key".to_string(),
                    ));
                }
            }
            if let Some(row) = self.working.template_mut(*id) {
                apply_shape(row, shape, values);
                row.attachment_id = Some(attachment_id);
                row.to_remove = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn fetch_templates(&mut self, ids: &[i64]) -> Result<Vec<TemplateRow>, DbError> {
        Ok(self
            .working
            .templates
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn flag_image_updated(&mut self, ids: &[i64]) -> Result<u64, DbError> {
        let mut count = 0;
        for row in &mut self.working.templates {
            if ids.contains(&row.id) && !row.image_url.is_empty() {
                row.image_updated = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn enable_dropship(&mut self, ids: &[i64]) -> Result<u64, DbError> {
        let mut count = 0;
        for row in &mut self.working.templates {
            if ids.contains(&row.id) && !row.dropship {
                row.dropship = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn refresh_template_prices(&mut self, ids: &[i64]) -> Result<u64, DbError> {
        let mut count = 0;
        for id in ids {
            let cheapest = self
                .working
                .variants
                .iter()
                .filter(|v| v.template_id == *id && v.active)
                .map(|v| v.base_list_price)
                .min();
            if let Some(row) = self.working.template_mut(*id) {
                row.list_price = cheapest.unwrap_or(row.list_1);
                row.standard_price = row.cost_1;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn retag_variants(
        &mut self,
        template_ids: &[i64],
        attachment_id: i64,
    ) -> Result<u64, DbError> {
        let mut count = 0;
        for row in &mut self.working.variants {
            if row.active && !row.to_remove && template_ids.contains(&row.template_id) {
                row.attachment_id = Some(attachment_id);
                count += 1;
            }
        }
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    async fn ensure_attribute(&mut self, name: &str) -> Result<i64, DbError> {
        if let Some((id, _)) = self.working.attributes.iter().find(|(_, n)| n == name) {
            return Ok(*id);
        }
        let id = self.working.allocate_id();
        self.working.attributes.push((id, name.to_string()));
        Ok(id)
    }

    async fn ensure_attribute_values(
        &mut self,
        attribute_id: i64,
        names: &[String],
    ) -> Result<Vec<AttributeValueRow>, DbError> {
        let mut rows = Vec::new();
        for name in names.iter().collect::<BTreeSet<_>>() {
            let existing = self
                .working
                .attribute_values
                .iter()
                .find(|v| v.attribute_id == attribute_id && &v.name == name)
                .cloned();
            let row = if let Some(row) = existing {
                row
            } else {
                let row = AttributeValueRow {
                    id: self.working.allocate_id(),
                    attribute_id,
                    name: name.clone(),
                };
                self.working.attribute_values.push(row.clone());
                row
            };
            rows.push(row);
        }
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn ensure_attribute_lines(
        &mut self,
        attribute_id: i64,
        template_ids: &[i64],
    ) -> Result<Vec<AttributeLineRow>, DbError> {
        let mut rows = Vec::new();
        for template_id in template_ids.iter().collect::<BTreeSet<_>>() {
            let existing = self
                .working
                .attribute_lines
                .iter_mut()
                .find(|l| l.attribute_id == attribute_id && l.template_id == *template_id);
            let row = if let Some(line) = existing {
                line.active = true;
                line.clone()
            } else {
                let line = AttributeLineRow {
                    id: self.working.allocate_id(),
                    template_id: *template_id,
                    attribute_id,
                    active: true,
                };
                self.working.attribute_lines.push(line.clone());
                line
            };
            rows.push(row);
        }
        Ok(rows)
    }

    async fn ensure_template_attribute_values(
        &mut self,
        rows: &[NewTemplateAttributeValue],
    ) -> Result<Vec<TemplateAttributeValueRow>, DbError> {
        let mut out = Vec::new();
        for new in rows.iter().collect::<BTreeSet<_>>() {
            let existing = self
                .working
                .template_attribute_values
                .iter_mut()
                .find(|v| {
                    v.line_id == new.line_id && v.attribute_value_id == new.attribute_value_id
                });
            let row = if let Some(value) = existing {
                value.active = true;
                value.clone()
            } else {
                let value = TemplateAttributeValueRow {
                    id: self.working.allocate_id(),
                    line_id: new.line_id,
                    template_id: new.template_id,
                    attribute_value_id: new.attribute_value_id,
                    active: true,
                };
                self.working.template_attribute_values.push(value.clone());
                value
            };
            out.push(row);
        }
        Ok(out)
    }

    async fn deactivate_template_attribute_values(
        &mut self,
        template_ids: &[i64],
        keep_ids: &[i64],
    ) -> Result<u64, DbError> {
        let mut count = 0;
        for row in &mut self.working.template_attribute_values {
            if template_ids.contains(&row.template_id) && row.active && !keep_ids.contains(&row.id)
            {
                row.active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_template_attribute_values(
        &mut self,
        template_ids: &[i64],
    ) -> Result<Vec<TemplateAttributeValueRow>, DbError> {
        Ok(self
            .working
            .template_attribute_values
            .iter()
            .filter(|v| template_ids.contains(&v.template_id))
            .cloned()
            .collect())
    }

    // -----------------------------------------------------------------------
    // Variants
    // -----------------------------------------------------------------------

    async fn upsert_variants(&mut self, rows: &[NewVariant]) -> Result<Vec<VariantRow>, DbError> {
        self.trip(FailPoint::UpsertVariants)?;

        let codes: BTreeSet<&str> = rows.iter().map(|r| r.default_code.as_str()).collect();
        if codes.len() != rows.len() {
            return Err(DbError::Constraint(
                "product_variants_default_code_key".to_string(),
            ));
        }

        let mut out = Vec::with_capacity(rows.len());
        for new in rows {
            let existing = self
                .working
                .variants
                .iter_mut()
                .find(|v| v.default_code == new.default_code);
            let row = if let Some(variant) = existing {
                variant.size.clone_from(&new.size);
                variant.unit.clone_from(&new.unit);
                variant.unitqty.clone_from(&new.unitqty);
                variant.standard_price = new.standard_price;
                variant.base_list_price = new.base_list_price;
                variant.attachment_id = Some(new.attachment_id);
                variant.is_published = true;
                variant.active = true;
                variant.to_remove = false;
                variant.clone()
            } else {
                let variant = VariantRow {
                    id: self.working.allocate_id(),
                    template_id: new.template_id,
                    default_code: new.default_code.clone(),
                    size: new.size.clone(),
                    unit: new.unit.clone(),
                    unitqty: new.unitqty.clone(),
                    standard_price: new.standard_price,
                    base_list_price: new.base_list_price,
                    combination_indices: String::new(),
                    is_published: true,
                    active: true,
                    to_remove: false,
                    attachment_id: Some(new.attachment_id),
                };
                self.working.variants.push(variant.clone());
                variant
            };
            out.push(row);
        }
        Ok(out)
    }

    async fn replace_variant_combinations(
        &mut self,
        variant_ids: &[i64],
        links: &[(i64, i64)],
    ) -> Result<(), DbError> {
        self.working
            .combinations
            .retain(|(variant_id, _)| !variant_ids.contains(variant_id));
        self.working.combinations.extend(links.iter().copied());
        Ok(())
    }

    async fn write_combination_signatures(&mut self, variant_ids: &[i64]) -> Result<u64, DbError> {
        let mut count = 0;
        for variant in &mut self.working.variants {
            if !variant_ids.contains(&variant.id) {
                continue;
            }
            let linked: Vec<i64> = self
                .working
                .combinations
                .iter()
                .filter(|(v, _)| *v == variant.id)
                .map(|(_, value)| *value)
                .collect();
            variant.combination_indices = vcat_core::combination_signature(&linked);
            count += 1;
        }
        Ok(count)
    }

    async fn list_variants(&mut self, template_ids: &[i64]) -> Result<Vec<VariantRow>, DbError> {
        Ok(self
            .working
            .variants
            .iter()
            .filter(|v| template_ids.contains(&v.template_id))
            .cloned()
            .collect())
    }

    // -----------------------------------------------------------------------
    // Vendors and price lists
    // -----------------------------------------------------------------------

    async fn ensure_partners(&mut self, names: &[String]) -> Result<Vec<PartnerRow>, DbError> {
        let mut rows = Vec::new();
        for name in names.iter().collect::<BTreeSet<_>>() {
            let existing = self.working.partners.iter().find(|p| &p.name == name).cloned();
            let row = if let Some(row) = existing {
                row
            } else {
                let row = PartnerRow {
                    id: self.working.allocate_id(),
                    name: name.clone(),
                };
                self.working.partners.push(row.clone());
                row
            };
            rows.push(row);
        }
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn delete_vendor_prices(&mut self, template_ids: &[i64]) -> Result<u64, DbError> {
        let variant_ids: BTreeSet<i64> = self
            .working
            .variants
            .iter()
            .filter(|v| template_ids.contains(&v.template_id))
            .map(|v| v.id)
            .collect();
        let before = self.working.vendor_prices.len();
        self.working.vendor_prices.retain(|p| {
            !template_ids.contains(&p.template_id)
                && !p.variant_id.is_some_and(|id| variant_ids.contains(&id))
        });
        Ok((before - self.working.vendor_prices.len()) as u64)
    }

    async fn insert_vendor_prices(&mut self, rows: &[NewVendorPrice]) -> Result<u64, DbError> {
        self.trip(FailPoint::InsertVendorPrices)?;

        for new in rows {
            let row = VendorPriceRow {
                id: self.working.allocate_id(),
                partner_id: new.partner_id,
                template_id: new.template_id,
                variant_id: new.variant_id,
                sequence: 1,
                product_code: new.product_code.clone(),
                mfr_name: new.mfr_name.clone(),
                mfr_num: new.mfr_num.clone(),
                currency_code: new.currency_code.clone(),
                min_qty: Decimal::ZERO,
                price: new.price,
                delay_days: 1,
            };
            self.working.vendor_prices.push(row);
        }
        Ok(rows.len() as u64)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    async fn reactivate_attached(
        &mut self,
        attachment_ids: &[i64],
    ) -> Result<LifecycleCounts, DbError> {
        let attached = |id: Option<i64>| id.is_some_and(|id| attachment_ids.contains(&id));
        let mut counts = LifecycleCounts::default();
        for t in &mut self.working.templates {
            if attached(t.attachment_id) && (!t.active || t.to_remove) {
                t.active = true;
                t.to_remove = false;
                counts.templates += 1;
            }
        }
        for v in &mut self.working.variants {
            if attached(v.attachment_id) && (!v.active || v.to_remove) {
                v.active = true;
                v.to_remove = false;
                counts.variants += 1;
            }
        }
        Ok(counts)
    }

    async fn archive_unattached(
        &mut self,
        attachment_ids: &[i64],
    ) -> Result<LifecycleCounts, DbError> {
        let mut counts = LifecycleCounts::default();
        if attachment_ids.is_empty() {
            return Ok(counts);
        }
        let attached = |id: Option<i64>| id.is_some_and(|id| attachment_ids.contains(&id));
        for t in &mut self.working.templates {
            if t.active && !attached(t.attachment_id) {
                t.active = false;
                counts.templates += 1;
            }
        }
        for v in &mut self.working.variants {
            if v.active && !attached(v.attachment_id) {
                v.active = false;
                counts.variants += 1;
            }
        }
        Ok(counts)
    }

    async fn flag_unattached(
        &mut self,
        attachment_ids: &[i64],
    ) -> Result<LifecycleCounts, DbError> {
        let mut counts = LifecycleCounts::default();
        if attachment_ids.is_empty() {
            return Ok(counts);
        }
        let attached = |id: Option<i64>| id.is_some_and(|id| attachment_ids.contains(&id));
        for t in &mut self.working.templates {
            if !t.to_remove && !attached(t.attachment_id) {
                t.to_remove = true;
                counts.templates += 1;
            }
        }
        for v in &mut self.working.variants {
            if !v.to_remove && !attached(v.attachment_id) {
                v.to_remove = true;
                counts.variants += 1;
            }
        }
        Ok(counts)
    }

    // -----------------------------------------------------------------------
    // Images
    // -----------------------------------------------------------------------

    async fn list_image_pending(&mut self, limit: i64) -> Result<Vec<ImagePendingRow>, DbError> {
        Ok(self
            .working
            .templates
            .iter()
            .filter(|t| t.image_updated)
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|t| ImagePendingRow {
                id: t.id,
                image_url: t.image_url.clone(),
            })
            .collect())
    }

    async fn store_image(&mut self, id: i64, image: &[u8], failed: bool) -> Result<(), DbError> {
        let row = self.working.template_mut(id).ok_or(DbError::NotFound)?;
        row.image_updated = false;
        row.image_failed = failed;
        self.working.images.insert(id, image.to_vec());
        Ok(())
    }

    async fn count_image_pending(&mut self) -> Result<i64, DbError> {
        let count = self
            .working
            .templates
            .iter()
            .filter(|t| t.image_updated)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
