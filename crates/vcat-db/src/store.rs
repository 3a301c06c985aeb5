//! The persistence seam the import engine writes through.
//!
//! Every catalog mutation happens inside a [`CatalogTx`]. A window of rows is
//! one transaction: it either commits together with the attachment's batch
//! cursor or rolls back leaving no trace.

use std::collections::BTreeMap;

use async_trait::async_trait;
use vcat_core::{CatalogField, RowValues};

use crate::rows::{
    AttachmentRow, AttachmentStatus, AttributeLineRow, AttributeValueRow, ImagePendingRow,
    ImportRunRow, LifecycleCounts, NewTemplate, NewTemplateAttributeValue, NewVariant,
    NewVendorPrice, PartnerRow, TemplateAttributeValueRow, TemplateRow, VariantRow,
};
use crate::DbError;

/// Opens transactions against a catalog backend.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    type Tx: CatalogTx;

    /// # Errors
    ///
    /// Returns [`DbError`] if the backend cannot start a transaction.
    async fn begin(&self) -> Result<Self::Tx, DbError>;
}

/// One open transaction.
///
/// Methods taking id slices treat an empty slice as a no-op.
#[async_trait]
pub trait CatalogTx: Send {
    /// # Errors
    ///
    /// Returns [`DbError`] if the commit fails.
    async fn commit(self) -> Result<(), DbError>;

    /// # Errors
    ///
    /// Returns [`DbError`] if the rollback fails.
    async fn rollback(self) -> Result<(), DbError>;

    // -----------------------------------------------------------------------
    // Import runs
    // -----------------------------------------------------------------------

    /// Create a run in `queued` status.
    async fn create_import_run(&mut self, trigger_source: &str) -> Result<ImportRunRow, DbError>;

    /// Move a run from `queued` to `running`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidImportRunTransition`] if the run is not queued.
    async fn start_import_run(&mut self, id: i64) -> Result<(), DbError>;

    /// Move a run from `running` to `succeeded` (no error) or `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidImportRunTransition`] if the run is not running.
    async fn finish_import_run(
        &mut self,
        id: i64,
        windows_committed: i32,
        error_message: Option<&str>,
    ) -> Result<(), DbError>;

    async fn list_import_runs(&mut self, limit: i64) -> Result<Vec<ImportRunRow>, DbError>;

    // -----------------------------------------------------------------------
    // Attachments
    // -----------------------------------------------------------------------

    /// Register a document by `(name, checksum)`.
    ///
    /// A previously finished document with the same identity is reset to
    /// `pending` at batch 0 so it is imported again; an unfinished one keeps
    /// its cursor.
    async fn register_attachment(
        &mut self,
        name: &str,
        checksum: &str,
        row_count: i32,
    ) -> Result<AttachmentRow, DbError>;

    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no such attachment exists.
    async fn get_attachment(&mut self, id: i64) -> Result<AttachmentRow, DbError>;

    async fn set_attachment_state(
        &mut self,
        id: i64,
        status: AttachmentStatus,
        batch: i32,
        error_message: Option<&str>,
    ) -> Result<(), DbError>;

    /// Most recently updated first.
    async fn list_attachments(&mut self, limit: i64) -> Result<Vec<AttachmentRow>, DbError>;

    /// Ids of `done` attachments not yet used by a reconciliation pass.
    async fn list_unreconciled_attachments(&mut self) -> Result<Vec<i64>, DbError>;

    async fn mark_attachments_reconciled(&mut self, ids: &[i64]) -> Result<u64, DbError>;

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    /// Map product codes to the id of the template carrying each one.
    async fn template_ids_by_code(
        &mut self,
        codes: &[String],
    ) -> Result<BTreeMap<String, i64>, DbError>;

    /// Insert templates in one statement. Every row must carry exactly the
    /// `shape` fields. Returns `(id, product_code)` per inserted row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Constraint`] when a product code already exists.
    async fn insert_templates(
        &mut self,
        attachment_id: i64,
        shape: &[CatalogField],
        rows: &[NewTemplate],
    ) -> Result<Vec<(i64, String)>, DbError>;

    /// Update templates in one statement, writing exactly the `shape` fields
    /// and re-tagging each row with `attachment_id`.
    async fn update_templates(
        &mut self,
        attachment_id: i64,
        shape: &[CatalogField],
        rows: &[(i64, RowValues)],
    ) -> Result<u64, DbError>;

    /// Ordered by id.
    async fn fetch_templates(&mut self, ids: &[i64]) -> Result<Vec<TemplateRow>, DbError>;

    /// Set `image_updated` on the given templates whose image url is non-empty.
    async fn flag_image_updated(&mut self, ids: &[i64]) -> Result<u64, DbError>;

    async fn enable_dropship(&mut self, ids: &[i64]) -> Result<u64, DbError>;

    /// Set each template's list price to the minimum base list price of its
    /// active variants (its slot-1 list price when it has none) and its cost
    /// to its slot-1 cost.
    async fn refresh_template_prices(&mut self, ids: &[i64]) -> Result<u64, DbError>;

    /// Point the live variants of the templates at `attachment_id`.
    /// Archived or flagged variants are left alone.
    async fn retag_variants(
        &mut self,
        template_ids: &[i64],
        attachment_id: i64,
    ) -> Result<u64, DbError>;

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    /// Get or create the attribute named `name`.
    async fn ensure_attribute(&mut self, name: &str) -> Result<i64, DbError>;

    /// Get or create one value per distinct name. Returns every requested row.
    async fn ensure_attribute_values(
        &mut self,
        attribute_id: i64,
        names: &[String],
    ) -> Result<Vec<AttributeValueRow>, DbError>;

    /// Get or create (and reactivate) one line per template.
    async fn ensure_attribute_lines(
        &mut self,
        attribute_id: i64,
        template_ids: &[i64],
    ) -> Result<Vec<AttributeLineRow>, DbError>;

    /// Get or create (and reactivate) the template attribute values.
    async fn ensure_template_attribute_values(
        &mut self,
        rows: &[NewTemplateAttributeValue],
    ) -> Result<Vec<TemplateAttributeValueRow>, DbError>;

    /// Deactivate template attribute values of the templates that are not in
    /// `keep_ids`.
    async fn deactivate_template_attribute_values(
        &mut self,
        template_ids: &[i64],
        keep_ids: &[i64],
    ) -> Result<u64, DbError>;

    async fn list_template_attribute_values(
        &mut self,
        template_ids: &[i64],
    ) -> Result<Vec<TemplateAttributeValueRow>, DbError>;

    // -----------------------------------------------------------------------
    // Variants
    // -----------------------------------------------------------------------

    /// Upsert on `default_code`. An existing variant keeps its owning
    /// template, is reactivated and has its removal flag cleared.
    async fn upsert_variants(&mut self, rows: &[NewVariant]) -> Result<Vec<VariantRow>, DbError>;

    /// Replace the combination links of `variant_ids` with `links`
    /// (`(variant_id, template_attribute_value_id)` pairs).
    async fn replace_variant_combinations(
        &mut self,
        variant_ids: &[i64],
        links: &[(i64, i64)],
    ) -> Result<(), DbError>;

    /// Recompute `combination_indices` from the current links.
    async fn write_combination_signatures(&mut self, variant_ids: &[i64]) -> Result<u64, DbError>;

    /// Ordered by id.
    async fn list_variants(&mut self, template_ids: &[i64]) -> Result<Vec<VariantRow>, DbError>;

    // -----------------------------------------------------------------------
    // Vendors and price lists
    // -----------------------------------------------------------------------

    /// Get or create a partner per distinct name.
    async fn ensure_partners(&mut self, names: &[String]) -> Result<Vec<PartnerRow>, DbError>;

    /// Delete every vendor price attached to the templates or their variants.
    async fn delete_vendor_prices(&mut self, template_ids: &[i64]) -> Result<u64, DbError>;

    async fn insert_vendor_prices(&mut self, rows: &[NewVendorPrice]) -> Result<u64, DbError>;

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Reactivate and unflag everything attached to `attachment_ids`.
    async fn reactivate_attached(
        &mut self,
        attachment_ids: &[i64],
    ) -> Result<LifecycleCounts, DbError>;

    /// Deactivate everything not attached to `attachment_ids`.
    async fn archive_unattached(
        &mut self,
        attachment_ids: &[i64],
    ) -> Result<LifecycleCounts, DbError>;

    /// Set `to_remove` on everything not attached to `attachment_ids`.
    async fn flag_unattached(&mut self, attachment_ids: &[i64])
        -> Result<LifecycleCounts, DbError>;

    // -----------------------------------------------------------------------
    // Images
    // -----------------------------------------------------------------------

    /// Templates with `image_updated` set, lowest id first.
    async fn list_image_pending(&mut self, limit: i64) -> Result<Vec<ImagePendingRow>, DbError>;

    /// Store image bytes, clear `image_updated` and record whether the
    /// fallback image was used.
    async fn store_image(&mut self, id: i64, image: &[u8], failed: bool) -> Result<(), DbError>;

    async fn count_image_pending(&mut self) -> Result<i64, DbError>;
}
