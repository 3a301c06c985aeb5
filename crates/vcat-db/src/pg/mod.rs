//! Postgres implementation of the catalog store.
//!
//! All multi-row writes are single set-based statements over `UNNEST`ed
//! parallel arrays so a window costs a fixed number of round-trips no
//! matter how many rows it holds.

mod attributes;
mod lifecycle;
mod prices;
mod runs;
mod templates;
mod variants;

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use vcat_core::{CatalogField, RowValues};

use crate::rows::{
    AttachmentRow, AttachmentStatus, AttributeLineRow, AttributeValueRow, ImagePendingRow,
    ImportRunRow, LifecycleCounts, NewTemplate, NewTemplateAttributeValue, NewVariant,
    NewVendorPrice, PartnerRow, TemplateAttributeValueRow, TemplateRow, VariantRow,
};
use crate::store::{CatalogStore, CatalogTx};
use crate::DbError;

/// Catalog store backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    type Tx = PgCatalogTx;

    async fn begin(&self) -> Result<PgCatalogTx, DbError> {
        let tx = self.pool.begin().await?;
        Ok(PgCatalogTx { tx })
    }
}

/// An open Postgres transaction.
pub struct PgCatalogTx {
    tx: Transaction<'static, Postgres>,
}

/// Translate unique and foreign-key violations into [`DbError::Constraint`]
/// so callers can tell data conflicts from connectivity failures.
pub(crate) fn map_constraint(err: sqlx::Error) -> DbError {
    if let Some(db_err) = err.as_database_error() {
        if let Some(name) = db_err.constraint() {
            return DbError::Constraint(name.to_string());
        }
    }
    DbError::Sqlx(err)
}

/// Distinct values in first-seen order.
pub(crate) fn distinct<T: Clone + Ord>(items: &[T]) -> Vec<T> {
    let mut seen = std::collections::BTreeSet::new();
    items
        .iter()
        .filter(|item| seen.insert((*item).clone()))
        .cloned()
        .collect()
}

#[async_trait]
impl CatalogTx for PgCatalogTx {
    async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn create_import_run(&mut self, trigger_source: &str) -> Result<ImportRunRow, DbError> {
        runs::create_import_run(&mut self.tx, trigger_source).await
    }

    async fn start_import_run(&mut self, id: i64) -> Result<(), DbError> {
        runs::start_import_run(&mut self.tx, id).await
    }

    async fn finish_import_run(
        &mut self,
        id: i64,
        windows_committed: i32,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        runs::finish_import_run(&mut self.tx, id, windows_committed, error_message).await
    }

    async fn list_import_runs(&mut self, limit: i64) -> Result<Vec<ImportRunRow>, DbError> {
        runs::list_import_runs(&mut self.tx, limit).await
    }

    async fn register_attachment(
        &mut self,
        name: &str,
        checksum: &str,
        row_count: i32,
    ) -> Result<AttachmentRow, DbError> {
        runs::register_attachment(&mut self.tx, name, checksum, row_count).await
    }

    async fn get_attachment(&mut self, id: i64) -> Result<AttachmentRow, DbError> {
        runs::get_attachment(&mut self.tx, id).await
    }

    async fn set_attachment_state(
        &mut self,
        id: i64,
        status: AttachmentStatus,
        batch: i32,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        runs::set_attachment_state(&mut self.tx, id, status, batch, error_message).await
    }

    async fn list_attachments(&mut self, limit: i64) -> Result<Vec<AttachmentRow>, DbError> {
        runs::list_attachments(&mut self.tx, limit).await
    }

    async fn list_unreconciled_attachments(&mut self) -> Result<Vec<i64>, DbError> {
        runs::list_unreconciled_attachments(&mut self.tx).await
    }

    async fn mark_attachments_reconciled(&mut self, ids: &[i64]) -> Result<u64, DbError> {
        runs::mark_attachments_reconciled(&mut self.tx, ids).await
    }

    async fn template_ids_by_code(
        &mut self,
        codes: &[String],
    ) -> Result<BTreeMap<String, i64>, DbError> {
        templates::template_ids_by_code(&mut self.tx, codes).await
    }

    async fn insert_templates(
        &mut self,
        attachment_id: i64,
        shape: &[CatalogField],
        rows: &[NewTemplate],
    ) -> Result<Vec<(i64, String)>, DbError> {
        templates::insert_templates(&mut self.tx, attachment_id, shape, rows).await
    }

    async fn update_templates(
        &mut self,
        attachment_id: i64,
        shape: &[CatalogField],
        rows: &[(i64, RowValues)],
    ) -> Result<u64, DbError> {
        templates::update_templates(&mut self.tx, attachment_id, shape, rows).await
    }

    async fn fetch_templates(&mut self, ids: &[i64]) -> Result<Vec<TemplateRow>, DbError> {
        templates::fetch_templates(&mut self.tx, ids).await
    }

    async fn flag_image_updated(&mut self, ids: &[i64]) -> Result<u64, DbError> {
        templates::flag_image_updated(&mut self.tx, ids).await
    }

    async fn enable_dropship(&mut self, ids: &[i64]) -> Result<u64, DbError> {
        templates::enable_dropship(&mut self.tx, ids).await
    }

    async fn refresh_template_prices(&mut self, ids: &[i64]) -> Result<u64, DbError> {
        templates::refresh_template_prices(&mut self.tx, ids).await
    }

    async fn retag_variants(
        &mut self,
        template_ids: &[i64],
        attachment_id: i64,
    ) -> Result<u64, DbError> {
        variants::retag_variants(&mut self.tx, template_ids, attachment_id).await
    }

    async fn ensure_attribute(&mut self, name: &str) -> Result<i64, DbError> {
        attributes::ensure_attribute(&mut self.tx, name).await
    }

    async fn ensure_attribute_values(
        &mut self,
        attribute_id: i64,
        names: &[String],
    ) -> Result<Vec<AttributeValueRow>, DbError> {
        attributes::ensure_attribute_values(&mut self.tx, attribute_id, names).await
    }

    async fn ensure_attribute_lines(
        &mut self,
        attribute_id: i64,
        template_ids: &[i64],
    ) -> Result<Vec<AttributeLineRow>, DbError> {
        attributes::ensure_attribute_lines(&mut self.tx, attribute_id, template_ids).await
    }

    async fn ensure_template_attribute_values(
        &mut self,
        rows: &[NewTemplateAttributeValue],
    ) -> Result<Vec<TemplateAttributeValueRow>, DbError> {
        attributes::ensure_template_attribute_values(&mut self.tx, rows).await
    }

    async fn deactivate_template_attribute_values(
        &mut self,
        template_ids: &[i64],
        keep_ids: &[i64],
    ) -> Result<u64, DbError> {
        attributes::deactivate_template_attribute_values(&mut self.tx, template_ids, keep_ids)
            .await
    }

    async fn list_template_attribute_values(
        &mut self,
        template_ids: &[i64],
    ) -> Result<Vec<TemplateAttributeValueRow>, DbError> {
        attributes::list_template_attribute_values(&mut self.tx, template_ids).await
    }

    async fn upsert_variants(&mut self, rows: &[NewVariant]) -> Result<Vec<VariantRow>, DbError> {
        variants::upsert_variants(&mut self.tx, rows).await
    }

    async fn replace_variant_combinations(
        &mut self,
        variant_ids: &[i64],
        links: &[(i64, i64)],
    ) -> Result<(), DbError> {
        variants::replace_variant_combinations(&mut self.tx, variant_ids, links).await
    }

    async fn write_combination_signatures(&mut self, variant_ids: &[i64]) -> Result<u64, DbError> {
        variants::write_combination_signatures(&mut self.tx, variant_ids).await
    }

    async fn list_variants(&mut self, template_ids: &[i64]) -> Result<Vec<VariantRow>, DbError> {
        variants::list_variants(&mut self.tx, template_ids).await
    }

    async fn ensure_partners(&mut self, names: &[String]) -> Result<Vec<PartnerRow>, DbError> {
        prices::ensure_partners(&mut self.tx, names).await
    }

    async fn delete_vendor_prices(&mut self, template_ids: &[i64]) -> Result<u64, DbError> {
        prices::delete_vendor_prices(&mut self.tx, template_ids).await
    }

    async fn insert_vendor_prices(&mut self, rows: &[NewVendorPrice]) -> Result<u64, DbError> {
        prices::insert_vendor_prices(&mut self.tx, rows).await
    }

    async fn reactivate_attached(
        &mut self,
        attachment_ids: &[i64],
    ) -> Result<LifecycleCounts, DbError> {
        lifecycle::reactivate_attached(&mut self.tx, attachment_ids).await
    }

    async fn archive_unattached(
        &mut self,
        attachment_ids: &[i64],
    ) -> Result<LifecycleCounts, DbError> {
        lifecycle::archive_unattached(&mut self.tx, attachment_ids).await
    }

    async fn flag_unattached(
        &mut self,
        attachment_ids: &[i64],
    ) -> Result<LifecycleCounts, DbError> {
        lifecycle::flag_unattached(&mut self.tx, attachment_ids).await
    }

    async fn list_image_pending(&mut self, limit: i64) -> Result<Vec<ImagePendingRow>, DbError> {
        lifecycle::list_image_pending(&mut self.tx, limit).await
    }

    async fn store_image(&mut self, id: i64, image: &[u8], failed: bool) -> Result<(), DbError> {
        lifecycle::store_image(&mut self.tx, id, image, failed).await
    }

    async fn count_image_pending(&mut self) -> Result<i64, DbError> {
        lifecycle::count_image_pending(&mut self.tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keeps_first_occurrence_order() {
        let ids = [5_i64, 3, 5, 1, 3];
        assert_eq!(distinct(&ids), vec![5, 3, 1]);
    }

    #[test]
    fn map_constraint_passes_through_non_database_errors() {
        let err = map_constraint(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }
}
