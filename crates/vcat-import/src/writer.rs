//! Set-based template writes.
//!
//! Each call issues one insert or one update statement for the whole window,
//! however many rows it carries.

use std::collections::{BTreeMap, BTreeSet};

use vcat_core::{CatalogField, RowValues, SLOT_COUNT};
use vcat_db::{CatalogTx, NewTemplate, TemplateRow};

use crate::context::ImportContext;
use crate::error::ImportError;

/// What an update window changed, by template id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub updated: u64,
    /// Image url changed to a non-empty value.
    pub image_changed: Vec<i64>,
    /// A slot, vendor or manufacturer field changed, or the template was
    /// archived or flagged before this update.
    pub variants_changed: Vec<i64>,
    /// Nothing variant-related changed; existing variants only need re-tagging.
    pub unchanged: Vec<i64>,
}

/// Fields whose change invalidates a template's variants or price lists.
fn variant_watch_fields() -> Vec<CatalogField> {
    let mut fields = vec![
        CatalogField::VendorName,
        CatalogField::MfrName,
        CatalogField::MfrNum,
    ];
    for slot in (1_u8..).take(SLOT_COUNT) {
        fields.extend(CatalogField::slot_fields(slot));
    }
    fields
}

fn ensure_uniform<'a>(
    shape: &[CatalogField],
    rows: impl Iterator<Item = &'a RowValues>,
) -> Result<(), ImportError> {
    for (row, values) in rows.enumerate() {
        let uniform = values.len() == shape.len() && shape.iter().all(|f| values.contains_key(f));
        if !uniform {
            return Err(ImportError::NonUniformShape {
                row,
                expected: shape.len(),
                actual: values.len(),
            });
        }
    }
    Ok(())
}

/// Insert new templates in one statement and return their ids in row order.
///
/// The field shape is taken from the first row; every other row must carry
/// the same fields.
///
/// # Errors
///
/// Returns [`ImportError::NonUniformShape`] for a ragged batch, or
/// [`ImportError::Db`] if the insert fails.
pub async fn optimized_create<T: CatalogTx>(
    tx: &mut T,
    ctx: &ImportContext<'_>,
    rows: &[NewTemplate],
) -> Result<Vec<i64>, ImportError> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let shape: Vec<CatalogField> = first.values.keys().copied().collect();
    ensure_uniform(&shape, rows.iter().map(|r| &r.values))?;

    let inserted = tx.insert_templates(ctx.attachment_id, &shape, rows).await?;
    let by_code: BTreeMap<String, i64> =
        inserted.into_iter().map(|(id, code)| (code, id)).collect();

    let ids = rows
        .iter()
        .filter_map(|row| by_code.get(row.product_code()).copied())
        .collect::<Vec<_>>();

    tracing::debug!(
        attachment_id = ctx.attachment_id,
        rows = rows.len(),
        columns = shape.len(),
        "templates inserted"
    );
    Ok(ids)
}

/// Update existing templates in one statement and report what changed.
///
/// # Errors
///
/// Returns [`ImportError::NonUniformShape`] for a ragged batch, or
/// [`ImportError::Db`] if a read or the update fails.
pub async fn optimized_update<T: CatalogTx>(
    tx: &mut T,
    ctx: &ImportContext<'_>,
    rows: &[(i64, RowValues)],
) -> Result<UpdateOutcome, ImportError> {
    let Some((_, first)) = rows.first() else {
        return Ok(UpdateOutcome::default());
    };
    let shape: Vec<CatalogField> = first.keys().copied().collect();
    ensure_uniform(&shape, rows.iter().map(|(_, values)| values))?;

    let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
    let before = index(tx.fetch_templates(&ids).await?);
    let updated = tx.update_templates(ctx.attachment_id, &shape, rows).await?;
    let after = index(tx.fetch_templates(&ids).await?);

    let watched = variant_watch_fields();
    let mut outcome = UpdateOutcome {
        updated,
        ..UpdateOutcome::default()
    };
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            continue;
        }
        let (Some(old), Some(new)) = (before.get(&id), after.get(&id)) else {
            continue;
        };
        if old.image_url != new.image_url && !new.image_url.is_empty() {
            outcome.image_changed.push(id);
        }
        let revived = !old.active || old.to_remove;
        if revived || watched.iter().any(|f| old.value(*f) != new.value(*f)) {
            outcome.variants_changed.push(id);
        } else {
            outcome.unchanged.push(id);
        }
    }

    tracing::debug!(
        attachment_id = ctx.attachment_id,
        updated,
        image_changed = outcome.image_changed.len(),
        variants_changed = outcome.variants_changed.len(),
        "templates updated"
    );
    Ok(outcome)
}

fn index(rows: Vec<TemplateRow>) -> BTreeMap<i64, TemplateRow> {
    rows.into_iter().map(|row| (row.id, row)).collect()
}
