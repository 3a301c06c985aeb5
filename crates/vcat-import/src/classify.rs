//! Split a window of cleaned rows into creates and updates.

use std::collections::HashMap;

use vcat_core::{CatalogField, FieldValue, RowValues};
use vcat_db::{CatalogTx, NewTemplate};

use crate::context::ImportContext;
use crate::error::ImportError;

/// Where a window row ended up after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSlot {
    /// Index into [`ClassifiedWindow::to_create`].
    Create(usize),
    /// Index into [`ClassifiedWindow::to_update`].
    Update(usize),
}

#[derive(Debug, Default)]
pub struct ClassifiedWindow {
    pub to_create: Vec<NewTemplate>,
    pub to_update: Vec<(i64, RowValues)>,
    /// One entry per distinct catalog code, in first-seen row order.
    pub order: Vec<RowSlot>,
    /// Rows dropped for a blank catalog code.
    pub skipped: usize,
}

impl ClassifiedWindow {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn product_code(values: &RowValues) -> &str {
    values
        .get(&CatalogField::ProductCode)
        .map_or("", FieldValue::as_text)
}

/// Partition `rows` by whether a template already carries their catalog code.
///
/// Codes are looked up in one query for the whole window. When a code repeats
/// inside the window the last row's values win, kept at the first row's
/// position.
///
/// # Errors
///
/// Returns [`ImportError::Db`] if the lookup fails.
pub async fn classify_rows<T: CatalogTx>(
    tx: &mut T,
    ctx: &ImportContext<'_>,
    rows: Vec<RowValues>,
) -> Result<ClassifiedWindow, ImportError> {
    let mut window = ClassifiedWindow::default();

    let mut distinct: Vec<(String, RowValues)> = Vec::with_capacity(rows.len());
    let mut position: HashMap<String, usize> = HashMap::new();
    for values in rows {
        let code = product_code(&values).to_string();
        if code.is_empty() {
            tracing::warn!(attachment_id = ctx.attachment_id, "row without catalog code skipped");
            window.skipped += 1;
            continue;
        }
        if let Some(&at) = position.get(&code) {
            tracing::debug!(code, "catalog code repeated in window; last row wins");
            distinct[at].1 = values;
            continue;
        }
        position.insert(code.clone(), distinct.len());
        distinct.push((code, values));
    }

    let codes: Vec<String> = distinct.iter().map(|(code, _)| code.clone()).collect();
    let existing = tx.template_ids_by_code(&codes).await?;

    for (code, values) in distinct {
        match existing.get(&code) {
            Some(&id) => {
                window.order.push(RowSlot::Update(window.to_update.len()));
                window.to_update.push((id, values));
            }
            None => {
                window.order.push(RowSlot::Create(window.to_create.len()));
                window.to_create.push(NewTemplate {
                    values,
                    defaults: ctx.settings.defaults.clone(),
                });
            }
        }
    }

    Ok(window)
}
