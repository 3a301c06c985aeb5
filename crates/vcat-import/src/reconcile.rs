//! Stale-product reconciliation over a set of completed attachments.

use vcat_core::StalePolicy;
use vcat_db::{CatalogTx, LifecycleCounts};

use crate::error::ImportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub policy: StalePolicy,
    pub attachments: Vec<i64>,
    pub reactivated: LifecycleCounts,
    /// Rows archived or flagged; zero under [`StalePolicy::None`].
    pub stale: LifecycleCounts,
}

/// Reactivate everything tied to `attachment_ids` and apply `policy` to
/// everything that is not.
///
/// An empty attachment set changes nothing: with no completed import there
/// is nothing to compare against.
///
/// # Errors
///
/// Returns [`ImportError::Db`] if an update fails.
pub async fn reconcile<T: CatalogTx>(
    tx: &mut T,
    policy: StalePolicy,
    attachment_ids: &[i64],
) -> Result<ReconcileReport, ImportError> {
    let mut report = ReconcileReport {
        policy,
        attachments: attachment_ids.to_vec(),
        reactivated: LifecycleCounts::default(),
        stale: LifecycleCounts::default(),
    };
    if attachment_ids.is_empty() {
        return Ok(report);
    }

    report.reactivated = tx.reactivate_attached(attachment_ids).await?;
    report.stale = match policy {
        StalePolicy::Archive => tx.archive_unattached(attachment_ids).await?,
        StalePolicy::Flag => tx.flag_unattached(attachment_ids).await?,
        StalePolicy::None => LifecycleCounts::default(),
    };

    tracing::info!(
        %policy,
        attachments = attachment_ids.len(),
        reactivated_templates = report.reactivated.templates,
        reactivated_variants = report.reactivated.variants,
        stale_templates = report.stale.templates,
        stale_variants = report.stale.variants,
        "reconciliation applied"
    );
    Ok(report)
}
