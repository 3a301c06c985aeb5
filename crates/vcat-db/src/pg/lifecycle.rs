//! Stale-product reconciliation and image bookkeeping.

use sqlx::PgConnection;

use crate::rows::{ImagePendingRow, LifecycleCounts};
use crate::DbError;

/// Run the same `SET … WHERE …` against templates and variants.
async fn apply_to_both(
    conn: &mut PgConnection,
    set: &str,
    predicate: &str,
    attachment_ids: &[i64],
) -> Result<LifecycleCounts, DbError> {
    let mut counts = LifecycleCounts::default();
    for (table, slot) in [
        ("product_templates", &mut counts.templates),
        ("product_variants", &mut counts.variants),
    ] {
        let result = sqlx::query(&format!(
            "UPDATE {table} SET {set}, updated_at = NOW() WHERE {predicate}"
        ))
        .bind(attachment_ids)
        .execute(&mut *conn)
        .await?;
        *slot = result.rows_affected();
    }
    Ok(counts)
}

pub(super) async fn reactivate_attached(
    conn: &mut PgConnection,
    attachment_ids: &[i64],
) -> Result<LifecycleCounts, DbError> {
    if attachment_ids.is_empty() {
        return Ok(LifecycleCounts::default());
    }

    apply_to_both(
        conn,
        "active = TRUE, to_remove = FALSE",
        "attachment_id = ANY($1) AND (NOT active OR to_remove)",
        attachment_ids,
    )
    .await
}

pub(super) async fn archive_unattached(
    conn: &mut PgConnection,
    attachment_ids: &[i64],
) -> Result<LifecycleCounts, DbError> {
    if attachment_ids.is_empty() {
        return Ok(LifecycleCounts::default());
    }

    apply_to_both(
        conn,
        "active = FALSE",
        "active AND (attachment_id IS NULL OR attachment_id <> ALL($1))",
        attachment_ids,
    )
    .await
}

pub(super) async fn flag_unattached(
    conn: &mut PgConnection,
    attachment_ids: &[i64],
) -> Result<LifecycleCounts, DbError> {
    if attachment_ids.is_empty() {
        return Ok(LifecycleCounts::default());
    }

    apply_to_both(
        conn,
        "to_remove = TRUE",
        "NOT to_remove AND (attachment_id IS NULL OR attachment_id <> ALL($1))",
        attachment_ids,
    )
    .await
}

pub(super) async fn list_image_pending(
    conn: &mut PgConnection,
    limit: i64,
) -> Result<Vec<ImagePendingRow>, DbError> {
    let rows = sqlx::query_as::<_, ImagePendingRow>(
        "SELECT id, image_url FROM product_templates WHERE image_updated ORDER BY id LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(super) async fn store_image(
    conn: &mut PgConnection,
    id: i64,
    image: &[u8],
    failed: bool,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE product_templates \
         SET image = $1, image_failed = $2, image_updated = FALSE, updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(image)
    .bind(failed)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

pub(super) async fn count_image_pending(conn: &mut PgConnection) -> Result<i64, DbError> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM product_templates WHERE image_updated")
            .fetch_one(&mut *conn)
            .await?;

    Ok(count)
}
