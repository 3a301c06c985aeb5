//! `import_runs` and `import_attachments` operations.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::rows::{AttachmentRow, AttachmentStatus, ImportRunRow};
use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, trigger_source, status, started_at, completed_at, \
     windows_committed, error_message, created_at";

const ATTACHMENT_COLUMNS: &str = "id, name, checksum, status, batch, row_count, error_message, \
     reconciled_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// import_runs
// ---------------------------------------------------------------------------

pub(super) async fn create_import_run(
    conn: &mut PgConnection,
    trigger_source: &str,
) -> Result<ImportRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ImportRunRow>(&format!(
        "INSERT INTO import_runs (public_id, trigger_source, status) \
         VALUES ($1, $2, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(trigger_source)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

pub(super) async fn start_import_run(conn: &mut PgConnection, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidImportRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

pub(super) async fn finish_import_run(
    conn: &mut PgConnection,
    id: i64,
    windows_committed: i32,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let status = if error_message.is_some() {
        "failed"
    } else {
        "succeeded"
    };

    let result = sqlx::query(
        "UPDATE import_runs \
         SET status = $1, completed_at = NOW(), windows_committed = $2, error_message = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(status)
    .bind(windows_committed)
    .bind(error_message)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidImportRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

pub(super) async fn list_import_runs(
    conn: &mut PgConnection,
    limit: i64,
) -> Result<Vec<ImportRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ImportRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM import_runs ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// import_attachments
// ---------------------------------------------------------------------------

pub(super) async fn register_attachment(
    conn: &mut PgConnection,
    name: &str,
    checksum: &str,
    row_count: i32,
) -> Result<AttachmentRow, DbError> {
    let row = sqlx::query_as::<_, AttachmentRow>(&format!(
        "INSERT INTO import_attachments (name, checksum, row_count) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (name, checksum) DO UPDATE SET \
             row_count     = EXCLUDED.row_count, \
             status        = CASE WHEN import_attachments.status = 'done' \
                                  THEN 'pending' ELSE import_attachments.status END, \
             batch         = CASE WHEN import_attachments.status = 'done' \
                                  THEN 0 ELSE import_attachments.batch END, \
             reconciled_at = CASE WHEN import_attachments.status = 'done' \
                                  THEN NULL ELSE import_attachments.reconciled_at END, \
             updated_at    = NOW() \
         RETURNING {ATTACHMENT_COLUMNS}"
    ))
    .bind(name)
    .bind(checksum)
    .bind(row_count)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

pub(super) async fn get_attachment(
    conn: &mut PgConnection,
    id: i64,
) -> Result<AttachmentRow, DbError> {
    sqlx::query_as::<_, AttachmentRow>(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM import_attachments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DbError::NotFound)
}

pub(super) async fn set_attachment_state(
    conn: &mut PgConnection,
    id: i64,
    status: AttachmentStatus,
    batch: i32,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_attachments \
         SET status = $1, batch = $2, error_message = $3, updated_at = NOW() \
         WHERE id = $4",
    )
    .bind(status.as_str())
    .bind(batch)
    .bind(error_message)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

pub(super) async fn list_attachments(
    conn: &mut PgConnection,
    limit: i64,
) -> Result<Vec<AttachmentRow>, DbError> {
    let rows = sqlx::query_as::<_, AttachmentRow>(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM import_attachments \
         ORDER BY updated_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(super) async fn list_unreconciled_attachments(
    conn: &mut PgConnection,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM import_attachments \
         WHERE status = 'done' AND reconciled_at IS NULL \
         ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

pub(super) async fn mark_attachments_reconciled(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE import_attachments SET reconciled_at = NOW(), updated_at = NOW() \
         WHERE id = ANY($1)",
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
