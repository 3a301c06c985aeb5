//! `product_templates` operations.
//!
//! Insert and update statements are assembled from the registry column
//! names of the window's field shape, then bound as one typed array per
//! column.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rust_decimal::Decimal;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgConnection, Postgres};
use vcat_core::{CatalogField, FieldKind, FieldValue, RowValues};

use super::map_constraint;
use crate::rows::{NewTemplate, TemplateRow, TEMPLATE_COLUMNS};
use crate::DbError;

/// One bound column: values in row order, typed by the field kind.
enum ColumnArray {
    Text(Vec<String>),
    Number(Vec<Decimal>),
    Boolean(Vec<bool>),
}

impl ColumnArray {
    fn collect<'a>(field: CatalogField, rows: impl Iterator<Item = &'a RowValues>) -> Self {
        let kind = field.kind();
        let empty = FieldValue::empty(kind);
        let values = rows.map(|row| row.get(&field).unwrap_or(&empty));
        match kind {
            FieldKind::Text | FieldKind::Binary => {
                ColumnArray::Text(values.map(|v| v.as_text().to_string()).collect())
            }
            FieldKind::Number => ColumnArray::Number(values.map(FieldValue::as_number).collect()),
            FieldKind::Boolean => ColumnArray::Boolean(values.map(FieldValue::as_bool).collect()),
        }
    }

    fn sql_type(&self) -> &'static str {
        match self {
            ColumnArray::Text(_) => "text[]",
            ColumnArray::Number(_) => "numeric[]",
            ColumnArray::Boolean(_) => "bool[]",
        }
    }

    fn bind_to<'q, O>(
        self,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> QueryAs<'q, Postgres, O, PgArguments> {
        match self {
            ColumnArray::Text(v) => query.bind(v),
            ColumnArray::Number(v) => query.bind(v),
            ColumnArray::Boolean(v) => query.bind(v),
        }
    }
}

pub(super) async fn template_ids_by_code(
    conn: &mut PgConnection,
    codes: &[String],
) -> Result<BTreeMap<String, i64>, DbError> {
    if codes.is_empty() {
        return Ok(BTreeMap::new());
    }

    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT product_code, id FROM product_templates WHERE product_code = ANY($1)",
    )
    .bind(codes)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

pub(super) async fn insert_templates(
    conn: &mut PgConnection,
    attachment_id: i64,
    shape: &[CatalogField],
    rows: &[NewTemplate],
) -> Result<Vec<(i64, String)>, DbError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let default_columns = [
        "categ_name",
        "uom_name",
        "uom_po_name",
        "product_type",
        "tracking",
        "sale_line_warn",
        "purchase_line_warn",
    ];
    let mut defaults: [Vec<String>; 7] = Default::default();
    for row in rows {
        let d = &row.defaults;
        for (column, value) in defaults.iter_mut().zip([
            &d.category,
            &d.uom,
            &d.uom_po,
            &d.product_type,
            &d.tracking,
            &d.sale_line_warn,
            &d.purchase_line_warn,
        ]) {
            column.push(value.clone());
        }
    }

    let arrays: Vec<ColumnArray> = shape
        .iter()
        .map(|field| ColumnArray::collect(*field, rows.iter().map(|r| &r.values)))
        .collect();

    let mut columns = default_columns.join(", ");
    let mut unnest = String::new();
    for (i, _) in default_columns.iter().enumerate() {
        let _ = write!(unnest, "${}::text[], ", i + 2);
    }
    for (i, (field, array)) in shape.iter().zip(&arrays).enumerate() {
        let _ = write!(columns, ", {}", field.column());
        let _ = write!(
            unnest,
            "${}::{}, ",
            i + 2 + default_columns.len(),
            array.sql_type()
        );
    }
    let unnest = unnest.trim_end_matches(", ");

    let sql = format!(
        "INSERT INTO product_templates (attachment_id, {columns}) \
         SELECT $1, * FROM UNNEST({unnest}) \
         RETURNING id, product_code"
    );

    let mut query = sqlx::query_as::<_, (i64, String)>(&sql).bind(attachment_id);
    for column in defaults {
        query = query.bind(column);
    }
    for array in arrays {
        query = array.bind_to(query);
    }

    let inserted = query.fetch_all(&mut *conn).await.map_err(map_constraint)?;
    Ok(inserted)
}

pub(super) async fn update_templates(
    conn: &mut PgConnection,
    attachment_id: i64,
    shape: &[CatalogField],
    rows: &[(i64, RowValues)],
) -> Result<u64, DbError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
    let arrays: Vec<ColumnArray> = shape
        .iter()
        .map(|field| ColumnArray::collect(*field, rows.iter().map(|(_, values)| values)))
        .collect();

    let mut assignments = String::new();
    let mut aliases = String::from("id");
    let mut unnest = String::from("$2::int8[]");
    for (i, (field, array)) in shape.iter().zip(&arrays).enumerate() {
        let column = field.column();
        let _ = write!(assignments, "{column} = u.{column}, ");
        let _ = write!(aliases, ", {column}");
        let _ = write!(unnest, ", ${}::{}", i + 3, array.sql_type());
    }

    let sql = format!(
        "UPDATE product_templates AS t SET {assignments}\
             attachment_id = $1, to_remove = FALSE, updated_at = NOW() \
         FROM UNNEST({unnest}) AS u({aliases}) \
         WHERE t.id = u.id \
         RETURNING t.id"
    );

    let mut query = sqlx::query_as::<_, (i64,)>(&sql)
        .bind(attachment_id)
        .bind(ids);
    for array in arrays {
        query = array.bind_to(query);
    }

    let updated = query.fetch_all(&mut *conn).await.map_err(map_constraint)?;
    Ok(updated.len() as u64)
}

pub(super) async fn fetch_templates(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<Vec<TemplateRow>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, TemplateRow>(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM product_templates WHERE id = ANY($1) ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(super) async fn flag_image_updated(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE product_templates SET image_updated = TRUE \
         WHERE id = ANY($1) AND image_url <> ''",
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(super) async fn enable_dropship(conn: &mut PgConnection, ids: &[i64]) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE product_templates SET dropship = TRUE WHERE id = ANY($1) AND NOT dropship",
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(super) async fn refresh_template_prices(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }

    // Templates without an active variant fall back to their slot-1 list price.
    let result = sqlx::query(
        "UPDATE product_templates AS t \
         SET list_price = COALESCE(( \
                 SELECT MIN(v.base_list_price) FROM product_variants AS v \
                 WHERE v.template_id = t.id AND v.active \
             ), t.list_1), \
             standard_price = t.cost_1, \
             updated_at = NOW() \
         WHERE t.id = ANY($1)",
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
