//! Attribute, attribute-value, attribute-line and template-attribute-value
//! operations.

use sqlx::PgConnection;

use super::distinct;
use crate::rows::{
    AttributeLineRow, AttributeValueRow, NewTemplateAttributeValue, TemplateAttributeValueRow,
};
use crate::DbError;

pub(super) async fn ensure_attribute(conn: &mut PgConnection, name: &str) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO product_attributes (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

pub(super) async fn ensure_attribute_values(
    conn: &mut PgConnection,
    attribute_id: i64,
    names: &[String],
) -> Result<Vec<AttributeValueRow>, DbError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let names = distinct(names);

    sqlx::query(
        "INSERT INTO product_attribute_values (attribute_id, name) \
         SELECT $1, * FROM UNNEST($2::text[]) \
         ON CONFLICT (attribute_id, name) DO NOTHING",
    )
    .bind(attribute_id)
    .bind(&names)
    .execute(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, AttributeValueRow>(
        "SELECT id, attribute_id, name FROM product_attribute_values \
         WHERE attribute_id = $1 AND name = ANY($2) \
         ORDER BY id",
    )
    .bind(attribute_id)
    .bind(&names)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(super) async fn ensure_attribute_lines(
    conn: &mut PgConnection,
    attribute_id: i64,
    template_ids: &[i64],
) -> Result<Vec<AttributeLineRow>, DbError> {
    if template_ids.is_empty() {
        return Ok(Vec::new());
    }
    let template_ids = distinct(template_ids);

    let rows = sqlx::query_as::<_, AttributeLineRow>(
        "INSERT INTO template_attribute_lines (attribute_id, template_id) \
         SELECT $1, * FROM UNNEST($2::int8[]) \
         ON CONFLICT (attribute_id, template_id) DO UPDATE SET active = TRUE \
         RETURNING id, template_id, attribute_id, active",
    )
    .bind(attribute_id)
    .bind(&template_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(super) async fn ensure_template_attribute_values(
    conn: &mut PgConnection,
    rows: &[NewTemplateAttributeValue],
) -> Result<Vec<TemplateAttributeValueRow>, DbError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let rows = distinct(rows);

    let line_ids: Vec<i64> = rows.iter().map(|r| r.line_id).collect();
    let template_ids: Vec<i64> = rows.iter().map(|r| r.template_id).collect();
    let value_ids: Vec<i64> = rows.iter().map(|r| r.attribute_value_id).collect();

    let upserted = sqlx::query_as::<_, TemplateAttributeValueRow>(
        "INSERT INTO template_attribute_values (line_id, template_id, attribute_value_id) \
         SELECT * FROM UNNEST($1::int8[], $2::int8[], $3::int8[]) \
         ON CONFLICT (line_id, attribute_value_id) DO UPDATE SET active = TRUE \
         RETURNING id, line_id, template_id, attribute_value_id, active",
    )
    .bind(&line_ids)
    .bind(&template_ids)
    .bind(&value_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(upserted)
}

pub(super) async fn deactivate_template_attribute_values(
    conn: &mut PgConnection,
    template_ids: &[i64],
    keep_ids: &[i64],
) -> Result<u64, DbError> {
    if template_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE template_attribute_values SET active = FALSE \
         WHERE template_id = ANY($1) AND active AND id <> ALL($2)",
    )
    .bind(template_ids)
    .bind(keep_ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(super) async fn list_template_attribute_values(
    conn: &mut PgConnection,
    template_ids: &[i64],
) -> Result<Vec<TemplateAttributeValueRow>, DbError> {
    if template_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, TemplateAttributeValueRow>(
        "SELECT id, line_id, template_id, attribute_value_id, active \
         FROM template_attribute_values WHERE template_id = ANY($1) ORDER BY id",
    )
    .bind(template_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}
