//! `product_variants` and `variant_combinations` operations.

use rust_decimal::Decimal;
use sqlx::PgConnection;

use super::map_constraint;
use crate::rows::{NewVariant, VariantRow, VARIANT_COLUMNS};
use crate::DbError;

pub(super) async fn upsert_variants(
    conn: &mut PgConnection,
    rows: &[NewVariant],
) -> Result<Vec<VariantRow>, DbError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut template_ids: Vec<i64> = Vec::with_capacity(rows.len());
    let mut codes: Vec<String> = Vec::with_capacity(rows.len());
    let mut sizes: Vec<String> = Vec::with_capacity(rows.len());
    let mut units: Vec<String> = Vec::with_capacity(rows.len());
    let mut unitqtys: Vec<String> = Vec::with_capacity(rows.len());
    let mut standard_prices: Vec<Decimal> = Vec::with_capacity(rows.len());
    let mut list_prices: Vec<Decimal> = Vec::with_capacity(rows.len());
    let mut attachment_ids: Vec<i64> = Vec::with_capacity(rows.len());

    for row in rows {
        template_ids.push(row.template_id);
        codes.push(row.default_code.clone());
        sizes.push(row.size.clone());
        units.push(row.unit.clone());
        unitqtys.push(row.unitqty.clone());
        standard_prices.push(row.standard_price);
        list_prices.push(row.base_list_price);
        attachment_ids.push(row.attachment_id);
    }

    // An existing code keeps its owning template.
    let upserted = sqlx::query_as::<_, VariantRow>(&format!(
        "INSERT INTO product_variants \
             (template_id, default_code, size, unit, unitqty, standard_price, \
              base_list_price, attachment_id) \
         SELECT * FROM UNNEST(\
              $1::int8[], $2::text[], $3::text[], $4::text[], $5::text[], \
              $6::numeric[], $7::numeric[], $8::int8[]) \
         ON CONFLICT (default_code) DO UPDATE SET \
             size            = EXCLUDED.size, \
             unit            = EXCLUDED.unit, \
             unitqty         = EXCLUDED.unitqty, \
             standard_price  = EXCLUDED.standard_price, \
             base_list_price = EXCLUDED.base_list_price, \
             attachment_id   = EXCLUDED.attachment_id, \
             is_published    = TRUE, \
             active          = TRUE, \
             to_remove       = FALSE, \
             updated_at      = NOW() \
         RETURNING {VARIANT_COLUMNS}"
    ))
    .bind(&template_ids)
    .bind(&codes)
    .bind(&sizes)
    .bind(&units)
    .bind(&unitqtys)
    .bind(&standard_prices)
    .bind(&list_prices)
    .bind(&attachment_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_constraint)?;

    Ok(upserted)
}

pub(super) async fn replace_variant_combinations(
    conn: &mut PgConnection,
    variant_ids: &[i64],
    links: &[(i64, i64)],
) -> Result<(), DbError> {
    if variant_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("DELETE FROM variant_combinations WHERE variant_id = ANY($1)")
        .bind(variant_ids)
        .execute(&mut *conn)
        .await?;

    if links.is_empty() {
        return Ok(());
    }

    let (link_variants, link_values): (Vec<i64>, Vec<i64>) = links.iter().copied().unzip();

    sqlx::query(
        "INSERT INTO variant_combinations (variant_id, template_attribute_value_id) \
         SELECT * FROM UNNEST($1::int8[], $2::int8[]) \
         ON CONFLICT DO NOTHING",
    )
    .bind(&link_variants)
    .bind(&link_values)
    .execute(&mut *conn)
    .await
    .map_err(map_constraint)?;

    Ok(())
}

pub(super) async fn write_combination_signatures(
    conn: &mut PgConnection,
    variant_ids: &[i64],
) -> Result<u64, DbError> {
    if variant_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE product_variants AS v SET combination_indices = COALESCE(( \
             SELECT STRING_AGG(c.template_attribute_value_id::text, ',' \
                               ORDER BY c.template_attribute_value_id) \
             FROM variant_combinations AS c \
             WHERE c.variant_id = v.id \
         ), '') \
         WHERE v.id = ANY($1)",
    )
    .bind(variant_ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(super) async fn list_variants(
    conn: &mut PgConnection,
    template_ids: &[i64],
) -> Result<Vec<VariantRow>, DbError> {
    if template_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, VariantRow>(&format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE template_id = ANY($1) ORDER BY id"
    ))
    .bind(template_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(super) async fn retag_variants(
    conn: &mut PgConnection,
    template_ids: &[i64],
    attachment_id: i64,
) -> Result<u64, DbError> {
    if template_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE product_variants \
         SET attachment_id = $2, updated_at = NOW() \
         WHERE template_id = ANY($1) AND active AND NOT to_remove",
    )
    .bind(template_ids)
    .bind(attachment_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
