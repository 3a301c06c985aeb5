//! `partners` and `vendor_prices` operations.

use rust_decimal::Decimal;
use sqlx::PgConnection;

use super::{distinct, map_constraint};
use crate::rows::{NewVendorPrice, PartnerRow};
use crate::DbError;

pub(super) async fn ensure_partners(
    conn: &mut PgConnection,
    names: &[String],
) -> Result<Vec<PartnerRow>, DbError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let names = distinct(names);

    sqlx::query(
        "INSERT INTO partners (name) SELECT * FROM UNNEST($1::text[]) \
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(&names)
    .execute(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, PartnerRow>(
        "SELECT id, name FROM partners WHERE name = ANY($1) ORDER BY id",
    )
    .bind(&names)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(super) async fn delete_vendor_prices(
    conn: &mut PgConnection,
    template_ids: &[i64],
) -> Result<u64, DbError> {
    if template_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "DELETE FROM vendor_prices \
         WHERE template_id = ANY($1) \
            OR variant_id IN (SELECT id FROM product_variants WHERE template_id = ANY($1))",
    )
    .bind(template_ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(super) async fn insert_vendor_prices(
    conn: &mut PgConnection,
    rows: &[NewVendorPrice],
) -> Result<u64, DbError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut partner_ids: Vec<i64> = Vec::with_capacity(rows.len());
    let mut template_ids: Vec<i64> = Vec::with_capacity(rows.len());
    let mut variant_ids: Vec<Option<i64>> = Vec::with_capacity(rows.len());
    let mut product_codes: Vec<String> = Vec::with_capacity(rows.len());
    let mut mfr_names: Vec<String> = Vec::with_capacity(rows.len());
    let mut mfr_nums: Vec<String> = Vec::with_capacity(rows.len());
    let mut currencies: Vec<String> = Vec::with_capacity(rows.len());
    let mut prices: Vec<Decimal> = Vec::with_capacity(rows.len());

    for row in rows {
        partner_ids.push(row.partner_id);
        template_ids.push(row.template_id);
        variant_ids.push(row.variant_id);
        product_codes.push(row.product_code.clone());
        mfr_names.push(row.mfr_name.clone());
        mfr_nums.push(row.mfr_num.clone());
        currencies.push(row.currency_code.clone());
        prices.push(row.price);
    }

    let result = sqlx::query(
        "INSERT INTO vendor_prices \
             (partner_id, template_id, variant_id, product_code, mfr_name, mfr_num, \
              currency_code, price) \
         SELECT * FROM UNNEST(\
              $1::int8[], $2::int8[], $3::int8[], $4::text[], $5::text[], $6::text[], \
              $7::text[], $8::numeric[])",
    )
    .bind(&partner_ids)
    .bind(&template_ids)
    .bind(&variant_ids)
    .bind(&product_codes)
    .bind(&mfr_names)
    .bind(&mfr_nums)
    .bind(&currencies)
    .bind(&prices)
    .execute(&mut *conn)
    .await
    .map_err(map_constraint)?;

    Ok(result.rows_affected())
}
