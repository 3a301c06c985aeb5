//! Vendor price-list regeneration.
//!
//! Entries of every touched template are wiped and rebuilt inside the
//! window's transaction; they are never patched in place. Only variants the
//! template's current size slots still produce are priced; a variant whose
//! slot left the sheet waits for reconciliation unpriced.

use std::collections::{BTreeSet, HashMap};

use vcat_db::{CatalogTx, NewVendorPrice, VariantRow};

use crate::context::ImportContext;
use crate::error::ImportError;
use crate::variants::sized_slots;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceListReport {
    pub partners: usize,
    pub deleted: u64,
    pub inserted: u64,
    /// Touched templates without a vendor name.
    pub without_vendor: usize,
}

/// Rebuild the vendor price lists of `template_ids`.
///
/// A template with at most one current variant gets a single template-level
/// entry priced at its slot-1 cost. A template with several gets one entry
/// per variant priced at that variant's cost.
///
/// # Errors
///
/// Returns [`ImportError::Db`] if any catalog read or write fails.
pub async fn rebuild_price_lists<T: CatalogTx>(
    tx: &mut T,
    ctx: &ImportContext<'_>,
    template_ids: &[i64],
) -> Result<PriceListReport, ImportError> {
    if template_ids.is_empty() {
        return Ok(PriceListReport::default());
    }

    let templates = tx.fetch_templates(template_ids).await?;

    let vendors: Vec<String> = templates
        .iter()
        .map(|t| t.vendor_name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let partners: HashMap<String, i64> = tx
        .ensure_partners(&vendors)
        .await?
        .into_iter()
        .map(|p| (p.name, p.id))
        .collect();

    let mut report = PriceListReport {
        partners: partners.len(),
        deleted: tx.delete_vendor_prices(template_ids).await?,
        ..PriceListReport::default()
    };

    let current: BTreeSet<(i64, String)> = sized_slots(&templates)
        .into_iter()
        .map(|d| (d.template_id, d.default_code))
        .collect();
    let mut variants: HashMap<i64, Vec<VariantRow>> = HashMap::new();
    for variant in tx.list_variants(template_ids).await? {
        let key = (variant.template_id, variant.default_code.clone());
        if variant.active && current.contains(&key) {
            variants.entry(variant.template_id).or_default().push(variant);
        }
    }

    let mut entries = Vec::new();
    for template in &templates {
        let Some(&partner_id) = partners.get(template.vendor_name.trim()) else {
            report.without_vendor += 1;
            continue;
        };
        let entry = |variant_id, product_code: &str, price| NewVendorPrice {
            partner_id,
            template_id: template.id,
            variant_id,
            product_code: product_code.to_string(),
            mfr_name: template.mfr_name.clone(),
            mfr_num: template.mfr_num.clone(),
            currency_code: ctx.settings.currency_code.clone(),
            price,
        };

        match variants.get(&template.id).map(Vec::as_slice) {
            Some(many @ [_, _, ..]) => {
                for variant in many {
                    entries.push(entry(
                        Some(variant.id),
                        &variant.default_code,
                        variant.standard_price,
                    ));
                }
            }
            Some([single]) => {
                entries.push(entry(None, &single.default_code, template.cost_1));
            }
            _ => entries.push(entry(None, &template.product_code, template.cost_1)),
        }
    }

    report.inserted = tx.insert_vendor_prices(&entries).await?;

    tracing::debug!(
        attachment_id = ctx.attachment_id,
        templates = templates.len(),
        deleted = report.deleted,
        inserted = report.inserted,
        "price lists rebuilt"
    );
    Ok(report)
}
