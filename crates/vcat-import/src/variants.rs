//! Variant synthesis: expand each template's size slots into variant
//! products, keep the shared size attribute in sync and recompute every
//! touched variant's combination signature.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;
use vcat_core::derived_variant_code;
use vcat_db::{CatalogTx, NewTemplateAttributeValue, NewVariant, TemplateRow};

use crate::context::ImportContext;
use crate::error::ImportError;

/// One sized slot of a template, resolved to the variant it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub template_id: i64,
    pub catalog_code: String,
    /// 1-based slot index.
    pub slot: u8,
    pub size: String,
    pub unit: String,
    pub unitqty: String,
    pub cost: Decimal,
    pub list: Decimal,
    pub default_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub templates: usize,
    pub variants: usize,
    pub links: usize,
    /// Descriptors dropped because a later one in the window produced the
    /// same variant code.
    pub superseded: usize,
    /// Variant codes already owned by a template outside this descriptor.
    pub foreign_codes: usize,
    pub values_deactivated: u64,
}

/// Every sized slot of `templates`, before collisions are resolved.
pub(crate) fn sized_slots(templates: &[TemplateRow]) -> Vec<VariantDescriptor> {
    let mut out = Vec::new();
    for template in templates {
        for (slot, values) in (1_u8..).zip(template.slots()) {
            if !values.is_sized() {
                continue;
            }
            let size = values.size.trim().to_string();
            out.push(VariantDescriptor {
                template_id: template.id,
                catalog_code: template.product_code.clone(),
                slot,
                default_code: derived_variant_code(
                    &template.product_code,
                    &values.unit,
                    &values.unitqty,
                ),
                size,
                unit: values.unit,
                unitqty: values.unitqty,
                cost: values.cost,
                list: values.list,
            });
        }
    }
    out
}

/// Resolve the variants `templates` produce, in template then slot order.
///
/// When two descriptors share a derived code the later one wins and takes
/// the later position; the earlier is dropped. Order of `templates` is
/// therefore the tie-break.
#[must_use]
pub fn resolve_descriptors(templates: &[TemplateRow]) -> Vec<VariantDescriptor> {
    let mut resolved: Vec<VariantDescriptor> = Vec::new();
    for descriptor in sized_slots(templates) {
        if let Some(at) = resolved
            .iter()
            .position(|d| d.default_code == descriptor.default_code)
        {
            tracing::debug!(
                code = %descriptor.default_code,
                template_id = descriptor.template_id,
                slot = descriptor.slot,
                "variant code repeated in window; last descriptor wins"
            );
            resolved.remove(at);
        }
        resolved.push(descriptor);
    }
    resolved
}

/// Synthesize variants for `template_ids`, given in window row order.
///
/// # Errors
///
/// Returns [`ImportError::Db`] if any catalog read or write fails; the
/// caller rolls the window back.
pub async fn synthesize_variants<T: CatalogTx>(
    tx: &mut T,
    ctx: &ImportContext<'_>,
    template_ids: &[i64],
) -> Result<SynthesisReport, ImportError> {
    if template_ids.is_empty() {
        return Ok(SynthesisReport::default());
    }

    // fetch_templates orders by id; restore row order for the tie-break.
    let mut by_id: HashMap<i64, TemplateRow> = tx
        .fetch_templates(template_ids)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();
    let templates: Vec<TemplateRow> = template_ids
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect();

    let every_slot = sized_slots(&templates);
    let resolved = resolve_descriptors(&templates);
    let mut report = SynthesisReport {
        templates: templates.len(),
        superseded: every_slot.len() - resolved.len(),
        ..SynthesisReport::default()
    };

    // Shared size values, then one attribute line per sized template.
    let sizes: Vec<String> = every_slot
        .iter()
        .map(|d| d.size.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let value_ids: HashMap<String, i64> = tx
        .ensure_attribute_values(ctx.size_attribute_id, &sizes)
        .await?
        .into_iter()
        .map(|v| (v.name, v.id))
        .collect();

    let sized_templates: Vec<i64> = every_slot
        .iter()
        .map(|d| d.template_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let line_ids: HashMap<i64, i64> = tx
        .ensure_attribute_lines(ctx.size_attribute_id, &sized_templates)
        .await?
        .into_iter()
        .map(|l| (l.template_id, l.id))
        .collect();

    let wanted: BTreeSet<NewTemplateAttributeValue> = every_slot
        .iter()
        .filter_map(|d| {
            Some(NewTemplateAttributeValue {
                line_id: *line_ids.get(&d.template_id)?,
                template_id: d.template_id,
                attribute_value_id: *value_ids.get(&d.size)?,
            })
        })
        .collect();
    let wanted: Vec<NewTemplateAttributeValue> = wanted.into_iter().collect();
    let ptavs: HashMap<(i64, i64), i64> = tx
        .ensure_template_attribute_values(&wanted)
        .await?
        .into_iter()
        .map(|p| ((p.template_id, p.attribute_value_id), p.id))
        .collect();

    let keep: Vec<i64> = ptavs.values().copied().collect();
    report.values_deactivated = tx
        .deactivate_template_attribute_values(template_ids, &keep)
        .await?;

    let new_variants: Vec<NewVariant> = resolved
        .iter()
        .map(|d| NewVariant {
            template_id: d.template_id,
            default_code: d.default_code.clone(),
            size: d.size.clone(),
            unit: d.unit.clone(),
            unitqty: d.unitqty.clone(),
            standard_price: d.cost,
            base_list_price: d.list,
            attachment_id: ctx.attachment_id,
        })
        .collect();
    let variants: BTreeMap<String, (i64, i64)> = tx
        .upsert_variants(&new_variants)
        .await?
        .into_iter()
        .map(|v| (v.default_code, (v.id, v.template_id)))
        .collect();
    report.variants = variants.len();

    let mut linked_variants = Vec::new();
    let mut links = Vec::new();
    for d in &resolved {
        let Some(&(variant_id, owner)) = variants.get(&d.default_code) else {
            continue;
        };
        if owner != d.template_id {
            tracing::warn!(
                code = %d.default_code,
                owner,
                template_id = d.template_id,
                "variant code belongs to another template; combination left as is"
            );
            report.foreign_codes += 1;
            continue;
        }
        let Some(&ptav) = value_ids
            .get(&d.size)
            .and_then(|value| ptavs.get(&(d.template_id, *value)))
        else {
            continue;
        };
        linked_variants.push(variant_id);
        links.push((variant_id, ptav));
    }
    report.links = links.len();

    tx.replace_variant_combinations(&linked_variants, &links).await?;
    tx.write_combination_signatures(&linked_variants).await?;
    tx.refresh_template_prices(template_ids).await?;

    tracing::debug!(
        attachment_id = ctx.attachment_id,
        templates = report.templates,
        variants = report.variants,
        superseded = report.superseded,
        "variants synthesized"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(id: i64, code: &str, slots: &[(&str, &str, &str)]) -> TemplateRow {
        let mut row = TemplateRow {
            id,
            product_code: code.to_string(),
            ..TemplateRow::default()
        };
        for (n, (size, unit, qty)) in slots.iter().enumerate() {
            let (s, u, q) = match n {
                0 => (&mut row.size_1, &mut row.unit_1, &mut row.unitqty_1),
                1 => (&mut row.size_2, &mut row.unit_2, &mut row.unitqty_2),
                _ => (&mut row.size_3, &mut row.unit_3, &mut row.unitqty_3),
            };
            *s = (*size).to_string();
            *u = (*unit).to_string();
            *q = (*qty).to_string();
        }
        row
    }

    #[test]
    fn blank_sizes_produce_no_descriptor() {
        let rows = [template(1, "A100", &[("Small", "EA", "1"), ("", "CS", "12")])];
        let resolved = resolve_descriptors(&rows);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].default_code, "A100EA1");
        assert_eq!(resolved[0].slot, 1);
    }

    #[test]
    fn later_slot_wins_on_code_collision() {
        let rows = [template(1, "A100", &[("Small", "EA", "1"), ("Large", "EA", "1")])];
        let resolved = resolve_descriptors(&rows);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].size, "Large");
        assert_eq!(resolved[0].slot, 2);
    }

    #[test]
    fn later_template_wins_and_moves_to_its_position() {
        // "AB" + "C" + "1" and "A" + "BC" + "1" derive the same code.
        let rows = [
            template(1, "AB", &[("S", "C", "1")]),
            template(2, "Z9", &[("S", "EA", "1")]),
            template(3, "A", &[("M", "BC", "1")]),
        ];
        let codes: Vec<(i64, String)> = resolve_descriptors(&rows)
            .into_iter()
            .map(|d| (d.template_id, d.default_code))
            .collect();
        assert_eq!(
            codes,
            vec![(2, "Z9EA1".to_string()), (3, "ABC1".to_string())]
        );
    }

    #[test]
    fn sizes_are_trimmed() {
        let rows = [template(1, "A1", &[("  Small ", "EA", "1")])];
        assert_eq!(resolve_descriptors(&rows)[0].size, "Small");
    }
}
