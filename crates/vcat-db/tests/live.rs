//! Live integration tests for the Postgres catalog store using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated database spun up by the sqlx test
//! harness. The `migrations` path is relative to the crate root
//! (`crates/vcat-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory. Run with `cargo test -- --ignored` and
//! `DATABASE_URL` pointing at a server the tests may create databases on.

use rust_decimal::Decimal;
use vcat_core::{CatalogField, FieldValue, RowValues, TemplateDefaults};
use vcat_db::{
    AttachmentStatus, CatalogStore, CatalogTx, DbError, NewTemplate, NewTemplateAttributeValue,
    NewVariant, NewVendorPrice, PgCatalog,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}

fn template(code: &str, name: &str, cost: i64) -> NewTemplate {
    let mut values = RowValues::new();
    values.insert(CatalogField::ProductCode, text(code));
    values.insert(CatalogField::Name, text(name));
    values.insert(CatalogField::Size(1), text("Small"));
    values.insert(CatalogField::Cost(1), FieldValue::Number(Decimal::from(cost)));
    values.insert(CatalogField::SaleOk, FieldValue::Boolean(false));
    NewTemplate {
        values,
        defaults: TemplateDefaults::default(),
    }
}

const SHAPE: [CatalogField; 5] = [
    CatalogField::Name,
    CatalogField::ProductCode,
    CatalogField::SaleOk,
    CatalogField::Size(1),
    CatalogField::Cost(1),
];

async fn seed_attachment(tx: &mut impl CatalogTx, name: &str) -> i64 {
    tx.register_attachment(name, "0123abcd", 3)
        .await
        .unwrap_or_else(|e| panic!("register_attachment failed for '{name}': {e}"))
        .id
}

fn variant(template_id: i64, code: &str, list: i64, attachment_id: i64) -> NewVariant {
    NewVariant {
        template_id,
        default_code: code.to_string(),
        size: "Small".to_string(),
        unit: "EA".to_string(),
        unitqty: "1".to_string(),
        standard_price: Decimal::from(list - 1),
        base_list_price: Decimal::from(list),
        attachment_id,
    }
}

// ---------------------------------------------------------------------------
// Section 1: Import runs and attachments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn import_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let catalog = PgCatalog::new(pool);
    let mut tx = catalog.begin().await.unwrap();

    let run = tx.create_import_run("cli").await.unwrap();
    assert_eq!(run.status, "queued");

    tx.start_import_run(run.id).await.unwrap();
    let err = tx.start_import_run(run.id).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidImportRunTransition { expected_status: "queued", .. }));

    tx.finish_import_run(run.id, 4, None).await.unwrap();
    let runs = tx.list_import_runs(5).await.unwrap();
    assert_eq!(runs[0].status, "succeeded");
    assert_eq!(runs[0].windows_committed, 4);
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn reregistering_a_done_attachment_resets_its_cursor(pool: sqlx::PgPool) {
    let catalog = PgCatalog::new(pool);
    let mut tx = catalog.begin().await.unwrap();

    let id = seed_attachment(&mut tx, "feed.csv").await;
    tx.set_attachment_state(id, AttachmentStatus::Done, 3, None)
        .await
        .unwrap();
    assert_eq!(tx.list_unreconciled_attachments().await.unwrap(), vec![id]);
    assert_eq!(tx.get_attachment(id).await.unwrap().batch, 3);

    let again = tx.register_attachment("feed.csv", "0123abcd", 9).await.unwrap();
    assert_eq!(again.id, id);
    assert_eq!(again.state(), Some(AttachmentStatus::Pending));
    assert_eq!(again.batch, 0);
    assert_eq!(again.row_count, 9);
    tx.commit().await.unwrap();
}

// ---------------------------------------------------------------------------
// Section 2: Templates
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn insert_then_update_templates_by_shape(pool: sqlx::PgPool) {
    let catalog = PgCatalog::new(pool);
    let mut tx = catalog.begin().await.unwrap();
    let first = seed_attachment(&mut tx, "a.csv").await;
    let second = seed_attachment(&mut tx, "b.csv").await;

    let inserted = tx
        .insert_templates(
            first,
            &SHAPE,
            &[template("A100", "Glove", 5), template("B200", "Mask", 7)],
        )
        .await
        .unwrap();
    assert_eq!(inserted.len(), 2);

    let ids = tx
        .template_ids_by_code(&["A100".to_string(), "B200".to_string(), "Z".to_string()])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);
    let a100 = ids["A100"];

    let mut values = RowValues::new();
    values.insert(CatalogField::Name, text("Glove XL"));
    let updated = tx
        .update_templates(second, &[CatalogField::Name], &[(a100, values)])
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let rows = tx.fetch_templates(&[a100]).await.unwrap();
    let row = &rows[0];
    assert_eq!(row.name, "Glove XL");
    assert_eq!(row.size_1, "Small");
    assert_eq!(row.cost_1, Decimal::from(5));
    assert!(!row.sale_ok);
    assert!(row.purchase_ok);
    assert_eq!(row.uom_name, "Units");
    assert_eq!(row.attachment_id, Some(second));
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn inserting_an_existing_code_maps_to_constraint_error(pool: sqlx::PgPool) {
    let catalog = PgCatalog::new(pool);
    let mut tx = catalog.begin().await.unwrap();
    let attachment = seed_attachment(&mut tx, "a.csv").await;

    tx.insert_templates(attachment, &SHAPE, &[template("A100", "Glove", 5)])
        .await
        .unwrap();
    let err = tx
        .insert_templates(attachment, &SHAPE, &[template("A100", "Glove", 5)])
        .await
        .unwrap_err();
    assert!(
        matches!(err, DbError::Constraint(ref name) if name == "product_templates_product_code_key"),
        "unexpected error: {err:?}"
    );
    tx.rollback().await.unwrap();
}

// ---------------------------------------------------------------------------
// Section 3: Attributes, variants and prices
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn variants_link_to_template_attribute_values(pool: sqlx::PgPool) {
    let catalog = PgCatalog::new(pool);
    let mut tx = catalog.begin().await.unwrap();
    let attachment = seed_attachment(&mut tx, "a.csv").await;
    let inserted = tx
        .insert_templates(attachment, &SHAPE, &[template("A100", "Glove", 5)])
        .await
        .unwrap();
    let template_id = inserted[0].0;

    let attribute = tx.ensure_attribute("Size").await.unwrap();
    assert_eq!(tx.ensure_attribute("Size").await.unwrap(), attribute);

    let values = tx
        .ensure_attribute_values(attribute, &["Small".to_string(), "Large".to_string()])
        .await
        .unwrap();
    assert_eq!(values.len(), 2);

    let lines = tx
        .ensure_attribute_lines(attribute, &[template_id])
        .await
        .unwrap();
    let new_tavs: Vec<NewTemplateAttributeValue> = values
        .iter()
        .map(|v| NewTemplateAttributeValue {
            line_id: lines[0].id,
            template_id,
            attribute_value_id: v.id,
        })
        .collect();
    let tavs = tx.ensure_template_attribute_values(&new_tavs).await.unwrap();
    assert_eq!(tavs.len(), 2);

    let variants = tx
        .upsert_variants(&[
            variant(template_id, "A100EA1", 30, attachment),
            variant(template_id, "A100BX10", 20, attachment),
        ])
        .await
        .unwrap();
    let variant_ids: Vec<i64> = variants.iter().map(|v| v.id).collect();
    tx.replace_variant_combinations(
        &variant_ids,
        &[(variants[0].id, tavs[0].id), (variants[1].id, tavs[1].id)],
    )
    .await
    .unwrap();
    tx.write_combination_signatures(&variant_ids).await.unwrap();

    let listed = tx.list_variants(&[template_id]).await.unwrap();
    assert_eq!(listed[0].combination_indices, tavs[0].id.to_string());

    tx.refresh_template_prices(&[template_id]).await.unwrap();
    let row = &tx.fetch_templates(&[template_id]).await.unwrap()[0];
    assert_eq!(row.list_price, Decimal::from(20));
    assert_eq!(row.standard_price, Decimal::from(5));

    let deactivated = tx
        .deactivate_template_attribute_values(&[template_id], &[tavs[0].id])
        .await
        .unwrap();
    assert_eq!(deactivated, 1);

    let active: Vec<i64> = tx
        .list_template_attribute_values(&[template_id])
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.active)
        .map(|v| v.id)
        .collect();
    assert_eq!(active, vec![tavs[0].id]);
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn vendor_prices_are_replaced_per_template(pool: sqlx::PgPool) {
    let catalog = PgCatalog::new(pool);
    let mut tx = catalog.begin().await.unwrap();
    let attachment = seed_attachment(&mut tx, "a.csv").await;
    let inserted = tx
        .insert_templates(attachment, &SHAPE, &[template("A100", "Glove", 5)])
        .await
        .unwrap();
    let template_id = inserted[0].0;
    let variants = tx
        .upsert_variants(&[variant(template_id, "A100EA1", 30, attachment)])
        .await
        .unwrap();

    let partners = tx
        .ensure_partners(&["Acme".to_string(), "Acme".to_string()])
        .await
        .unwrap();
    assert_eq!(partners.len(), 1);

    let entry = NewVendorPrice {
        partner_id: partners[0].id,
        template_id,
        variant_id: Some(variants[0].id),
        product_code: "A100EA1".to_string(),
        mfr_name: "Acme".to_string(),
        mfr_num: "M-1".to_string(),
        currency_code: "USD".to_string(),
        price: Decimal::from(29),
    };
    assert_eq!(tx.insert_vendor_prices(&[entry.clone()]).await.unwrap(), 1);
    assert_eq!(tx.delete_vendor_prices(&[template_id]).await.unwrap(), 1);
    assert_eq!(tx.insert_vendor_prices(&[entry]).await.unwrap(), 1);
    tx.commit().await.unwrap();
}

// ---------------------------------------------------------------------------
// Section 4: Lifecycle and images
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn archive_and_reactivate_follow_attachment_tags(pool: sqlx::PgPool) {
    let catalog = PgCatalog::new(pool);
    let mut tx = catalog.begin().await.unwrap();
    let old = seed_attachment(&mut tx, "old.csv").await;
    let current = seed_attachment(&mut tx, "new.csv").await;
    tx.insert_templates(old, &SHAPE, &[template("OLD1", "Old", 1)])
        .await
        .unwrap();
    tx.insert_templates(current, &SHAPE, &[template("NEW1", "New", 1)])
        .await
        .unwrap();

    let archived = tx.archive_unattached(&[current]).await.unwrap();
    assert_eq!(archived.templates, 1);

    let reactivated = tx.reactivate_attached(&[old]).await.unwrap();
    assert_eq!(reactivated.templates, 1);

    let flagged = tx.flag_unattached(&[current]).await.unwrap();
    assert_eq!(flagged.templates, 1);
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn image_queue_drains_on_store(pool: sqlx::PgPool) {
    let catalog = PgCatalog::new(pool);
    let mut tx = catalog.begin().await.unwrap();
    let attachment = seed_attachment(&mut tx, "a.csv").await;

    let mut row = template("A100", "Glove", 5);
    row.values
        .insert(CatalogField::ImageUrl, text("https://cdn.example/a100.png"));
    let shape = [CatalogField::Name, CatalogField::ProductCode, CatalogField::ImageUrl];
    let inserted = tx.insert_templates(attachment, &shape, &[row]).await.unwrap();
    let id = inserted[0].0;

    assert_eq!(tx.flag_image_updated(&[id]).await.unwrap(), 1);
    let pending = tx.list_image_pending(10).await.unwrap();
    assert_eq!(pending[0].image_url, "https://cdn.example/a100.png");

    tx.store_image(id, b"\x89PNG", false).await.unwrap();
    assert_eq!(tx.count_image_pending().await.unwrap(), 0);
    tx.commit().await.unwrap();
}
