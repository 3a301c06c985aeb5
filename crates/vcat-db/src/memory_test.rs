use rust_decimal::Decimal;
use vcat_core::{CatalogField, FieldValue, RowValues, TemplateDefaults};

use super::*;

fn row_with_code(code: &str) -> NewTemplate {
    let mut values = RowValues::new();
    values.insert(CatalogField::ProductCode, FieldValue::Text(code.to_string()));
    values.insert(CatalogField::Name, FieldValue::Text(format!("Item {code}")));
    NewTemplate {
        values,
        defaults: TemplateDefaults::default(),
    }
}

const SHAPE: [CatalogField; 2] = [CatalogField::Name, CatalogField::ProductCode];

fn variant(template_id: i64, code: &str, list: i64) -> NewVariant {
    NewVariant {
        template_id,
        default_code: code.to_string(),
        size: "Small".to_string(),
        unit: "EA".to_string(),
        unitqty: "1".to_string(),
        standard_price: Decimal::from(list / 2),
        base_list_price: Decimal::from(list),
        attachment_id: 1,
    }
}

#[tokio::test]
async fn rollback_discards_writes() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    tx.insert_templates(1, &SHAPE, &[row_with_code("A100")])
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert!(catalog.snapshot().templates.is_empty());
}

#[tokio::test]
async fn commit_publishes_writes_with_defaults() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let inserted = tx
        .insert_templates(7, &SHAPE, &[row_with_code("A100")])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let state = catalog.snapshot();
    let template = state.template(inserted[0].0).unwrap();
    assert_eq!(template.product_code, "A100");
    assert_eq!(template.name, "Item A100");
    assert_eq!(template.categ_name, "All");
    assert_eq!(template.attachment_id, Some(7));
    assert!(template.sale_ok && template.active && template.is_published);
}

#[tokio::test]
async fn duplicate_product_code_is_a_constraint_error() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    tx.insert_templates(1, &SHAPE, &[row_with_code("A100")])
        .await
        .unwrap();
    let err = tx
        .insert_templates(1, &SHAPE, &[row_with_code("A100")])
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Constraint(ref name) if name == "product_templates_product_code_key"));
}

#[tokio::test]
async fn armed_fail_point_fires_once() {
    let catalog = MemoryCatalog::new();
    catalog.fail_next(FailPoint::InsertTemplates);

    let mut tx = catalog.begin().await.unwrap();
    assert!(tx
        .insert_templates(1, &SHAPE, &[row_with_code("A100")])
        .await
        .is_err());
    assert!(tx
        .insert_templates(1, &SHAPE, &[row_with_code("A100")])
        .await
        .is_ok());
}

#[tokio::test]
async fn cursor_fail_point_spares_status_changes_at_the_same_batch() {
    let catalog = MemoryCatalog::new();
    catalog.fail_next(FailPoint::AdvanceCursor);
    let mut tx = catalog.begin().await.unwrap();
    let id = tx.register_attachment("feed.csv", "abc", 3).await.unwrap().id;

    tx.set_attachment_state(id, AttachmentStatus::Importing, 0, None)
        .await
        .unwrap();
    assert!(tx
        .set_attachment_state(id, AttachmentStatus::Importing, 1, None)
        .await
        .is_err());
    tx.set_attachment_state(id, AttachmentStatus::Importing, 1, None)
        .await
        .unwrap();
    assert_eq!(tx.get_attachment(id).await.unwrap().batch, 1);
}

#[tokio::test]
async fn commit_hook_sees_published_state() {
    let catalog = MemoryCatalog::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    catalog.on_commit(move |state| {
        sink.lock().unwrap().push(state.templates.len());
    });

    let tx = catalog.begin().await.unwrap();
    tx.rollback().await.unwrap();
    let mut tx = catalog.begin().await.unwrap();
    tx.insert_templates(1, &SHAPE, &[row_with_code("A100")])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn done_attachment_is_reset_on_reregistration() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let first = tx.register_attachment("feed.csv", "abc", 10).await.unwrap();
    tx.set_attachment_state(first.id, AttachmentStatus::Done, 2, None)
        .await
        .unwrap();
    tx.mark_attachments_reconciled(&[first.id]).await.unwrap();

    let again = tx.register_attachment("feed.csv", "abc", 12).await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.state(), Some(AttachmentStatus::Pending));
    assert_eq!(again.batch, 0);
    assert_eq!(again.row_count, 12);
    assert!(again.reconciled_at.is_none());
}

#[tokio::test]
async fn failed_attachment_keeps_its_cursor_on_reregistration() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let first = tx.register_attachment("feed.csv", "abc", 10).await.unwrap();
    tx.set_attachment_state(first.id, AttachmentStatus::Failed, 3, Some("boom"))
        .await
        .unwrap();

    let again = tx.register_attachment("feed.csv", "abc", 10).await.unwrap();
    assert_eq!(again.state(), Some(AttachmentStatus::Failed));
    assert_eq!(again.batch, 3);
}

#[tokio::test]
async fn upsert_variant_keeps_owner_and_reactivates() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let first = tx.upsert_variants(&[variant(10, "A100EA1", 20)]).await.unwrap();
    tx.archive_unattached(&[99]).await.unwrap();

    let second = tx.upsert_variants(&[variant(11, "A100EA1", 30)]).await.unwrap();
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[0].template_id, 10);
    assert_eq!(second[0].base_list_price, Decimal::from(30));
    assert!(second[0].active);
}

#[tokio::test]
async fn duplicate_codes_in_one_upsert_are_rejected() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let err = tx
        .upsert_variants(&[variant(10, "X", 1), variant(10, "X", 2)])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Constraint(_)));
}

#[tokio::test]
async fn combination_signature_follows_links() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let rows = tx.upsert_variants(&[variant(10, "V1", 5)]).await.unwrap();
    let id = rows[0].id;

    tx.replace_variant_combinations(&[id], &[(id, 42), (id, 7)])
        .await
        .unwrap();
    tx.write_combination_signatures(&[id]).await.unwrap();
    let listed = tx.list_variants(&[10]).await.unwrap();
    assert_eq!(listed[0].combination_indices, "7,42");

    tx.replace_variant_combinations(&[id], &[]).await.unwrap();
    tx.write_combination_signatures(&[id]).await.unwrap();
    let listed = tx.list_variants(&[10]).await.unwrap();
    assert_eq!(listed[0].combination_indices, "");
}

#[tokio::test]
async fn template_prices_follow_cheapest_active_variant() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let mut row = row_with_code("A100");
    row.values
        .insert(CatalogField::Cost(1), FieldValue::Number(Decimal::from(9)));
    row.values
        .insert(CatalogField::List(1), FieldValue::Number(Decimal::from(99)));
    let shape = [
        CatalogField::Name,
        CatalogField::ProductCode,
        CatalogField::Cost(1),
        CatalogField::List(1),
    ];
    let inserted = tx.insert_templates(1, &shape, &[row]).await.unwrap();
    let template_id = inserted[0].0;

    tx.refresh_template_prices(&[template_id]).await.unwrap();
    let template = &tx.fetch_templates(&[template_id]).await.unwrap()[0];
    assert_eq!(template.list_price, Decimal::from(99));

    tx.upsert_variants(&[
        variant(template_id, "A100EA1", 40),
        variant(template_id, "A100BX10", 25),
    ])
    .await
    .unwrap();

    tx.refresh_template_prices(&[template_id]).await.unwrap();
    let template = &tx.fetch_templates(&[template_id]).await.unwrap()[0];
    assert_eq!(template.list_price, Decimal::from(25));
    assert_eq!(template.standard_price, Decimal::from(9));
}

#[tokio::test]
async fn flag_unattached_skips_attached_rows() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    tx.insert_templates(1, &SHAPE, &[row_with_code("KEEP")])
        .await
        .unwrap();
    tx.insert_templates(2, &SHAPE, &[row_with_code("GONE")])
        .await
        .unwrap();

    let counts = tx.flag_unattached(&[1]).await.unwrap();
    assert_eq!(counts.templates, 1);

    tx.commit().await.unwrap();
    let state = catalog.snapshot();
    assert!(!state.template_by_code("KEEP").unwrap().to_remove);
    assert!(state.template_by_code("GONE").unwrap().to_remove);
    assert!(state.template_by_code("GONE").unwrap().active);
}

#[tokio::test]
async fn stored_image_clears_pending_flag() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let mut row = row_with_code("A100");
    row.values.insert(
        CatalogField::ImageUrl,
        FieldValue::Text("https://cdn.example/a.png".to_string()),
    );
    let shape = [CatalogField::Name, CatalogField::ProductCode, CatalogField::ImageUrl];
    let inserted = tx.insert_templates(1, &shape, &[row]).await.unwrap();
    let id = inserted[0].0;

    assert_eq!(tx.flag_image_updated(&[id]).await.unwrap(), 1);
    assert_eq!(tx.count_image_pending().await.unwrap(), 1);

    tx.store_image(id, b"png", false).await.unwrap();
    assert_eq!(tx.count_image_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_attachment_is_not_found() {
    let catalog = MemoryCatalog::new();
    let mut tx = catalog.begin().await.unwrap();
    let id = tx.register_attachment("feed.csv", "abc", 4).await.unwrap().id;

    assert_eq!(tx.get_attachment(id).await.unwrap().row_count, 4);
    assert!(matches!(
        tx.get_attachment(id + 1).await,
        Err(DbError::NotFound)
    ));
}
