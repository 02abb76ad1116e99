use catalog_reconcile::reconcile::TaskNode;
use catalog_reconcile::session::load_categories;
use catalog_reconcile::store::{Change, FaultRule, OpKind};
use catalog_reconcile::{
    Collection, ColorVariant, EditSession, FeatureTag, ImageBaseline, InMemoryStore, ProductFields, ReconcileConfig,
    ReconcileError, RemoteId, SizeVariant, StoreError, Upload, Value,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    store: Arc<InMemoryStore>,
    category: RemoteId,
    product: RemoteId,
    red: RemoteId,
    red_image: RemoteId,
    sizes: Vec<RemoteId>,
    feature: RemoteId,
}

impl Fixture {
    async fn new(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        let category = store
            .seed(Collection::Categories, None, json!({"name": "Bags"}))
            .await
            .unwrap();
        let product = store
            .seed(
                Collection::Products,
                None,
                json!({"name": "Tote", "price": "45.00", "category": category.get(), "sku": "TOTE-1"}),
            )
            .await
            .unwrap();
        let red = store
            .seed(
                Collection::Colors,
                Some(product),
                json!({"name": "Red", "hex": "#FF0000", "stock": 3, "position": 0}),
            )
            .await
            .unwrap();
        let red_image = store
            .seed(
                Collection::ColorImages,
                Some(red),
                json!({"image": "media/color_images/red-1.png", "position": 0}),
            )
            .await
            .unwrap();

        let mut sizes = Vec::new();
        for (position, name) in ["S", "M", "L"].into_iter().enumerate() {
            let id = store
                .seed(
                    Collection::Sizes,
                    Some(product),
                    json!({"name": name, "extra_price": "0.00", "position": position}),
                )
                .await
                .unwrap();
            sizes.push(id);
        }
        let feature = store
            .seed(
                Collection::Features,
                Some(product),
                json!({"name": "Waterproof", "position": 0}),
            )
            .await
            .unwrap();

        Self {
            store,
            category,
            product,
            red,
            red_image,
            sizes,
            feature,
        }
    }

    async fn open(&self) -> EditSession {
        let session = EditSession::load(self.store.as_ref(), self.product).await.unwrap();
        self.store.reset_counters();
        self.store.clear_journal().await;
        session
    }

    async fn save(&self, session: &mut EditSession, config: &ReconcileConfig) -> catalog_reconcile::ReconcileResults {
        session.save(self.store.as_ref(), config).await.unwrap()
    }
}

fn png(name: &str) -> Upload {
    Upload::new(name, "image/png", vec![137, 80, 78, 71])
}

fn changes_in(journal: &[Change], collection: Collection) -> Vec<&Change> {
    journal.iter().filter(|change| change.collection == collection).collect()
}

#[tokio::test]
async fn test_load_session_reads_every_collection() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let session = fixture.open().await;

    let working = session.working();
    assert_eq!(working.product.name, "Tote");
    assert_eq!(working.product.category, Some(fixture.category));
    assert_eq!(working.colors.len(), 1);
    assert_eq!(working.colors[0].id(), Some(fixture.red));
    assert_eq!(working.colors[0].item().images[0].id(), Some(fixture.red_image));
    let size_ids: Vec<_> = working.sizes.iter().filter_map(|entry| entry.id()).collect();
    assert_eq!(size_ids, fixture.sizes);
    assert_eq!(working.features[0].id(), Some(fixture.feature));
    assert_eq!(session.categories().len(), 1);
    assert!(!session.is_dirty());
}

#[tokio::test]
async fn test_load_missing_product_fails() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let err = EditSession::load(fixture.store.as_ref(), RemoteId(9999)).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Store(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_red_blue_reorder_and_insert() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;

    let blue = session
        .working_mut()
        .add_color(ColorVariant::new("Blue", "#0000FF", 2));
    assert!(session.working_mut().move_color(blue, 0));

    let plan = session.plan().unwrap();
    assert_eq!(plan.colors.to_create.len(), 1);
    assert_eq!(plan.colors.to_create[0].slot, 0);
    assert_eq!(plan.colors.to_update.len(), 1);
    assert_eq!(plan.colors.to_update[0].id, fixture.red);
    assert_eq!(plan.colors.to_update[0].payload.field_names(), vec!["position"]);
    assert!(plan.colors.to_delete.is_empty());
    assert!(plan.images.is_empty());

    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(results.is_success());

    let journal = fixture.store.journal().await;
    assert_eq!(journal.len(), 2);
    let update = journal.iter().find(|change| change.is_update()).unwrap();
    assert_eq!(update.id, fixture.red);
    assert_eq!(update.fields, vec!["position".to_string()]);
    assert_eq!(update.value("position"), Some(&Value::Integer(1)));
    let create = journal.iter().find(|change| change.is_create()).unwrap();
    assert_eq!(create.value("name"), Some(&Value::Text("Blue".to_string())));
    assert_eq!(create.value("position"), Some(&Value::Integer(0)));
    assert!(!journal.iter().any(Change::is_delete));

    let stored = fixture.store.records(Collection::Colors, Some(fixture.product)).await;
    let names: Vec<_> = stored.iter().filter_map(|record| record.get("name")).collect();
    assert_eq!(names, vec![&json!("Blue"), &json!("Red")]);
    assert_eq!(session.working().colors[0].id(), Some(create.id));
    assert!(!session.is_dirty());
}

#[tokio::test]
async fn test_unchanged_session_issues_no_calls() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;

    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(results.is_success());
    assert_eq!(fixture.store.call_count(), 0);
    assert!(fixture.store.journal().await.is_empty());
}

#[tokio::test]
async fn test_single_field_change_is_single_update() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;

    session.working_mut().sizes[1].item_mut().name = "Medium".to_string();
    fixture.save(&mut session, &ReconcileConfig::default()).await;

    let journal = fixture.store.journal().await;
    assert_eq!(journal.len(), 1);
    assert!(journal[0].is_update());
    assert_eq!(journal[0].id, fixture.sizes[1]);
    assert_eq!(journal[0].fields, vec!["name".to_string()]);
    assert_eq!(fixture.store.call_count(), 1);
}

#[tokio::test]
async fn test_swap_updates_only_moved_positions() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;

    assert!(session.working_mut().move_size(0, 1));
    fixture.save(&mut session, &ReconcileConfig::default()).await;

    let journal = fixture.store.journal().await;
    assert_eq!(journal.len(), 2);
    for change in &journal {
        assert!(change.is_update());
        assert_eq!(change.fields, vec!["position".to_string()]);
        assert_ne!(change.id, fixture.sizes[2]);
    }
    let moved_s = journal.iter().find(|change| change.id == fixture.sizes[0]).unwrap();
    assert_eq!(moved_s.value("position"), Some(&Value::Integer(1)));
}

#[tokio::test]
async fn test_removed_items_deleted_once_before_writes() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;

    session.working_mut().remove_size(2);
    session.working_mut().remove_size(0);
    let plan = session.plan().unwrap();
    assert_eq!(plan.sizes.to_delete, vec![fixture.sizes[0], fixture.sizes[2]]);

    fixture.save(&mut session, &ReconcileConfig::default()).await;

    let journal = fixture.store.journal().await;
    let deletes: Vec<_> = journal.iter().filter(|change| change.is_delete()).collect();
    assert_eq!(deletes.len(), 2);
    assert_ne!(deletes[0].id, deletes[1].id);

    let update = journal.iter().find(|change| change.is_update()).unwrap();
    assert_eq!(update.id, fixture.sizes[1]);
    assert!(deletes.iter().all(|delete| update.happened_after(delete)));

    let remaining = fixture.store.records(Collection::Sizes, Some(fixture.product)).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(session.snapshot().sizes.len(), 1);
}

#[tokio::test]
async fn test_removing_color_drops_its_images() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;

    session.working_mut().remove_color(0);
    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert_eq!(results.colors.deleted, vec![fixture.red]);

    let journal = fixture.store.journal().await;
    assert_eq!(journal.len(), 1);
    assert!(changes_in(&journal, Collection::ColorImages).is_empty());
    assert!(session.snapshot().images_of(fixture.red).is_empty());
    assert!(fixture.store.record(Collection::ColorImages, fixture.red_image).await.is_none());
}

#[tokio::test]
async fn test_new_color_images_wait_for_color_identity() {
    let fixture = Fixture::new(InMemoryStore::new().with_latency(Duration::from_millis(5))).await;
    let mut session = fixture.open().await;

    let green = session
        .working_mut()
        .add_color(ColorVariant::new("Green", "#00FF00", 4));
    assert_eq!(session.attach_images(green, vec![png("g1.png"), png("g2.png")]), Some(2));

    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(results.is_success());

    let journal = fixture.store.journal().await;
    let color_create = changes_in(&journal, Collection::Colors)
        .into_iter()
        .find(|change| change.is_create())
        .unwrap();
    let image_creates = changes_in(&journal, Collection::ColorImages);
    assert_eq!(image_creates.len(), 2);
    for image in image_creates {
        assert_eq!(image.parent, Some(color_create.id));
        assert!(image.with_upload);
        assert!(image.happened_after(color_create));
    }

    let green_entry = &session.working().colors[green];
    assert_eq!(green_entry.id(), Some(color_create.id));
    assert!(green_entry.item().images.iter().all(|image| !image.is_pending()));
    assert_eq!(session.snapshot().images_of(color_create.id).len(), 2);
}

#[tokio::test]
async fn test_failed_color_update_does_not_block_siblings() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    fixture
        .store
        .inject(
            FaultRule::new(Collection::Colors, OpKind::Update)
                .target(fixture.red)
                .error(StoreError::rejected(409, "conflict")),
        )
        .await;
    let mut session = fixture.open().await;

    session.working_mut().colors[0].item_mut().stock = 7;
    session.working_mut().add_size(SizeVariant::new("XL", "5.00"));
    session.working_mut().add_feature(FeatureTag::new("Light"));

    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(!results.is_success());
    assert_eq!(results.colors.failures.len(), 1);
    assert_eq!(results.colors.failures[0].error.status(), Some(409));
    assert_eq!(results.sizes.created.len(), 1);
    assert_eq!(results.features.created.len(), 1);

    let red = fixture.store.record(Collection::Colors, fixture.red).await.unwrap();
    assert_eq!(red.get("stock"), Some(&json!(3)));
    assert_eq!(session.working().colors[0].item().stock, 7);
    assert_eq!(session.snapshot().colors.get(fixture.red).unwrap().item.stock, 3);
    assert!(session.working().sizes[3].id().is_some());
    assert!(session.is_dirty());
}

#[tokio::test]
async fn test_retry_reissues_only_failed_operations() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    fixture
        .store
        .inject(FaultRule::new(Collection::Colors, OpKind::Update).target(fixture.red).times(1))
        .await;
    let mut session = fixture.open().await;

    session.working_mut().colors[0].item_mut().stock = 7;
    session.working_mut().sizes[0].item_mut().extra_price = "1.50".to_string();
    session.working_mut().remove_feature(0);
    let first = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert_eq!(first.failures().len(), 1);

    fixture.store.clear_journal().await;
    let second = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(second.is_success());

    let journal = fixture.store.journal().await;
    assert_eq!(journal.len(), 1);
    assert!(journal[0].is_update());
    assert_eq!(journal[0].id, fixture.red);
    assert_eq!(journal[0].fields, vec!["stock".to_string()]);
    assert!(!session.is_dirty());
}

#[tokio::test]
async fn test_failed_color_create_skips_its_images() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    fixture
        .store
        .inject(FaultRule::new(Collection::Colors, OpKind::Create).times(1))
        .await;
    let mut session = fixture.open().await;

    let green = session
        .working_mut()
        .add_color(ColorVariant::new("Green", "#00FF00", 4));
    session.attach_images(green, vec![png("g1.png")]);

    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert_eq!(results.skipped.len(), 1);
    assert_eq!(results.skipped[0].node, TaskNode::ColorImages { color_slot: green });
    assert!(changes_in(&fixture.store.journal().await, Collection::ColorImages).is_empty());
    assert!(session.working().colors[green].is_pending());

    let retry = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(retry.is_success());
    let green_id = session.working().colors[green].id().unwrap();
    assert_eq!(
        fixture.store.records(Collection::ColorImages, Some(green_id)).await.len(),
        1
    );
}

#[tokio::test]
async fn test_new_product_created_before_children() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let categories = load_categories(fixture.store.as_ref()).await.unwrap();
    let mut session = EditSession::new_product(
        ProductFields::new("Backpack", "89.90", Some(fixture.category)),
        categories,
    );
    let color = session
        .working_mut()
        .add_color(ColorVariant::new("Black", "#000000", 10));
    session.attach_images(color, vec![png("black.png")]);
    session.working_mut().add_size(SizeVariant::new("One size", "0"));
    session.working_mut().add_feature(FeatureTag::new("Laptop sleeve"));

    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(results.is_success());
    let product_id = results.product.created.unwrap();
    assert_eq!(session.product_id(), Some(product_id));

    let journal = fixture.store.journal().await;
    assert_eq!(journal.len(), 5);
    let product_create = journal
        .iter()
        .find(|change| change.collection == Collection::Products)
        .unwrap();
    for change in journal.iter().filter(|change| change.collection != Collection::Products) {
        assert!(change.happened_after(product_create));
    }

    let colors = fixture.store.records(Collection::Colors, Some(product_id)).await;
    assert_eq!(colors.len(), 1);
    let color_id = session.working().colors[0].id().unwrap();
    let images = fixture.store.records(Collection::ColorImages, Some(color_id)).await;
    let image = images[0].get("image").and_then(|value| value.as_str()).unwrap();
    assert!(image.starts_with("media/color_images/"));
    assert!(!session.is_dirty());
}

#[tokio::test]
async fn test_failed_product_create_skips_everything() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    fixture
        .store
        .inject(FaultRule::new(Collection::Products, OpKind::Create).times(1))
        .await;

    let categories = load_categories(fixture.store.as_ref()).await.unwrap();
    let mut session = EditSession::new_product(
        ProductFields::new("Backpack", "89.90", Some(fixture.category)),
        categories,
    );
    session.working_mut().add_size(SizeVariant::new("One size", "0"));
    session.working_mut().add_feature(FeatureTag::new("Laptop sleeve"));
    fixture.store.reset_counters();

    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(results.product.failure.is_some());
    assert_eq!(results.skipped.len(), 2);
    assert_eq!(fixture.store.call_count(), 1);
    assert!(session.product_id().is_none());
    assert!(session.working().sizes[0].is_pending());

    let retry = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(retry.is_success());
    assert!(session.product_id().is_some());
    assert!(session.working().sizes[0].id().is_some());
}

#[tokio::test]
async fn test_in_flight_requests_respect_cap() {
    let fixture = Fixture::new(InMemoryStore::new().with_latency(Duration::from_millis(20))).await;
    let mut session = fixture.open().await;
    for index in 0..6 {
        session
            .working_mut()
            .add_feature(FeatureTag::new(format!("Feature {}", index)));
    }

    let config = ReconcileConfig::new().max_concurrent_requests(2);
    let results = fixture.save(&mut session, &config).await;
    assert_eq!(results.features.created.len(), 6);
    assert!(fixture.store.peak_in_flight() <= 2);
}

#[tokio::test]
async fn test_independent_operations_overlap() {
    let fixture = Fixture::new(InMemoryStore::new().with_latency(Duration::from_millis(20))).await;
    let mut session = fixture.open().await;
    for index in 0..4 {
        session
            .working_mut()
            .add_feature(FeatureTag::new(format!("Feature {}", index)));
    }

    fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(fixture.store.peak_in_flight() > 2);
}

#[tokio::test]
async fn test_validation_failure_blocks_all_calls() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;

    session.working_mut().colors[0].item_mut().hex = "red".to_string();
    session.working_mut().add_feature(FeatureTag::new("Light"));

    match session.save(fixture.store.as_ref(), &ReconcileConfig::default()).await {
        Err(ReconcileError::Validation(report)) => assert!(report.has("colors[0].hex")),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(fixture.store.call_count(), 0);
}

#[tokio::test]
async fn test_remote_baseline_replaces_foreign_images() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;
    let foreign = fixture
        .store
        .seed(
            Collection::ColorImages,
            Some(fixture.red),
            json!({"image": "media/color_images/other.png", "position": 1}),
        )
        .await
        .unwrap();

    session.attach_images(0, vec![png("mine.png")]);
    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;
    assert!(results.is_success());

    let images = results.image_outcome(0).unwrap();
    assert_eq!(images.baseline.as_ref().map(|baseline| baseline.len()), Some(2));
    assert_eq!(images.outcome.deleted, vec![foreign]);
    assert_eq!(images.outcome.created.len(), 1);
    assert_eq!(fixture.store.read_count(), 1);
    assert_eq!(
        fixture.store.records(Collection::ColorImages, Some(fixture.red)).await.len(),
        2
    );
    assert_eq!(session.snapshot().images_of(fixture.red).len(), 2);
}

#[tokio::test]
async fn test_session_baseline_keeps_foreign_images() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;
    fixture
        .store
        .seed(
            Collection::ColorImages,
            Some(fixture.red),
            json!({"image": "media/color_images/other.png", "position": 1}),
        )
        .await
        .unwrap();

    session.attach_images(0, vec![png("mine.png")]);
    let config = ReconcileConfig::new().image_baseline(ImageBaseline::Session);
    let results = fixture.save(&mut session, &config).await;
    assert!(results.is_success());

    let journal = fixture.store.journal().await;
    assert_eq!(journal.len(), 1);
    assert!(journal[0].is_create());
    assert_eq!(fixture.store.read_count(), 0);
    assert_eq!(
        fixture.store.records(Collection::ColorImages, Some(fixture.red)).await.len(),
        3
    );
}

#[tokio::test]
async fn test_image_list_failure_is_reported() {
    let fixture = Fixture::new(InMemoryStore::new()).await;
    let mut session = fixture.open().await;
    fixture
        .store
        .inject(FaultRule::reads(Collection::ColorImages).target(fixture.red))
        .await;

    session.attach_images(0, vec![png("mine.png")]);
    session.working_mut().add_feature(FeatureTag::new("Light"));
    let results = fixture.save(&mut session, &ReconcileConfig::default()).await;

    let images = results.image_outcome(0).unwrap();
    assert!(images.baseline.is_none());
    assert_eq!(images.outcome.failures[0].kind, OpKind::List);
    assert_eq!(results.features.created.len(), 1);
    assert!(session.working().colors[0].item().images[1].is_pending());
}
