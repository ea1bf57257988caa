use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use schemaform_engine::{
    ActionOutcome, FormAction, FormDataStore, FormNode, FormSession, ImportStrategy, LoadOutcome, RenderOptions, SAMPLE_WORKFLOW, SchemaLoader,
    SchemaSource, StaticSchemaSource, SubmissionHandler, SubmitOutcome,
};
use schemaform_types::{FieldPath, ItemId};
use serde_json::{Value, json};

struct BrokenBackend;

#[async_trait]
impl SchemaSource for BrokenBackend {
    fn name(&self) -> &str {
        "broken"
    }

    async fn fetch(&self, workflow: &str) -> anyhow::Result<Value> {
        Err(anyhow!("GET /api/v1/custom-workflows/schema/{}/ failed with status 500 Internal Server Error", workflow))
    }
}

#[derive(Default)]
struct RecordingHandler {
    submitted: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl SubmissionHandler for RecordingHandler {
    async fn submit(&self, workflow: &str, data: &Value) -> anyhow::Result<()> {
        self.submitted.lock().unwrap().push((workflow.to_string(), data.clone()));
        Ok(())
    }
}

fn sample_session() -> FormSession {
    let loader = SchemaLoader::new(Box::new(StaticSchemaSource::bundled()), Duration::from_secs(5));
    FormSession::new(loader, FormDataStore::new(), RenderOptions::default())
}

/// Applies the action encoded by `action`'s binding, as a host would after a click.
fn click(session: &mut FormSession, action: &FormAction) -> ActionOutcome {
    let attributes = action.binding_attributes();
    let parsed = FormAction::from_binding(attributes.iter().map(|(name, value)| (*name, value.as_str())), None).unwrap();
    session.dispatch(SAMPLE_WORKFLOW, parsed).unwrap()
}

fn add_action(session: &mut FormSession, path: &FieldPath) -> FormAction {
    let view = session.render(SAMPLE_WORKFLOW).unwrap();
    match view.find(path) {
        Some(FormNode::Array(array)) => array.add.clone(),
        other => panic!("expected an array at {}, found {:?}", path, other),
    }
}

#[tokio::test]
async fn untouched_form_collects_declared_defaults() {
    let mut session = sample_session();
    let outcome = session.open(SAMPLE_WORKFLOW).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Fetched(_)));

    let view = session.render(SAMPLE_WORKFLOW).unwrap();
    assert_eq!(view.title, "RootModel");
    assert!(matches!(view.find(&FieldPath::root().field("stores")), Some(FormNode::Array(array)) if array.items.is_empty()));
    assert_eq!(session.collect(SAMPLE_WORKFLOW), json!({ "stores": [] }));
}

#[tokio::test]
async fn bike_store_scenario_collects_selected_variant() {
    let mut session = sample_session();
    session.open(SAMPLE_WORKFLOW).await.unwrap();

    let stores = FieldPath::root().field("stores");
    let add_store = add_action(&mut session, &stores);
    let ActionOutcome::ItemAdded(store) = click(&mut session, &add_store) else {
        panic!("expected a new store block");
    };
    assert_eq!(store.container_id(), "stores--items");
    assert!(store.html().contains(r#"id="stores-0-bike_stock--items""#));

    let bike_stock = stores.item(store.id).field("bike_stock");
    let add_stock = add_action(&mut session, &bike_stock);
    let ActionOutcome::ItemAdded(stock) = click(&mut session, &add_stock) else {
        panic!("expected a new stock block");
    };

    let bike = bike_stock.item(stock.id).field("bike");
    let view = session.render(SAMPLE_WORKFLOW).unwrap();
    let Some(FormNode::Union(union)) = view.find(&bike) else {
        panic!("expected a union at {}", bike);
    };
    let labels: Vec<_> = union.options.iter().map(|option| option.label.as_str()).collect();
    assert_eq!(labels, vec!["mountain", "road", "electric"]);
    let electric = union.options[2].select.clone();

    let ActionOutcome::VariantSelected(selected) = click(&mut session, &electric) else {
        panic!("expected a variant body");
    };
    assert_eq!(selected.body_id(), "stores-0-bike_stock-0-bike--body");
    assert!(selected.html().contains(r#"id="stores-0-bike_stock-0-bike-battery_wh""#));

    assert_eq!(
        session.collect(SAMPLE_WORKFLOW),
        json!({ "stores": [{ "bike_stock": [{ "bike": { "bike_type": "electric", "battery_wh": 500 }, "quantity": 0 }] }] })
    );
}

#[tokio::test]
async fn switching_variants_keeps_one_sub_tree() {
    let mut session = sample_session();
    session.open(SAMPLE_WORKFLOW).await.unwrap();

    let stores = FieldPath::root().field("stores");
    let store = session.add_item(SAMPLE_WORKFLOW, &stores).unwrap();
    let bike_stock = stores.item(store.id).field("bike_stock");
    let stock = session.add_item(SAMPLE_WORKFLOW, &bike_stock).unwrap();
    let bike = bike_stock.item(stock.id).field("bike");

    session.select_variant(SAMPLE_WORKFLOW, &bike, "electric").unwrap();
    session
        .set_value(SAMPLE_WORKFLOW, &bike.field("brand"), json!("Voltra"))
        .unwrap();
    let switched = session.select_variant(SAMPLE_WORKFLOW, &bike, "road").unwrap();
    assert_eq!(switched.previous.as_deref(), Some("electric"));

    let data = session.collect(SAMPLE_WORKFLOW);
    assert_eq!(data["stores"][0]["bike_stock"][0]["bike"], json!({ "bike_type": "road", "gears": 22 }));
}

#[tokio::test]
async fn add_and_remove_stay_in_lockstep_with_rendered_blocks() {
    let mut session = sample_session();
    session.open(SAMPLE_WORKFLOW).await.unwrap();
    let stores = FieldPath::root().field("stores");

    for name in ["North", "South", "East"] {
        let added = session.add_item(SAMPLE_WORKFLOW, &stores).unwrap();
        session
            .set_value(SAMPLE_WORKFLOW, &stores.item(added.id).field("name"), json!(name))
            .unwrap();
    }

    let view = session.render(SAMPLE_WORKFLOW).unwrap();
    let Some(FormNode::Array(array)) = view.find(&stores) else {
        panic!("expected stores array");
    };
    let remove_south = array.items[1].remove.clone();
    let ActionOutcome::ItemRemoved(removed) = click(&mut session, &remove_south) else {
        panic!("expected a removal");
    };
    assert_eq!(removed.id, ItemId(1));
    assert_eq!(removed.block_id(), "stores-1--item");

    let view = session.render(SAMPLE_WORKFLOW).unwrap();
    let Some(FormNode::Array(array)) = view.find(&stores) else {
        panic!("expected stores array");
    };
    let ids: Vec<_> = array.items.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![ItemId(0), ItemId(2)]);
    assert_eq!(
        session.collect(SAMPLE_WORKFLOW)["stores"],
        json!([{ "name": "North", "bike_stock": [] }, { "name": "East", "bike_stock": [] }])
    );

    let html = view.to_html();
    assert!(html.contains(r#"id="stores-2--item""#));
    assert!(!html.contains(r#"id="stores-1--item""#));
}

#[tokio::test]
async fn text_input_is_coerced_to_field_types() {
    let mut session = sample_session();
    session.open(SAMPLE_WORKFLOW).await.unwrap();
    let stores = FieldPath::root().field("stores");
    let store = session.add_item(SAMPLE_WORKFLOW, &stores).unwrap();
    let bike_stock = stores.item(store.id).field("bike_stock");
    let stock = session.add_item(SAMPLE_WORKFLOW, &bike_stock).unwrap();

    let quantity = bike_stock.item(stock.id).field("quantity");
    let action = FormAction::from_binding([("data-action", "set-value"), ("data-path", quantity.dom_id().as_str())], Some("12")).unwrap();
    let outcome = session.dispatch(SAMPLE_WORKFLOW, action).unwrap();
    assert_eq!(outcome, ActionOutcome::ValueSet { path: quantity, value: json!(12) });
}

#[tokio::test]
async fn submit_is_blocked_until_required_fields_are_filled() {
    let mut session = sample_session();
    session.open(SAMPLE_WORKFLOW).await.unwrap();
    let stores = FieldPath::root().field("stores");
    let store = session.add_item(SAMPLE_WORKFLOW, &stores).unwrap();
    let handler = RecordingHandler::default();

    let outcome = session.submit(SAMPLE_WORKFLOW, &handler).await.unwrap();
    let SubmitOutcome::Invalid { violations } = outcome else {
        panic!("expected validation to block submission");
    };
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path.dom_id(), "stores-0-name");
    assert!(handler.submitted.lock().unwrap().is_empty());

    session
        .set_value(SAMPLE_WORKFLOW, &stores.item(store.id).field("name"), json!("Harbour"))
        .unwrap();
    let outcome = session.submit(SAMPLE_WORKFLOW, &handler).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Submitted { .. }));
    let submitted = handler.submitted.lock().unwrap();
    assert_eq!(submitted[0].0, SAMPLE_WORKFLOW);
    assert_eq!(submitted[0].1, json!({ "stores": [{ "name": "Harbour", "bike_stock": [] }] }));
}

#[tokio::test]
async fn export_then_replace_import_restores_the_tree() {
    let mut session = sample_session();
    session.open(SAMPLE_WORKFLOW).await.unwrap();
    let stores = FieldPath::root().field("stores");
    for _ in 0..3 {
        session.add_item(SAMPLE_WORKFLOW, &stores).unwrap();
    }
    session.remove_item(SAMPLE_WORKFLOW, &stores, 0).unwrap();
    let stock_path = stores.item(ItemId(1)).field("bike_stock");
    let stock = session.add_item(SAMPLE_WORKFLOW, &stock_path).unwrap();
    session
        .select_variant(SAMPLE_WORKFLOW, &stock_path.item(stock.id).field("bike"), "mountain")
        .unwrap();

    let before = session.tree(SAMPLE_WORKFLOW).cloned().unwrap();
    let text = serde_json::to_string(&session.export(SAMPLE_WORKFLOW).unwrap()).unwrap();

    session.reset(SAMPLE_WORKFLOW).unwrap();
    assert_eq!(session.collect(SAMPLE_WORKFLOW), json!({ "stores": [] }));

    let export = serde_json::from_str(&text).unwrap();
    session.import(SAMPLE_WORKFLOW, &export, ImportStrategy::Replace).unwrap();
    assert_eq!(session.tree(SAMPLE_WORKFLOW), Some(&before));
}

#[tokio::test]
async fn plain_data_import_infers_union_variants() {
    let mut session = sample_session();
    session.open(SAMPLE_WORKFLOW).await.unwrap();
    let data = json!({ "stores": [{ "name": "Depot", "bike_stock": [{ "bike": { "bike_type": "road", "gears": 18 }, "quantity": 2 }] }] });
    session.import_data(SAMPLE_WORKFLOW, &data, ImportStrategy::Replace).unwrap();
    assert_eq!(session.collect(SAMPLE_WORKFLOW), data);

    let bike = FieldPath::root()
        .field("stores")
        .item(ItemId(0))
        .field("bike_stock")
        .item(ItemId(0))
        .field("bike");
    let view = session.render(SAMPLE_WORKFLOW).unwrap();
    assert!(matches!(view.find(&bike), Some(FormNode::Union(union)) if union.selected.as_deref() == Some("road")));
}

#[tokio::test]
async fn failing_backend_falls_back_to_bundled_sample() {
    let loader = SchemaLoader::new(Box::new(BrokenBackend), Duration::from_secs(1)).with_fallback(Box::new(StaticSchemaSource::bundled()));
    let mut session = FormSession::new(loader, FormDataStore::new(), RenderOptions::default());

    let outcome = session.open(SAMPLE_WORKFLOW).await.unwrap();
    assert!(outcome.is_degraded());
    assert!(matches!(&outcome, LoadOutcome::Fallback { reason, .. } if reason.contains("500")));

    let view = session.render(SAMPLE_WORKFLOW).unwrap();
    assert!(view.to_html().contains(r#"id="stores--items""#));
}

#[tokio::test]
async fn unavailable_schema_leaves_session_empty() {
    let loader = SchemaLoader::new(Box::new(BrokenBackend), Duration::from_secs(1));
    let mut session = FormSession::new(loader, FormDataStore::new(), RenderOptions::default());

    let outcome = session.open(SAMPLE_WORKFLOW).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Unavailable { .. }));
    assert!(session.render(SAMPLE_WORKFLOW).is_err());
    assert_eq!(session.collect(SAMPLE_WORKFLOW), json!({}));
}

#[tokio::test]
async fn persisted_forms_survive_a_new_session() {
    let storage = Arc::new(schemaform_util::InMemoryStorage::new());
    let stores = FieldPath::root().field("stores");
    {
        let loader = SchemaLoader::new(Box::new(StaticSchemaSource::bundled()), Duration::from_secs(5));
        let mut session = FormSession::new(loader, FormDataStore::with_storage(storage.clone()), RenderOptions::default());
        session.open(SAMPLE_WORKFLOW).await.unwrap();
        let store = session.add_item(SAMPLE_WORKFLOW, &stores).unwrap();
        session
            .set_value(SAMPLE_WORKFLOW, &stores.item(store.id).field("name"), json!("Kept"))
            .unwrap();
    }

    let loader = SchemaLoader::new(Box::new(StaticSchemaSource::bundled()), Duration::from_secs(5));
    let mut session = FormSession::new(loader, FormDataStore::with_storage(storage), RenderOptions::default());
    session.open(SAMPLE_WORKFLOW).await.unwrap();
    assert_eq!(session.collect(SAMPLE_WORKFLOW)["stores"][0]["name"], json!("Kept"));
}
