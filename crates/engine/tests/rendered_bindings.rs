use std::time::Duration;

use regex::Regex;
use schemaform_engine::{
    ActionOutcome, FormAction, FormDataStore, FormError, FormSession, RenderOptions, SAMPLE_WORKFLOW, SchemaLoader, StaticSchemaSource,
};
use schemaform_types::FieldPath;
use serde_json::json;

async fn session_with_one_bike() -> (FormSession, FieldPath) {
    let loader = SchemaLoader::new(Box::new(StaticSchemaSource::bundled()), Duration::from_secs(5));
    let mut session = FormSession::new(loader, FormDataStore::new(), RenderOptions::default());
    session.open(SAMPLE_WORKFLOW).await.unwrap();

    let stores = FieldPath::root().field("stores");
    let store = session.add_item(SAMPLE_WORKFLOW, &stores).unwrap();
    let bike_stock = stores.item(store.id).field("bike_stock");
    let stock = session.add_item(SAMPLE_WORKFLOW, &bike_stock).unwrap();
    (session, bike_stock.item(stock.id).field("bike"))
}

/// `data-*` attributes of the element whose id is `id`, as a host reads them
/// from the page.
fn data_attributes(html: &str, id: &str) -> Vec<(String, String)> {
    let element = Regex::new(&format!(r#"<[a-z]+\s[^>]*\bid="{}"[^>]*>"#, regex::escape(id))).unwrap();
    let tag = element
        .find(html)
        .unwrap_or_else(|| panic!("no element with id {} in {}", id, html))
        .as_str();
    let attribute = Regex::new(r#"\s(data-[a-z-]+)="([^"]*)""#).unwrap();
    attribute
        .captures_iter(tag)
        .map(|captures| (captures[1].to_string(), captures[2].to_string()))
        .collect()
}

/// Replays a change event on the element `id` with the control's `value`.
fn change(session: &mut FormSession, id: &str, value: &str) -> Result<ActionOutcome, FormError> {
    let html = session.render(SAMPLE_WORKFLOW)?.to_html();
    let attributes = data_attributes(&html, id);
    let action = FormAction::from_binding(attributes.iter().map(|(name, attribute)| (name.as_str(), attribute.as_str())), Some(value))?;
    session.dispatch(SAMPLE_WORKFLOW, action)
}

#[tokio::test]
async fn dropdown_selector_drives_variant_changes() {
    let (mut session, bike) = session_with_one_bike().await;
    let selector = format!("{}--selector", bike.dom_id());

    let ActionOutcome::VariantSelected(electric) = change(&mut session, &selector, "electric").unwrap() else {
        panic!("expected the dropdown to select a variant");
    };
    assert_eq!(electric.variant, "electric");
    assert_eq!(electric.previous, None);

    let battery = bike.field("battery_wh").dom_id();
    let outcome = change(&mut session, &battery, "750").unwrap();
    assert_eq!(
        outcome,
        ActionOutcome::ValueSet {
            path: bike.field("battery_wh"),
            value: json!(750),
        }
    );

    let ActionOutcome::VariantSelected(road) = change(&mut session, &selector, "road").unwrap() else {
        panic!("expected the dropdown to switch variants");
    };
    assert_eq!(road.previous.as_deref(), Some("electric"));
    change(&mut session, &bike.field("gears").dom_id(), "18").unwrap();

    let data = session.collect(SAMPLE_WORKFLOW);
    assert_eq!(data["stores"][0]["bike_stock"][0]["bike"], json!({ "bike_type": "road", "gears": 18 }));
}

#[tokio::test]
async fn fields_of_a_replaced_variant_no_longer_accept_values() {
    let (mut session, bike) = session_with_one_bike().await;
    session.select_variant(SAMPLE_WORKFLOW, &bike, "electric").unwrap();
    session.select_variant(SAMPLE_WORKFLOW, &bike, "mountain").unwrap();

    let stale = FormAction::from_binding(
        [("data-action", "set-value"), ("data-path", bike.field("brand").dom_id().as_str())],
        Some("Voltra"),
    )
    .unwrap();
    assert!(matches!(
        session.dispatch(SAMPLE_WORKFLOW, stale),
        Err(FormError::UnknownPath { .. })
    ));
    assert_eq!(
        session.collect(SAMPLE_WORKFLOW)["stores"][0]["bike_stock"][0]["bike"],
        json!({ "bike_type": "mountain", "suspension": "hardtail" })
    );
}

#[tokio::test]
async fn structured_fields_reject_single_values() {
    let (mut session, bike) = session_with_one_bike().await;
    let before = session.collect(SAMPLE_WORKFLOW);

    let stores = FieldPath::root().field("stores");
    for path in [stores.clone(), bike.clone(), stores.item(schemaform_types::ItemId(0)).field("bike_stock")] {
        assert!(matches!(
            session.set_value(SAMPLE_WORKFLOW, &path, json!("oops")),
            Err(FormError::NotALeaf { .. })
        ));
    }
    assert_eq!(session.collect(SAMPLE_WORKFLOW), before);
}

#[test]
fn same_named_fields_follow_the_selected_variant() {
    let document = schemaform_types::SchemaDocument::from_json_schema(
        "pick",
        &json!({
            "properties": { "u": { "oneOf": [{ "$ref": "#/$defs/A" }, { "$ref": "#/$defs/B" }] } },
            "$defs": {
                "A": { "properties": { "extras": { "type": "array", "items": { "type": "string" } } } },
                "B": { "properties": { "extras": { "type": "string" } } }
            }
        }),
    )
    .unwrap();
    let loader = SchemaLoader::new(Box::new(StaticSchemaSource::bundled()), Duration::from_secs(5));
    let mut session = FormSession::new(loader, FormDataStore::new(), RenderOptions::default());
    session.open_document(document).unwrap();

    let union = FieldPath::root().field("u");
    let extras = union.field("extras");
    session.select_variant("pick", &union, "A").unwrap();
    session.render("pick").unwrap();
    session.add_item("pick", &extras).unwrap();
    session.select_variant("pick", &union, "B").unwrap();

    assert!(matches!(session.add_item("pick", &extras), Err(FormError::NotAnArray { .. })));
    session.set_value("pick", &extras, json!("spare tube")).unwrap();
    assert_eq!(session.collect("pick"), json!({ "u": { "extras": "spare tube" } }));
}
