//! HTML rendering of the component tree.
//!
//! Markup uses Bootstrap class names. Control ids come from the field path
//! scheme; wrapper elements append a `--` suffix (`--field`, `--items`,
//! `--body`, `--selector`) which can never collide with a path because paths
//! have no empty segments.

use schemaform_util::{UnionStyle, escape_html};
use serde_json::Value;

use super::FormView;
use super::node::{ArrayItemNode, ArrayNode, FallbackNode, FieldMeta, FormAction, FormNode, InputKind, InputNode, SectionNode, SelectNode, UnionNode};

/// Renders a whole form with its title.
pub fn render_form(view: &FormView) -> String {
    let mut html = format!(
        r#"<form class="schema-form" id="form-{workflow}" data-workflow="{workflow}" novalidate>"#,
        workflow = escape_html(&view.workflow)
    );
    html.push_str(&format!(r#"<h2 class="h4 mb-3">{}</h2>"#, escape_html(&view.title)));
    html.push_str(r#"<div class="row">"#);
    html.push_str(&to_html(&view.nodes));
    html.push_str("</div></form>");
    html
}

/// Renders a list of nodes.
pub fn to_html(nodes: &[FormNode]) -> String {
    let mut html = String::new();
    for node in nodes {
        write_node(&mut html, node);
    }
    html
}

fn write_node(html: &mut String, node: &FormNode) {
    match node {
        FormNode::Input(input) => write_input(html, input),
        FormNode::Select(select) => write_select(html, select),
        FormNode::Section(section) => write_section(html, section),
        FormNode::Array(array) => write_array(html, array),
        FormNode::Union(union) => write_union(html, union),
        FormNode::Fallback(fallback) => write_fallback(html, fallback),
    }
}

fn open_field(html: &mut String, meta: &FieldMeta, extra_class: &str) {
    let column = if meta.full_width { "col-12" } else { "col-md-6" };
    html.push_str(&format!(
        r#"<div class="{column} mb-3{extra_class}" id="{id}--field">"#,
        id = escape_html(&meta.dom_id())
    ));
}

fn write_label(html: &mut String, meta: &FieldMeta, class: &str, for_control: bool) {
    let for_attribute = if for_control {
        format!(r#" for="{}""#, escape_html(&meta.dom_id()))
    } else {
        String::new()
    };
    html.push_str(&format!(r#"<label class="{class}"{for_attribute}>{}"#, escape_html(&meta.label)));
    if meta.required {
        html.push_str(r#"<span class="text-danger ms-1" aria-hidden="true">*</span>"#);
    }
    html.push_str("</label>");
}

fn write_description(html: &mut String, meta: &FieldMeta) {
    if let Some(description) = &meta.description {
        html.push_str(&format!(r#"<div class="form-text">{}</div>"#, escape_html(description)));
    }
}

fn bindings(action: &FormAction) -> String {
    action
        .binding_attributes()
        .into_iter()
        .map(|(name, value)| format!(r#" {name}="{}""#, escape_html(&value)))
        .collect()
}

fn literal_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

fn write_input(html: &mut String, input: &InputNode) {
    let id = escape_html(&input.meta.dom_id());
    let mut attributes = format!(r#" id="{id}" name="{id}""#);
    let constraints = &input.constraints;
    if let Some(minimum) = constraints.minimum.or(constraints.exclusive_minimum) {
        attributes.push_str(&format!(r#" min="{}""#, format_number(minimum)));
    }
    if let Some(maximum) = constraints.maximum.or(constraints.exclusive_maximum) {
        attributes.push_str(&format!(r#" max="{}""#, format_number(maximum)));
    }
    if input.input == InputKind::Number {
        let step = match constraints.multiple_of {
            Some(step) => format_number(step),
            None if input.integer => "1".to_string(),
            None => "any".to_string(),
        };
        attributes.push_str(&format!(r#" step="{step}""#));
    }
    if let Some(length) = constraints.min_length {
        attributes.push_str(&format!(r#" minlength="{length}""#));
    }
    if let Some(length) = constraints.max_length {
        attributes.push_str(&format!(r#" maxlength="{length}""#));
    }
    if let Some(pattern) = &constraints.pattern {
        attributes.push_str(&format!(r#" pattern="{}""#, escape_html(pattern)));
    }
    if input.meta.required {
        attributes.push_str(" required");
    }
    attributes.push_str(&bindings(&input.on_change));

    let value = input.value.as_ref().map(literal_text).unwrap_or_default();
    match input.input {
        InputKind::Checkbox => {
            open_field(html, &input.meta, " form-check");
            let checked = if input.value == Some(Value::Bool(true)) { " checked" } else { "" };
            html.push_str(&format!(r#"<input type="checkbox" class="form-check-input"{attributes}{checked}>"#));
            write_label(html, &input.meta, "form-check-label", true);
        }
        InputKind::Textarea => {
            open_field(html, &input.meta, "");
            write_label(html, &input.meta, "form-label", true);
            html.push_str(&format!(
                r#"<textarea class="form-control" rows="4"{attributes}>{}</textarea>"#,
                escape_html(&value)
            ));
        }
        kind => {
            open_field(html, &input.meta, "");
            write_label(html, &input.meta, "form-label", true);
            html.push_str(&format!(
                r#"<input type="{}" class="form-control"{attributes} value="{}">"#,
                kind.as_str(),
                escape_html(&value)
            ));
        }
    }
    write_description(html, &input.meta);
    html.push_str("</div>");
}

fn write_select(html: &mut String, select: &SelectNode) {
    let id = escape_html(&select.meta.dom_id());
    open_field(html, &select.meta, "");
    write_label(html, &select.meta, "form-label", true);
    let required = if select.meta.required { " required" } else { "" };
    html.push_str(&format!(
        r#"<select class="form-select" id="{id}" name="{id}"{required}{}>"#,
        bindings(&select.on_change)
    ));
    if !select.options.iter().any(|option| option.selected) {
        html.push_str(r#"<option value="" selected>Choose...</option>"#);
    }
    for option in &select.options {
        let selected = if option.selected { " selected" } else { "" };
        html.push_str(&format!(
            r#"<option value="{}"{selected}>{}</option>"#,
            escape_html(&literal_text(&option.value)),
            escape_html(&option.label)
        ));
    }
    html.push_str("</select>");
    write_description(html, &select.meta);
    html.push_str("</div>");
}

fn write_section(html: &mut String, section: &SectionNode) {
    let id = escape_html(&section.meta.dom_id());
    if section.collapsible {
        html.push_str(&format!(r#"<details class="col-12 mb-3 form-section" id="{id}--field" open>"#));
        html.push_str(r#"<summary class="fw-semibold mb-2">"#);
        html.push_str(&escape_html(&section.meta.label));
        if section.meta.required {
            html.push_str(r#"<span class="text-danger ms-1" aria-hidden="true">*</span>"#);
        }
        html.push_str("</summary>");
    } else {
        html.push_str(&format!(r#"<fieldset class="col-12 mb-3 border rounded p-3 form-section" id="{id}--field">"#));
        html.push_str(&format!(r#"<legend class="fs-6 fw-semibold">{}</legend>"#, escape_html(&section.meta.label)));
    }
    write_description(html, &section.meta);
    html.push_str(r#"<div class="row ps-3">"#);
    html.push_str(&to_html(&section.children));
    html.push_str("</div>");
    html.push_str(if section.collapsible { "</details>" } else { "</fieldset>" });
}

fn write_array(html: &mut String, array: &ArrayNode) {
    let id = escape_html(&array.meta.dom_id());
    open_field(html, &array.meta, " form-array");
    html.push_str(r#"<div class="d-flex justify-content-between align-items-center mb-2">"#);
    write_label(html, &array.meta, "form-label mb-0", false);
    let disabled = if array.can_add() { "" } else { " disabled" };
    html.push_str(&format!(
        r#"<button type="button" class="btn btn-sm btn-outline-primary"{}{disabled}>Add {}</button>"#,
        bindings(&array.add),
        escape_html(&array.item_title)
    ));
    html.push_str("</div>");
    write_description(html, &array.meta);
    html.push_str(&format!(r#"<div class="array-items" id="{id}--items">"#));
    for item in &array.items {
        html.push_str(&array_item_html(item));
    }
    html.push_str("</div></div>");
}

/// Markup for one array item block, appended after an add.
pub fn array_item_html(item: &ArrayItemNode) -> String {
    let id = escape_html(&item.path.dom_id());
    let mut html = format!(r#"<div class="card mb-2 array-item" id="{id}--item" data-item="{}">"#, item.id);
    html.push_str(r#"<div class="card-header d-flex justify-content-between align-items-center">"#);
    html.push_str(&format!("<span>{}</span>", escape_html(&item.title)));
    html.push_str(&format!(
        r#"<button type="button" class="btn btn-sm btn-outline-danger"{}>Remove</button>"#,
        bindings(&item.remove)
    ));
    html.push_str("</div>");
    html.push_str(r#"<div class="card-body"><div class="row">"#);
    html.push_str(&to_html(&item.children));
    html.push_str("</div></div></div>");
    html
}

fn write_union(html: &mut String, union: &UnionNode) {
    let id = escape_html(&union.meta.dom_id());
    open_field(html, &union.meta, " form-union");
    write_label(html, &union.meta, "form-label", false);
    write_description(html, &union.meta);
    match union.style {
        UnionStyle::Dropdown => {
            let required = if union.meta.required { " required" } else { "" };
            html.push_str(&format!(
                r#"<select class="form-select mb-2" id="{id}--selector" data-action="select-variant" data-path="{id}"{required}>"#
            ));
            if union.selected.is_none() {
                html.push_str(r#"<option value="" selected>Choose...</option>"#);
            }
            for option in &union.options {
                let selected = if option.selected { " selected" } else { "" };
                html.push_str(&format!(
                    r#"<option value="{label}" data-variant="{label}"{selected}>{}</option>"#,
                    escape_html(&option.title),
                    label = escape_html(&option.label)
                ));
            }
            html.push_str("</select>");
        }
        UnionStyle::Cards => {
            html.push_str(&format!(r#"<div class="row g-2 mb-2" id="{id}--selector" role="radiogroup">"#));
            for option in &union.options {
                let (state, pressed) = if option.selected {
                    (" border-primary selected", "true")
                } else {
                    ("", "false")
                };
                html.push_str(r#"<div class="col">"#);
                html.push_str(&format!(
                    r#"<div class="card h-100 union-option{state}" role="radio" aria-checked="{pressed}" tabindex="0"{}>"#,
                    bindings(&option.select)
                ));
                html.push_str(&format!(r#"<div class="card-body"><h6 class="card-title">{}</h6>"#, escape_html(&option.title)));
                if let Some(description) = &option.description {
                    html.push_str(&format!(r#"<p class="card-text small">{}</p>"#, escape_html(description)));
                }
                html.push_str("</div></div></div>");
            }
            html.push_str("</div>");
        }
    }
    html.push_str(&format!(r#"<div class="union-body row" id="{id}--body">"#));
    html.push_str(&to_html(&union.body));
    html.push_str("</div></div>");
}

fn write_fallback(html: &mut String, fallback: &FallbackNode) {
    let id = escape_html(&fallback.meta.dom_id());
    open_field(html, &fallback.meta, " fallback-field");
    write_label(html, &fallback.meta, "form-label", true);
    let value = fallback.value.as_ref().map(literal_text).unwrap_or_default();
    html.push_str(&format!(
        r#"<input type="text" class="form-control is-invalid" id="{id}" name="{id}" value="{}"{}>"#,
        escape_html(&value),
        bindings(&fallback.on_change)
    ));
    html.push_str(&format!(
        r#"<div class="invalid-feedback d-block">{}</div>"#,
        escape_html(&fallback.message)
    ));
    html.push_str("</div>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{FormRenderer, RenderOptions};
    use schemaform_types::{FormValue, SchemaDocument};
    use serde_json::json;

    fn view(options: &RenderOptions, data: Option<&FormValue>) -> String {
        let document = SchemaDocument::from_json_schema(
            "shop",
            &json!({
                "title": "Shop <Intake>",
                "properties": {
                    "name": { "type": "string", "minLength": 2 },
                    "count": { "type": "integer", "minimum": 0 },
                    "items": { "type": "array", "items": { "type": "string" }, "maxItems": 1 },
                    "kind": { "oneOf": [{ "$ref": "#/$defs/A" }, { "$ref": "#/$defs/B" }] }
                },
                "required": ["name"],
                "$defs": {
                    "A": { "properties": { "a": { "type": "boolean" } } },
                    "B": { "description": "Second", "properties": { "b": { "type": "string" } } }
                }
            }),
        )
        .unwrap();
        let rendered = FormRenderer::new(&document, options).render_document(data).unwrap();
        FormView {
            workflow: document.workflow.clone(),
            title: document.title.clone().unwrap_or_default(),
            nodes: rendered.nodes,
        }
        .to_html()
    }

    #[test]
    fn html_carries_constraints_and_bindings() {
        let html = view(&RenderOptions::default(), None);
        assert!(html.contains("Shop &lt;Intake&gt;"));
        assert!(html.contains(r#"id="name" name="name" minlength="2" required data-action="set-value" data-path="name""#));
        assert!(html.contains(r#"min="0" step="1""#));
        assert!(html.contains(r#"data-action="add-item" data-path="items">Add Item</button>"#));
        assert!(html.contains(r#"id="items--items""#));
        assert!(html.contains(r#"<select class="form-select mb-2" id="kind--selector" data-action="select-variant" data-path="kind">"#));
        assert!(html.contains(r#"<option value="" selected>Choose...</option>"#));
        assert!(html.contains(r#"id="kind--body""#));
    }

    #[test]
    fn full_arrays_disable_add_and_items_render_blocks() {
        let data = FormValue::from_json(&json!({ "items": ["x"] }));
        let html = view(&RenderOptions::default(), Some(&data));
        assert!(html.contains(r#"data-path="items" disabled>Add Item"#));
        assert!(html.contains(r#"id="items-0--item" data-item="0""#));
        assert!(html.contains(r#"data-action="remove-item" data-path="items" data-item="0""#));
        assert!(html.contains(r#"id="items-0" name="items-0""#));
    }

    #[test]
    fn card_style_marks_only_selected_variant() {
        let options = RenderOptions {
            union_style: UnionStyle::Cards,
            ..RenderOptions::default()
        };
        let mut data = FormValue::empty_object();
        let mut union = schemaform_types::FormUnion::default();
        union.select("B", Default::default());
        data.fields_mut().unwrap().insert("kind".to_string(), FormValue::Union(union));

        let html = view(&options, Some(&data));
        assert_eq!(html.matches(r#"aria-checked="true""#).count(), 1);
        assert!(html.contains(r#"data-variant="B">"#));
        assert!(html.contains("Second"));
        assert!(html.contains(r#"id="kind-b""#));
    }
}
