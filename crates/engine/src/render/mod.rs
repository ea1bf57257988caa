//! Form renderer.
//!
//! Rendering is a pure function of `(schema document, form data tree)`: the
//! renderer walks the model's fields in display order and returns a
//! [`FormNode`] tree plus the array and union definitions it met, which the
//! session registers in the field cache. Nothing is mutated here.
//!
//! - primitives become inputs, enums become selects
//! - references and inline objects become sections rendered recursively
//! - arrays render one block per stored item; nothing is created eagerly
//! - unions render their alternatives and, once selected, the variant body
//!
//! Nested models are expanded under a [`ResolutionStack`]; array items and
//! union bodies get a detached stack because they only exist once the user
//! has added or selected them.

mod html;
mod node;

pub use html::{array_item_html, render_form, to_html};
pub use node::{
    ArrayItemNode, ArrayNode, FallbackNode, FieldMeta, FormAction, FormNode, InputKind, InputNode, SectionNode, SelectNode, SelectOption,
    TEXTAREA_MIN_LENGTH, UnionNode, UnionOption, find_node,
};

use schemaform_types::{
    ArrayField, FieldDefinition, FieldKind, FieldPath, FormValue, ItemId, ModelDefinition, SchemaDocument, UnionField, bare_reference_name,
    humanize_field_name,
};
use schemaform_util::{FormsConfig, UnionStyle};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::resolver::{ResolutionStack, resolve_reference, root_model};

/// Array or union definition met while rendering, keyed by its path.
pub type Registration = (FieldPath, FieldDefinition);

/// Presentation switches for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub union_style: UnionStyle,
    pub collapsible_sections: bool,
    /// Field names that always span the full row.
    pub full_width_fields: Vec<String>,
    /// Input kinds that always span the full row.
    pub full_width_kinds: Vec<InputKind>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            union_style: UnionStyle::Dropdown,
            collapsible_sections: true,
            full_width_fields: Vec::new(),
            full_width_kinds: vec![InputKind::Textarea],
        }
    }
}

impl From<&FormsConfig> for RenderOptions {
    fn from(config: &FormsConfig) -> Self {
        Self {
            union_style: config.union_style,
            collapsible_sections: config.collapsible_sections,
            full_width_fields: config.full_width_fields.clone(),
            ..Self::default()
        }
    }
}

/// Nodes produced by one render call and the definitions to register.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub nodes: Vec<FormNode>,
    pub registrations: Vec<Registration>,
}

/// A whole rendered form, ready to be turned into HTML.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormView {
    pub workflow: String,
    pub title: String,
    pub nodes: Vec<FormNode>,
}

impl FormView {
    pub fn to_html(&self) -> String {
        render_form(self)
    }

    pub fn find(&self, path: &FieldPath) -> Option<&FormNode> {
        find_node(&self.nodes, path)
    }
}

/// Walks a schema document and produces component trees.
pub struct FormRenderer<'a> {
    document: &'a SchemaDocument,
    options: &'a RenderOptions,
}

impl<'a> FormRenderer<'a> {
    pub fn new(document: &'a SchemaDocument, options: &'a RenderOptions) -> Self {
        Self { document, options }
    }

    /// Renders the root model against the schema's whole data tree.
    pub fn render_document(&self, data: Option<&FormValue>) -> Result<Rendered, SchemaError> {
        let model = root_model(self.document)?;
        let mut registrations = Vec::new();
        let mut stack = ResolutionStack::new();
        let nodes = stack.with_frame(&self.document.root, |stack| {
            self.render_fields(model, &FieldPath::root(), data, stack, &mut registrations)
        })?;
        debug!(workflow = %self.document.workflow, nodes = nodes.len(), "rendered form");
        Ok(Rendered { nodes, registrations })
    }

    /// Renders `model`'s fields under `path`; `data` is the object node at `path`.
    pub fn render(&self, model: &ModelDefinition, path: &FieldPath, data: Option<&FormValue>) -> Result<Rendered, SchemaError> {
        let mut registrations = Vec::new();
        let nodes = self.render_fields(model, path, data, &mut ResolutionStack::new(), &mut registrations)?;
        Ok(Rendered { nodes, registrations })
    }

    /// Renders the block for one array item, as appended after an add.
    /// `depth` is the array's [`model_depth_at`](crate::resolver::model_depth_at),
    /// so the fragment hits the nesting limit exactly where a full render would.
    #[allow(clippy::too_many_arguments)]
    pub fn render_array_item(
        &self,
        array_path: &FieldPath,
        array: &ArrayField,
        index: usize,
        id: ItemId,
        value: Option<&FormValue>,
        depth: usize,
    ) -> Result<(ArrayItemNode, Vec<Registration>), SchemaError> {
        let mut registrations = Vec::new();
        let item = self.array_item(
            array_path,
            array,
            index,
            id,
            value,
            &mut ResolutionStack::at_depth(depth),
            &mut registrations,
        )?;
        Ok((item, registrations))
    }

    /// Renders the fields of the variant `label` of the union at `union_path`,
    /// starting at the union's model `depth`.
    pub fn render_variant_body(
        &self,
        union_path: &FieldPath,
        union: &UnionField,
        label: &str,
        value: Option<&FormValue>,
        depth: usize,
    ) -> Result<Rendered, SchemaError> {
        let mut registrations = Vec::new();
        let nodes = self.variant_body(
            union_path,
            union,
            label,
            value,
            &mut ResolutionStack::at_depth(depth),
            &mut registrations,
        )?;
        Ok(Rendered { nodes, registrations })
    }

    fn render_fields(
        &self,
        model: &ModelDefinition,
        path: &FieldPath,
        data: Option<&FormValue>,
        stack: &mut ResolutionStack,
        registrations: &mut Vec<Registration>,
    ) -> Result<Vec<FormNode>, SchemaError> {
        let fields = data.and_then(FormValue::fields);
        model
            .ordered_fields()
            .into_iter()
            .map(|(name, field)| {
                let value = fields.and_then(|fields| fields.get(name));
                let meta = self.meta(name, field, model.is_required(name), path.field(name));
                self.render_field(meta, field, value, stack, registrations)
            })
            .collect()
    }

    fn render_field(
        &self,
        mut meta: FieldMeta,
        field: &FieldDefinition,
        value: Option<&FormValue>,
        stack: &mut ResolutionStack,
        registrations: &mut Vec<Registration>,
    ) -> Result<FormNode, SchemaError> {
        let path = meta.path.clone();
        let node = match &field.kind {
            FieldKind::Primitive(primitive) => {
                let input = InputKind::for_primitive(primitive);
                meta.full_width |= self.options.full_width_kinds.contains(&input);
                FormNode::Input(InputNode {
                    meta,
                    input,
                    value: scalar(value),
                    nullable: field.nullable,
                    integer: primitive.kind == schemaform_types::PrimitiveKind::Integer,
                    constraints: primitive.constraints.clone(),
                    on_change: set_value(&path),
                })
            }
            FieldKind::Enumerated { values } => {
                let current = scalar(value);
                FormNode::Select(SelectNode {
                    meta,
                    options: values
                        .iter()
                        .map(|option| SelectOption {
                            value: option.clone(),
                            label: literal_label(option),
                            selected: current.as_ref() == Some(option),
                        })
                        .collect(),
                    on_change: set_value(&path),
                })
            }
            FieldKind::Reference { reference } => match resolve_reference(reference, self.document) {
                Some(resolved) => {
                    meta.full_width = true;
                    if meta.description.is_none() {
                        meta.description = resolved.model.description.clone();
                    }
                    let children = stack.with_frame(resolved.name, |stack| {
                        self.render_fields(resolved.model, &path, value, stack, registrations)
                    })?;
                    FormNode::Section(SectionNode {
                        meta,
                        collapsible: self.options.collapsible_sections,
                        children,
                    })
                }
                None => fallback(meta, reference, value),
            },
            FieldKind::Object { model } => {
                meta.full_width = true;
                let children = self.render_fields(model, &path, value, stack, registrations)?;
                FormNode::Section(SectionNode {
                    meta,
                    collapsible: self.options.collapsible_sections,
                    children,
                })
            }
            FieldKind::Array(array) => {
                registrations.push((path.clone(), field.clone()));
                meta.full_width = true;
                let mut items = Vec::new();
                if let Some(stored) = value.and_then(FormValue::as_array) {
                    for (index, item) in stored.iter().enumerate() {
                        items.push(self.array_item(
                            &path,
                            array,
                            index,
                            item.id,
                            Some(&item.value),
                            &mut stack.detached(),
                            registrations,
                        )?);
                    }
                }
                FormNode::Array(ArrayNode {
                    meta,
                    item_title: self.item_title(&array.items),
                    items,
                    add: FormAction::AddItem { path: path.clone() },
                    min_items: array.min_items,
                    max_items: array.max_items,
                })
            }
            FieldKind::Union(union) => {
                registrations.push((path.clone(), field.clone()));
                meta.full_width = true;
                let selected = value
                    .and_then(FormValue::as_union)
                    .and_then(|stored| stored.variant.clone());
                let options = union
                    .variants
                    .iter()
                    .map(|variant| {
                        let model = resolve_reference(&variant.reference, self.document).map(|resolved| resolved.model);
                        UnionOption {
                            label: variant.label.clone(),
                            title: model
                                .and_then(|model| model.title.clone())
                                .unwrap_or_else(|| humanize_field_name(&variant.label)),
                            description: model.and_then(|model| model.description.clone()),
                            selected: selected.as_deref() == Some(variant.label.as_str()),
                            select: FormAction::SelectVariant {
                                path: path.clone(),
                                variant: variant.label.clone(),
                            },
                        }
                    })
                    .collect();
                let body = match selected.as_deref() {
                    Some(label) => self.variant_body(&path, union, label, value, &mut stack.detached(), registrations)?,
                    None => Vec::new(),
                };
                FormNode::Union(UnionNode {
                    meta,
                    style: self.options.union_style,
                    options,
                    selected,
                    body,
                })
            }
        };
        Ok(node)
    }

    #[allow(clippy::too_many_arguments)]
    fn array_item(
        &self,
        array_path: &FieldPath,
        array: &ArrayField,
        index: usize,
        id: ItemId,
        value: Option<&FormValue>,
        stack: &mut ResolutionStack,
        registrations: &mut Vec<Registration>,
    ) -> Result<ArrayItemNode, SchemaError> {
        let path = array_path.item(id);
        let title = format!("{} {}", self.item_title(&array.items), index + 1);
        let item = array.items.as_ref();
        let children = match &item.kind {
            FieldKind::Reference { reference } => match resolve_reference(reference, self.document) {
                Some(resolved) => stack.with_frame(resolved.name, |stack| {
                    self.render_fields(resolved.model, &path, value, stack, registrations)
                })?,
                None => vec![fallback(self.meta(&title, item, false, path.clone()), reference, value)],
            },
            FieldKind::Object { model } => self.render_fields(model, &path, value, stack, registrations)?,
            _ => {
                let meta = self.meta(&title, item, false, path.clone());
                vec![self.render_field(meta, item, value, stack, registrations)?]
            }
        };
        Ok(ArrayItemNode {
            id,
            index,
            path: path.clone(),
            title,
            remove: FormAction::RemoveItem {
                path: array_path.clone(),
                item: id,
            },
            children,
        })
    }

    fn variant_body(
        &self,
        union_path: &FieldPath,
        union: &UnionField,
        label: &str,
        value: Option<&FormValue>,
        stack: &mut ResolutionStack,
        registrations: &mut Vec<Registration>,
    ) -> Result<Vec<FormNode>, SchemaError> {
        let reference = union
            .variant(label)
            .map(|variant| variant.reference.as_str())
            .unwrap_or(label);
        match resolve_reference(reference, self.document) {
            Some(resolved) => stack.with_frame(resolved.name, |stack| {
                self.render_fields(resolved.model, union_path, value, stack, registrations)
            }),
            None => {
                let meta = FieldMeta {
                    path: union_path.clone(),
                    name: label.to_string(),
                    label: humanize_field_name(label),
                    description: None,
                    required: false,
                    full_width: true,
                };
                Ok(vec![fallback(meta, reference, None)])
            }
        }
    }

    fn meta(&self, name: &str, field: &FieldDefinition, required: bool, path: FieldPath) -> FieldMeta {
        FieldMeta {
            path,
            name: name.to_string(),
            label: field.label(name),
            description: field.description.clone(),
            required,
            full_width: self.options.full_width_fields.iter().any(|full| full == name),
        }
    }

    fn item_title(&self, item: &FieldDefinition) -> String {
        if let Some(title) = &item.title {
            return title.clone();
        }
        match &item.kind {
            FieldKind::Reference { reference } => resolve_reference(reference, self.document)
                .and_then(|resolved| resolved.model.title.clone())
                .unwrap_or_else(|| humanize_field_name(bare_reference_name(reference))),
            FieldKind::Object { model } => model.title.clone().unwrap_or_else(|| "Item".to_string()),
            _ => "Item".to_string(),
        }
    }
}

fn scalar(value: Option<&FormValue>) -> Option<Value> {
    value.and_then(FormValue::as_scalar).filter(|value| !value.is_null()).cloned()
}

fn set_value(path: &FieldPath) -> FormAction {
    FormAction::SetValue {
        path: path.clone(),
        value: Value::Null,
    }
}

fn literal_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn fallback(meta: FieldMeta, reference: &str, value: Option<&FormValue>) -> FormNode {
    warn!(path = %meta.path, reference, "unresolved schema reference; rendering fallback input");
    let path = meta.path.clone();
    FormNode::Fallback(FallbackNode {
        meta,
        reference: reference.to_string(),
        message: format!("Could not resolve '{}'", reference),
        value: scalar(value),
        on_change: set_value(&path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaform_types::{FormArray, FormUnion};
    use serde_json::json;

    fn document() -> SchemaDocument {
        SchemaDocument::from_json_schema(
            "shop",
            &json!({
                "properties": {
                    "owner": { "$ref": "#/$defs/Person" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "vehicle": {
                        "oneOf": [{ "$ref": "#/$defs/Car" }, { "$ref": "#/$defs/Boat" }]
                    },
                    "notes": { "type": "string", "maxLength": 2000 },
                    "missing": { "$ref": "#/$defs/Nowhere" }
                },
                "required": ["owner"],
                "$defs": {
                    "Person": {
                        "properties": {
                            "name": { "type": "string" },
                            "size": { "enum": ["s", "m"] }
                        },
                        "required": ["name"]
                    },
                    "Car": { "title": "Car", "properties": { "doors": { "type": "integer" } } },
                    "Boat": { "properties": { "sails": { "type": "integer" } } }
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn renders_each_kind() {
        let document = document();
        let options = RenderOptions::default();
        let rendered = FormRenderer::new(&document, &options).render_document(None).unwrap();
        let kinds: Vec<_> = rendered
            .nodes
            .iter()
            .map(|node| match node {
                FormNode::Section(_) => "section",
                FormNode::Input(_) => "input",
                FormNode::Select(_) => "select",
                FormNode::Array(_) => "array",
                FormNode::Union(_) => "union",
                FormNode::Fallback(_) => "fallback",
            })
            .collect();
        assert_eq!(kinds, vec!["section", "array", "union", "input", "fallback"]);

        let FormNode::Section(owner) = &rendered.nodes[0] else {
            panic!("expected section");
        };
        assert!(owner.meta.required);
        assert!(owner.children[0].meta().required);
        assert_eq!(owner.children[0].meta().dom_id(), "owner-name");

        let FormNode::Input(notes) = &rendered.nodes[3] else {
            panic!("expected input");
        };
        assert_eq!(notes.input, InputKind::Textarea);
        assert!(notes.meta.full_width);

        let registered: Vec<_> = rendered.registrations.iter().map(|(path, _)| path.dom_id()).collect();
        assert_eq!(registered, vec!["tags", "vehicle"]);
    }

    #[test]
    fn arrays_render_one_block_per_stored_item() {
        let document = document();
        let options = RenderOptions::default();
        let mut tags = FormArray::new();
        tags.push(FormValue::Scalar(json!("a")));
        tags.push(FormValue::Scalar(json!("b")));
        tags.remove(0);
        let data = FormValue::Object([("tags".to_string(), FormValue::Array(tags))].into_iter().collect());

        let rendered = FormRenderer::new(&document, &options).render_document(Some(&data)).unwrap();
        let FormNode::Array(array) = &rendered.nodes[1] else {
            panic!("expected array");
        };
        assert_eq!(array.items.len(), 1);
        assert_eq!(array.items[0].id, ItemId(1));
        assert_eq!(array.items[0].title, "Item 1");
        assert_eq!(array.items[0].children[0].meta().dom_id(), "tags-1");
    }

    #[test]
    fn union_body_follows_selection() {
        let document = document();
        let options = RenderOptions {
            union_style: UnionStyle::Cards,
            ..RenderOptions::default()
        };
        let mut union = FormUnion::default();
        union.select("Boat", Default::default());
        let data = FormValue::Object([("vehicle".to_string(), FormValue::Union(union))].into_iter().collect());

        let rendered = FormRenderer::new(&document, &options).render_document(Some(&data)).unwrap();
        let FormNode::Union(node) = &rendered.nodes[2] else {
            panic!("expected union");
        };
        assert_eq!(node.style, UnionStyle::Cards);
        assert_eq!(node.options.iter().filter(|option| option.selected).count(), 1);
        assert_eq!(node.options[0].title, "Car");
        assert_eq!(node.body[0].meta().dom_id(), "vehicle-sails");
    }

    #[test]
    fn eager_self_reference_is_a_cycle() {
        let document = SchemaDocument::from_json_schema(
            "loop",
            &json!({
                "properties": { "node": { "$ref": "#/$defs/Node" } },
                "$defs": { "Node": { "properties": { "next": { "$ref": "#/$defs/Node" } } } }
            }),
        )
        .unwrap();
        let options = RenderOptions::default();
        let error = FormRenderer::new(&document, &options).render_document(None).unwrap_err();
        assert!(matches!(error, SchemaError::ReferenceCycle { chain } if chain == vec!["RootModel", "Node", "Node"]));
    }

    #[test]
    fn recursion_through_arrays_is_allowed() {
        let document = SchemaDocument::from_json_schema(
            "tree",
            &json!({
                "properties": { "root": { "$ref": "#/$defs/Node" } },
                "$defs": {
                    "Node": {
                        "properties": {
                            "label": { "type": "string" },
                            "children": { "type": "array", "items": { "$ref": "#/$defs/Node" } }
                        }
                    }
                }
            }),
        )
        .unwrap();
        let data = FormValue::from_json(&json!({ "root": { "children": [{ "label": "leaf", "children": [] }] } }));
        let options = RenderOptions::default();
        let rendered = FormRenderer::new(&document, &options).render_document(Some(&data)).unwrap();
        let leaf = FieldPath::root().field("root").field("children").item(ItemId(0)).field("label");
        assert!(find_node(&rendered.nodes, &leaf).is_some());
    }
}
