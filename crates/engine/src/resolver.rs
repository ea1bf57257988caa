//! Reference resolution over a schema document.
//!
//! `$ref` lookups are best-effort: known prefixes are stripped, the bare name
//! is looked up directly, then a fixed list of spelling variants is tried.
//! Recursive walks carry a [`ResolutionStack`] so a model that reaches itself
//! through eager nesting fails fast instead of recursing forever.

use schemaform_types::{FieldDefinition, FieldKind, FieldPath, FormValue, ModelDefinition, PathSegment, SchemaDocument, bare_reference_name};
use schemaform_util::reference_name_variants;

use crate::error::SchemaError;

/// Upper bound on nested model expansion, including lazily rendered items.
pub const MAX_RESOLUTION_DEPTH: usize = 64;

/// A model found for a `$ref`, with the name it is stored under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedModel<'a> {
    pub name: &'a str,
    pub model: &'a ModelDefinition,
}

/// Resolves `reference` against `document`. First match wins.
pub fn resolve_reference<'a>(reference: &str, document: &'a SchemaDocument) -> Option<ResolvedModel<'a>> {
    let bare_name = bare_reference_name(reference);
    if let Some((name, model)) = document.models.get_key_value(bare_name) {
        return Some(ResolvedModel { name, model });
    }
    reference_name_variants(bare_name).into_iter().find_map(|candidate| {
        document
            .models
            .get_key_value(candidate.as_str())
            .map(|(name, model)| ResolvedModel { name, model })
    })
}

/// Model-only form of [`resolve_reference`].
pub fn resolve<'a>(reference: &str, document: &'a SchemaDocument) -> Option<&'a ModelDefinition> {
    resolve_reference(reference, document).map(|resolved| resolved.model)
}

/// Models currently being expanded, outermost first.
#[derive(Debug, Default, Clone)]
pub struct ResolutionStack {
    chain: Vec<String>,
    base_depth: usize,
}

impl ResolutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.base_depth + self.chain.len()
    }

    /// An empty chain that starts counting at `depth`, for rendering a
    /// fragment that sits `depth` models deep in the full form.
    pub fn at_depth(depth: usize) -> Self {
        Self {
            chain: Vec::new(),
            base_depth: depth,
        }
    }

    /// A stack for data-driven nesting (array items, selected variants): the
    /// chain starts empty because each level exists only when the user added
    /// it, while the depth keeps counting.
    pub fn detached(&self) -> Self {
        Self {
            chain: Vec::new(),
            base_depth: self.depth(),
        }
    }

    /// Runs `resolver` with `model_name` pushed onto the stack.
    pub fn with_frame<T>(
        &mut self,
        model_name: &str,
        resolver: impl FnOnce(&mut Self) -> Result<T, SchemaError>,
    ) -> Result<T, SchemaError> {
        if self.chain.iter().any(|entry| entry == model_name) {
            let mut chain = self.chain.clone();
            chain.push(model_name.to_string());
            return Err(SchemaError::ReferenceCycle { chain });
        }
        if self.depth() >= MAX_RESOLUTION_DEPTH {
            return Err(SchemaError::DepthExceeded {
                max: MAX_RESOLUTION_DEPTH,
                model: model_name.to_string(),
            });
        }

        self.chain.push(model_name.to_string());
        let result = resolver(self);
        self.chain.pop();
        result
    }
}

/// Returns the root model or a [`SchemaError::MissingRootModel`].
pub fn root_model(document: &SchemaDocument) -> Result<&ModelDefinition, SchemaError> {
    document
        .root_model()
        .ok_or_else(|| SchemaError::MissingRootModel(document.root.clone()))
}

/// Finds the field definition addressed by `path`, following references,
/// array items, and the union variant currently selected in `data`.
pub fn field_definition_at<'a>(document: &'a SchemaDocument, data: Option<&FormValue>, path: &FieldPath) -> Option<&'a FieldDefinition> {
    walk_path(document, data, path).map(|(field, _)| field)
}

/// Number of models a full render has entered around the field at `path`,
/// the root model included. Fragments rendered for that field start their
/// [`ResolutionStack`] at this depth.
pub fn model_depth_at(document: &SchemaDocument, data: Option<&FormValue>, path: &FieldPath) -> Option<usize> {
    walk_path(document, data, path).map(|(_, depth)| depth)
}

fn walk_path<'a>(document: &'a SchemaDocument, data: Option<&FormValue>, path: &FieldPath) -> Option<(&'a FieldDefinition, usize)> {
    let mut model = document.root_model()?;
    let mut field: Option<&'a FieldDefinition> = None;
    let mut depth = 1;
    let mut walked = FieldPath::root();

    for segment in path.segments() {
        match segment {
            PathSegment::Field(name) => {
                if let Some(current) = field {
                    model = model_of(document, current, data.and_then(|tree| tree.get_path(&walked)))?;
                    if matches!(current.kind, FieldKind::Reference { .. } | FieldKind::Union(_)) {
                        depth += 1;
                    }
                }
                field = Some(model.properties.get(name)?);
                walked = walked.field(name);
            }
            PathSegment::Item(id) => {
                let FieldKind::Array(array) = &field?.kind else {
                    return None;
                };
                field = Some(array.items.as_ref());
                walked = walked.item(*id);
            }
        }
    }
    field.map(|field| (field, depth))
}

/// Model whose fields sit directly under a field of kind reference, inline
/// object, or union (using the variant selected in `value`).
pub fn model_of<'a>(document: &'a SchemaDocument, field: &'a FieldDefinition, value: Option<&FormValue>) -> Option<&'a ModelDefinition> {
    match &field.kind {
        FieldKind::Reference { reference } => resolve(reference, document),
        FieldKind::Object { model } => Some(model.as_ref()),
        FieldKind::Union(union) => {
            let label = value?.as_union()?.variant.as_deref()?;
            resolve(&union.variant(label)?.reference, document)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaform_types::ItemId;
    use serde_json::json;

    fn document() -> SchemaDocument {
        SchemaDocument::from_json_schema(
            "bike_shop",
            &json!({
                "title": "RootModel",
                "properties": {
                    "stores": { "type": "array", "items": { "$ref": "#/$defs/Store" } }
                },
                "$defs": {
                    "RootModel_Store": {
                        "properties": {
                            "bike_stock": { "type": "array", "items": { "$ref": "#/$defs/BikeStock" } }
                        }
                    },
                    "bike_stock": {
                        "properties": {
                            "bike": { "oneOf": [{ "$ref": "#/$defs/Road" }, { "$ref": "#/$defs/Mountain" }] }
                        }
                    },
                    "Road": { "properties": { "gears": { "type": "integer" } } },
                    "Mountain": { "properties": { "suspension": { "type": "string" } } }
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn resolves_through_name_variants() {
        let document = document();
        assert_eq!(resolve_reference("#/$defs/Store", &document).unwrap().name, "RootModel_Store");
        assert_eq!(resolve_reference("#/definitions/BikeStock", &document).unwrap().name, "bike_stock");
        assert_eq!(resolve_reference("Road", &document).unwrap().name, "Road");
        assert!(resolve_reference("#/$defs/Unicycle", &document).is_none());
    }

    #[test]
    fn resolution_is_idempotent() {
        let document = document();
        let first = resolve("#/$defs/Store", &document).unwrap();
        let second = resolve("#/$defs/Store", &document).unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn stack_detects_cycles_with_chain() {
        let mut stack = ResolutionStack::new();
        let error = stack
            .with_frame("A", |stack| stack.with_frame("B", |stack| stack.with_frame("A", |_| Ok(()))))
            .unwrap_err();
        assert_eq!(
            error,
            SchemaError::ReferenceCycle {
                chain: vec!["A".to_string(), "B".to_string(), "A".to_string()]
            }
        );
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn detached_stack_keeps_depth_but_not_chain() {
        let mut stack = ResolutionStack::new();
        stack
            .with_frame("Node", |stack| {
                let mut nested = stack.detached();
                assert_eq!(nested.depth(), 1);
                nested.with_frame("Node", |_| Ok(()))
            })
            .unwrap();
    }

    #[test]
    fn model_depth_counts_entered_models() {
        let document = document();
        let tree = FormValue::from_json(&json!({ "stores": [{ "bike_stock": [{}] }] }));
        let stores = FieldPath::root().field("stores");
        let bike_stock = stores.item(ItemId(0)).field("bike_stock");
        assert_eq!(model_depth_at(&document, Some(&tree), &stores), Some(1));
        assert_eq!(model_depth_at(&document, Some(&tree), &bike_stock), Some(2));
        assert_eq!(model_depth_at(&document, Some(&tree), &bike_stock.item(ItemId(0)).field("bike")), Some(3));
        assert_eq!(ResolutionStack::at_depth(3).depth(), 3);
    }

    #[test]
    fn finds_definitions_along_paths() {
        let document = document();
        let mut tree = FormValue::from_json(&json!({ "stores": [{ "bike_stock": [{}] }] }));
        let path = FieldPath::root()
            .field("stores")
            .item(ItemId(0))
            .field("bike_stock")
            .item(ItemId(0))
            .field("bike");
        let definition = field_definition_at(&document, Some(&tree), &path).unwrap();
        assert!(matches!(definition.kind, FieldKind::Union(_)));

        let variant_field = path.field("gears");
        assert!(field_definition_at(&document, Some(&tree), &variant_field).is_none());

        let bike = tree.get_path_mut(&path.parent().unwrap()).unwrap().fields_mut().unwrap();
        let mut union = schemaform_types::FormUnion::default();
        union.select("Road", Default::default());
        bike.insert("bike".to_string(), FormValue::Union(union));
        assert!(field_definition_at(&document, Some(&tree), &variant_field).is_some());
    }
}
