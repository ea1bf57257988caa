//! Array and union item manager.
//!
//! Keeps the stored tree and the rendered blocks in lockstep: every add
//! seeds one defaulted item and renders exactly its block, every remove
//! splices one item and names the block to drop, and every variant
//! selection replaces the union's sub-tree and renders the new body.

use schemaform_types::{ArrayField, FieldDefinition, FieldKind, FieldPath, FormUnion, FormValue, ItemId, SchemaDocument, UnionField};
use tracing::{debug, info};

use crate::cache::FieldCache;
use crate::defaults::{item_default, variant_defaults};
use crate::error::FormError;
use crate::render::{ArrayItemNode, FormNode, FormRenderer, Registration, RenderOptions, array_item_html, to_html};
use crate::resolver::{field_definition_at, model_depth_at};
use crate::store::FormDataStore;

/// Result of appending an array item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemAdded {
    pub array_path: FieldPath,
    pub index: usize,
    pub id: ItemId,
    pub item: ArrayItemNode,
}

impl ItemAdded {
    /// Id of the element the new block is appended to.
    pub fn container_id(&self) -> String {
        format!("{}--items", self.array_path.dom_id())
    }

    pub fn html(&self) -> String {
        array_item_html(&self.item)
    }
}

/// Result of removing an array item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRemoved {
    pub array_path: FieldPath,
    pub index: usize,
    pub id: ItemId,
}

impl ItemRemoved {
    /// Id of the block to drop from the page.
    pub fn block_id(&self) -> String {
        format!("{}--item", self.array_path.item(self.id).dom_id())
    }
}

/// Result of selecting a union variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSelected {
    pub union_path: FieldPath,
    pub variant: String,
    pub previous: Option<String>,
    pub body: Vec<FormNode>,
}

impl VariantSelected {
    /// Id of the element whose content is replaced by the new body.
    pub fn body_id(&self) -> String {
        format!("{}--body", self.union_path.dom_id())
    }

    pub fn html(&self) -> String {
        to_html(&self.body)
    }
}

/// Mutates one schema's arrays and unions through the store and renders the
/// affected fragment.
pub struct ItemManager<'a> {
    schema: &'a str,
    document: &'a SchemaDocument,
    options: &'a RenderOptions,
    fields: &'a mut FieldCache,
    store: &'a mut FormDataStore,
}

impl<'a> ItemManager<'a> {
    pub fn new(
        schema: &'a str,
        document: &'a SchemaDocument,
        options: &'a RenderOptions,
        fields: &'a mut FieldCache,
        store: &'a mut FormDataStore,
    ) -> Self {
        Self {
            schema,
            document,
            options,
            fields,
            store,
        }
    }

    /// Appends a defaulted item to the array at `array_path` and renders its block.
    pub fn add_item(&mut self, array_path: &FieldPath) -> Result<ItemAdded, FormError> {
        let array = self.array_definition(array_path)?;
        let value = item_default(&array.items, self.document)?;
        let depth = self.depth(array_path);
        let (index, id) = self.store.add_array_item(self.schema, array_path, value)?;

        let stored = self.store.get(self.schema, &array_path.item(id));
        let rendered = FormRenderer::new(self.document, self.options).render_array_item(array_path, &array, index, id, stored, depth);
        let (item, registrations) = match rendered {
            Ok(rendered) => rendered,
            Err(error) => {
                self.store.remove_array_item(self.schema, array_path, index)?;
                return Err(error.into());
            }
        };
        self.register(registrations);

        info!(schema = self.schema, path = %array_path, index, item = %id, "array item added");
        Ok(ItemAdded {
            array_path: array_path.clone(),
            index,
            id,
            item,
        })
    }

    /// Removes the item at `index`; later items move down one position.
    pub fn remove_item(&mut self, array_path: &FieldPath, index: usize) -> Result<ItemRemoved, FormError> {
        self.array_definition(array_path)?;
        let removed = self.store.remove_array_item(self.schema, array_path, index)?;
        self.fields.forget_subtree(self.schema, &array_path.item(removed.id));
        info!(schema = self.schema, path = %array_path, index, item = %removed.id, "array item removed");
        Ok(ItemRemoved {
            array_path: array_path.clone(),
            index,
            id: removed.id,
        })
    }

    /// Removes the item whose stable id is `id`.
    pub fn remove_item_by_id(&mut self, array_path: &FieldPath, id: ItemId) -> Result<ItemRemoved, FormError> {
        let index = self
            .store
            .get(self.schema, array_path)
            .and_then(|value| value.as_array())
            .and_then(|array| array.position(id))
            .ok_or_else(|| FormError::UnknownItem {
                path: array_path.to_string(),
                item: id.to_string(),
            })?;
        self.remove_item(array_path, index)
    }

    /// Selects `label` for the union at `union_path`: the previous variant's
    /// fields are discarded and the new variant's defaults seeded. Field
    /// definitions cached for the previous body are dropped.
    pub fn select_variant(&mut self, union_path: &FieldPath, label: &str) -> Result<VariantSelected, FormError> {
        let union = self.union_definition(union_path)?;
        let fields = variant_defaults(&union, label, self.document)?.ok_or_else(|| FormError::UnknownVariant {
            path: union_path.to_string(),
            label: label.to_string(),
        })?;

        let mut selected = FormUnion::default();
        selected.select(label, fields.clone());
        let rendered = FormRenderer::new(self.document, self.options).render_variant_body(
            union_path,
            &union,
            label,
            Some(&FormValue::Union(selected)),
            self.depth(union_path),
        )?;
        let previous = self.store.select_variant(self.schema, union_path, label, fields)?;

        self.fields.forget_below(self.schema, union_path);
        self.register(rendered.registrations);

        info!(schema = self.schema, path = %union_path, variant = label, previous = ?previous, "union variant selected");
        Ok(VariantSelected {
            union_path: union_path.clone(),
            variant: label.to_string(),
            previous,
            body: rendered.nodes,
        })
    }

    fn definition(&self, path: &FieldPath) -> Result<FieldDefinition, FormError> {
        if let Some(definition) = self.fields.get(self.schema, path) {
            debug!(schema = self.schema, path = %path, "field cache hit");
            return Ok(definition.clone());
        }
        field_definition_at(self.document, self.store.tree(self.schema), path)
            .cloned()
            .ok_or_else(|| FormError::UnknownPath {
                schema: self.schema.to_string(),
                path: path.to_string(),
            })
    }

    fn depth(&self, path: &FieldPath) -> usize {
        model_depth_at(self.document, self.store.tree(self.schema), path).unwrap_or(1)
    }

    fn array_definition(&self, path: &FieldPath) -> Result<ArrayField, FormError> {
        match self.definition(path)?.kind {
            FieldKind::Array(array) => Ok(array),
            _ => Err(FormError::NotAnArray {
                schema: self.schema.to_string(),
                path: path.to_string(),
            }),
        }
    }

    fn union_definition(&self, path: &FieldPath) -> Result<UnionField, FormError> {
        match self.definition(path)?.kind {
            FieldKind::Union(union) => Ok(union),
            _ => Err(FormError::NotAUnion {
                schema: self.schema.to_string(),
                path: path.to_string(),
            }),
        }
    }

    fn register(&mut self, registrations: Vec<Registration>) {
        for (path, definition) in registrations {
            self.fields.register(self.schema, &path, definition);
        }
    }
}
