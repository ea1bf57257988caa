//! Component tree produced by the form renderer.
//!
//! Nodes describe what to show; interactions are expressed as [`FormAction`]
//! values attached to the node that offers them. A host turns the actions into
//! `data-*` attributes (see [`FormAction::binding_attributes`]) and parses them
//! back with [`FormAction::from_binding`] when the user clicks or types.

use schemaform_types::{Constraints, FieldPath, ItemId, PrimitiveField, PrimitiveKind};
use schemaform_util::UnionStyle;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FormError;

/// `maxLength` above which a string renders as a textarea.
pub const TEXTAREA_MIN_LENGTH: usize = 255;

/// HTML input control chosen for a primitive field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    Text,
    Number,
    Checkbox,
    Date,
    DatetimeLocal,
    Time,
    Email,
    Url,
    Password,
    Textarea,
}

impl InputKind {
    /// Chooses the control from the primitive's type and format.
    pub fn for_primitive(field: &PrimitiveField) -> Self {
        match field.kind {
            PrimitiveKind::Boolean => Self::Checkbox,
            PrimitiveKind::Number | PrimitiveKind::Integer => Self::Number,
            PrimitiveKind::String => match field.format.as_deref() {
                Some("date") => Self::Date,
                Some("date-time") | Some("datetime") => Self::DatetimeLocal,
                Some("time") => Self::Time,
                Some("email") => Self::Email,
                Some("uri") | Some("url") => Self::Url,
                Some("password") => Self::Password,
                Some("textarea") => Self::Textarea,
                _ if field.constraints.max_length.is_some_and(|length| length > TEXTAREA_MIN_LENGTH) => Self::Textarea,
                _ => Self::Text,
            },
        }
    }

    /// Value of the HTML `type` attribute; `textarea` renders as its own element.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::DatetimeLocal => "datetime-local",
            Self::Time => "time",
            Self::Email => "email",
            Self::Url => "url",
            Self::Password => "password",
            Self::Textarea => "textarea",
        }
    }
}

/// Declarative event binding carried by interactive nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FormAction {
    /// Write a leaf value.
    SetValue { path: FieldPath, value: Value },
    /// Append a defaulted item to the array at `path`.
    AddItem { path: FieldPath },
    /// Remove the item `item` of the array at `path`.
    RemoveItem { path: FieldPath, item: ItemId },
    /// Select `variant` for the union at `path`.
    SelectVariant { path: FieldPath, variant: String },
}

impl FormAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetValue { .. } => "set-value",
            Self::AddItem { .. } => "add-item",
            Self::RemoveItem { .. } => "remove-item",
            Self::SelectVariant { .. } => "select-variant",
        }
    }

    pub fn path(&self) -> &FieldPath {
        match self {
            Self::SetValue { path, .. }
            | Self::AddItem { path }
            | Self::RemoveItem { path, .. }
            | Self::SelectVariant { path, .. } => path,
        }
    }

    /// `data-*` attributes encoding this action. `SetValue` carries no value
    /// attribute; the control's own value is read when the event fires.
    pub fn binding_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attributes = vec![("data-action", self.name().to_string()), ("data-path", self.path().dom_id())];
        match self {
            Self::RemoveItem { item, .. } => attributes.push(("data-item", item.to_string())),
            Self::SelectVariant { variant, .. } => attributes.push(("data-variant", variant.clone())),
            Self::SetValue { .. } | Self::AddItem { .. } => {}
        }
        attributes
    }

    /// Parses an action back from an element's `data-*` attributes. `value` is
    /// the control's current value: the new value for `set-value`, and the
    /// chosen label for a `select-variant` dropdown that carries no
    /// `data-variant` of its own.
    pub fn from_binding<'a>(attributes: impl IntoIterator<Item = (&'a str, &'a str)>, value: Option<&str>) -> Result<Self, FormError> {
        let mut action = None;
        let mut path = None;
        let mut item = None;
        let mut variant = None;
        for (name, attribute_value) in attributes {
            match name {
                "data-action" => action = Some(attribute_value),
                "data-path" => path = Some(attribute_value),
                "data-item" => item = Some(attribute_value),
                "data-variant" => variant = Some(attribute_value),
                _ => {}
            }
        }

        let action = action.ok_or_else(|| FormError::UnknownAction(String::new()))?;
        let path = FieldPath::parse(path.unwrap_or_default())?;
        match action {
            "set-value" => {
                let value = value.ok_or_else(|| FormError::MissingValue(action.to_string()))?;
                Ok(Self::SetValue {
                    path,
                    value: Value::String(value.to_string()),
                })
            }
            "add-item" => Ok(Self::AddItem { path }),
            "remove-item" => {
                let raw = item.ok_or_else(|| FormError::MissingValue(action.to_string()))?;
                let id = raw.parse::<u64>().map_err(|_| FormError::UnknownItem {
                    path: path.to_string(),
                    item: raw.to_string(),
                })?;
                Ok(Self::RemoveItem { path, item: ItemId(id) })
            }
            "select-variant" => {
                let variant = variant
                    .or(value)
                    .filter(|label| !label.is_empty())
                    .ok_or_else(|| FormError::MissingValue(action.to_string()))?;
                Ok(Self::SelectVariant {
                    path,
                    variant: variant.to_string(),
                })
            }
            other => Err(FormError::UnknownAction(other.to_string())),
        }
    }
}

/// Presentation data shared by every field node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMeta {
    pub path: FieldPath,
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    pub full_width: bool,
}

impl FieldMeta {
    /// DOM id of the field's control.
    pub fn dom_id(&self) -> String {
        self.path.dom_id()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputNode {
    pub meta: FieldMeta,
    pub input: InputKind,
    pub value: Option<Value>,
    pub nullable: bool,
    pub integer: bool,
    pub constraints: Constraints,
    pub on_change: FormAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectNode {
    pub meta: FieldMeta,
    pub options: Vec<SelectOption>,
    pub on_change: FormAction,
}

/// Nested model rendered inline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionNode {
    pub meta: FieldMeta,
    pub collapsible: bool,
    pub children: Vec<FormNode>,
}

/// One rendered item block of an array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayItemNode {
    pub id: ItemId,
    pub index: usize,
    pub path: FieldPath,
    pub title: String,
    pub remove: FormAction,
    pub children: Vec<FormNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayNode {
    pub meta: FieldMeta,
    pub item_title: String,
    pub items: Vec<ArrayItemNode>,
    pub add: FormAction,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl ArrayNode {
    /// True while another item may be added.
    pub fn can_add(&self) -> bool {
        self.max_items.is_none_or(|max| self.items.len() < max)
    }
}

/// One selectable alternative of a union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionOption {
    pub label: String,
    pub title: String,
    pub description: Option<String>,
    pub selected: bool,
    pub select: FormAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionNode {
    pub meta: FieldMeta,
    pub style: UnionStyle,
    pub options: Vec<UnionOption>,
    pub selected: Option<String>,
    pub body: Vec<FormNode>,
}

/// Visible placeholder for a field whose reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackNode {
    pub meta: FieldMeta,
    pub reference: String,
    pub message: String,
    pub value: Option<Value>,
    pub on_change: FormAction,
}

/// Element of the rendered component tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum FormNode {
    Section(SectionNode),
    Input(InputNode),
    Select(SelectNode),
    Array(ArrayNode),
    Union(UnionNode),
    Fallback(FallbackNode),
}

impl FormNode {
    pub fn meta(&self) -> &FieldMeta {
        match self {
            Self::Section(node) => &node.meta,
            Self::Input(node) => &node.meta,
            Self::Select(node) => &node.meta,
            Self::Array(node) => &node.meta,
            Self::Union(node) => &node.meta,
            Self::Fallback(node) => &node.meta,
        }
    }

    /// Depth-first search for the node rendered at `path`.
    pub fn find(&self, path: &FieldPath) -> Option<&FormNode> {
        if &self.meta().path == path {
            return Some(self);
        }
        self.children().find_map(|child| child.find(path))
    }

    /// Direct descendants, including array item contents and union bodies.
    pub fn children(&self) -> Box<dyn Iterator<Item = &FormNode> + '_> {
        match self {
            Self::Section(node) => Box::new(node.children.iter()),
            Self::Array(node) => Box::new(node.items.iter().flat_map(|item| item.children.iter())),
            Self::Union(node) => Box::new(node.body.iter()),
            Self::Input(_) | Self::Select(_) | Self::Fallback(_) => Box::new(std::iter::empty()),
        }
    }
}

/// Finds the node at `path` among top-level `nodes`.
pub fn find_node<'a>(nodes: &'a [FormNode], path: &FieldPath) -> Option<&'a FormNode> {
    nodes.iter().find_map(|node| node.find(path))
}
