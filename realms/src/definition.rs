//! Node definitions: the kind, default value and keyed functions of a realm.
//!
//! The runtime only ever looks these tables up by key. Richer authoring
//! layers are expected to build [`NodeDefinition`]s rather than extend them.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::context::{MutationContext, ReadContext};
use crate::core::path::Fragment;
use crate::core::value::Value;
use crate::storage::{SliceCell, StorageCell};

pub type MutationFn = Rc<dyn Fn(&MutationContext<'_>) -> anyhow::Result<Value>>;
pub type SelectorFn = Rc<dyn Fn(&ReadContext<'_>) -> anyhow::Result<Value>>;
pub type DefaultFn = Rc<dyn Fn() -> Value>;

/// Fragment under which a wrapper exposes its single child.
pub const WRAPPED_FRAGMENT: &str = "inner";

/// Closed set of realm shapes.
#[derive(Clone)]
pub enum NodeKind {
    /// No children.
    Leaf,
    /// Fixed named fields, each a child at a string fragment.
    Record(Vec<(String, Rc<NodeDefinition>)>),
    /// Homogeneous items, each a child at an integer fragment.
    List(Rc<NodeDefinition>),
    /// One pass-through child sharing this realm's storage cell.
    Wrapper(Rc<NodeDefinition>),
}

/// Blueprint for one child realm.
pub struct ChildSpec {
    pub fragment: Fragment,
    pub definition: Rc<NodeDefinition>,
    pub cell: Rc<dyn StorageCell>,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Leaf => "leaf",
            NodeKind::Record(_) => "record",
            NodeKind::List(_) => "list",
            NodeKind::Wrapper(_) => "wrapper",
        }
    }

    /// Children are interchangeable siblings.
    pub fn is_divergent(&self) -> bool {
        matches!(self, NodeKind::List(_))
    }

    /// Children to create for a realm of this kind holding `value` in `cell`.
    pub fn child_specs(&self, value: &Value, cell: &Rc<dyn StorageCell>) -> Vec<ChildSpec> {
        match self {
            NodeKind::Leaf => Vec::new(),
            NodeKind::Record(fields) => fields
                .iter()
                .map(|(name, definition)| {
                    slice_spec(cell, Fragment::from(name.as_str()), definition)
                })
                .collect(),
            NodeKind::List(item) => (0..value.len())
                .map(|index| slice_spec(cell, Fragment::from(index), item))
                .collect(),
            NodeKind::Wrapper(inner) => vec![ChildSpec {
                fragment: Fragment::from(WRAPPED_FRAGMENT),
                definition: inner.clone(),
                cell: cell.clone(),
            }],
        }
    }
}

pub(crate) fn slice_spec(
    cell: &Rc<dyn StorageCell>,
    fragment: Fragment,
    definition: &Rc<NodeDefinition>,
) -> ChildSpec {
    ChildSpec {
        cell: Rc::new(SliceCell::new(cell.clone(), fragment.clone())),
        fragment,
        definition: definition.clone(),
    }
}

pub struct NodeDefinition {
    name: String,
    kind: NodeKind,
    default: DefaultFn,
    mutations: HashMap<String, MutationFn>,
    selectors: HashMap<String, SelectorFn>,
}

impl NodeDefinition {
    fn with_kind(name: impl Into<String>, kind: NodeKind, default: DefaultFn) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            mutations: HashMap::new(),
            selectors: HashMap::new(),
        }
    }

    pub fn leaf(name: impl Into<String>, default: Value) -> Self {
        Self::with_kind(name, NodeKind::Leaf, Rc::new(move || default.clone()))
    }

    /// Record whose default is assembled from each field's default.
    pub fn record<K: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, NodeDefinition)>,
    ) -> Self {
        let fields: Vec<(String, Rc<NodeDefinition>)> = fields
            .into_iter()
            .map(|(key, definition)| (key.into(), Rc::new(definition)))
            .collect();
        let defaults = fields.clone();
        let default: DefaultFn = Rc::new(move || {
            Value::record(
                defaults
                    .iter()
                    .map(|(key, definition)| (key.clone(), definition.default_value())),
            )
        });
        Self::with_kind(name, NodeKind::Record(fields), default)
    }

    pub fn list(name: impl Into<String>, item: NodeDefinition) -> Self {
        Self::with_kind(
            name,
            NodeKind::List(Rc::new(item)),
            Rc::new(|| Value::list(Vec::new())),
        )
    }

    pub fn wrapper(name: impl Into<String>, inner: NodeDefinition) -> Self {
        let inner = Rc::new(inner);
        let defaults = inner.clone();
        Self::with_kind(
            name,
            NodeKind::Wrapper(inner),
            Rc::new(move || defaults.default_value()),
        )
    }

    pub fn with_default(mut self, default: impl Fn() -> Value + 'static) -> Self {
        self.default = Rc::new(default);
        self
    }

    pub fn mutation(
        mut self,
        key: impl Into<String>,
        mutation: impl Fn(&MutationContext<'_>) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        self.mutations.insert(key.into(), Rc::new(mutation));
        self
    }

    pub fn selector(
        mut self,
        name: impl Into<String>,
        selector: impl Fn(&ReadContext<'_>) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        self.selectors.insert(name.into(), Rc::new(selector));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn default_value(&self) -> Value {
        (self.default)()
    }

    pub fn find_mutation(&self, key: &str) -> Option<&MutationFn> {
        self.mutations.get(key)
    }

    pub fn find_selector(&self, name: &str) -> Option<&SelectorFn> {
        self.selectors.get(name)
    }
}

impl fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut mutations: Vec<&String> = self.mutations.keys().collect();
        mutations.sort();
        let mut selectors: Vec<&String> = self.selectors.keys().collect();
        selectors.sort();
        f.debug_struct("NodeDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field("mutations", &mutations)
            .field("selectors", &selectors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RootCell;

    #[test]
    fn record_default_collects_field_defaults() {
        let definition = NodeDefinition::record(
            "app",
            [
                ("count", NodeDefinition::leaf("count", Value::Int(0))),
                (
                    "items",
                    NodeDefinition::list("items", NodeDefinition::leaf("item", Value::Null)),
                ),
            ],
        );

        assert_eq!(
            definition.default_value().to_json(),
            serde_json::json!({"count": 0, "items": []})
        );
    }

    #[test]
    fn list_specs_follow_current_length() {
        let kind = NodeKind::List(Rc::new(NodeDefinition::leaf("item", Value::Null)));
        let value = Value::list([Value::Int(1), Value::Int(2)]);
        let cell: Rc<dyn StorageCell> = Rc::new(RootCell::new(value.clone()));

        let specs = kind.child_specs(&value, &cell);
        let fragments: Vec<Fragment> = specs.iter().map(|s| s.fragment.clone()).collect();
        assert_eq!(fragments, vec![Fragment::Int(0), Fragment::Int(1)]);
        assert_eq!(specs[1].cell.get(), Value::Int(2));
    }

    #[test]
    fn wrapper_child_shares_the_cell() {
        let kind = NodeKind::Wrapper(Rc::new(NodeDefinition::leaf("inner", Value::Int(1))));
        let cell: Rc<dyn StorageCell> = Rc::new(RootCell::new(Value::Int(1)));

        let specs = kind.child_specs(&Value::Int(1), &cell);
        assert_eq!(specs.len(), 1);
        assert!(Rc::ptr_eq(&specs[0].cell, &cell));
    }

    #[test]
    fn lookups_are_by_key() {
        let definition = NodeDefinition::leaf("flag", Value::Bool(false))
            .mutation("toggle", |ctx| Ok(Value::Bool(!ctx.value().as_bool().unwrap_or(false))))
            .selector("is_on", |ctx| Ok(ctx.value()));

        assert!(definition.find_mutation("toggle").is_some());
        assert!(definition.find_mutation("missing").is_none());
        assert!(definition.find_selector("is_on").is_some());
        assert!(format!("{definition:?}").contains("toggle"));
    }
}
