//! Test-only helpers for building node definitions.

use anyhow::anyhow;

use crate::core::path::{Fragment, Path};
use crate::core::value::Value;
use crate::definition::NodeDefinition;
use crate::demo::counter_definition;

/// The demo counter plus a `noop` action (returns the stored value) and a
/// `fail` action (always errors).
pub fn counter_app() -> NodeDefinition {
    counter_definition()
        .mutation("noop", |ctx| Ok(ctx.value()))
        .mutation("fail", |ctx| Err(anyhow!("refusing to touch {}", ctx.path())))
}

/// List of string leaves with `push` and `pop` actions.
pub fn todo_list() -> NodeDefinition {
    NodeDefinition::list("todos", NodeDefinition::leaf("todo", Value::from("")))
        .mutation("push", |ctx| {
            let items = ctx.value();
            Ok(items.with_child(&Fragment::from(items.len()), ctx.arg(0)?.clone())?)
        })
        .mutation("pop", |ctx| {
            let items = ctx.value();
            let kept = items.as_list().unwrap_or_default();
            Ok(Value::list(kept.iter().take(kept.len().saturating_sub(1)).cloned()))
        })
}

/// Wrapper around a single integer leaf with a `set` action on the wrapper.
pub fn wrapped_counter() -> NodeDefinition {
    NodeDefinition::wrapper("boxed", NodeDefinition::leaf("value", Value::Int(0)))
        .mutation("set", |ctx| Ok(ctx.arg(0)?.clone()))
}

/// Path from mixed string and index fragments.
pub fn path_of(fragments: impl IntoIterator<Item = Fragment>) -> Path {
    fragments.into_iter().collect()
}
