//! Built-in counter app driven by `realms demo`.

use anyhow::{Context, Result, anyhow};
use serde_json::json;

use crate::core::path::Fragment;
use crate::core::value::Value;
use crate::definition::NodeDefinition;
use crate::io::config::RuntimeConfig;
use crate::runtime::{Action, Runtime};

/// Mount id used by the demo.
pub const DEMO_MOUNT: &str = "counter";

/// Record with a `count` leaf and a `history` list of every count reached.
///
/// Actions on the record: `increment`, `reset`. On `count`: `set`. On
/// `history`: `append`. Selector on the record: `doubled`.
pub fn counter_definition() -> NodeDefinition {
    let count = NodeDefinition::leaf("count", Value::Int(0)).mutation("set", |ctx| Ok(ctx.arg(0)?.clone()));
    let history = NodeDefinition::list("history", NodeDefinition::leaf("entry", Value::Null))
        .mutation("append", |ctx| {
            let history = ctx.value();
            Ok(history.with_child(&Fragment::from(history.len()), ctx.arg(0)?.clone())?)
        });

    NodeDefinition::record("counter", [("count", count), ("history", history)])
        .mutation("increment", |ctx| {
            let count = ctx
                .read(["count"])
                .as_i64()
                .ok_or_else(|| anyhow!("count at {} is not an integer", ctx.path()))?
                + 1;
            let history = ctx.read(["history"]);
            let history = history.with_child(&Fragment::from(history.len()), Value::Int(count))?;
            Ok(ctx
                .value()
                .with_child(&Fragment::from("count"), Value::Int(count))?
                .with_child(&Fragment::from("history"), history)?)
        })
        .mutation("reset", |ctx| {
            Ok(ctx
                .value()
                .with_child(&Fragment::from("count"), Value::Int(0))?
                .with_child(&Fragment::from("history"), Value::list(Vec::new()))?)
        })
        .selector("doubled", |ctx| {
            let count = ctx
                .read(["count"])
                .as_i64()
                .ok_or_else(|| anyhow!("count at {} is not an integer", ctx.path()))?;
            Ok(Value::Int(count * 2))
        })
}

/// Mount the counter, increment it `steps` times and report every commit.
///
/// A single audit over the `doubled` selector is held for the whole run, so
/// each commit also reports whether it invalidated that audit.
pub fn run_demo(steps: usize, config: RuntimeConfig) -> Result<serde_json::Value> {
    let mut runtime = Runtime::with_config(config);
    let root = runtime
        .mount(DEMO_MOUNT, counter_definition(), None)
        .context("mount counter app")?;

    let recorder = runtime.start_audit()?;
    let doubled = runtime.select(&root, "doubled", &[]);
    let subscription = match doubled {
        Ok(_) => runtime.finish_audit(recorder)?,
        Err(err) => {
            runtime.cancel_audit(recorder)?;
            return Err(err).context("audit doubled selector");
        }
    };

    let mut commits = Vec::with_capacity(steps);
    for step in 1..=steps {
        let report = runtime
            .dispatch(Action::new(&root, "increment"))
            .with_context(|| format!("increment step {step}"))?;
        let invalidated = !runtime.affected_audits(&report).is_empty();
        commits.push(json!({
            "step": step,
            "altered": report.altered_paths.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "mounted": report.mounted.len(),
            "unmounted": report.unmounted.len(),
            "invalidated": invalidated,
        }));
    }

    let value = runtime.value(root.id())?;
    let doubled = runtime.select(&root, "doubled", &[])?;
    let realms = runtime.realm_count();
    runtime.release(subscription)?;

    Ok(json!({
        "mount": DEMO_MOUNT,
        "steps": steps,
        "value": value.to_json(),
        "doubled": doubled.to_json(),
        "realms": realms,
        "commits": commits,
    }))
}
