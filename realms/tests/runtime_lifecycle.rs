//! End-to-end runtime scenarios: mount, dispatch, structural change,
//! revocation and audit invalidation through the public API.

use std::rc::Rc;

use realms::storage::{RootCell, StorageCell};
use realms::test_support::{counter_app, path_of, todo_list, wrapped_counter};
use realms::{
    AccessError, Action, Fragment, MountStatus, Path, RealmError, Runtime, StructuralError, Value,
};

fn app(fragments: &[&str]) -> Path {
    fragments.iter().map(|f| Fragment::from(*f)).collect()
}

#[test]
fn increment_scenario_alters_root_and_count() {
    let mut runtime = Runtime::new();
    let root = runtime.mount("app", counter_app(), None).expect("mount");
    let count = runtime.resolve(&app(&["app", "count"])).expect("count");

    let report = runtime
        .dispatch(Action::new(app(&["app"]), "increment"))
        .expect("dispatch");

    assert_eq!(
        runtime.value_at(&app(&["app", "count"])).expect("value"),
        Value::Int(1)
    );
    assert!(report.altered.contains(&root.id()));
    assert!(report.altered.contains(&count.id()));
    assert_eq!(report.altered[0], root.id());
}

#[test]
fn external_cell_sees_committed_writes() {
    let cell = Rc::new(RootCell::new(Value::record([
        ("count", Value::Int(41)),
        ("history", Value::list(Vec::new())),
    ])));
    let mut runtime = Runtime::new();
    runtime
        .mount_with_cell("app", counter_app(), cell.clone())
        .expect("mount");

    runtime
        .dispatch(Action::new(app(&["app"]), "increment"))
        .expect("dispatch");

    assert_eq!(cell.get().to_json(), serde_json::json!({"count": 42, "history": [42]}));
}

#[test]
fn list_items_follow_length_changes() {
    let mut runtime = Runtime::new();
    runtime.mount("todos", todo_list(), None).expect("mount");

    for item in ["a", "b", "c"] {
        runtime
            .dispatch(Action::new(app(&["todos"]), "push").with_arg(item))
            .expect("push");
    }
    let last = path_of([Fragment::from("todos"), Fragment::from(2_usize)]);
    let handle = runtime.resolve(&last).expect("third item");
    assert_eq!(runtime.value(handle.id()).expect("value"), Value::from("c"));

    let report = runtime
        .dispatch(Action::new(app(&["todos"]), "pop"))
        .expect("pop");
    assert_eq!(report.unmounted, vec![handle.id()]);
    assert_eq!(
        runtime.status(handle.id()).expect("status"),
        MountStatus::Unmounted
    );
    assert!(matches!(
        runtime.resolve(&last),
        Err(RealmError::Structural(StructuralError::MissingChild { .. }))
    ));
}

#[test]
fn wrapper_child_shares_the_wrapper_value() {
    let mut runtime = Runtime::new();
    runtime.mount("boxed", wrapped_counter(), None).expect("mount");
    let inner = runtime
        .resolve(&app(&["boxed", "inner"]))
        .expect("inner");

    let report = runtime
        .dispatch(Action::new(app(&["boxed"]), "set").with_arg(7_i64))
        .expect("set");

    assert!(report.altered.contains(&inner.id()));
    assert_eq!(runtime.value(inner.id()).expect("value"), Value::Int(7));
}

#[test]
fn unmount_revokes_every_handle() {
    let mut runtime = Runtime::new();
    let root = runtime.mount("app", counter_app(), None).expect("mount");
    let count = runtime.resolve(&app(&["app", "count"])).expect("count");

    let report = runtime.unmount("app").expect("unmount");

    assert_eq!(report.unmounted.len(), 3);
    for id in [root.id(), count.id()] {
        let err = runtime.value(id).expect_err("revoked");
        assert!(matches!(err, RealmError::Access(AccessError::Unmounted { .. })));
    }
    assert_eq!(runtime.realm_count(), 0);
    assert!(runtime.mounts().is_empty());
    assert!(matches!(
        runtime.dispatch(Action::new(&count, "set").with_arg(1_i64)),
        Err(RealmError::Structural(StructuralError::UnknownMount { .. }))
    ));
    assert!(matches!(
        runtime.unmount("app"),
        Err(RealmError::Structural(StructuralError::UnknownMount { .. }))
    ));
}

#[test]
fn failing_mutation_leaves_state_and_coordinator_clean() {
    let mut runtime = Runtime::new();
    let root = runtime.mount("app", counter_app(), None).expect("mount");
    let before = runtime.value(root.id()).expect("value");

    let err = runtime
        .dispatch(Action::new(&root, "fail"))
        .expect_err("fails");
    assert!(format!("{:#}", anyhow::Error::new(err)).contains("refusing to touch"));
    assert!(runtime.value(root.id()).expect("value").same(&before));

    let report = runtime
        .dispatch(Action::new(&root, "increment"))
        .expect("next dispatch");
    assert!(report.changed);
}

#[test]
fn overlapping_audits_share_paths_until_last_release() {
    let mut runtime = Runtime::new();
    let root = runtime.mount("app", counter_app(), None).expect("mount");

    let recorder = runtime.start_audit().expect("start");
    runtime.select(&root, "doubled", &[]).expect("doubled");
    let first = runtime.finish_audit(recorder).expect("finish");

    let recorder = runtime.start_audit().expect("start");
    runtime.value_at(&app(&["app", "count"])).expect("count");
    let second = runtime.finish_audit(recorder).expect("finish");
    let shared = runtime.share(&second).expect("share");

    assert_eq!(runtime.catalyst().interner().len(), 1);
    runtime.release(first).expect("release first");
    runtime.release(second).expect("release second");
    assert_eq!(runtime.catalyst().interner().len(), 1);
    runtime.release(shared).expect("release shared");
    assert!(runtime.catalyst().interner().is_empty());
}

#[test]
fn unrelated_commit_does_not_invalidate_audit() {
    let mut runtime = Runtime::new();
    runtime.mount("app", counter_app(), None).expect("mount");
    runtime.mount("todos", todo_list(), None).expect("mount");

    let recorder = runtime.start_audit().expect("start");
    runtime.value_at(&app(&["app", "count"])).expect("count");
    let subscription = runtime.finish_audit(recorder).expect("finish");

    let report = runtime
        .dispatch(Action::new(app(&["todos"]), "push").with_arg("x"))
        .expect("push");
    assert!(runtime.affected_audits(&report).is_empty());

    runtime.release(subscription).expect("release");
}

#[test]
fn nested_audit_is_rejected() {
    let runtime = Runtime::new();
    let recorder = runtime.start_audit().expect("start");
    assert!(matches!(
        runtime.start_audit(),
        Err(RealmError::Audit(realms::AuditError::AlreadyRecording))
    ));
    drop(recorder);
}

#[test]
fn audit_over_untouched_sibling_survives_commit() {
    let mut runtime = Runtime::new();
    runtime.mount("app", counter_app(), None).expect("mount");
    let history_before = runtime
        .value_at(&app(&["app", "history"]))
        .expect("history");

    let recorder = runtime.start_audit().expect("start");
    runtime
        .value_at(&app(&["app", "history"]))
        .expect("history");
    let subscription = runtime.finish_audit(recorder).expect("finish");

    let report = runtime
        .dispatch(Action::new(app(&["app", "count"]), "set").with_arg(9_i64))
        .expect("set count");
    assert!(runtime
        .value_at(&app(&["app", "history"]))
        .expect("history")
        .same(&history_before));
    assert_eq!(
        report.altered_paths,
        vec![app(&["app", "count"]), app(&["app"])]
    );
    assert!(runtime.affected_audits(&report).is_empty());

    let report = runtime
        .dispatch(Action::new(app(&["app", "history"]), "append").with_arg(1_i64))
        .expect("append");
    assert_eq!(
        runtime.affected_audits(&report),
        vec![subscription.audit()]
    );

    runtime.release(subscription).expect("release");
}
