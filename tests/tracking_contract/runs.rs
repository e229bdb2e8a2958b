//! Run lifecycle: creation, status transitions, soft delete, purge.

use crate::common::*;
use mlmd_graph::NodeKind;
use mlmdstore::{
    CreateRun, ErrorCode, LifecycleStage, Metric, Param, RunStatus, RunTag, TrackingStore,
    ViewType, RUN_NAME_TAG,
};

#[test]
fn test_create_then_get_is_running_and_active() {
    let (store, _graph) = store();
    let (_, created) = experiment_with_run(&store, "exp");
    let run = store.get_run(&created.info.run_id).unwrap();
    assert_eq!(run.info.status, RunStatus::Running);
    assert_eq!(run.info.lifecycle_stage, LifecycleStage::Active);
    assert_eq!(run.info.end_time, None);
    assert_eq!(run.info.user_id, "alice");
}

#[test]
fn test_run_name_from_request_or_tag() {
    let (store, _graph) = store();
    let exp = store.create_experiment("exp", None, &[]).unwrap();

    let named = store
        .create_run(CreateRun::in_experiment(exp.as_str()).named("baseline"))
        .unwrap();
    assert_eq!(named.info.run_name, "baseline");
    assert_eq!(named.data.tags[RUN_NAME_TAG], "baseline");

    let tagged = store
        .create_run(CreateRun::in_experiment(exp.as_str()).tag(RUN_NAME_TAG, "from-tag"))
        .unwrap();
    assert_eq!(tagged.info.run_name, "from-tag");
}

#[test]
fn test_terminal_status_is_final() {
    let (store, _graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();

    let info = store
        .update_run_info(run_id, RunStatus::Finished, Some(5_000), None)
        .unwrap();
    assert_eq!(info.status, RunStatus::Finished);
    assert_eq!(info.end_time, Some(5_000));
    assert_eq!(store.get_run(run_id).unwrap().info.end_time, Some(5_000));

    let err = store
        .update_run_info(run_id, RunStatus::Running, None, None)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);

    // metrics and params are rejected, tags still accepted
    assert_eq!(
        store
            .log_metric(run_id, &Metric::new("m", 1.0, 1, 0))
            .unwrap_err()
            .code(),
        ErrorCode::InvalidState
    );
    assert_eq!(
        store
            .log_param(run_id, &Param::new("p", "1"))
            .unwrap_err()
            .code(),
        ErrorCode::InvalidState
    );
    store.set_tag(run_id, &RunTag::new("note", "done")).unwrap();
}

#[test]
fn test_scheduled_can_start_running() {
    let (store, _graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();
    store
        .update_run_info(run_id, RunStatus::Scheduled, None, None)
        .unwrap();
    let info = store
        .update_run_info(run_id, RunStatus::Running, None, Some("second-try"))
        .unwrap();
    assert_eq!(info.status, RunStatus::Running);
    assert_eq!(info.end_time, None);

    let run = store.get_run(run_id).unwrap();
    assert_eq!(run.info.run_name, "second-try");
    assert_eq!(run.data.tags[RUN_NAME_TAG], "second-try");
}

#[test]
fn test_deleted_run_rejects_writes_until_restored() {
    let (store, _graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();

    store.delete_run(run_id).unwrap();
    let err = store
        .log_metric(run_id, &Metric::new("loss", 0.1, 1, 0))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceDoesNotExist);
    assert_eq!(
        store.get_run(run_id).unwrap().info.lifecycle_stage,
        LifecycleStage::Deleted
    );

    store.restore_run(run_id).unwrap();
    store
        .log_metric(run_id, &Metric::new("loss", 0.1, 1, 0))
        .unwrap();
    assert_eq!(store.get_run(run_id).unwrap().data.metrics["loss"].value, 0.1);
}

#[test]
fn test_list_run_infos_by_view() {
    let (store, _graph) = store();
    let exp = store.create_experiment("exp", None, &[]).unwrap();
    let ids: Vec<String> = (0..3)
        .map(|i| {
            store
                .create_run(CreateRun::in_experiment(exp.as_str()).start_time(i))
                .unwrap()
                .info
                .run_id
        })
        .collect();
    store.delete_run(&ids[1]).unwrap();

    let active = store.list_run_infos(&exp, ViewType::ActiveOnly).unwrap();
    assert_eq!(active.len(), 2);
    let deleted = store.list_run_infos(&exp, ViewType::DeletedOnly).unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].run_id, ids[1]);
    assert_eq!(store.list_run_infos(&exp, ViewType::All).unwrap().len(), 3);
}

#[test]
fn test_purge_run() {
    let (store, graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();

    assert_eq!(
        store.purge_run(run_id).unwrap_err().code(),
        ErrorCode::InvalidState
    );
    store.delete_run(run_id).unwrap();
    store.purge_run(run_id).unwrap();
    assert_eq!(
        store.get_run(run_id).unwrap_err().code(),
        ErrorCode::ResourceDoesNotExist
    );
    assert_eq!(graph.count(NodeKind::Run), 0);
    assert_eq!(graph.count(NodeKind::Execution), 0);
}

#[test]
fn test_unknown_run_is_not_found() {
    let (store, _graph) = store();
    for err in [
        store.get_run("0123456789abcdef").unwrap_err(),
        store.delete_run("0123456789abcdef").unwrap_err(),
        store
            .log_param("0123456789abcdef", &Param::new("a", "b"))
            .unwrap_err(),
    ] {
        assert_eq!(err.code(), ErrorCode::ResourceDoesNotExist);
    }
}
