//! Experiment lifecycle: create, lookup, rename, tags, delete, restore, purge.

use crate::common::*;
use mlmd_graph::{NodeKind, NodePredicate};
use mlmdstore::{
    CreateRun, ErrorCode, ExperimentTag, GraphClient, LifecycleStage, TrackingStore, ViewType,
    DEFAULT_EXPERIMENT_ID, DEFAULT_EXPERIMENT_NAME,
};

#[test]
fn test_duplicate_active_name_leaves_one_workspace() {
    let (store, graph) = store();
    let first = store.create_experiment("mnist", None, &[]).unwrap();
    let err = store.create_experiment("mnist", None, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceAlreadyExists);

    let nodes = graph
        .query(
            &NodePredicate::kind(NodeKind::Workspace).with_name("mnist"),
            &Default::default(),
        )
        .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(store.get_experiment(&first).unwrap().name, "mnist");
}

#[test]
fn test_get_by_id_and_name() {
    let (store, _graph) = store();
    let tags = [ExperimentTag::new("team", "vision")];
    let id = store.create_experiment("cifar", None, &tags).unwrap();

    let by_id = store.get_experiment(&id).unwrap();
    assert_eq!(by_id.tags.get("team").map(String::as_str), Some("vision"));
    assert!(by_id.creation_time.is_some());

    let by_name = store.get_experiment_by_name("cifar").unwrap().unwrap();
    assert_eq!(by_name, by_id);
    assert!(store.get_experiment_by_name("nope").unwrap().is_none());

    let err = store.get_experiment("missing-id").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceDoesNotExist);
}

#[test]
fn test_lookup_survives_fresh_store_over_same_graph() {
    let (store, graph) = store();
    let id = store.create_experiment("persisted", None, &[]).unwrap();
    drop(store);

    let reopened = mlmdstore::GraphTrackingStore::new(graph);
    assert_eq!(reopened.get_experiment(&id).unwrap().name, "persisted");
}

#[test]
fn test_delete_restore_and_views() {
    let (store, _graph) = store();
    let keep = store.create_experiment("keep", None, &[]).unwrap();
    let gone = store.create_experiment("gone", None, &[]).unwrap();
    store.delete_experiment(&gone).unwrap();
    store.delete_experiment(&gone).unwrap();

    let active: Vec<String> = store
        .list_experiments(ViewType::ActiveOnly)
        .unwrap()
        .into_iter()
        .map(|e| e.experiment_id)
        .collect();
    assert!(active.contains(&keep));
    assert!(active.contains(&DEFAULT_EXPERIMENT_ID.to_string()));
    assert!(!active.contains(&gone));

    let deleted = store.list_experiments(ViewType::DeletedOnly).unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].lifecycle_stage, LifecycleStage::Deleted);

    let err = store
        .create_run(CreateRun::in_experiment(gone.as_str()))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);

    store.restore_experiment(&gone).unwrap();
    assert!(store.create_run(CreateRun::in_experiment(gone)).is_ok());
}

#[test]
fn test_rename() {
    let (store, _graph) = store();
    let a = store.create_experiment("a", None, &[]).unwrap();
    store.create_experiment("b", None, &[]).unwrap();

    let err = store.rename_experiment(&a, "b").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceAlreadyExists);

    store.rename_experiment(&a, "c").unwrap();
    assert_eq!(store.get_experiment(&a).unwrap().name, "c");
    assert!(store.get_experiment_by_name("a").unwrap().is_none());
    assert!(store.create_experiment("a", None, &[]).is_ok());
}

#[test]
fn test_experiment_tag_overwrites() {
    let (store, _graph) = store();
    let id = store.create_experiment("tagged", None, &[]).unwrap();
    store
        .set_experiment_tag(&id, &ExperimentTag::new("owner", "ann"))
        .unwrap();
    store
        .set_experiment_tag(&id, &ExperimentTag::new("owner", "bo"))
        .unwrap();
    assert_eq!(
        store.get_experiment(&id).unwrap().tags.get("owner").map(String::as_str),
        Some("bo")
    );

    store.delete_experiment(&id).unwrap();
    let err = store
        .set_experiment_tag(&id, &ExperimentTag::new("owner", "cy"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);
}

#[test]
fn test_purge_requires_delete_and_cascades() {
    let (store, graph) = store();
    let (id, run) = experiment_with_run(&store, "doomed");
    store
        .log_metric(&run.info.run_id, &mlmdstore::Metric::new("m", 1.0, 1, 0))
        .unwrap();

    let err = store.purge_experiment(&id).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);

    store.delete_experiment(&id).unwrap();
    store.purge_experiment(&id).unwrap();
    assert_eq!(
        store.get_experiment(&id).unwrap_err().code(),
        ErrorCode::ResourceDoesNotExist
    );
    assert_eq!(
        store.get_run(&run.info.run_id).unwrap_err().code(),
        ErrorCode::ResourceDoesNotExist
    );
    assert_eq!(graph.count(NodeKind::Run), 0);
    assert_eq!(graph.count(NodeKind::Artifact), 0);
}

#[test]
fn test_default_experiment_is_protected() {
    let (store, _graph) = store();
    store.get_experiment(DEFAULT_EXPERIMENT_ID).unwrap();
    assert_eq!(
        store.delete_experiment(DEFAULT_EXPERIMENT_ID).unwrap_err().code(),
        ErrorCode::InvalidParameterValue
    );
    assert_eq!(
        store.purge_experiment(DEFAULT_EXPERIMENT_ID).unwrap_err().code(),
        ErrorCode::InvalidParameterValue
    );
}

#[test]
fn test_default_name_is_reserved_for_default_experiment() {
    let (store, graph) = store();
    let err = store
        .create_experiment(DEFAULT_EXPERIMENT_NAME, None, &[])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceAlreadyExists);

    let other = store.create_experiment("other", None, &[]).unwrap();
    let err = store
        .rename_experiment(&other, DEFAULT_EXPERIMENT_NAME)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceAlreadyExists);

    let listed = store.list_experiments(ViewType::All).unwrap();
    assert_eq!(listed.len(), 2);
    let run = store.create_run(CreateRun::default()).unwrap();
    assert_eq!(run.info.experiment_id, DEFAULT_EXPERIMENT_ID);
    assert_eq!(
        store.get_experiment(DEFAULT_EXPERIMENT_ID).unwrap().name,
        DEFAULT_EXPERIMENT_NAME
    );
    assert_eq!(graph.count(NodeKind::Workspace), 2);
}

#[test]
fn test_default_experiment_found_by_name_on_fresh_store() {
    let (store, _graph) = store();
    let by_name = store
        .get_experiment_by_name(DEFAULT_EXPERIMENT_NAME)
        .unwrap()
        .unwrap();
    assert_eq!(by_name.experiment_id, DEFAULT_EXPERIMENT_ID);
    assert_eq!(store.get_experiment(DEFAULT_EXPERIMENT_ID).unwrap(), by_name);
}

#[test]
fn test_unsupported_updates_report_not_implemented() {
    init_tracing();
    let store = mlmdstore::GraphTrackingStore::new(CreateOnlyGraph(
        mlmd_graph::InMemoryGraph::new(),
    ));
    let id = store.create_experiment("basic", None, &[]).unwrap();
    let run = store.create_run(CreateRun::in_experiment(id.as_str())).unwrap();

    assert_eq!(
        store.delete_experiment(&id).unwrap_err().code(),
        ErrorCode::NotImplemented
    );
    assert_eq!(
        store.delete_run(&run.info.run_id).unwrap_err().code(),
        ErrorCode::NotImplemented
    );
    // Logging only creates nodes and keeps working
    store
        .log_param(&run.info.run_id, &mlmdstore::Param::new("k", "v"))
        .unwrap();
}
