//! Logging semantics: metric history, current values, params, tags, batches.

use crate::common::*;
use mlmd_graph::NodeKind;
use mlmdstore::{ErrorCode, Metric, Param, RunTag, TrackingStore};
use proptest::prelude::*;

#[test]
fn test_current_value_is_latest_then_max() {
    let (store, _graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();
    for (t, v) in [(1, 0.9), (2, 0.5), (2, 0.4)] {
        store.log_metric(run_id, &Metric::new("loss", v, t, 0)).unwrap();
    }
    assert_eq!(store.get_run(run_id).unwrap().data.metrics["loss"].value, 0.5);
}

#[test]
fn test_history_spans_every_logging_call() {
    let (store, graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();
    store
        .log_batch(
            run_id,
            &[Metric::new("acc", 0.1, 30, 3), Metric::new("acc", 0.2, 10, 1)],
            &[],
            &[],
        )
        .unwrap();
    store.log_metric(run_id, &Metric::new("acc", 0.3, 20, 2)).unwrap();

    let steps: Vec<i64> = store
        .get_metric_history(run_id, "acc")
        .unwrap()
        .iter()
        .map(|m| m.step)
        .collect();
    assert_eq!(steps, vec![1, 2, 3]);
    assert!(store.get_metric_history(run_id, "other").unwrap().is_empty());
    assert!(!store.get_run(run_id).unwrap().data.metrics.contains_key("other"));

    // one execution for create_run, one per logging call
    assert_eq!(graph.count(NodeKind::Execution), 3);
}

#[test]
fn test_param_immutable_tag_overwritable() {
    let (store, _graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();

    store.log_param(run_id, &Param::new("lr", "0.01")).unwrap();
    let err = store.log_param(run_id, &Param::new("lr", "0.02")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameterValue);

    store.set_tag(run_id, &RunTag::new("stage", "a")).unwrap();
    store.set_tag(run_id, &RunTag::new("stage", "b")).unwrap();

    let data = store.get_run(run_id).unwrap().data;
    assert_eq!(data.params["lr"], "0.01");
    assert_eq!(data.tags["stage"], "b");
}

#[test]
fn test_rejected_batch_writes_nothing() {
    let (store, graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();
    store.log_param(run_id, &Param::new("lr", "0.01")).unwrap();
    let before = graph.count(NodeKind::Artifact);

    let err = store
        .log_batch(
            run_id,
            &[Metric::new("loss", 1.0, 1, 0)],
            &[Param::new("lr", "0.5")],
            &[RunTag::new("t", "v")],
        )
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
    assert_eq!(graph.count(NodeKind::Artifact), before);
}

#[test]
fn test_batch_limits() {
    let (store, _graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let run_id = run.info.run_id.as_str();

    let params: Vec<Param> = (0..101).map(|i| Param::new(format!("p{}", i), "v")).collect();
    let err = store.log_batch(run_id, &[], &params, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameterValue);

    let dupes = [Param::new("k", "1"), Param::new("k", "2")];
    let err = store.log_batch(run_id, &[], &dupes, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameterValue);

    let metrics: Vec<Metric> = (0..1000).map(|i| Metric::new("m", i as f64, i, i)).collect();
    store.log_batch(run_id, &metrics, &[], &[]).unwrap();
    assert_eq!(store.get_metric_history(run_id, "m").unwrap().len(), 1000);
}

#[test]
fn test_empty_batch_is_noop() {
    let (store, graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let executions = graph.count(NodeKind::Execution);
    store.log_batch(&run.info.run_id, &[], &[], &[]).unwrap();
    assert_eq!(graph.count(NodeKind::Execution), executions);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_history_sorted_and_complete(
        points in prop::collection::vec((0i64..20, -5.0f64..5.0), 1..40)
    ) {
        let (store, _graph) = store();
        let (_, run) = experiment_with_run(&store, "exp");
        let run_id = run.info.run_id.as_str();
        for (i, (t, v)) in points.iter().enumerate() {
            store.log_metric(run_id, &Metric::new("x", *v, *t, i as i64)).unwrap();
        }
        let history = store.get_metric_history(run_id, "x").unwrap();
        prop_assert_eq!(history.len(), points.len());
        prop_assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let latest = points.iter().map(|(t, _)| *t).max().unwrap();
        let best = points
            .iter()
            .filter(|(t, _)| *t == latest)
            .map(|(_, v)| *v)
            .fold(f64::NEG_INFINITY, f64::max);
        let current = &store.get_run(run_id).unwrap().data.metrics["x"];
        prop_assert_eq!(current.timestamp, latest);
        prop_assert_eq!(current.value, best);
    }
}
