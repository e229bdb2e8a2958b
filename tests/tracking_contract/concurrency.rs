//! Concurrent callers sharing one store, and independent stores sharing one graph.

use crate::common::*;
use mlmd_graph::NodeKind;
use mlmdstore::{ErrorCode, GraphTrackingStore, Metric, Param, TrackingStore};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

#[test]
fn test_concurrent_create_same_name_yields_one_node() {
    let (store, graph) = store();
    let store = Arc::new(store);
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.create_experiment("race", None, &[])
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.code(), ErrorCode::ResourceAlreadyExists);
    }
    assert_eq!(graph.count(NodeKind::Workspace), 1);
}

#[test]
fn test_independent_stores_share_the_graph() {
    init_tracing();
    let graph = Arc::new(mlmd_graph::InMemoryGraph::new());
    let a = GraphTrackingStore::new(Arc::clone(&graph));
    let b = GraphTrackingStore::new(Arc::clone(&graph));

    let id = a.create_experiment("shared", None, &[]).unwrap();
    let err = b.create_experiment("shared", None, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceAlreadyExists);
    assert_eq!(b.get_experiment(&id).unwrap().name, "shared");
    assert_eq!(graph.count(NodeKind::Workspace), 1);
}

#[test]
fn test_concurrent_metric_writers_lose_nothing() {
    let (store, _graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let store = Arc::new(store);
    let run_id = Arc::new(run.info.run_id);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            let run_id = Arc::clone(&run_id);
            thread::spawn(move || {
                for i in 0..25 {
                    let metric = Metric::new("loss", (t * 100 + i) as f64, i as i64, i as i64);
                    store.log_metric(&run_id, &metric).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let history = store.get_metric_history(&run_id, "loss").unwrap();
    assert_eq!(history.len(), THREADS * 25);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_conflicting_params_one_winner() {
    let (store, _graph) = store();
    let (_, run) = experiment_with_run(&store, "exp");
    let store = Arc::new(store);
    let run_id = Arc::new(run.info.run_id);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            let run_id = Arc::clone(&run_id);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.log_param(&run_id, &Param::new("seed", t.to_string()))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let params = store.get_run(&run_id).unwrap().data.params;
    assert_eq!(params.len(), 1);
}
