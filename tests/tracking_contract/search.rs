//! Run search: filtering, ordering and keyset pagination.

use crate::common::*;
use mlmdstore::{
    CreateRun, ErrorCode, Metric, Param, RunStatus, RunTag, SearchRequest, StoreConfig,
    TrackingStore, ViewType,
};
use std::collections::HashSet;

/// Five runs with start times 0..5, loss = start time, user alternating.
fn five_runs(store: &TestStore) -> (String, Vec<String>) {
    let exp = store.create_experiment("search", None, &[]).unwrap();
    let ids = (0..5)
        .map(|i| {
            let user = if i % 2 == 0 { "alice" } else { "bob" };
            let run = store
                .create_run(
                    CreateRun::in_experiment(exp.as_str())
                        .user(user)
                        .start_time(i),
                )
                .unwrap();
            let run_id = run.info.run_id;
            store
                .log_batch(
                    &run_id,
                    &[Metric::new("loss", i as f64, 1, 0)],
                    &[Param::new("model", if i < 3 { "cnn" } else { "mlp" })],
                    &[RunTag::new("parity", if i % 2 == 0 { "even" } else { "odd" })],
                )
                .unwrap();
            run_id
        })
        .collect();
    (exp, ids)
}

#[test]
fn test_pages_of_two_two_one() {
    let (store, _graph) = store();
    let (exp, _) = five_runs(&store);
    let base = SearchRequest::new([exp.as_str()])
        .filter("metrics.loss >= 0")
        .max_results(2);

    let mut seen = HashSet::new();
    let mut sizes = Vec::new();
    let mut token = None;
    loop {
        let page = store
            .search_runs(&base.clone().page_token(token.take()))
            .unwrap();
        sizes.push(page.runs.len());
        for run in &page.runs {
            assert!(seen.insert(run.info.run_id.clone()), "pages overlap");
        }
        match page.next_page_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(seen.len(), 5);
}

#[test]
fn test_default_order_is_newest_first() {
    let (store, _graph) = store();
    let (exp, ids) = five_runs(&store);
    let page = store.search_runs(&SearchRequest::new([exp])).unwrap();
    let got: Vec<&str> = page.runs.iter().map(|r| r.info.run_id.as_str()).collect();
    let want: Vec<&str> = ids.iter().rev().map(String::as_str).collect();
    assert_eq!(got, want);
}

#[test]
fn test_filters() {
    let (store, _graph) = store();
    let (exp, _) = five_runs(&store);
    let count = |filter: &str| {
        store
            .search_runs(&SearchRequest::new([exp.as_str()]).filter(filter))
            .unwrap()
            .runs
            .len()
    };
    assert_eq!(count("metrics.loss < 2"), 2);
    assert_eq!(count("params.model = 'mlp'"), 2);
    assert_eq!(count("tags.parity = 'even' and metrics.loss > 0"), 2);
    assert_eq!(count("attributes.user_id = 'bob'"), 2);
    assert_eq!(count("attributes.status = 'RUNNING'"), 5);
    assert_eq!(count("params.model LIKE 'c%'"), 3);
    assert_eq!(count("tags.missing = 'x'"), 0);
}

#[test]
fn test_order_by_metric_ascending() {
    let (store, _graph) = store();
    let (exp, ids) = five_runs(&store);
    let page = store
        .search_runs(&SearchRequest::new([exp]).order_by("metrics.loss ASC"))
        .unwrap();
    let got: Vec<String> = page.runs.into_iter().map(|r| r.info.run_id).collect();
    assert_eq!(got, ids);
}

#[test]
fn test_view_type_and_status_pushdown() {
    let (store, _graph) = store();
    let (exp, ids) = five_runs(&store);
    store.delete_run(&ids[0]).unwrap();
    store
        .update_run_info(&ids[1], RunStatus::Finished, None, None)
        .unwrap();

    let search = |view: ViewType, filter: &str| {
        store
            .search_runs(
                &SearchRequest::new([exp.as_str()])
                    .view_type(view)
                    .filter(filter),
            )
            .unwrap()
            .runs
            .len()
    };
    assert_eq!(search(ViewType::ActiveOnly, ""), 4);
    assert_eq!(search(ViewType::DeletedOnly, ""), 1);
    assert_eq!(search(ViewType::All, ""), 5);
    assert_eq!(search(ViewType::All, "attributes.status = 'FINISHED'"), 1);
    assert_eq!(search(ViewType::All, "attributes.status != 'FINISHED'"), 4);
}

#[test]
fn test_search_across_experiments() {
    let (store, _graph) = store();
    let (a, _) = five_runs(&store);
    let b = store.create_experiment("other", None, &[]).unwrap();
    store.create_run(CreateRun::in_experiment(b.as_str())).unwrap();

    let page = store
        .search_runs(&SearchRequest::new([a.as_str(), b.as_str(), a.as_str()]))
        .unwrap();
    assert_eq!(page.runs.len(), 6);

    let err = store
        .search_runs(&SearchRequest::new(["no-such-experiment"]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceDoesNotExist);
}

#[test]
fn test_invalid_requests() {
    let (store, _graph) = store_with(StoreConfig {
        search_max_results_threshold: 10,
        default_max_results: 5,
        ..StoreConfig::default()
    });
    let (exp, _) = five_runs(&store);

    let too_big = SearchRequest::new([exp.as_str()]).max_results(11);
    assert_eq!(
        store.search_runs(&too_big).unwrap_err().code(),
        ErrorCode::InvalidParameterValue
    );

    let bad_filter = SearchRequest::new([exp.as_str()]).filter("metrics.loss >>> 1");
    assert_eq!(
        store.search_runs(&bad_filter).unwrap_err().code(),
        ErrorCode::InvalidParameterValue
    );

    let first = store
        .search_runs(&SearchRequest::new([exp.as_str()]).max_results(2))
        .unwrap();
    let reused = SearchRequest::new([exp.as_str()])
        .max_results(2)
        .order_by("metrics.loss DESC")
        .page_token(first.next_page_token);
    assert_eq!(
        store.search_runs(&reused).unwrap_err().code(),
        ErrorCode::InvalidParameterValue
    );

    let garbage = SearchRequest::new([exp.as_str()]).page_token(Some("%%%".to_string()));
    assert_eq!(
        store.search_runs(&garbage).unwrap_err().code(),
        ErrorCode::InvalidParameterValue
    );
}

#[test]
fn test_page_cursor_is_stable_under_inserts() {
    let (store, _graph) = store();
    let (exp, _) = five_runs(&store);
    let request = SearchRequest::new([exp.as_str()])
        .order_by("attributes.start_time ASC")
        .max_results(2);
    let first = store.search_runs(&request).unwrap();

    // a run sorting before the cursor must not shift the next page
    store
        .create_run(CreateRun::in_experiment(exp.as_str()).start_time(-1))
        .unwrap();
    let second = store
        .search_runs(&request.clone().page_token(first.next_page_token))
        .unwrap();
    let starts: Vec<i64> = second.runs.iter().map(|r| r.info.start_time).collect();
    assert_eq!(starts, vec![2, 3]);
}
