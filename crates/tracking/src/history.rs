//! Metric history aggregation
//!
//! A metric key's history is the union of every point logged for it across
//! all executions of a run. The current value is the point with the latest
//! timestamp, ties broken by the larger value under `f64::total_cmp`.

use mlmd_core::Metric;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Order points by recency: timestamp first, then value
fn recency(a: &Metric, b: &Metric) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.value.total_cmp(&b.value))
}

/// All points for `key`, ascending by timestamp (stable for equal timestamps)
pub fn history(log: &[Metric], key: &str) -> Vec<Metric> {
    let mut points: Vec<Metric> = log.iter().filter(|m| m.key == key).cloned().collect();
    points.sort_by_key(|m| m.timestamp);
    points
}

/// Current value of `key`, if any point was logged
pub fn current(log: &[Metric], key: &str) -> Option<Metric> {
    log.iter()
        .filter(|m| m.key == key)
        .max_by(|a, b| recency(a, b))
        .cloned()
}

/// Current value of every key
pub fn latest_by_key(log: &[Metric]) -> BTreeMap<String, Metric> {
    let mut latest: BTreeMap<String, Metric> = BTreeMap::new();
    for metric in log {
        match latest.get(&metric.key) {
            Some(best) if recency(metric, best) != Ordering::Greater => {}
            _ => {
                latest.insert(metric.key.clone(), metric.clone());
            }
        }
    }
    latest
}
