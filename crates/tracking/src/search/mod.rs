//! Run search
//!
//! A search is planned once per request:
//! 1. validate `max_results` and parse filter and ordering
//! 2. derive the graph-side pushdown (lifecycle stage, status and user
//!    equality) used to narrow the run-node query
//! 3. after the store has replayed candidate runs, apply the full predicate,
//!    sort, and cut the page after the token's cursor
//!
//! Pushdown only narrows candidates; the in-memory predicate is always
//! applied, so results are identical with or without it.

pub mod filter;
pub mod order;
pub mod token;

pub use filter::{parse_filter, Attribute, Comparator, Comparison, Entity, Literal, Predicate};
pub use order::{OrderBy, OrderClause, SortKey, SortValue};
pub use token::PageToken;

use mlmd_core::{LifecycleStage, Result, Run, RunStatus, TrackingError, ViewType};
use tracing::debug;

use crate::translator::{PROP_LIFECYCLE_STAGE, PROP_STATUS, PROP_USER_ID};

/// A `search_runs` request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub experiment_ids: Vec<String>,
    pub filter: String,
    pub view_type: ViewType,
    /// `None` uses the configured default page size
    pub max_results: Option<usize>,
    pub order_by: Vec<String>,
    pub page_token: Option<String>,
}

impl SearchRequest {
    pub fn new<I, S>(experiment_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SearchRequest {
            experiment_ids: experiment_ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn view_type(mut self, view_type: ViewType) -> Self {
        self.view_type = view_type;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by.push(clause.into());
        self
    }

    pub fn page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq)]
pub struct RunsPage {
    pub runs: Vec<Run>,
    /// Present when more rows follow
    pub next_page_token: Option<String>,
}

/// A validated search
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub view_type: ViewType,
    pub predicate: Predicate,
    pub order: OrderBy,
    pub max_results: usize,
    fingerprint: String,
    after: Option<SortKey>,
}

impl SearchPlan {
    /// Validate a request against the page-size limits
    pub fn prepare(request: &SearchRequest, threshold: usize, default_max: usize) -> Result<Self> {
        let max_results = request.max_results.unwrap_or(default_max);
        if max_results == 0 || max_results > threshold {
            return Err(TrackingError::invalid_parameter(format!(
                "Invalid value {} for parameter 'max_results': must be between 1 and {}",
                max_results, threshold
            )));
        }
        let predicate = parse_filter(&request.filter)?;
        let order = OrderBy::parse(&request.order_by)?;
        let fingerprint = token::fingerprint(
            &request.experiment_ids,
            &predicate.to_string(),
            &order.canonical(),
            request.view_type,
        );
        let after = match request.page_token.as_deref() {
            Some(t) if !t.is_empty() => Some(PageToken::decode(t, &fingerprint)?.after),
            _ => None,
        };
        Ok(SearchPlan {
            view_type: request.view_type,
            predicate,
            order,
            max_results,
            fingerprint,
            after,
        })
    }

    /// Property equalities the graph query can apply to run nodes
    pub fn pushdown(&self) -> Vec<(&'static str, String)> {
        let mut props = Vec::new();
        if let Some(stage) = self.view_type.stage() {
            props.push((PROP_LIFECYCLE_STAGE, stage.as_str().to_string()));
        }
        for c in self.predicate.comparisons() {
            if c.entity != Entity::Attribute || c.op != Comparator::Eq {
                continue;
            }
            let Literal::Text(value) = &c.value else {
                continue;
            };
            match Attribute::parse(&c.key) {
                Some(Attribute::Status) if RunStatus::parse(value).is_some() => {
                    props.push((PROP_STATUS, value.clone()));
                }
                Some(Attribute::UserId) => props.push((PROP_USER_ID, value.clone())),
                _ => {}
            }
        }
        props
    }

    /// Whether a run in `stage` is a candidate, checked before replaying it
    pub fn admits_stage(&self, stage: LifecycleStage) -> bool {
        self.view_type.includes(stage)
    }

    /// Filter, order and cut one page from the candidate runs
    pub fn execute(&self, candidates: Vec<Run>) -> Result<RunsPage> {
        let total = candidates.len();
        let matching: Vec<Run> = candidates
            .into_iter()
            .filter(|r| self.admits_stage(r.info.lifecycle_stage) && self.predicate.matches(r))
            .collect();
        let matched = matching.len();
        let sorted = self.order.sorted(matching);
        let start = match &self.after {
            Some(after) => sorted.partition_point(|(key, _)| {
                self.order.compare(key, after) != std::cmp::Ordering::Greater
            }),
            None => 0,
        };
        let end = start.saturating_add(self.max_results).min(sorted.len());
        let next_page_token = if end < sorted.len() && end > start {
            let token = PageToken {
                fingerprint: self.fingerprint.clone(),
                after: sorted[end - 1].0.clone(),
            };
            Some(token.encode()?)
        } else {
            None
        };
        debug!(
            target: "mlmd::search",
            candidates = total,
            matched,
            start,
            returned = end - start,
            more = next_page_token.is_some(),
            "search page"
        );
        let runs = sorted
            .into_iter()
            .skip(start)
            .take(end - start)
            .map(|(_, run)| run)
            .collect();
        Ok(RunsPage {
            runs,
            next_page_token,
        })
    }
}
