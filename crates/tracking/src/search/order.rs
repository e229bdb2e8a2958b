//! Result ordering
//!
//! `order_by` entries have the form `<entity>.<key> [ASC|DESC]`. An empty list
//! means `attributes.start_time DESC`. Rows whose value is missing sort after
//! every row that has one, in either direction, and `run_id` ascending always
//! breaks remaining ties, so the order is total.

use mlmd_core::{Result, Run, TrackingError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::filter::{parse_identifier, Attribute, Entity};

/// One ordering clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub entity: Entity,
    pub key: String,
    pub ascending: bool,
}

impl OrderClause {
    fn value(&self, run: &Run) -> SortValue {
        match self.entity {
            Entity::Metric => run
                .data
                .metrics
                .get(&self.key)
                .map_or(SortValue::Missing, |m| SortValue::Number(m.value)),
            Entity::Param => run
                .data
                .params
                .get(&self.key)
                .map_or(SortValue::Missing, |v| SortValue::Text(v.clone())),
            Entity::Tag => run
                .data
                .tags
                .get(&self.key)
                .map_or(SortValue::Missing, |v| SortValue::Text(v.clone())),
            Entity::Attribute => match Attribute::parse(&self.key) {
                Some(attr) if attr.is_numeric() => {
                    attr.number(run).map_or(SortValue::Missing, SortValue::Number)
                }
                Some(attr) => attr.text(run).map_or(SortValue::Missing, SortValue::Text),
                None => SortValue::Missing,
            },
        }
    }
}

/// Sort value extracted from a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortValue {
    Missing,
    Number(#[serde(with = "f64_bits")] f64),
    Text(String),
}

/// Exact, NaN-safe encoding of sort numbers in page tokens
mod f64_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        u64::deserialize(d).map(f64::from_bits)
    }
}

impl SortValue {
    /// Compare two present-or-missing values; missing is last regardless of `ascending`
    fn compare(&self, other: &SortValue, ascending: bool) -> Ordering {
        let ord = match (self, other) {
            (SortValue::Missing, SortValue::Missing) => return Ordering::Equal,
            (SortValue::Missing, _) => return Ordering::Greater,
            (_, SortValue::Missing) => return Ordering::Less,
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        };
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

/// Full sort key of a row: clause values then run id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub values: Vec<SortValue>,
    pub run_id: String,
}

/// Parsed `order_by`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    clauses: Vec<OrderClause>,
}

impl Default for OrderBy {
    fn default() -> Self {
        OrderBy {
            clauses: vec![OrderClause {
                entity: Entity::Attribute,
                key: "start_time".to_string(),
                ascending: false,
            }],
        }
    }
}

impl OrderBy {
    /// Parse `order_by` entries; empty means the default ordering
    pub fn parse(entries: &[String]) -> Result<Self> {
        if entries.iter().all(|e| e.trim().is_empty()) {
            return Ok(OrderBy::default());
        }
        let mut clauses = Vec::with_capacity(entries.len());
        for entry in entries.iter().filter(|e| !e.trim().is_empty()) {
            clauses.push(parse_clause(entry)?);
        }
        Ok(OrderBy { clauses })
    }

    pub fn clauses(&self) -> &[OrderClause] {
        &self.clauses
    }

    pub fn key(&self, run: &Run) -> SortKey {
        SortKey {
            values: self.clauses.iter().map(|c| c.value(run)).collect(),
            run_id: run.info.run_id.clone(),
        }
    }

    pub fn compare(&self, a: &SortKey, b: &SortKey) -> Ordering {
        self.clauses
            .iter()
            .zip(a.values.iter().zip(&b.values))
            .map(|(clause, (x, y))| x.compare(y, clause.ascending))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.run_id.cmp(&b.run_id))
    }

    /// Sort rows, pairing each with its key
    pub fn sorted(&self, runs: Vec<Run>) -> Vec<(SortKey, Run)> {
        let mut keyed: Vec<(SortKey, Run)> = runs.into_iter().map(|r| (self.key(&r), r)).collect();
        keyed.sort_by(|(a, _), (b, _)| self.compare(a, b));
        keyed
    }

    /// Canonical text, used for fingerprinting
    pub fn canonical(&self) -> String {
        self.clauses
            .iter()
            .map(|c| {
                format!(
                    "{}.`{}` {}",
                    c.entity.as_str(),
                    c.key,
                    if c.ascending { "ASC" } else { "DESC" }
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn parse_clause(entry: &str) -> Result<OrderClause> {
    let invalid = |reason: &str| {
        TrackingError::invalid_parameter(format!("Invalid order_by clause '{}': {}", entry, reason))
    };
    let (entity, key, rest) = parse_identifier(entry).map_err(|_| invalid("expected <entity>.<key>"))?;
    if entity == Entity::Attribute && Attribute::parse(&key).is_none() {
        return Err(invalid("unknown attribute"));
    }
    let ascending = match rest.trim().to_ascii_uppercase().as_str() {
        "" | "ASC" => true,
        "DESC" => false,
        _ => return Err(invalid("expected ASC or DESC")),
    };
    Ok(OrderClause {
        entity,
        key,
        ascending,
    })
}
