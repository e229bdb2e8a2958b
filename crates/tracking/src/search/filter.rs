//! Run filter language
//!
//! ```text
//! filter     := comparison ( AND comparison )*
//! comparison := entity "." key op literal
//! entity     := metrics | metric | params | param | tags | tag
//!             | attributes | attribute | attr | run
//! key        := bare-key | `quoted key` | "quoted key"
//! ```
//!
//! Keywords and entity names are case-insensitive. Metric keys compare
//! numerically (`= != < <= > >=`); params and tags compare as strings
//! (`= != LIKE ILIKE`). Attribute keys `status`, `user_id`, `artifact_uri`,
//! `run_id` and `run_name` are strings; `start_time` and `end_time` are
//! numbers.
//!
//! A comparison against a value the run does not have is false, whatever the
//! operator.

use mlmd_core::{Result, Run, TrackingError};
use std::fmt;

/// What a comparison looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Metric,
    Param,
    Tag,
    Attribute,
}

impl Entity {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "metrics" | "metric" => Some(Entity::Metric),
            "params" | "param" => Some(Entity::Param),
            "tags" | "tag" => Some(Entity::Tag),
            "attributes" | "attribute" | "attr" | "run" => Some(Entity::Attribute),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Metric => "metrics",
            Entity::Param => "params",
            Entity::Tag => "tags",
            Entity::Attribute => "attributes",
        }
    }
}

/// Run attributes addressable from filters and ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Status,
    UserId,
    ArtifactUri,
    RunId,
    RunName,
    StartTime,
    EndTime,
}

impl Attribute {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "status" => Some(Attribute::Status),
            "user_id" => Some(Attribute::UserId),
            "artifact_uri" => Some(Attribute::ArtifactUri),
            "run_id" => Some(Attribute::RunId),
            "run_name" => Some(Attribute::RunName),
            "start_time" => Some(Attribute::StartTime),
            "end_time" => Some(Attribute::EndTime),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Attribute::StartTime | Attribute::EndTime)
    }

    /// String value of a string attribute
    pub fn text(&self, run: &Run) -> Option<String> {
        let info = &run.info;
        match self {
            Attribute::Status => Some(info.status.as_str().to_string()),
            Attribute::UserId => Some(info.user_id.clone()),
            Attribute::ArtifactUri => Some(info.artifact_uri.clone()),
            Attribute::RunId => Some(info.run_id.clone()),
            Attribute::RunName => Some(info.run_name.clone()),
            Attribute::StartTime | Attribute::EndTime => None,
        }
    }

    /// Numeric value of a numeric attribute
    pub fn number(&self, run: &Run) -> Option<f64> {
        match self {
            Attribute::StartTime => Some(run.info.start_time as f64),
            Attribute::EndTime => run.info.end_time.map(|t| t as f64),
            _ => None,
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    ILike,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::NotEq => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Like => "LIKE",
            Comparator::ILike => "ILIKE",
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, Comparator::Like | Comparator::ILike)
    }

    fn is_string(&self) -> bool {
        matches!(
            self,
            Comparator::Eq | Comparator::NotEq | Comparator::Like | Comparator::ILike
        )
    }

    fn compare_numbers(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::NotEq => lhs != rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Like | Comparator::ILike => false,
        }
    }

    fn compare_text(&self, lhs: &str, rhs: &str) -> bool {
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::NotEq => lhs != rhs,
            Comparator::Like => like(lhs, rhs, false),
            Comparator::ILike => like(lhs, rhs, true),
            _ => false,
        }
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

/// One `<entity>.<key> <op> <literal>` clause
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub entity: Entity,
    pub key: String,
    pub op: Comparator,
    pub value: Literal,
}

impl Comparison {
    pub fn matches(&self, run: &Run) -> bool {
        match (&self.entity, &self.value) {
            (Entity::Metric, Literal::Number(rhs)) => run
                .data
                .metrics
                .get(&self.key)
                .is_some_and(|m| self.op.compare_numbers(m.value, *rhs)),
            (Entity::Param, Literal::Text(rhs)) => run
                .data
                .params
                .get(&self.key)
                .is_some_and(|v| self.op.compare_text(v, rhs)),
            (Entity::Tag, Literal::Text(rhs)) => run
                .data
                .tags
                .get(&self.key)
                .is_some_and(|v| self.op.compare_text(v, rhs)),
            (Entity::Attribute, literal) => {
                let Some(attribute) = Attribute::parse(&self.key) else {
                    return false;
                };
                match literal {
                    Literal::Number(rhs) => attribute
                        .number(run)
                        .is_some_and(|lhs| self.op.compare_numbers(lhs, *rhs)),
                    Literal::Text(rhs) => attribute
                        .text(run)
                        .is_some_and(|lhs| self.op.compare_text(&lhs, rhs)),
                }
            }
            _ => false,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.`{}` {} ", self.entity.as_str(), self.key, self.op.as_str())?;
        match &self.value {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Typed filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Compare(Comparison),
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::And(Vec::new())
    }
}

impl Predicate {
    pub fn matches(&self, run: &Run) -> bool {
        match self {
            Predicate::And(parts) => parts.iter().all(|p| p.matches(run)),
            Predicate::Compare(c) => c.matches(run),
        }
    }

    /// Every leaf comparison, in source order
    pub fn comparisons(&self) -> Vec<&Comparison> {
        match self {
            Predicate::And(parts) => parts.iter().flat_map(|p| p.comparisons()).collect(),
            Predicate::Compare(c) => vec![c],
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
            Predicate::Compare(c) => write!(f, "{}", c),
        }
    }
}

// ========== Parser ==========

fn invalid(filter: &str, reason: impl fmt::Display) -> TrackingError {
    TrackingError::invalid_parameter(format!("Invalid filter '{}': {}", filter, reason))
}

/// Parse a filter string; blank means "match everything"
pub fn parse_filter(filter: &str) -> Result<Predicate> {
    let mut parser = Parser::new(filter);
    let mut parts = Vec::new();
    parser.skip_ws();
    if parser.at_end() {
        return Ok(Predicate::default());
    }
    loop {
        parts.push(Predicate::Compare(parser.comparison()?));
        parser.skip_ws();
        if parser.at_end() {
            break;
        }
        let word = parser.word();
        if !word.eq_ignore_ascii_case("and") {
            return Err(parser.error(format!("expected AND, found '{}'", word)));
        }
    }
    Ok(Predicate::And(parts))
}

/// Parse a leading `<entity>.<key>`; returns the rest of the input
pub(crate) fn parse_identifier(text: &str) -> Result<(Entity, String, String)> {
    let mut parser = Parser::new(text);
    parser.skip_ws();
    let (entity, key) = parser.identifier()?;
    let rest = parser.chars[parser.pos..].iter().collect();
    Ok((entity, key, rest))
}

struct Parser<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl fmt::Display) -> TrackingError {
        invalid(self.src, format!("{} at position {}", reason, self.pos))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn word(&mut self) -> String {
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Read a quoted run up to the closing `quote`; a doubled quote escapes it
    fn quoted(&mut self, quote: char) -> Result<String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error(format!("unterminated {} quote", quote))),
                Some(c) if c == quote => {
                    self.pos += 1;
                    if self.peek() == Some(quote) {
                        out.push(quote);
                        self.pos += 1;
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn identifier(&mut self) -> Result<(Entity, String)> {
        let word = self.word();
        let entity = Entity::parse(&word).ok_or_else(|| {
            self.error(format!(
                "unknown entity '{}', expected metrics, params, tags or attributes",
                word
            ))
        })?;
        if self.peek() != Some('.') {
            return Err(self.error(format!("expected '.' after '{}'", word)));
        }
        self.pos += 1;
        let key = match self.peek() {
            Some(q @ ('`' | '"')) => self.quoted(q)?,
            _ => self.take_while(|c| {
                c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':')
            }),
        };
        if key.is_empty() {
            return Err(self.error("empty key"));
        }
        Ok((entity, key))
    }

    fn comparator(&mut self) -> Result<Comparator> {
        let two: String = self.chars[self.pos..].iter().take(2).collect();
        let op = match two.as_str() {
            "!=" => Some((Comparator::NotEq, 2)),
            "<=" => Some((Comparator::Le, 2)),
            ">=" => Some((Comparator::Ge, 2)),
            _ => match self.peek() {
                Some('=') => Some((Comparator::Eq, 1)),
                Some('<') => Some((Comparator::Lt, 1)),
                Some('>') => Some((Comparator::Gt, 1)),
                _ => None,
            },
        };
        if let Some((op, width)) = op {
            self.pos += width;
            return Ok(op);
        }
        let word = self.word();
        if word.eq_ignore_ascii_case("like") {
            Ok(Comparator::Like)
        } else if word.eq_ignore_ascii_case("ilike") {
            Ok(Comparator::ILike)
        } else {
            Err(self.error(format!("unknown comparator '{}'", word)))
        }
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.peek() {
            Some(q @ ('\'' | '"')) => Ok(Literal::Text(self.quoted(q)?)),
            Some(_) => {
                let raw = self.take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
                raw.parse::<f64>()
                    .map(Literal::Number)
                    .map_err(|_| self.error("expected a number or a quoted string"))
            }
            None => Err(self.error("missing value")),
        }
    }

    fn comparison(&mut self) -> Result<Comparison> {
        let (entity, key) = self.identifier()?;
        self.skip_ws();
        let op = self.comparator()?;
        self.skip_ws();
        let value = self.literal()?;

        let numeric = match entity {
            Entity::Metric => true,
            Entity::Param | Entity::Tag => false,
            Entity::Attribute => Attribute::parse(&key)
                .ok_or_else(|| self.error(format!("unknown attribute '{}'", key)))?
                .is_numeric(),
        };
        match (&value, numeric) {
            (Literal::Number(_), true) if op.is_numeric() => {}
            (Literal::Text(_), false) if op.is_string() => {}
            (_, true) => {
                return Err(self.error(format!(
                    "{}.{} takes a number and one of = != < <= > >=",
                    entity.as_str(),
                    key
                )))
            }
            (_, false) => {
                return Err(self.error(format!(
                    "{}.{} takes a quoted string and one of = != LIKE ILIKE",
                    entity.as_str(),
                    key
                )))
            }
        }
        Ok(Comparison {
            entity,
            key,
            op,
            value,
        })
    }
}

/// SQL LIKE: `%` matches any run, `_` matches one character
fn like(value: &str, pattern: &str, case_insensitive: bool) -> bool {
    let fold = |s: &str| -> Vec<char> {
        if case_insensitive {
            s.to_lowercase().chars().collect()
        } else {
            s.chars().collect()
        }
    };
    let v = fold(value);
    let p = fold(pattern);
    // match[j]: pattern prefix p[..j] matches the value prefix seen so far
    let mut matched = vec![false; p.len() + 1];
    matched[0] = true;
    for j in 1..=p.len() {
        matched[j] = matched[j - 1] && p[j - 1] == '%';
    }
    for &c in &v {
        let mut next = vec![false; p.len() + 1];
        for j in 1..=p.len() {
            next[j] = match p[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                pc => matched[j - 1] && pc == c,
            };
        }
        matched = next;
    }
    matched[p.len()]
}
