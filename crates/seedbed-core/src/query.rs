//! Filter, sort and pagination over record slices.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::record::Record;

/// Page size used when a query does not set one.
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// Single comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
}

impl Condition {
    fn parse(operator: &str, operand: &Value) -> Result<Self> {
        let condition = match operator {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$in" | "$nin" => {
                let values = operand.as_array().cloned().ok_or_else(|| {
                    Error::InvalidQuery(format!("operator '{operator}' expects an array"))
                })?;
                if operator == "$in" {
                    Condition::In(values)
                } else {
                    Condition::Nin(values)
                }
            }
            other => {
                return Err(Error::InvalidQuery(format!("unknown operator '{other}'")));
            }
        };
        Ok(condition)
    }

    fn operator(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "$eq",
            Condition::Ne(_) => "$ne",
            Condition::Gt(_) => "$gt",
            Condition::Gte(_) => "$gte",
            Condition::Lt(_) => "$lt",
            Condition::Lte(_) => "$lte",
            Condition::In(_) => "$in",
            Condition::Nin(_) => "$nin",
        }
    }

    fn operand(&self) -> Value {
        match self {
            Condition::Eq(value)
            | Condition::Ne(value)
            | Condition::Gt(value)
            | Condition::Gte(value)
            | Condition::Lt(value)
            | Condition::Lte(value) => value.clone(),
            Condition::In(values) | Condition::Nin(values) => Value::Array(values.clone()),
        }
    }

    /// Evaluate against a field value; `Null` stands in for a missing field.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Condition::Eq(expected) => values_equal(value, expected),
            Condition::Ne(expected) => !values_equal(value, expected),
            Condition::Gt(bound) => compare_values(value, bound).is_some_and(Ordering::is_gt),
            Condition::Gte(bound) => compare_values(value, bound).is_some_and(Ordering::is_ge),
            Condition::Lt(bound) => compare_values(value, bound).is_some_and(Ordering::is_lt),
            Condition::Lte(bound) => compare_values(value, bound).is_some_and(Ordering::is_le),
            Condition::In(values) => values.iter().any(|candidate| values_equal(value, candidate)),
            Condition::Nin(values) => !values.iter().any(|candidate| values_equal(value, candidate)),
        }
    }
}

/// Conjunction of per-field conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Filter {
    clauses: Vec<(String, Vec<Condition>)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{ field: value }` / `{ field: { "$op": operand } }` documents.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => return Err(Error::InvalidQuery("filter must be a JSON object".to_string())),
        };

        let mut filter = Self::default();
        for (field, spec) in map {
            let conditions = match spec {
                Value::Object(ops) if is_operator_object(ops) => ops
                    .iter()
                    .map(|(operator, operand)| Condition::parse(operator, operand))
                    .collect::<Result<Vec<_>>>()?,
                exact => vec![Condition::Eq(exact.clone())],
            };
            filter.clauses.push((field.clone(), conditions));
        }
        Ok(filter)
    }

    /// Add an exact-match clause.
    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.with(field, Condition::Eq(value))
    }

    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        let field = field.into();
        match self.clauses.iter_mut().find(|(name, _)| *name == field) {
            Some((_, conditions)) => conditions.push(condition),
            None => self.clauses.push((field, vec![condition])),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|(field, conditions)| {
            let value = record.value(field);
            conditions.iter().all(|condition| condition.matches(value))
        })
    }

    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
        records
            .into_iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

impl TryFrom<Value> for Filter {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Filter::from_value(&value)
    }
}

impl From<Filter> for Value {
    fn from(filter: Filter) -> Self {
        let mut map = Map::new();
        for (field, conditions) in filter.clauses {
            let ops = conditions
                .iter()
                .map(|condition| (condition.operator().to_string(), condition.operand()))
                .collect::<Map<_, _>>();
            map.insert(field, Value::Object(ops));
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// List query: filter, single-field sort and 1-indexed pagination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub filter: Filter,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Filter and sort `records` without paginating.
    pub fn select(&self, records: &[Record]) -> Vec<Record> {
        let mut matched = self.filter.apply(records);
        if let Some(field) = &self.sort_by {
            sort_records(&mut matched, field, self.sort_order);
        }
        matched
    }

    /// Paginate an already selected record set.
    pub fn paginate(&self, matched: &[Record], default_limit: u64) -> QueryResult {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).max(1);
        let total = matched.len() as u64;
        let total_pages = total.div_ceil(limit);

        let start = (page - 1).saturating_mul(limit);
        let data = if start >= total {
            Vec::new()
        } else {
            let end = start.saturating_add(limit).min(total);
            matched[start as usize..end as usize].to_vec()
        };

        QueryResult {
            data,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages,
            },
        }
    }

    pub fn execute(&self, records: &[Record], default_limit: u64) -> QueryResult {
        let matched = self.select(records);
        self.paginate(&matched, default_limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Record>,
    pub pagination: Pagination,
}

/// Stable single-field sort; missing values go last.
///
/// Mixed types order by kind first: booleans, numbers, strings, then
/// composite values.
pub fn sort_records(records: &mut [Record], field: &str, order: SortOrder) {
    records.sort_by(|a, b| {
        let (left, right) = (a.value(field), b.value(field));
        match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ordering = sort_rank(left)
                    .cmp(&sort_rank(right))
                    .then_with(|| compare_values(left, right).unwrap_or(Ordering::Equal));
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
        }
    });
}

fn sort_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

/// Equality with numeric normalization (`1 == 1.0`).
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => left == right,
    }
}

/// Ordering for same-typed scalars; `None` for mixed or composite values.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Some(a.as_f64()?.total_cmp(&b.as_f64()?)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
