//! Collection queries
//!
//! Equality and membership filters on (dotted) fields, one sort key and an
//! optional limit, the same shape a managed document database offers.

use crate::document::{lookup, StoredDocument};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first
    Asc,
    /// Largest first
    Desc,
}

/// Field predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value
    Eq(String, Value),
    /// Field differs from value (missing fields match)
    NotEq(String, Value),
    /// Field equals one of the values
    In(String, Vec<Value>),
}

impl Filter {
    /// Whether `data` satisfies the predicate
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => lookup(data, field) == Some(expected),
            Filter::NotEq(field, expected) => lookup(data, field) != Some(expected),
            Filter::In(field, options) => {
                lookup(data, field).is_some_and(|v| options.iter().any(|o| o == v))
            }
        }
    }
}

/// Query over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection path
    pub collection: String,
    /// Conjunctive filters
    pub filters: Vec<Filter>,
    /// Sort key
    pub order_by: Option<(String, Direction)>,
    /// Maximum results
    pub limit: Option<usize>,
}

impl Query {
    /// Every document of `collection`
    #[must_use]
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Require `field == value`
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    /// Require `field != value`
    #[must_use]
    pub fn where_ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::NotEq(field.into(), value.into()));
        self
    }

    /// Require `field` in `values`
    #[must_use]
    pub fn where_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::In(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Sort by `field`
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Keep at most `n` results
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Whether a document passes every filter
    #[must_use]
    pub fn matches(&self, doc: &StoredDocument) -> bool {
        doc.path.collection() == self.collection && self.filters.iter().all(|f| f.matches(&doc.data))
    }

    /// Filter, sort and truncate candidate documents
    #[must_use]
    pub fn apply<'a>(&self, docs: impl IntoIterator<Item = &'a StoredDocument>) -> Vec<StoredDocument> {
        let mut out: Vec<StoredDocument> = docs
            .into_iter()
            .filter(|d| self.matches(d))
            .cloned()
            .collect();
        if let Some((field, direction)) = &self.order_by {
            out.sort_by(|a, b| {
                let ord = compare_json(lookup(&a.data, field), lookup(&b.data, field));
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Total order over optional JSON values: missing < null < bool < number < string
#[must_use]
pub fn compare_json(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::DocPath;
    use chrono::Utc;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> StoredDocument {
        StoredDocument {
            path: DocPath::new("contracts", id).unwrap(),
            revision: 1,
            data,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn filters_sorts_and_limits() {
        let docs = vec![
            doc("a", json!({"status": "Activo", "rent": 300})),
            doc("b", json!({"status": "Pendiente", "rent": 500})),
            doc("c", json!({"status": "Activo", "rent": 700})),
        ];
        let q = Query::collection("contracts")
            .where_eq("status", "Activo")
            .order_by("rent", Direction::Desc)
            .limit(1);
        let out = q.apply(&docs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path.id(), "c");
    }

    #[test]
    fn membership_and_inequality() {
        let docs = vec![
            doc("a", json!({"status": "Activo"})),
            doc("b", json!({"status": "Rechazado"})),
            doc("c", json!({})),
        ];
        let q = Query::collection("contracts").where_in("status", ["Activo", "Pendiente"]);
        assert_eq!(q.apply(&docs).len(), 1);
        let q = Query::collection("contracts").where_ne("status", "Activo");
        assert_eq!(q.apply(&docs).len(), 2);
    }

    #[test]
    fn other_collections_excluded() {
        let d = doc("a", json!({}));
        assert!(!Query::collection("propiedades").matches(&d));
    }

    #[test]
    fn json_order() {
        assert_eq!(compare_json(None, Some(&json!(null))), Ordering::Less);
        assert_eq!(compare_json(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_json(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
    }
}
