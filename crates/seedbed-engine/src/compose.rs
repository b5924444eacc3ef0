//! Response composition from a parsed [`ResponseShape`].

use serde_json::{Map, Number, Value};

use seedbed_core::{MetaKind, MetaMarker, Pagination, Record, ResponseShape, ShapeNode};

/// Fills a response shape from one page and the full filtered set.
pub struct ResponseComposer<'a> {
    page: &'a [Record],
    pagination: &'a Pagination,
    matched: &'a [Record],
}

impl<'a> ResponseComposer<'a> {
    /// `matched` is the unpaginated filtered set aggregates run over.
    pub fn new(page: &'a [Record], pagination: &'a Pagination, matched: &'a [Record]) -> Self {
        Self {
            page,
            pagination,
            matched,
        }
    }

    pub fn compose(&self, shape: &ResponseShape) -> Value {
        self.visit(shape.root())
    }

    fn visit(&self, node: &ShapeNode) -> Value {
        match node {
            ShapeNode::Data => Value::Array(self.page.iter().cloned().map(Record::into_value).collect()),
            ShapeNode::Meta(marker) => self.meta(marker),
            ShapeNode::Object(children) => {
                let mut out = Map::new();
                for (key, child) in children {
                    out.insert(key.clone(), self.visit(child));
                }
                Value::Object(out)
            }
            ShapeNode::Passthrough(value) => value.clone(),
        }
    }

    fn meta(&self, marker: &MetaMarker) -> Value {
        let pagination = self.pagination;
        match marker.kind {
            MetaKind::Page => Value::from(pagination.page),
            MetaKind::Limit => Value::from(pagination.limit),
            MetaKind::Total => Value::from(pagination.total),
            MetaKind::TotalPages => Value::from(pagination.total_pages),
            MetaKind::Count => {
                let records = self.scope(marker);
                let count = match &marker.field {
                    Some(field) => records.iter().filter(|record| !record.value(field).is_null()).count(),
                    None => records.len(),
                };
                Value::from(count as u64)
            }
            MetaKind::Avg | MetaKind::Sum | MetaKind::Min | MetaKind::Max => {
                let Some(field) = &marker.field else {
                    return Value::Null;
                };
                let values: Vec<f64> = self
                    .scope(marker)
                    .iter()
                    .filter_map(|record| record.value(field).as_f64())
                    .collect();
                aggregate(marker.kind, &values).map_or(Value::Null, number_value)
            }
        }
    }

    fn scope(&self, marker: &MetaMarker) -> Vec<&'a Record> {
        match &marker.filter {
            Some(filter) => self.matched.iter().filter(|record| filter.matches(record)).collect(),
            None => self.matched.iter().collect(),
        }
    }
}

fn aggregate(kind: MetaKind, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    match kind {
        MetaKind::Sum => Some(sum),
        MetaKind::Avg => Some(sum / values.len() as f64),
        MetaKind::Min => values.iter().copied().reduce(f64::min),
        MetaKind::Max => values.iter().copied().reduce(f64::max),
        _ => None,
    }
}

fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Value::from(value as i64);
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn priced(prices: &[i64]) -> Vec<Record> {
        prices
            .iter()
            .enumerate()
            .map(|(idx, price)| {
                let status = if idx % 2 == 0 { "paid" } else { "open" };
                Record::from_value(json!({"id": idx + 1, "price": price, "status": status}))
                    .expect("object")
            })
            .collect()
    }

    fn pagination(total: u64) -> Pagination {
        Pagination {
            page: 1,
            limit: 2,
            total,
            total_pages: total.div_ceil(2),
        }
    }

    #[test]
    fn aggregates_run_over_all_matched_records() {
        let matched = priced(&[100, 200, 150, 300, 250]);
        let page = &matched[..2];
        let pagination = pagination(5);
        let shape = ResponseShape::parse(&json!({
            "items": {"$type": "data"},
            "stats": {
                "avg": {"$type": "meta", "kind": "avg", "field": "price"},
                "sum": {"$type": "meta", "kind": "sum", "field": "price"},
                "min": {"$type": "meta", "kind": "min", "field": "price"},
                "max": {"$type": "meta", "kind": "max", "field": "price"}
            },
            "meta": {
                "page": {"$type": "meta", "kind": "page"},
                "totalPages": {"$type": "meta", "kind": "totalPages"}
            },
            "version": 2
        }))
        .expect("shape");

        let out = ResponseComposer::new(page, &pagination, &matched).compose(&shape);
        assert_eq!(out["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(out["stats"]["avg"], json!(200));
        assert_eq!(out["stats"]["sum"], json!(1000));
        assert_eq!(out["stats"]["min"], json!(100));
        assert_eq!(out["stats"]["max"], json!(300));
        assert_eq!(out["meta"]["page"], json!(1));
        assert_eq!(out["meta"]["totalPages"], json!(3));
        assert_eq!(out["version"], json!(2));
    }

    #[test]
    fn empty_aggregates_are_null() {
        let pagination = pagination(0);
        let shape = ResponseShape::parse(&json!({
            "avg": {"$type": "meta", "kind": "avg", "field": "price"},
            "count": {"$type": "meta", "kind": "count"}
        }))
        .expect("shape");

        let out = ResponseComposer::new(&[], &pagination, &[]).compose(&shape);
        assert_eq!(out["avg"], Value::Null);
        assert_eq!(out["count"], json!(0));
    }

    #[test]
    fn count_honors_where_filter() {
        let matched = priced(&[10, 20, 30]);
        let pagination = pagination(3);
        let shape = ResponseShape::parse(&json!({
            "paid": {"$type": "meta", "kind": "count", "where": {"status": "paid"}}
        }))
        .expect("shape");

        let out = ResponseComposer::new(&matched, &pagination, &matched).compose(&shape);
        assert_eq!(out["paid"], json!(2));
    }

    #[test]
    fn fractional_average_stays_float() {
        let matched = priced(&[1, 2]);
        let pagination = pagination(2);
        let shape = ResponseShape::parse(&json!({"$type": "meta", "kind": "avg", "field": "price"}))
            .expect("shape");

        let out = ResponseComposer::new(&matched, &pagination, &matched).compose(&shape);
        assert_eq!(out, json!(1.5));
    }
}
