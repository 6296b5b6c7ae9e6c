use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

pub const CREATED_AT: &str = "$createdAt";

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equal(String, Value),
    GreaterThanEqual(String, Value),
    LessThanEqual(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Store-agnostic query: filters, one ordering attribute and an optional limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filters: Vec<Filter>,
    pub order: Option<(String, SortDirection)>,
    pub limit: Option<u32>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents created in `[start, end]`, oldest first.
    pub fn created_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new()
            .filter(Filter::GreaterThanEqual(CREATED_AT.to_string(), timestamp(start)))
            .filter(Filter::LessThanEqual(CREATED_AT.to_string(), timestamp(end)))
            .order_by(CREATED_AT, SortDirection::Asc)
    }

    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Self::new().filter(Filter::Equal(attribute.to_string(), value.into()))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, attribute: &str, direction: SortDirection) -> Self {
        self.order = Some((attribute.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Encodes each clause in the store's JSON query syntax (`queries[]` parameters).
    pub fn to_query_strings(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.filters.len() + 2);
        for filter in &self.filters {
            let (method, attribute, value) = match filter {
                Filter::Equal(a, v) => ("equal", a, v),
                Filter::GreaterThanEqual(a, v) => ("greaterThanEqual", a, v),
                Filter::LessThanEqual(a, v) => ("lessThanEqual", a, v),
            };
            out.push(json!({"method": method, "attribute": attribute, "values": [value]}).to_string());
        }
        if let Some((attribute, direction)) = &self.order {
            let method = match direction {
                SortDirection::Asc => "orderAsc",
                SortDirection::Desc => "orderDesc",
            };
            out.push(json!({"method": method, "attribute": attribute}).to_string());
        }
        out
    }
}

pub fn timestamp(ts: DateTime<Utc>) -> Value {
    Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn limit_clause(limit: u32) -> String {
    json!({"method": "limit", "values": [limit]}).to_string()
}

pub fn cursor_after_clause(document_id: &str) -> String {
    json!({"method": "cursorAfter", "values": [document_id]}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encodes_created_range_with_order() {
        let start = Utc.with_ymd_and_hms(2026, 1, 3, 17, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 6, 16, 59, 59).unwrap();
        let encoded = DocumentQuery::created_between(start, end).to_query_strings();

        assert_eq!(encoded.len(), 3);
        let first: Value = serde_json::from_str(&encoded[0]).unwrap();
        assert_eq!(first["method"], "greaterThanEqual");
        assert_eq!(first["attribute"], "$createdAt");
        assert_eq!(first["values"][0], "2026-01-03T17:00:00.000Z");
        let order: Value = serde_json::from_str(&encoded[2]).unwrap();
        assert_eq!(order["method"], "orderAsc");
    }

    #[test]
    fn limit_is_not_part_of_encoded_filters() {
        let q = DocumentQuery::equal("payment_transaction_id", "t1").limit(1);
        let encoded = q.to_query_strings();
        assert_eq!(encoded.len(), 1);
        assert_eq!(q.limit, Some(1));
        let limit: Value = serde_json::from_str(&limit_clause(25)).unwrap();
        assert_eq!(limit["values"][0], 25);
    }
}
