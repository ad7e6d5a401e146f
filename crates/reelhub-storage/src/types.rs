//! Query and pagination types shared by all document store backends.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "1" => Ok(SortOrder::Asc),
            "desc" | "-1" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{other}', expected 'asc' or 'desc'")),
        }
    }
}

/// Sort on a single top-level document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// One page of a collection scan.
///
/// `page` is 1-based. Without a sort the backend returns documents in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
    pub sort: Option<SortSpec>,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Number of documents skipped before this page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE, Self::DEFAULT_LIMIT)
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(rename = "data")]
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        let limit = u64::from(request.limit.max(1));
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages: total.div_ceil(limit),
        }
    }

    /// Converts every item, keeping the pagination metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        })
    }
}

/// A single predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value exactly.
    Eq { field: String, value: Value },
    /// Field is a string containing `value`, ignoring ASCII case.
    Contains { field: String, value: String },
    /// At least one of the fields contains `value`, ignoring ASCII case.
    AnyContains { fields: Vec<String>, value: String },
    /// Field lies within the inclusive bounds. Numbers compare numerically,
    /// strings lexicographically.
    Range {
        field: String,
        min: Option<Value>,
        max: Option<Value>,
    },
}

impl Condition {
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Condition::Eq { field, value } => document.get(field) == Some(value),
            Condition::Contains { field, value } => contains_ignore_case(document.get(field), value),
            Condition::AnyContains { fields, value } => fields
                .iter()
                .any(|field| contains_ignore_case(document.get(field), value)),
            Condition::Range { field, min, max } => {
                let Some(actual) = document.get(field) else {
                    return false;
                };
                let above_min = min.as_ref().is_none_or(|min| {
                    matches!(
                        compare_values(actual, min),
                        Some(Ordering::Greater | Ordering::Equal)
                    )
                });
                let below_max = max.as_ref().is_none_or(|max| {
                    matches!(
                        compare_values(actual, max),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                });
                above_min && below_max
            }
        }
    }
}

fn contains_ignore_case(actual: Option<&Value>, needle: &str) -> bool {
    actual
        .and_then(Value::as_str)
        .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase()))
}

/// Orders two JSON scalars of the same kind. Mixed kinds are unordered.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn contains(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Contains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn any_contains<I, S>(mut self, fields: I, value: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions.push(Condition::AnyContains {
            fields: fields.into_iter().map(Into::into).collect(),
            value: value.into(),
        });
        self
    }

    pub fn range(
        mut self,
        field: impl Into<String>,
        min: Option<Value>,
        max: Option<Value>,
    ) -> Self {
        self.conditions.push(Condition::Range {
            field: field.into(),
            min,
            max,
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_request_clamps_and_offsets() {
        let req = PageRequest::new(0, 500);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, PageRequest::MAX_LIMIT);

        let req = PageRequest::new(3, 10);
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn page_computes_total_pages() {
        let page: Page<u8> = Page::new(vec![], 21, &PageRequest::new(1, 10));
        assert_eq!(page.total_pages, 3);

        let empty: Page<u8> = Page::new(vec![], 0, &PageRequest::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn page_serializes_items_as_data() {
        let page = Page::new(vec![1, 2], 2, &PageRequest::default());
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(
            value,
            json!({"data": [1, 2], "total": 2, "page": 1, "limit": 10, "totalPages": 1})
        );
    }

    #[test]
    fn sort_order_parses() {
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn filter_conditions() {
        let doc = json!({"genre": "Drama", "rating": 7.5, "lastName": "Kubrick"});

        assert!(Filter::new().matches(&doc));
        assert!(Filter::new().eq("genre", "Drama").matches(&doc));
        assert!(!Filter::new().eq("genre", "drama").matches(&doc));
        assert!(Filter::new().contains("lastName", "KUB").matches(&doc));
        assert!(
            Filter::new()
                .any_contains(["firstName", "lastName"], "brick")
                .matches(&doc)
        );
        assert!(
            Filter::new()
                .range("rating", Some(json!(7)), Some(json!(8)))
                .matches(&doc)
        );
        assert!(
            !Filter::new()
                .range("rating", Some(json!(8)), None)
                .matches(&doc)
        );
        assert!(!Filter::new().range("missing", None, None).matches(&doc));
    }
}
