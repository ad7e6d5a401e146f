//! Listing query parameters.

use reelhub_storage::{PageRequest, SortOrder, SortSpec};
use serde::Deserialize;

use crate::error::ApiError;

/// `?page=&limit=&sortBy=&sortOrder=` as sent by the client.
///
/// Fields stay strings so malformed values produce a 400 with a readable
/// message rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListQuery {
    /// Validates the parameters. `sortBy` must name one of `sortable`.
    pub fn to_page_request(&self, sortable: &[&str]) -> Result<PageRequest, ApiError> {
        let page = parse_bounded(
            self.page.as_deref(),
            "page",
            PageRequest::DEFAULT_PAGE,
            1,
            u32::MAX,
        )?;
        let limit = parse_bounded(
            self.limit.as_deref(),
            "limit",
            PageRequest::DEFAULT_LIMIT,
            1,
            PageRequest::MAX_LIMIT,
        )?;

        let order = match non_empty(self.sort_order.as_deref()) {
            None => SortOrder::default(),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "asc" => SortOrder::Asc,
                "desc" => SortOrder::Desc,
                _ => return Err(ApiError::validation("sortOrder must be 'asc' or 'desc'")),
            },
        };

        let mut request = PageRequest::new(page, limit);
        if let Some(field) = non_empty(self.sort_by.as_deref()) {
            if !sortable.contains(&field) {
                return Err(ApiError::validation(format!(
                    "sortBy must be one of: {}",
                    sortable.join(", ")
                )));
            }
            request = request.with_sort(SortSpec::new(field, order));
        }
        Ok(request)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bounded(
    raw: Option<&str>,
    name: &str,
    default: u32,
    min: u32,
    max: u32,
) -> Result<u32, ApiError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(n) if (min..=max).contains(&n) => Ok(n),
        _ if max == u32::MAX => Err(ApiError::validation(format!(
            "{name} must be an integer >= {min}"
        ))),
        _ => Err(ApiError::validation(format!(
            "{name} must be an integer between {min} and {max}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORTABLE: &[&str] = &["title", "rating"];

    fn query(page: Option<&str>, limit: Option<&str>, by: Option<&str>, order: Option<&str>) -> ListQuery {
        ListQuery {
            page: page.map(Into::into),
            limit: limit.map(Into::into),
            sort_by: by.map(Into::into),
            sort_order: order.map(Into::into),
        }
    }

    #[test]
    fn defaults() {
        let req = ListQuery::default().to_page_request(SORTABLE).unwrap();
        assert_eq!(req, PageRequest::new(1, 10));
    }

    #[test]
    fn explicit_values() {
        let req = query(Some("3"), Some("25"), Some("rating"), Some("DESC"))
            .to_page_request(SORTABLE)
            .unwrap();
        assert_eq!(req.page, 3);
        assert_eq!(req.limit, 25);
        assert_eq!(req.sort, Some(SortSpec::new("rating", SortOrder::Desc)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for q in [
            query(Some("0"), None, None, None),
            query(Some("abc"), None, None, None),
            query(None, Some("0"), None, None),
            query(None, Some("101"), None, None),
            query(None, None, Some("budget"), None),
            query(None, None, Some("title"), Some("up")),
        ] {
            let err = q.to_page_request(SORTABLE).unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        }
    }
}
