use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// `page` and `limit` as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageParamsRaw {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParamsRaw {
    /// A malformed page number is an invalid page; a malformed limit falls back to the default.
    pub fn parse(&self) -> ApiResult<PageParams> {
        let page = match self.page.as_deref() {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| ApiError::not_found("Invalid page."))?,
            ),
            None => None,
        };
        let limit = self.limit.as_deref().and_then(|raw| raw.trim().parse::<i64>().ok());
        Ok(PageParams { page, limit })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
}

impl Page {
    /// `limit` overrides the default size and is clamped to `max_size`.
    pub fn from_params(params: PageParams, default_size: i64, max_size: i64) -> ApiResult<Self> {
        let number = params.page.unwrap_or(1);
        if number < 1 {
            return Err(ApiError::not_found("Invalid page."));
        }
        let size = match params.limit {
            Some(limit) if limit > 0 => limit.min(max_size),
            _ => default_size,
        };
        Ok(Page { number, size })
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }

    /// Rejects pages past the end. Page 1 always exists, even for an empty result.
    pub fn check_in_range(&self, count: i64) -> ApiResult<i64> {
        let pages = num_pages(count, self.size);
        if self.number > pages {
            return Err(ApiError::not_found("Invalid page."));
        }
        Ok(pages)
    }
}

pub fn num_pages(count: i64, size: i64) -> i64 {
    if count <= 0 {
        return 1;
    }
    (count + size - 1) / size
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub num_pages: i64,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_pages_rounds_up() {
        assert_eq!(num_pages(0, 10), 1);
        assert_eq!(num_pages(10, 10), 1);
        assert_eq!(num_pages(11, 10), 2);
        assert_eq!(num_pages(95, 10), 10);
    }

    #[test]
    fn limit_is_capped() {
        let page = Page::from_params(PageParams { page: Some(2), limit: Some(500) }, 10, 100).unwrap();
        assert_eq!(page, Page { number: 2, size: 100 });
        assert_eq!(page.offset(), 100);
    }

    #[test]
    fn non_positive_limit_falls_back_to_default() {
        let page = Page::from_params(PageParams { page: None, limit: Some(0) }, 10, 100).unwrap();
        assert_eq!(page.size, 10);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn page_zero_is_invalid() {
        let err = Page::from_params(PageParams { page: Some(0), limit: None }, 10, 100).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn pages_past_the_end_are_invalid() {
        let page = Page { number: 3, size: 10 };
        assert_eq!(page.check_in_range(25).unwrap(), 3);
        assert!(page.check_in_range(20).is_err());
        assert_eq!(Page { number: 1, size: 10 }.check_in_range(0).unwrap(), 1);
    }

    #[test]
    fn raw_page_must_be_numeric_but_raw_limit_may_not_be() {
        let raw = PageParamsRaw { page: Some("abc".into()), limit: None };
        assert!(matches!(raw.parse(), Err(ApiError::NotFound(_))));

        let raw = PageParamsRaw { page: Some(" 2 ".into()), limit: Some("lots".into()) };
        let params = raw.parse().unwrap();
        assert_eq!(params.page, Some(2));
        assert_eq!(params.limit, None);
        assert_eq!(Page::from_params(params, 10, 100).unwrap().size, 10);
    }
}
