use serde::Serialize;

use super::{error::ApiError, form::QueryForm};
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// `page`/`limit` query parameters, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    pub fn from_form(form: &QueryForm) -> Result<Self, ApiError> {
        let page = match form.get_str("page") {
            None | Some("") => 1,
            Some(value) => match value.parse::<i64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(ApiError::not_found("Invalid page.")),
            },
        };

        let limit = form
            .get_str("limit")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .map(|limit| limit.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        // the offset has to fit in a BIGINT
        if (page - 1).checked_mul(limit).is_none() {
            return Err(ApiError::not_found("Invalid page."));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// The absolute URL of the current request, used to build `next`/`previous` links.
#[derive(Debug, Clone)]
pub struct PageLink {
    pub base_url: String,
    pub path: String,
    pub query: QueryForm,
}

impl PageLink {
    pub fn new(base_url: &str, path: &str, query: QueryForm) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.to_string(),
            query,
        }
    }

    pub fn to_page(&self, page: i64) -> String {
        // the first page is linked without a `page` parameter
        let value = page.to_string();
        let query = self
            .query
            .with_param("page", if page <= 1 { None } else { Some(&value) });

        if query.is_empty() {
            format!("{}{}", self.base_url, self.path)
        } else {
            format!("{}{}?{}", self.base_url, self.path, query)
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        params: PageParams,
        link: &PageLink,
    ) -> Result<Self, ApiError> {
        if rows.is_empty() && params.page > 1 {
            return Err(ApiError::not_found("Invalid page."));
        }

        let page_count = (total_rows + params.limit - 1) / params.limit;
        let next = (params.page < page_count).then(|| link.to_page(params.page + 1));
        let previous = (params.page > 1).then(|| link.to_page(params.page - 1));

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
