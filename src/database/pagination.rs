use serde::Serialize;

use crate::{
    constants::MAX_PAGE_SIZE,
    error::{Error, HttpError},
};

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Page-number request parsed from the raw query string.
///
/// The rest of the query is kept verbatim (still percent-encoded) so that
/// `next`/`previous` links carry the caller's filters along.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
    offset: i64,
    url: String,
    rest: Vec<String>,
}

impl PageRequest {
    pub fn parse(url: &str, raw_query: &str, default_limit: i64) -> Result<Self, Error> {
        let mut page = 1;
        let mut limit = default_limit;
        let mut rest = vec![];

        for segment in raw_query.split('&').filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));

            match key {
                "page" => {
                    page = value
                        .parse::<i64>()
                        .ok()
                        .filter(|page| *page >= 1)
                        .ok_or_else(|| HttpError::NotFound.new("Invalid page."))?;
                }
                "limit" | "page_size" => {
                    limit = value
                        .parse::<i64>()
                        .ok()
                        .filter(|limit| *limit >= 1)
                        .map(|limit| limit.min(MAX_PAGE_SIZE))
                        .unwrap_or(default_limit);
                    rest.push(format!("{key}={limit}"));
                }
                _ => rest.push(segment.to_string()),
            }
        }

        // Pages this far out can never hold rows.
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| HttpError::NotFound.new("Invalid page."))?;

        Ok(Self {
            page,
            limit,
            offset,
            url: url.to_string(),
            rest,
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    fn link(&self, page: i64) -> String {
        let mut query = self.rest.clone();
        if page > 1 {
            query.push(format!("page={page}"));
        }

        if query.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{}", self.url, query.join("&"))
        }
    }
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, request: &PageRequest) -> Result<Self, Error> {
        let page_count = ((total_rows + request.limit - 1) / request.limit).max(1);

        if request.page > page_count {
            return Err(HttpError::NotFound.new("Invalid page."));
        }

        Ok(Self {
            count: total_rows,
            next: (request.page < page_count).then(|| request.link(request.page + 1)),
            previous: (request.page > 1).then(|| request.link(request.page - 1)),
            results: rows,
        })
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageContext<U> {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
