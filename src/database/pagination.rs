use serde::{Deserialize, Serialize};

use crate::{constants::MAX_PAGE_SIZE, error::ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Reads `page` and `limit` from raw query pairs, other keys are ignored.
    pub fn from_query(pairs: &[(String, String)], default_limit: i64) -> Result<Self, ServiceError> {
        let mut page = 1;
        let mut limit = default_limit;

        for (key, value) in pairs {
            match key.as_str() {
                "page" => page = parse_positive(key, value)?,
                "limit" => limit = parse_positive(key, value)?,
                _ => {}
            }
        }

        Ok(Self::new(page, limit))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<i64, ServiceError> {
    match value.parse::<i64>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(ServiceError::Validation(format!(
            "Query parameter '{key}' must be a positive integer"
        ))),
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(results: Vec<T>, total_rows: i64, request: PageRequest) -> Self {
        if results.is_empty() && request.page == 1 {
            return Self::no_rows();
        }

        let shown = request.offset().saturating_add(results.len() as i64);
        let next = (shown < total_rows).then_some(request.page.saturating_add(1));
        let previous = (request.page > 1).then_some(request.page - 1);

        Self {
            count: total_rows,
            next,
            previous,
            results,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
        }
    }
}
