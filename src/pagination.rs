//! Page-number pagination driven by the `pgnum` and `pgsize` query parameters.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: i64 = 2;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number.
    pub pgnum: Option<String>,
    /// Items per page, capped at 100.
    pub pgsize: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid page")]
pub struct InvalidPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: i64,
    pub size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            number: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageParams {
    /// A page number that is not a positive integer is an error. A bad page size
    /// falls back to the default instead.
    pub fn page_request(&self) -> Result<PageRequest, InvalidPage> {
        let number = match self.pgnum.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|number| *number >= 1)
                .ok_or(InvalidPage)?,
        };
        let size = self
            .pgsize
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|size| *size >= 1)
            .map_or(DEFAULT_PAGE_SIZE, |size| size.min(MAX_PAGE_SIZE));

        Ok(PageRequest { number, size })
    }
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }

    /// The first page always exists, even when there is nothing to show.
    pub fn check(&self, count: i64) -> Result<(), InvalidPage> {
        if self.number == 1 || self.offset() < count {
            Ok(())
        } else {
            Err(InvalidPage)
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Page<T> {
    pub count: i64,
    /// Next page number, if any.
    pub next: Option<i64>,
    /// Previous page number, if any.
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, count: i64, results: Vec<T>) -> Self {
        let has_next = request.offset().saturating_add(request.size) < count;
        Self {
            count,
            next: has_next.then_some(request.number + 1),
            previous: (request.number > 1).then_some(request.number - 1),
            results,
        }
    }
}
