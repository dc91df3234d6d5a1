//! Request extractors that report through `AppError`, plus list pagination.

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// JSON body; malformed bodies become a 400 with the standard error shape.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(AppError::user("invalid_body", rejection.body_text())),
        }
    }
}

/// Query string counterpart of [`Payload`].
pub struct Params<T>(pub T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Params(value)),
            Err(rejection) => Err(AppError::user("invalid_query", rejection.body_text())),
        }
    }
}

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl Pagination {
    /// 1-based page and a limit in `1..=MAX_LIMIT`.
    pub fn window(&self) -> AppResult<(usize, usize)> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if page == 0 {
            return Err(AppError::user("invalid_page", "Invalid page. Pages start at 1."));
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(AppError::user("invalid_limit", format!("Invalid limit. Valid: 1 to {}.", MAX_LIMIT)));
        }
        Ok((page, limit))
    }

    pub fn apply<T>(&self, items: Vec<T>) -> AppResult<Page<T>> {
        let (page, limit) = self.window()?;
        let total = items.len();
        let items = items.into_iter().skip((page - 1).saturating_mul(limit)).take(limit).collect();
        Ok(Page { total, page, limit, items })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { total: self.total, page: self.page, limit: self.limit, items: self.items.into_iter().map(f).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_slice_and_report_total() {
        let p = Pagination { page: Some(2), limit: Some(3) };
        let page = p.apply((1..=8).collect::<Vec<_>>()).unwrap();
        assert_eq!(page.total, 8);
        assert_eq!(page.items, vec![4, 5, 6]);

        let last = Pagination { page: Some(9), limit: Some(3) }.apply(vec![1, 2]).unwrap();
        assert!(last.items.is_empty());
        assert_eq!(last.total, 2);
    }

    #[test]
    fn defaults_and_bounds() {
        assert_eq!(Pagination::default().window().unwrap(), (1, DEFAULT_LIMIT));
        assert_eq!(Pagination { page: Some(0), limit: None }.window().unwrap_err().http_status(), 400);
        assert!(Pagination { page: None, limit: Some(MAX_LIMIT + 1) }.window().is_err());
        assert!(Pagination { page: None, limit: Some(0) }.window().is_err());
    }
}
