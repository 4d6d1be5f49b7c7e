//! Paging for list endpoints.
//!
//! Lists of drivers, trips, costs and the rest take `skip`/`limit` in the query string and
//! answer with a [`PaginatedResponse`] whose `total_count` counts every match of the filters.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: i64 = 10;

pub const MAX_LIMIT: i64 = 100;

/// `skip`/`limit` as sent by the client. List queries flatten this in, so both fields are
/// parsed from their string form.
///
/// Out-of-range values are not rejected: `skip` floors at 0 and `limit` is held to
/// `1..=MAX_LIMIT`.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Rows to skip before the page starts
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Page size, at most 100
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn skip(&self) -> i64 {
        self.skip.map_or(0, |skip| skip.max(0))
    }

    pub fn limit(&self) -> i64 {
        self.limit.map_or(DEFAULT_LIMIT, |limit| limit.clamp(1, MAX_LIMIT))
    }

    /// `(skip, limit)` ready for a repository filter
    pub fn params(&self) -> (i64, i64) {
        (self.skip(), self.limit())
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    pub data: Vec<T>,
    /// Matches across all pages
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self {
            data,
            total_count,
            skip,
            limit,
        }
    }

    /// Convert repository rows into their API shape, echoing the effective paging.
    pub fn from_rows<R>(rows: Vec<R>, total_count: i64, pagination: &Pagination) -> Self
    where
        T: From<R>,
    {
        let (skip, limit) = pagination.params();
        Self::new(rows.into_iter().map(T::from).collect(), total_count, skip, limit)
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::Query, http::Uri};

    use crate::api::models::drivers::ListDriversQuery;

    use super::*;

    fn paging(skip: Option<i64>, limit: Option<i64>) -> Pagination {
        Pagination { skip, limit }
    }

    #[test]
    fn test_out_of_range_values_are_held_in_bounds() {
        let cases = [
            (paging(None, None), (0, DEFAULT_LIMIT)),
            (paging(Some(-3), Some(0)), (0, 1)),
            (paging(Some(40), Some(-7)), (40, 1)),
            (paging(Some(5), Some(500)), (5, MAX_LIMIT)),
            (paging(Some(20), Some(25)), (20, 25)),
        ];
        for (pagination, expected) in cases {
            assert_eq!(pagination.params(), expected, "{pagination:?}");
        }
    }

    #[test]
    fn test_paging_parses_from_flattened_query() {
        let uri: Uri = "/drivers?skip=30&limit=15&search=silva".parse().unwrap();
        let Query(query) = Query::<ListDriversQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.pagination.params(), (30, 15));
        assert_eq!(query.search.as_deref(), Some("silva"));

        let uri: Uri = "/drivers?limit=many".parse().unwrap();
        assert!(Query::<ListDriversQuery>::try_from_uri(&uri).is_err());
    }

    #[test]
    fn test_page_echoes_effective_paging() {
        #[derive(ToSchema, Serialize)]
        struct Plate(String);
        impl From<&str> for Plate {
            fn from(raw: &str) -> Self {
                Plate(raw.to_uppercase())
            }
        }

        let page = PaginatedResponse::<Plate>::from_rows(vec!["abc1d23", "xyz9k88"], 42, &paging(Some(10), Some(1000)));
        assert_eq!(page.data.iter().map(|p| p.0.as_str()).collect::<Vec<_>>(), ["ABC1D23", "XYZ9K88"]);
        assert_eq!((page.total_count, page.skip, page.limit), (42, 10, MAX_LIMIT));
    }
}
