//! Translation of request query string into [`ListingParams`].
//!
//! Query keys `page`, `sort`, `limit` and `fields` control the window, order
//! and projection of the listing, all other keys are filter conditions:
//!
//! - `difficulty=easy` equality
//! - `price[gte]=100` comparison, operators are `gte`, `gt`, `lte`, `lt`
//! - `price={"gte":100,"lt":500}` same comparisons written as JSON object
//! - `difficulty=easy&difficulty=medium` membership
//!
//! Field names are not checked here, that happens when the listing is executed.

mod parsers;

use axum::extract::FromRequestParts;
use http::request::Parts;
use tourhub_dal::{Comparison, Filter, FilterValue, ListingParams, Order, Projection, MAX_LIMIT};

use crate::error::{ApiError, ApiResult};

const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Field used for ordering, when none is requested
pub const DEFAULT_SORT_FIELD: &str = "created";

#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Single(String),
    Many(Vec<String>),
}

impl QueryValue {
    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => {
                *self = QueryValue::Many(vec![std::mem::take(first), value]);
            }
            QueryValue::Many(values) => values.push(value),
        }
    }

    fn first(&self) -> &str {
        match self {
            QueryValue::Single(v) => v,
            QueryValue::Many(values) => values.first().map(String::as_str).unwrap_or_default(),
        }
    }

    fn joined(&self) -> String {
        match self {
            QueryValue::Single(v) => v.clone(),
            QueryValue::Many(values) => values.join(","),
        }
    }
}

/// Decoded query string, repeated keys are collected, order of first occurrence is kept
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryMap(Vec<(String, QueryValue)>);

impl QueryMap {
    pub fn parse(query: &str) -> Self {
        let mut map = QueryMap::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            map.append(key.into_owned(), value.into_owned());
        }
        map
    }

    fn append(&mut self, key: String, value: String) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.push(value),
            None => self.0.push((key, QueryValue::Single(value))),
        }
    }

    /// Replaces all values of the key
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = QueryValue::Single(value.into());
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> FromRequestParts<S> for QueryMap
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(QueryMap::parse(parts.uri.query().unwrap_or_default()))
    }
}

/// Builds [`ListingParams`] from query in stages, each stage consumes the builder.
///
/// ```ignore
/// let params = QueryFeatures::new(ListingParams::default(), &query)
///     .filter()?
///     .sort()?
///     .limit_fields()?
///     .paginate(100)
///     .build();
/// ```
#[derive(Debug)]
pub struct QueryFeatures<'a> {
    query: &'a QueryMap,
    params: ListingParams,
}

impl<'a> QueryFeatures<'a> {
    /// `base` can carry preset conditions, e.g. parent record for nested listing
    pub fn new(base: ListingParams, query: &'a QueryMap) -> Self {
        QueryFeatures {
            query,
            params: base,
        }
    }

    /// All four stages with default page size
    pub fn apply(base: ListingParams, query: &'a QueryMap, default_limit: u32) -> ApiResult<ListingParams> {
        Ok(QueryFeatures::new(base, query)
            .filter()?
            .sort()?
            .limit_fields()?
            .paginate(default_limit)
            .build())
    }

    pub fn filter(self) -> ApiResult<Self> {
        let mut filter = self.params.filter;
        for (key, value) in self.query.iter() {
            if RESERVED_KEYS.contains(&key) {
                continue;
            }
            let (field, op) = parsers::parse_key(key)?;
            match (op, value) {
                (None, QueryValue::Single(raw)) if raw.trim_start().starts_with('{') => {
                    filter.extend(parsers::parse_json_conditions(field, raw)?);
                }
                (None, QueryValue::Single(raw)) => {
                    filter.push(Filter::eq(field, FilterValue::parse(raw)));
                }
                (None, QueryValue::Many(values)) => {
                    let values = values.iter().map(|v| FilterValue::parse(v)).collect();
                    filter.push(Filter::new(field, Comparison::In, FilterValue::List(values)));
                }
                (Some(op), QueryValue::Single(raw)) => {
                    filter.push(Filter::new(field, op, FilterValue::parse(raw)));
                }
                (Some(_), QueryValue::Many(_)) => {
                    return Err(ApiError::InvalidQuery(format!(
                        "Comparison {key} can have only one value"
                    )));
                }
            }
        }
        Ok(QueryFeatures {
            query: self.query,
            params: ListingParams {
                filter,
                ..self.params
            },
        })
    }

    pub fn sort(self) -> ApiResult<Self> {
        let order = match self.query.get("sort") {
            Some(value) => Some(parsers::parse_ordering(&value.joined())?),
            None => self
                .params
                .order
                .clone()
                .or_else(|| Some(vec![Order::Asc(DEFAULT_SORT_FIELD.to_string())])),
        };
        Ok(QueryFeatures {
            query: self.query,
            params: ListingParams {
                order,
                ..self.params
            },
        })
    }

    pub fn limit_fields(self) -> ApiResult<Self> {
        let projection = match self.query.get("fields") {
            Some(value) => match parsers::parse_fields(&value.joined())? {
                Some((true, names)) => Projection::Include(names),
                Some((false, names)) => Projection::Exclude(names),
                None => Projection::Default,
            },
            None => self.params.projection.clone(),
        };
        Ok(QueryFeatures {
            query: self.query,
            params: ListingParams {
                projection,
                ..self.params
            },
        })
    }

    /// Invalid `page` or `limit` fall back to first page and `default_limit`.
    /// Any `page` given marks the window as requested.
    pub fn paginate(self, default_limit: u32) -> Self {
        let page_requested = self.query.get("page").is_some();
        let page = self
            .query
            .get("page")
            .and_then(|v| parsers::parse_positive(v.first()))
            .unwrap_or(1);
        let limit = self
            .query
            .get("limit")
            .and_then(|v| parsers::parse_positive(v.first()))
            .unwrap_or(default_limit as i64)
            .clamp(1, MAX_LIMIT as i64);
        let offset = (page - 1).saturating_mul(limit);
        QueryFeatures {
            query: self.query,
            params: ListingParams {
                offset,
                limit,
                page_requested: page_requested || self.params.page_requested,
                ..self.params
            },
        }
    }

    pub fn build(self) -> ListingParams {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen, TestResult};
    use quickcheck_macros::quickcheck;

    use super::*;

    fn build(query: &str) -> ApiResult<ListingParams> {
        let query = QueryMap::parse(query);
        QueryFeatures::apply(ListingParams::default(), &query, 100)
    }

    #[test]
    fn test_query_map() {
        let map = QueryMap::parse("a=1&b=x%20y&a=2&c=");
        assert_eq!(
            map.get("a"),
            Some(&QueryValue::Many(vec!["1".into(), "2".into()]))
        );
        assert_eq!(map.get("b"), Some(&QueryValue::Single("x y".into())));
        assert_eq!(map.get("c"), Some(&QueryValue::Single("".into())));
        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        let map = map.set("a", "3");
        assert_eq!(map.get("a"), Some(&QueryValue::Single("3".into())));
    }

    #[test]
    fn test_comparisons() {
        let params = build("price[gte]=100&price[lt]=500&duration[gt]=2&duration[lte]=7").unwrap();
        assert_eq!(
            params.filter,
            vec![
                Filter::new("price", Comparison::Gte, FilterValue::Integer(100)),
                Filter::new("price", Comparison::Lt, FilterValue::Integer(500)),
                Filter::new("duration", Comparison::Gt, FilterValue::Integer(2)),
                Filter::new("duration", Comparison::Lte, FilterValue::Integer(7)),
            ]
        );
    }

    #[test]
    fn test_json_comparison() {
        let params = build(r#"price={"gte":100}&difficulty=easy"#).unwrap();
        assert_eq!(
            params.filter,
            vec![
                Filter::new("price", Comparison::Gte, FilterValue::Integer(100)),
                Filter::eq("difficulty", FilterValue::Text("easy".into())),
            ]
        );
        assert!(matches!(
            build(r#"price={"gte":100"#),
            Err(ApiError::InvalidQuery(_))
        ));
        assert!(matches!(
            build(r#"price={"$ne":100}"#),
            Err(ApiError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_membership() {
        let params = build("difficulty=easy&difficulty=medium").unwrap();
        assert_eq!(
            params.filter,
            vec![Filter::new(
                "difficulty",
                Comparison::In,
                FilterValue::List(vec![
                    FilterValue::Text("easy".into()),
                    FilterValue::Text("medium".into())
                ])
            )]
        );
        assert!(build("price[gt]=1&price[gt]=2").is_err());
    }

    #[test]
    fn test_injection_shaped_value() {
        let params = build("name=x'%20OR%201%3D1--").unwrap();
        assert_eq!(
            params.filter,
            vec![Filter::eq("name", FilterValue::Text("x' OR 1=1--".into()))]
        );
    }

    #[test]
    fn test_sort() {
        let params = build("sort=price,-ratings_average").unwrap();
        assert_eq!(
            params.order,
            Some(vec![
                Order::Asc("price".into()),
                Order::Desc("ratings_average".into())
            ])
        );
        let params = build("").unwrap();
        assert_eq!(params.order, Some(vec![Order::Asc("created".into())]));
        let params = build("sort=price&sort=-duration").unwrap();
        assert_eq!(
            params.order,
            Some(vec![
                Order::Asc("price".into()),
                Order::Desc("duration".into())
            ])
        );
        assert!(build("sort=").is_err());
    }

    #[test]
    fn test_fields() {
        let params = build("fields=name,price").unwrap();
        assert_eq!(
            params.projection,
            Projection::Include(vec!["name".into(), "price".into()])
        );
        let params = build("fields=-summary,-description").unwrap();
        assert_eq!(
            params.projection,
            Projection::Exclude(vec!["summary".into(), "description".into()])
        );
        assert_eq!(build("").unwrap().projection, Projection::Default);
        assert!(build("fields=name,-summary").is_err());
    }

    #[test]
    fn test_paginate() {
        let params = build("page=2&limit=5").unwrap();
        assert_eq!((params.offset, params.limit), (5, 5));
        assert_eq!(params.page(), 2);

        let params = build("page=3&limit=5").unwrap();
        assert_eq!(params.offset, 10);
        assert!(params.page_requested);

        let params = build("page=1").unwrap();
        assert_eq!(params.offset, 0);
        assert!(params.page_requested);
        assert!(!build("limit=5").unwrap().page_requested);

        for query in ["page=0&limit=-1", "page=x&limit=y", ""] {
            let params = build(query).unwrap();
            assert_eq!((params.offset, params.limit), (0, 100), "query {query}");
        }

        let params = build("limit=1000000").unwrap();
        assert_eq!(params.limit, MAX_LIMIT as i64);
        assert!(params.filter.is_empty());
    }

    #[test]
    fn test_base_params_kept() {
        let base = ListingParams::default()
            .with_filter(Filter::eq("tour_id", FilterValue::Integer(7)))
            .with_order(vec![Order::Desc("rating".into())]);
        let query = QueryMap::parse("rating[gte]=4");
        let params = QueryFeatures::apply(base, &query, 10).unwrap();
        assert_eq!(params.filter.len(), 2);
        assert_eq!(params.filter[0].field, "tour_id");
        assert_eq!(params.order, Some(vec![Order::Desc("rating".into())]));
        assert_eq!(params.limit, 10);
    }

    #[derive(Debug, Clone)]
    struct PlainQuery(Vec<(String, String)>);

    impl Arbitrary for PlainQuery {
        fn arbitrary(g: &mut Gen) -> Self {
            const KEY_CHARS: &[char] = &['a', 'b', 'c', 'x', 'y', 'z', '_', '1', '2'];
            let size = usize::arbitrary(g) % 6;
            let mut pairs: Vec<(String, String)> = Vec::new();
            while pairs.len() < size {
                let len = 1 + usize::arbitrary(g) % 8;
                let key: String = (0..len).map(|_| *g.choose(KEY_CHARS).unwrap()).collect();
                let value = String::arbitrary(g);
                if !pairs.iter().any(|(k, _)| *k == key) {
                    pairs.push((key, value));
                }
            }
            PlainQuery(pairs)
        }
    }

    impl PlainQuery {
        fn encoded(&self) -> String {
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.0.iter())
                .finish()
        }
    }

    #[quickcheck]
    fn prop_plain_keys_are_equality(query: PlainQuery) -> TestResult {
        if query.0.iter().any(|(k, v)| {
            RESERVED_KEYS.contains(&k.as_str()) || v.trim_start().starts_with('{')
        }) {
            return TestResult::discard();
        }
        let params = match build(&query.encoded()) {
            Ok(params) => params,
            Err(_) => return TestResult::failed(),
        };
        if params.filter.len() != query.0.len() {
            return TestResult::failed();
        }
        let verbatim = params.filter.iter().zip(query.0.iter()).all(|(f, (k, v))| {
            f.field == *k && f.op == Comparison::Eq && f.value.to_string() == *v
        });
        TestResult::from_bool(verbatim)
    }
}
