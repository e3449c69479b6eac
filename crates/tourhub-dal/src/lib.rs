pub mod error;
pub mod query;
pub mod rating;
pub mod review;
pub mod tour;
pub mod user;

use std::{fmt::Display, str::FromStr};

pub use error::Error;
pub use query::{Comparison, Filter, FilterValue, Projection};
pub use sqlx::Error as SqlxError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type ChosenRow = sqlx::sqlite::SqliteRow;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

pub async fn new_pool(database_url: &str) -> Result<Pool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(50)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &Pool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Asc(String),
    Desc(String),
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc(s) => write!(f, "{}", s),
            Order::Desc(s) => write!(f, "{} DESC", s),
        }
    }
}

impl AsRef<str> for Order {
    fn as_ref(&self) -> &str {
        match self {
            Order::Asc(s) => s.as_str(),
            Order::Desc(s) => s.as_str(),
        }
    }
}

/// Filter, ordering, projection and window of one listing request.
///
/// Nothing is validated here, fields are checked against the entity schema
/// only when the listing is executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
    pub order: Option<Vec<Order>>,
    pub filter: Vec<Filter>,
    pub projection: Projection,
    /// Window was asked for explicitly, so even the first one must exist
    pub page_requested: bool,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_LIMIT as i64,
            order: None,
            filter: Vec::new(),
            projection: Projection::Default,
            page_requested: false,
        }
    }
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    pub fn with_order(mut self, order: Vec<Order>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter.push(filter);
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_page_requested(mut self) -> Self {
        self.page_requested = true;
        self
    }

    /// 1-based page number of this window
    pub fn page(&self) -> i64 {
        if self.limit > 0 {
            self.offset / self.limit + 1
        } else {
            1
        }
    }

    pub fn ordering(&self, valid_fields: &[&str]) -> Result<String> {
        let mut ordering = self
            .order
            .as_ref()
            .map(|o| {
                o.iter()
                    .map(|o| {
                        if valid_fields.contains(&o.as_ref()) {
                            Ok(o.to_string())
                        } else {
                            Err(Error::InvalidQuery(format!(
                                "Invalid sort field {}",
                                o.as_ref()
                            )))
                        }
                    })
                    .collect::<Result<Vec<String>>>()
            })
            .transpose()?
            .unwrap_or_default();

        // id is unique, so it makes the order total and pages stable
        if !self
            .order
            .iter()
            .flatten()
            .any(|o| o.as_ref() == "id")
        {
            ordering.push("id".to_string());
        }
        Ok(ordering.join(", "))
    }
}

/// One window of listed records together with total count of matching records
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub offset: i64,
    pub limit: i64,
    pub total: u64,
    pub rows: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        let params = ListingParams::default().with_order(vec![
            Order::Asc("price".into()),
            Order::Desc("ratings_average".into()),
        ]);
        let ordering = params.ordering(&["price", "ratings_average"]).unwrap();
        assert_eq!(ordering, "price, ratings_average DESC, id");

        let params = ListingParams::default().with_order(vec![Order::Desc("id".into())]);
        assert_eq!(params.ordering(&["id"]).unwrap(), "id DESC");

        let params = ListingParams::default();
        assert_eq!(params.ordering(&[]).unwrap(), "id");

        let params = ListingParams::default().with_order(vec![Order::Asc("secret".into())]);
        assert!(matches!(
            params.ordering(&["price"]),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_page() {
        assert_eq!(ListingParams::new(0, 5).page(), 1);
        assert_eq!(ListingParams::new(5, 5).page(), 2);
        assert_eq!(ListingParams::new(15, 5).page(), 4);
    }
}
