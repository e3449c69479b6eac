//! Derived rating summary of a tour.
//!
//! `ratings_quantity` and `ratings_average` on a tour are written only here.
//! Every write to reviews must be followed by [`recompute_ratings`] for the
//! affected tour, in the same transaction (see [`crate::review`]).

use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::debug;

use crate::{error::Result, ChosenDB, Error};

/// Average used when a tour has no reviews
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RatingSummary {
    pub tour_id: i64,
    pub ratings_quantity: i64,
    pub ratings_average: f64,
}

/// Recomputes count and mean rating of all reviews of the tour and stores them on the tour.
///
/// Aggregation and write are one statement, so concurrent recomputations
/// of the same tour cannot interleave. Idempotent.
pub(crate) async fn recompute_ratings<'c, E>(tour_id: i64, executor: E) -> Result<RatingSummary>
where
    E: sqlx::Executor<'c, Database = ChosenDB>,
{
    const SQL: &str = r#"
    UPDATE tour SET
        ratings_quantity = (SELECT count(*) FROM review r WHERE r.tour_id = tour.id),
        ratings_average = coalesce((SELECT avg(r.rating) FROM review r WHERE r.tour_id = tour.id), ?)
    WHERE id = ?
    RETURNING id AS tour_id, ratings_quantity, ratings_average
    "#;
    let summary = sqlx::query_as::<_, RatingSummary>(SQL)
        .bind(DEFAULT_RATINGS_AVERAGE)
        .bind(tour_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Tour".to_string()))?;
    debug!("Recomputed ratings {summary:?}");
    Ok(summary)
}

pub type RatingRepository = RatingRepositoryImpl<Pool<ChosenDB>>;

pub struct RatingRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> RatingRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn recompute_ratings(&self, tour_id: i64) -> Result<RatingSummary> {
        recompute_ratings(tour_id, &self.executor).await
    }
}
