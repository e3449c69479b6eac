//! Reviews of tours.
//!
//! All writes recompute rating summary of the affected tour in the same transaction.

use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool};
use tracing::debug;

use crate::{
    error::{NotFoundExt as _, Result},
    query::{field, list_records, EntitySchema, FieldKind, Record},
    rating::recompute_ratings,
    Batch, ChosenDB, Error, ListingParams,
};

pub const REVIEW_SCHEMA: EntitySchema = EntitySchema {
    table: "review_listing",
    fields: &[
        field("id", FieldKind::Integer),
        field("review", FieldKind::Text),
        field("rating", FieldKind::Integer),
        field("tour_id", FieldKind::Integer),
        field("user_id", FieldKind::Integer),
        field("user_name", FieldKind::Text),
        field("user_photo", FieldKind::Text),
        field("version", FieldKind::Integer),
        field("created", FieldKind::DateTime),
        field("modified", FieldKind::DateTime),
    ],
    hidden: &["version"],
};

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub review: String,
    pub rating: i64,
    pub tour_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_photo: Option<String>,
    pub version: i64,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

/// Review as submitted. Author always comes from the caller identity,
/// tour can come from the body or from the nested route.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateReview {
    #[garde(length(min = 1, max = 5000))]
    pub review: String,
    #[garde(range(min = 1, max = 5))]
    pub rating: i64,
    #[garde(skip)]
    pub tour_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate, Default)]
pub struct UpdateReview {
    #[garde(length(min = 1, max = 5000))]
    pub review: Option<String>,
    #[garde(range(min = 1, max = 5))]
    pub rating: Option<i64>,
    #[garde(range(min = 0))]
    pub version: Option<i64>,
}

pub type ReviewRepository = ReviewRepositoryImpl<Pool<ChosenDB>>;

pub struct ReviewRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> ReviewRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateReview, tour_id: i64, user_id: i64) -> Result<Review> {
        let mut tx = self.executor.begin().await?;
        let result = sqlx::query(
            "INSERT INTO review (review, rating, tour_id, user_id, version) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(&payload.review)
        .bind(payload.rating)
        .bind(tour_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        recompute_ratings(tour_id, &mut *tx).await?;
        let review = get(id, &mut *tx).await?;
        tx.commit().await?;
        Ok(review)
    }

    pub async fn update(&self, id: i64, payload: UpdateReview) -> Result<Review> {
        let version = payload.version.ok_or_else(|| {
            debug!("No version provided");
            Error::MissingVersion
        })?;
        let mut tx = self.executor.begin().await?;
        let tour_id = tour_of_review(id, &mut *tx).await?;

        let result = sqlx::query(
            r#"UPDATE review SET
            review = coalesce(?, review),
            rating = coalesce(?, rating),
            version = ?,
            modified = datetime('now')
            WHERE id = ? AND version = ?"#,
        )
        .bind(&payload.review)
        .bind(payload.rating)
        .bind(version + 1)
        .bind(id)
        .bind(version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::FailedUpdate { id, version });
        }

        recompute_ratings(tour_id, &mut *tx).await?;
        let review = get(id, &mut *tx).await?;
        tx.commit().await?;
        Ok(review)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.executor.begin().await?;
        let tour_id = tour_of_review(id, &mut *tx).await?;

        sqlx::query("DELETE FROM review WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        recompute_ratings(tour_id, &mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Review> {
        get(id, &self.executor).await
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<Record>> {
        list_records(&self.executor, &REVIEW_SCHEMA, &params).await
    }
}

async fn tour_of_review<'c, E>(id: i64, executor: E) -> Result<i64>
where
    E: Executor<'c, Database = ChosenDB>,
{
    sqlx::query_scalar::<_, i64>("SELECT tour_id FROM review WHERE id = ?")
        .bind(id)
        .fetch_one(executor)
        .await
        .or_not_found("Review")
}

async fn get<'c, E>(id: i64, executor: E) -> Result<Review>
where
    E: Executor<'c, Database = ChosenDB>,
{
    sqlx::query_as::<_, Review>("SELECT * FROM review_listing WHERE id = ?")
        .bind(id)
        .fetch_one(executor)
        .await
        .or_not_found("Review")
}
