use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, Acquire, Executor, Pool};
use tourhub_types::utils::slugify;
use tracing::debug;

use crate::{
    error::{NotFoundExt as _, Result},
    query::{field, list_records, EntitySchema, FieldKind, Record},
    Batch, ChosenDB, Error, ListingParams,
};

pub const TOUR_SCHEMA: EntitySchema = EntitySchema {
    table: "tour",
    fields: &[
        field("id", FieldKind::Integer),
        field("name", FieldKind::Text),
        field("slug", FieldKind::Text),
        field("duration", FieldKind::Integer),
        field("max_group_size", FieldKind::Integer),
        field("difficulty", FieldKind::Text),
        field("ratings_average", FieldKind::Float),
        field("ratings_quantity", FieldKind::Integer),
        field("price", FieldKind::Float),
        field("price_discount", FieldKind::Float),
        field("summary", FieldKind::Text),
        field("description", FieldKind::Text),
        field("image_cover", FieldKind::Text),
        field("images", FieldKind::Json),
        field("start_dates", FieldKind::Json),
        field("secret_tour", FieldKind::Bool),
        field("version", FieldKind::Integer),
        field("created_by", FieldKind::Text),
        field("created", FieldKind::DateTime),
        field("modified", FieldKind::DateTime),
    ],
    hidden: &["version"],
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Tour {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub duration: i64,
    pub max_group_size: i64,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Json<Vec<String>>,
    pub start_dates: Json<Vec<time::Date>>,
    pub secret_tour: bool,
    pub version: i64,
    pub created_by: Option<String>,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

fn check_discount(price: Option<f64>, discount: Option<f64>) -> Result<()> {
    match (price, discount) {
        (Some(price), Some(discount)) if discount >= price => Err(Error::ConstraintViolation(
            format!("Discount price ({discount}) should be below regular price"),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateTour {
    #[garde(length(chars, min = 10, max = 40))]
    pub name: String,
    #[garde(range(min = 1))]
    pub duration: i64,
    #[garde(range(min = 1))]
    pub max_group_size: i64,
    #[garde(skip)]
    pub difficulty: Difficulty,
    #[garde(range(min = 0.01))]
    pub price: f64,
    #[garde(range(min = 0.0))]
    pub price_discount: Option<f64>,
    #[garde(length(min = 1, max = 1000))]
    pub summary: String,
    #[garde(length(min = 1, max = 5000))]
    pub description: Option<String>,
    #[garde(length(min = 1, max = 255))]
    pub image_cover: String,
    #[serde(default)]
    #[garde(inner(length(min = 1, max = 255)))]
    pub images: Vec<String>,
    #[serde(default)]
    #[garde(skip)]
    pub start_dates: Vec<time::Date>,
    #[serde(default)]
    #[garde(skip)]
    pub secret_tour: bool,
    #[serde(skip_deserializing)]
    #[garde(skip)]
    pub created_by: Option<String>,
}

/// Partial update, only present fields are changed.
///
/// Ratings are not here, they are derived from reviews.
#[derive(Debug, Serialize, Deserialize, Clone, Validate, Default)]
pub struct UpdateTour {
    #[garde(length(chars, min = 10, max = 40))]
    pub name: Option<String>,
    #[garde(range(min = 1))]
    pub duration: Option<i64>,
    #[garde(range(min = 1))]
    pub max_group_size: Option<i64>,
    #[garde(skip)]
    pub difficulty: Option<Difficulty>,
    #[garde(range(min = 0.01))]
    pub price: Option<f64>,
    #[garde(range(min = 0.0))]
    pub price_discount: Option<f64>,
    #[garde(length(min = 1, max = 1000))]
    pub summary: Option<String>,
    #[garde(length(min = 1, max = 5000))]
    pub description: Option<String>,
    #[garde(length(min = 1, max = 255))]
    pub image_cover: Option<String>,
    #[garde(inner(inner(length(min = 1, max = 255))))]
    pub images: Option<Vec<String>>,
    #[garde(skip)]
    pub start_dates: Option<Vec<time::Date>>,
    #[garde(skip)]
    pub secret_tour: Option<bool>,
    #[garde(range(min = 0))]
    pub version: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct DifficultyStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct MonthPlan {
    pub month: i64,
    pub num_tour_starts: i64,
    pub tours: Json<Vec<String>>,
}

pub type TourRepository = TourRepositoryImpl<Pool<ChosenDB>>;

pub struct TourRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> TourRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateTour) -> Result<Tour> {
        check_discount(Some(payload.price), payload.price_discount)?;
        let result = sqlx::query(
            r#"INSERT INTO tour (name, slug, duration, max_group_size, difficulty, price, price_discount,
            summary, description, image_cover, images, start_dates, secret_tour, created_by, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"#,
        )
        .bind(&payload.name)
        .bind(slugify(&payload.name))
        .bind(payload.duration)
        .bind(payload.max_group_size)
        .bind(payload.difficulty)
        .bind(payload.price)
        .bind(payload.price_discount)
        .bind(&payload.summary)
        .bind(&payload.description)
        .bind(&payload.image_cover)
        .bind(Json(&payload.images))
        .bind(Json(&payload.start_dates))
        .bind(payload.secret_tour)
        .bind(&payload.created_by)
        .execute(&self.executor)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id).await
    }

    pub async fn update(&self, id: i64, payload: UpdateTour) -> Result<Tour> {
        let version = payload.version.ok_or_else(|| {
            debug!("No version provided");
            Error::MissingVersion
        })?;
        check_discount(payload.price, payload.price_discount)?;
        let mut transaction = self.executor.begin().await?;
        let result = sqlx::query(
            r#"UPDATE tour SET
            name = coalesce(?, name),
            slug = coalesce(?, slug),
            duration = coalesce(?, duration),
            max_group_size = coalesce(?, max_group_size),
            difficulty = coalesce(?, difficulty),
            price = coalesce(?, price),
            price_discount = coalesce(?, price_discount),
            summary = coalesce(?, summary),
            description = coalesce(?, description),
            image_cover = coalesce(?, image_cover),
            images = coalesce(?, images),
            start_dates = coalesce(?, start_dates),
            secret_tour = coalesce(?, secret_tour),
            version = ?,
            modified = datetime('now')
            WHERE id = ? AND version = ?"#,
        )
        .bind(&payload.name)
        .bind(payload.name.as_deref().map(slugify))
        .bind(payload.duration)
        .bind(payload.max_group_size)
        .bind(payload.difficulty)
        .bind(payload.price)
        .bind(payload.price_discount)
        .bind(&payload.summary)
        .bind(&payload.description)
        .bind(&payload.image_cover)
        .bind(payload.images.as_ref().map(Json))
        .bind(payload.start_dates.as_ref().map(Json))
        .bind(payload.secret_tour)
        .bind(version + 1)
        .bind(id)
        .bind(version)
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() == 0 {
            // distinguish missing record from stale version
            get(id, &mut *transaction).await?;
            Err(Error::FailedUpdate { id, version })
        } else {
            let record = get(id, &mut *transaction).await?;
            transaction.commit().await?;
            Ok(record)
        }
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM tour WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Tour".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Tour> {
        get(id, &self.executor).await
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<Record>> {
        list_records(&self.executor, &TOUR_SCHEMA, &params).await
    }

    /// Summary of public tours grouped by difficulty, cheapest group first
    pub async fn stats(&self) -> Result<Vec<DifficultyStats>> {
        const SQL: &str = r#"
        SELECT upper(difficulty) AS difficulty,
            count(*) AS num_tours,
            sum(ratings_quantity) AS num_ratings,
            avg(ratings_average) AS avg_rating,
            avg(price) AS avg_price,
            min(price) AS min_price,
            max(price) AS max_price
        FROM tour
        WHERE secret_tour = 0
        GROUP BY upper(difficulty)
        ORDER BY avg_price
        "#;
        let stats = sqlx::query_as::<_, DifficultyStats>(SQL)
            .fetch_all(&self.executor)
            .await?;
        Ok(stats)
    }

    /// Number of public tour starts per month of the year, busiest month first
    pub async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthPlan>> {
        const SQL: &str = r#"
        SELECT CAST(strftime('%m', d.value) AS INTEGER) AS month,
            count(*) AS num_tour_starts,
            json_group_array(t.name) AS tours
        FROM tour t, json_each(t.start_dates) d
        WHERE t.secret_tour = 0 AND d.value >= ? AND d.value <= ?
        GROUP BY month
        ORDER BY num_tour_starts DESC, month
        LIMIT 12
        "#;
        let plan = sqlx::query_as::<_, MonthPlan>(SQL)
            .bind(format!("{year:04}-01-01"))
            .bind(format!("{year:04}-12-31"))
            .fetch_all(&self.executor)
            .await?;
        Ok(plan)
    }
}

async fn get<'c, E>(id: i64, executor: E) -> Result<Tour>
where
    E: Executor<'c, Database = ChosenDB>,
{
    sqlx::query_as::<_, Tour>("SELECT * FROM tour WHERE id = ?")
        .bind(id)
        .fetch_one(executor)
        .await
        .or_not_found("Tour")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_discount() {
        assert!(check_discount(Some(100.0), Some(80.0)).is_ok());
        assert!(check_discount(Some(100.0), None).is_ok());
        assert!(check_discount(None, Some(80.0)).is_ok());
        assert!(matches!(
            check_discount(Some(100.0), Some(100.0)),
            Err(Error::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_create_tour_validation() {
        let payload: CreateTour = serde_json::from_value(serde_json::json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "max_group_size": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "image_cover": "tour-1-cover.jpg",
            "start_dates": ["2021-04-25", "2021-07-20"]
        }))
        .unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.start_dates.len(), 2);
        assert!(payload.images.is_empty());

        let mut short = payload.clone();
        short.name = "Short".to_string();
        assert!(short.validate().is_err());

        let bad: Result<CreateTour, _> = serde_json::from_value(serde_json::json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "max_group_size": 25,
            "difficulty": "extreme",
            "price": 397,
            "summary": "x",
            "image_cover": "x"
        }));
        assert!(bad.is_err());
    }
}
