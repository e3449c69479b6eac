mod common;

use common::init_db;
use tourhub_dal::{
    Error, Filter, FilterValue, ListingParams,
    rating::{DEFAULT_RATINGS_AVERAGE, RatingRepositoryImpl},
    review::{CreateReview, ReviewRepositoryImpl, UpdateReview},
    tour::TourRepositoryImpl,
};

fn review(rating: i64) -> CreateReview {
    CreateReview {
        review: format!("Rated {rating}"),
        rating,
        tour_id: None,
    }
}

#[tokio::test]
async fn test_ratings_follow_reviews() {
    let conn = init_db().await;
    let reviews = ReviewRepositoryImpl::new(conn.clone());
    let tours = TourRepositoryImpl::new(conn.clone());
    let ratings = RatingRepositoryImpl::new(conn);

    let summary = ratings.recompute_ratings(1).await.unwrap();
    assert_eq!(summary.ratings_quantity, 0);
    assert_eq!(summary.ratings_average, DEFAULT_RATINGS_AVERAGE);

    reviews.create(review(3), 1, 1).await.unwrap();
    reviews.create(review(4), 1, 2).await.unwrap();
    let five = reviews.create(review(5), 1, 3).await.unwrap();
    assert_eq!(five.user_name, "Kate Morrison");

    let tour = tours.get(1).await.unwrap();
    assert_eq!(tour.ratings_quantity, 3);
    assert_eq!(tour.ratings_average, 4.0);

    reviews.delete(five.id).await.unwrap();
    let tour = tours.get(1).await.unwrap();
    assert_eq!(tour.ratings_quantity, 2);
    assert_eq!(tour.ratings_average, 3.5);

    let first = ratings.recompute_ratings(1).await.unwrap();
    let second = ratings.recompute_ratings(1).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.ratings_quantity, 2);

    // other tours untouched
    let other = tours.get(2).await.unwrap();
    assert_eq!(other.ratings_quantity, 0);
    assert_eq!(other.ratings_average, DEFAULT_RATINGS_AVERAGE);

    assert!(matches!(
        ratings.recompute_ratings(999).await,
        Err(Error::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_review_update_recomputes() {
    let conn = init_db().await;
    let reviews = ReviewRepositoryImpl::new(conn.clone());
    let tours = TourRepositoryImpl::new(conn);

    let r = reviews.create(review(2), 3, 1).await.unwrap();
    reviews.create(review(4), 3, 2).await.unwrap();
    assert_eq!(tours.get(3).await.unwrap().ratings_average, 3.0);

    let updated = reviews
        .update(
            r.id,
            UpdateReview {
                rating: Some(5),
                version: Some(r.version),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.rating, 5);
    assert_eq!(updated.review, r.review);
    assert_eq!(updated.version, 2);
    assert_eq!(tours.get(3).await.unwrap().ratings_average, 4.5);
    assert_eq!(tours.get(3).await.unwrap().ratings_quantity, 2);

    let stale = reviews
        .update(
            r.id,
            UpdateReview {
                rating: Some(1),
                version: Some(1),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(stale, Err(Error::FailedUpdate { .. })));
    // failed write leaves rating summary as it was
    assert_eq!(tours.get(3).await.unwrap().ratings_average, 4.5);

    let missing = reviews
        .update(
            999,
            UpdateReview {
                version: Some(1),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(missing, Err(Error::RecordNotFound(_))));
    assert!(matches!(
        reviews.delete(999).await,
        Err(Error::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_one_review_per_user_and_tour() {
    let conn = init_db().await;
    let reviews = ReviewRepositoryImpl::new(conn.clone());
    let tours = TourRepositoryImpl::new(conn);

    reviews.create(review(5), 2, 1).await.unwrap();
    let res = reviews.create(review(1), 2, 1).await;
    assert!(matches!(res, Err(Error::UniqueViolation(_))));

    let tour = tours.get(2).await.unwrap();
    assert_eq!(tour.ratings_quantity, 1);
    assert_eq!(tour.ratings_average, 5.0);

    let res = reviews.create(review(3), 999, 1).await;
    assert!(matches!(res, Err(Error::ConstraintViolation(_))));
}

#[tokio::test]
async fn test_review_listing() {
    let conn = init_db().await;
    let reviews = ReviewRepositoryImpl::new(conn);

    reviews.create(review(5), 1, 1).await.unwrap();
    reviews.create(review(4), 1, 2).await.unwrap();
    reviews.create(review(3), 2, 1).await.unwrap();

    let params = ListingParams::default().with_filter(Filter::eq("tour_id", FilterValue::Integer(1)));
    let page = reviews.list(params).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(
        page.rows[0].get("user_name").and_then(|v| v.as_str()),
        Some("Leo Gillespie")
    );
    assert!(page.rows[0].get("version").is_none());
}

#[tokio::test]
async fn test_deleting_tour_removes_reviews() {
    let conn = init_db().await;
    let reviews = ReviewRepositoryImpl::new(conn.clone());
    let tours = TourRepositoryImpl::new(conn);

    let r = reviews.create(review(5), 4, 1).await.unwrap();
    tours.delete(4).await.unwrap();
    assert!(matches!(reviews.get(r.id).await, Err(Error::RecordNotFound(_))));
}
