use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json,
};
use axum_valid::Garde;
use http::StatusCode;
use tourhub_dal::{
    rating::RatingRepository,
    tour::{CreateTour, TourRepository, UpdateTour},
    ListingParams,
};
use tourhub_types::claim::ApiClaim;
use tracing::info;

use crate::{
    auth::{
        policy::{ensure, Action, Resource},
        token::TokenLayer,
    },
    error::{ApiError, ApiResult},
    repository_from_request,
    rest_api::{review, Page, QueryFeatures, QueryMap},
    state::AppState,
};

repository_from_request!(TourRepository);
repository_from_request!(RatingRepository);

const TOP_CHEAP_LIMIT: &str = "5";
const TOP_CHEAP_SORT: &str = "-ratings_average,price";
const TOP_CHEAP_FIELDS: &str = "name,price,ratings_average,summary,difficulty";

pub async fn list(
    api_user: ApiClaim,
    State(state): State<AppState>,
    repository: TourRepository,
    query: QueryMap,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::ListTours, Resource::Any)?;
    let params = QueryFeatures::apply(
        ListingParams::default(),
        &query,
        state.config().default_page_size,
    )?;
    let batch = repository.list(params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch))))
}

/// Best rated and cheapest tours, window, order and fields are fixed
pub async fn top_cheap(repository: TourRepository, query: QueryMap) -> ApiResult<impl IntoResponse> {
    let query = query
        .set("limit", TOP_CHEAP_LIMIT)
        .set("sort", TOP_CHEAP_SORT)
        .set("fields", TOP_CHEAP_FIELDS);
    let params = QueryFeatures::apply(ListingParams::default(), &query, 5)?;
    let batch = repository.list(params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch))))
}

pub async fn stats(repository: TourRepository) -> ApiResult<impl IntoResponse> {
    let stats = repository.stats().await?;
    Ok((StatusCode::OK, Json(stats)))
}

pub async fn monthly_plan(
    Path(year): Path<String>,
    api_user: ApiClaim,
    repository: TourRepository,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::ReadMonthlyPlan, Resource::Any)?;
    let year = year
        .parse::<i32>()
        .ok()
        .filter(|y| (1..=9999).contains(y))
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid year {year}")))?;
    let plan = repository.monthly_plan(year).await?;
    Ok((StatusCode::OK, Json(plan)))
}

pub async fn create(
    api_user: ApiClaim,
    repository: TourRepository,
    Garde(Json(mut payload)): Garde<Json<CreateTour>>,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::CreateTour, Resource::Any)?;
    payload.created_by = Some(api_user.sub);
    let record = repository.create(payload).await?;
    info!("Created tour {} ({})", record.id, record.slug);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_tour(Path(id): Path<i64>, repository: TourRepository) -> ApiResult<impl IntoResponse> {
    let record = repository.get(id).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn update(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: TourRepository,
    Garde(Json(payload)): Garde<Json<UpdateTour>>,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::UpdateTour, Resource::Any)?;
    let record = repository.update(id, payload).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: TourRepository,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::DeleteTour, Resource::Any)?;
    repository.delete(id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

pub async fn recompute_ratings(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: RatingRepository,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::RecomputeRatings, Resource::Any)?;
    let summary = repository.recompute_ratings(id).await?;
    Ok((StatusCode::OK, Json(summary)))
}

/// Tours, to be nested on /api/tours
pub fn router(state: AppState) -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/monthly-plan/{year}", get(monthly_plan))
        .route("/{id}", patch(update).delete(delete))
        .route("/{id}/ratings", post(recompute_ratings))
        .route(
            "/{id}/reviews",
            get(review::list_for_tour).post(review::create_for_tour),
        )
        // All above routes are protected
        .layer(TokenLayer::new(state))
        .route("/top-5-cheap", get(top_cheap))
        .route("/stats", get(stats))
        .route("/{id}", get(get_tour))
}
