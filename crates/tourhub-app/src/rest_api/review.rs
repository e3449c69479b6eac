use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use axum_valid::Garde;
use http::StatusCode;
use tourhub_dal::{
    review::{CreateReview, ReviewRepository, UpdateReview},
    Filter, FilterValue, ListingParams,
};
use tourhub_types::claim::ApiClaim;

use crate::{
    auth::policy::{ensure, Action, Resource},
    error::{ApiError, ApiResult},
    repository_from_request,
    rest_api::{Page, QueryFeatures, QueryMap},
    state::AppState,
};

repository_from_request!(ReviewRepository);

async fn list_reviews(
    base: ListingParams,
    api_user: &ApiClaim,
    state: &AppState,
    repository: &ReviewRepository,
    query: &QueryMap,
) -> ApiResult<Page<tourhub_dal::query::Record>> {
    ensure(api_user, Action::ListReviews, Resource::Any)?;
    let params = QueryFeatures::apply(base, query, state.config().default_page_size)?;
    let batch = repository.list(params).await?;
    Ok(Page::from_batch(batch))
}

async fn create_review(
    api_user: &ApiClaim,
    repository: &ReviewRepository,
    payload: CreateReview,
    tour_from_path: Option<i64>,
) -> ApiResult<impl IntoResponse> {
    ensure(api_user, Action::CreateReview, Resource::Any)?;
    let user_id = api_user
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized("Invalid user".to_string()))?;
    let tour_id = tour_from_path
        .or(payload.tour_id)
        .ok_or_else(|| ApiError::BadRequest("Review must belong to a tour".to_string()))?;
    let record = repository.create(payload, tour_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list(
    api_user: ApiClaim,
    State(state): State<AppState>,
    repository: ReviewRepository,
    query: QueryMap,
) -> ApiResult<impl IntoResponse> {
    let page = list_reviews(
        ListingParams::default(),
        &api_user,
        &state,
        &repository,
        &query,
    )
    .await?;
    Ok((StatusCode::OK, Json(page)))
}

/// Reviews of one tour
pub async fn list_for_tour(
    Path(tour_id): Path<i64>,
    api_user: ApiClaim,
    State(state): State<AppState>,
    repository: ReviewRepository,
    query: QueryMap,
) -> ApiResult<impl IntoResponse> {
    let base =
        ListingParams::default().with_filter(Filter::eq("tour_id", FilterValue::Integer(tour_id)));
    let page = list_reviews(base, &api_user, &state, &repository, &query).await?;
    Ok((StatusCode::OK, Json(page)))
}

pub async fn create(
    api_user: ApiClaim,
    repository: ReviewRepository,
    Garde(Json(payload)): Garde<Json<CreateReview>>,
) -> ApiResult<impl IntoResponse> {
    create_review(&api_user, &repository, payload, None).await
}

pub async fn create_for_tour(
    Path(tour_id): Path<i64>,
    api_user: ApiClaim,
    repository: ReviewRepository,
    Garde(Json(payload)): Garde<Json<CreateReview>>,
) -> ApiResult<impl IntoResponse> {
    create_review(&api_user, &repository, payload, Some(tour_id)).await
}

pub async fn get_review(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: ReviewRepository,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::ReadReview, Resource::Any)?;
    let record = repository.get(id).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn update(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: ReviewRepository,
    Garde(Json(payload)): Garde<Json<UpdateReview>>,
) -> ApiResult<impl IntoResponse> {
    let existing = repository.get(id).await?;
    ensure(
        &api_user,
        Action::UpdateReview,
        Resource::Review {
            author_id: existing.user_id,
        },
    )?;
    let record = repository.update(id, payload).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: ReviewRepository,
) -> ApiResult<impl IntoResponse> {
    let existing = repository.get(id).await?;
    ensure(
        &api_user,
        Action::DeleteReview,
        Resource::Review {
            author_id: existing.user_id,
        },
    )?;
    repository.delete(id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

/// Reviews, to be nested on /api/reviews behind token layer
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_review).patch(update).delete(delete))
}
