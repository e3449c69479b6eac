use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json,
};
use axum_valid::Garde;
use http::StatusCode;
use tourhub_dal::{
    user::{UpdateMe, UpdateUser, UserRepository},
    ListingParams,
};
use tourhub_types::claim::ApiClaim;
use tower_cookies::Cookies;

use crate::{
    auth::{
        self,
        policy::{ensure, Action, Resource},
        token::{clear_token, TokenLayer},
    },
    error::{ApiError, ApiResult},
    repository_from_request,
    rest_api::{Page, QueryFeatures, QueryMap},
    state::AppState,
};

repository_from_request!(UserRepository);

fn own_id(api_user: &ApiClaim) -> ApiResult<i64> {
    api_user
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized("Invalid user".to_string()))
}

async fn me(api_user: ApiClaim, repository: UserRepository) -> ApiResult<impl IntoResponse> {
    let user = repository.get(own_id(&api_user)?).await?;
    Ok((StatusCode::OK, Json(user)))
}

async fn update_me(
    api_user: ApiClaim,
    repository: UserRepository,
    Garde(Json(payload)): Garde<Json<UpdateMe>>,
) -> ApiResult<impl IntoResponse> {
    let user = repository.update_me(own_id(&api_user)?, payload).await?;
    Ok((StatusCode::OK, Json(user)))
}

async fn delete_me(
    api_user: ApiClaim,
    cookies: Cookies,
    repository: UserRepository,
) -> ApiResult<impl IntoResponse> {
    repository.deactivate(own_id(&api_user)?).await?;
    clear_token(&cookies);
    Ok((StatusCode::NO_CONTENT, ()))
}

async fn list_users(
    api_user: ApiClaim,
    State(state): State<AppState>,
    repository: UserRepository,
    query: QueryMap,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::ManageUsers, Resource::Any)?;
    let params = QueryFeatures::apply(
        ListingParams::default(),
        &query,
        state.config().default_page_size,
    )?;
    let batch = repository.list(params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch))))
}

async fn get_user(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: UserRepository,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::ManageUsers, Resource::Any)?;
    let user = repository.get(id).await?;
    Ok((StatusCode::OK, Json(user)))
}

async fn update_user(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: UserRepository,
    Garde(Json(payload)): Garde<Json<UpdateUser>>,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::ManageUsers, Resource::Any)?;
    let user = repository.update(id, payload).await?;
    Ok((StatusCode::OK, Json(user)))
}

async fn delete_user(
    Path(id): Path<i64>,
    api_user: ApiClaim,
    repository: UserRepository,
) -> ApiResult<impl IntoResponse> {
    ensure(&api_user, Action::ManageUsers, Resource::Any)?;
    repository.delete(id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

/// Users and authentication, to be nested on /api/users
pub fn users_router(state: AppState) -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route("/me", get(me))
        .route("/update-me", patch(update_me))
        .route("/delete-me", delete(delete_me))
        .route("/update-password", patch(auth::update_password))
        // All above routes are protected
        .layer(TokenLayer::new(state))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{token}", patch(auth::reset_password))
}
