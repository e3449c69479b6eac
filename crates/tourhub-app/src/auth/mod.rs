use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use axum_valid::Garde;
use garde::Validate;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tourhub_auth::reset::{token_digest, ResetToken, RESET_TOKEN_VALIDITY};
use tourhub_dal::user::{CreateUser, ResetPassword, UpdatePassword, User, UserRepository};
use tourhub_types::claim::{ApiClaim, Role};
use tower_cookies::Cookies;
use tracing::{debug, error, info};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub mod policy;
pub mod token;

pub const TOKEN_COOKIE_NAME: &str = "tourhub_token";

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginCredentials {
    #[garde(length(min = 1, max = 255))]
    email: String,
    #[garde(length(min = 1, max = 255))]
    password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPassword {
    #[garde(length(min = 1, max = 255))]
    email: String,
}

fn token_response(state: &AppState, cookies: &Cookies, user: User) -> ApiResult<TokenResponse> {
    let token = token::issue_token(state, cookies, &user)?;
    Ok(TokenResponse { token, user })
}

pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    repository: UserRepository,
    Garde(Json(payload)): Garde<Json<CreateUser>>,
) -> ApiResult<impl IntoResponse> {
    // role can be only granted by admin later
    let user = repository.create(payload, Role::User).await?;
    info!("New user {} signed up", user.id);
    Ok((
        StatusCode::CREATED,
        Json(token_response(&state, &cookies, user)?),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    repository: UserRepository,
    Garde(Json(credentials)): Garde<Json<LoginCredentials>>,
) -> ApiResult<impl IntoResponse> {
    let user = repository
        .check_password(&credentials.email, &credentials.password)
        .await?;
    debug!("User {} logged in", user.id);
    Ok((StatusCode::OK, Json(token_response(&state, &cookies, user)?)))
}

pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    token::clear_token(&cookies);
    StatusCode::NO_CONTENT
}

pub async fn forgot_password(
    State(state): State<AppState>,
    repository: UserRepository,
    Garde(Json(payload)): Garde<Json<ForgotPassword>>,
) -> ApiResult<impl IntoResponse> {
    let user = repository
        .find_by_email(&payload.email)
        .await
        .map_err(|e| match e {
            tourhub_dal::Error::RecordNotFound(_) => {
                ApiError::NotFound("There is no user with this email address".to_string())
            }
            e => e.into(),
        })?;

    let reset = ResetToken::generate();
    repository
        .set_reset_token(user.id, &reset.digest, RESET_TOKEN_VALIDITY)
        .await?;
    let reset_url = state.build_url(&format!("api/users/reset-password/{}", reset.token))?;

    if let Err(e) = state.notifier().send_reset(&user, &reset_url).await {
        error!("Failed to send reset token to user {}: {e}", user.id);
        repository.clear_reset_token(user.id).await?;
        return Err(ApiError::Internal(
            "There was an error sending the reset token".to_string(),
        ));
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Reset token sent"})),
    ))
}

pub async fn reset_password(
    Path(token): Path<String>,
    State(state): State<AppState>,
    cookies: Cookies,
    repository: UserRepository,
    Garde(Json(payload)): Garde<Json<ResetPassword>>,
) -> ApiResult<impl IntoResponse> {
    let user = repository
        .reset_password(&token_digest(&token), payload)
        .await?;
    info!("User {} reset password", user.id);
    Ok((StatusCode::OK, Json(token_response(&state, &cookies, user)?)))
}

pub async fn update_password(
    State(state): State<AppState>,
    cookies: Cookies,
    api_user: ApiClaim,
    repository: UserRepository,
    Garde(Json(payload)): Garde<Json<UpdatePassword>>,
) -> ApiResult<impl IntoResponse> {
    let user_id = api_user
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized("Invalid user".to_string()))?;
    let user = repository
        .update_password(user_id, payload)
        .await
        .map_err(|e| match e {
            tourhub_dal::Error::InvalidCredentials => {
                ApiError::Unauthorized("Your current password is wrong".to_string())
            }
            e => e.into(),
        })?;
    Ok((StatusCode::OK, Json(token_response(&state, &cookies, user)?)))
}
