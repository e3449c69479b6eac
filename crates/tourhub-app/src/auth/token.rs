use std::{
    convert::Infallible,
    task::{Context, Poll},
};

use axum::{
    extract::{FromRequestParts, Request},
    response::{IntoResponse, Response},
    RequestPartsExt,
};
use axum_extra::TypedHeader;
use cookie::{Cookie, Expiration, SameSite};
use futures::future::BoxFuture;
use headers::{authorization::Bearer, Authorization};
use http::request::Parts;
use time::OffsetDateTime;
use tourhub_dal::user::UserRepository;
use tourhub_types::claim::ApiClaim;
use tower::{Layer, Service};
use tower_cookies::Cookies;
use tracing::{debug, error};

use super::TOKEN_COOKIE_NAME;
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

async fn token_from_parts(parts: &mut Parts) -> ApiResult<Option<String>> {
    let header_token = parts
        .extract::<TypedHeader<Authorization<Bearer>>>()
        .await
        .ok()
        .map(|h| h.0.token().to_string());
    if header_token.is_some() {
        return Ok(header_token);
    }

    let cookies = parts.extract::<Cookies>().await.map_err(|e| {
        error!("Cannot get cookies: {}", e.1);
        ApiError::Internal("Cookies not available".to_string())
    })?;
    Ok(cookies.get(TOKEN_COOKIE_NAME).map(|c| c.value().to_string()))
}

/// Checks token signature and expiry and that its user can still use it
async fn authenticate(token: &str, state: &AppState) -> ApiResult<ApiClaim> {
    let mut claim = state.tokens().validate::<ApiClaim>(token).map_err(|e| {
        debug!("Failed to validate token: {e}");
        if e.is_expired() {
            ApiError::Unauthorized("Your token has expired, please log in again".to_string())
        } else {
            ApiError::Unauthorized("Invalid token, please log in again".to_string())
        }
    })?;

    let gone = || ApiError::Unauthorized("The user of this token no longer exists".to_string());
    let user_id = claim.user_id().ok_or_else(gone)?;
    let info = UserRepository::new(state.pool().clone())
        .auth_info(user_id)
        .await
        .map_err(|e| match e {
            tourhub_dal::Error::RecordNotFound(_) => gone(),
            e => e.into(),
        })?;
    if !info.active {
        return Err(gone());
    }
    if info.changed_password_after(claim.iat) {
        return Err(ApiError::Unauthorized(
            "Password was changed recently, please log in again".to_string(),
        ));
    }

    // role may have changed since the token was issued
    claim.role = info.role.parse().map_err(|e| {
        error!("User {user_id} has invalid role: {e}");
        ApiError::Internal(format!("Invalid role of user {user_id}"))
    })?;
    Ok(claim)
}

impl FromRequestParts<AppState> for ApiClaim {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(claim) = parts.extensions.get::<ApiClaim>() {
            return Ok(claim.clone());
        }

        match token_from_parts(parts).await? {
            Some(token) => {
                let claim = authenticate(&token, state).await?;
                parts.extensions.insert(claim.clone());
                Ok(claim)
            }
            None => {
                debug!("No token found");
                Err(ApiError::Unauthorized(
                    "You are not logged in, please log in to get access".to_string(),
                ))
            }
        }
    }
}

/// Signs token for the user and sets it also as cookie
pub fn issue_token(
    state: &AppState,
    cookies: &Cookies,
    user: &tourhub_dal::user::User,
) -> ApiResult<String> {
    let claim = ApiClaim::new_expired(user.id, user.role);
    let signed_token = state.tokens().issue(claim)?;

    let cookie = Cookie::build((TOKEN_COOKIE_NAME, signed_token.clone()))
        .http_only(true)
        .secure(state.config().secure_cookies)
        .path("/")
        .same_site(SameSite::Lax)
        .expires(Expiration::DateTime(
            OffsetDateTime::now_utc() + state.tokens().default_validity(),
        ));
    cookies.add(cookie.into());

    Ok(signed_token)
}

pub fn clear_token(cookies: &Cookies) {
    let cookie = Cookie::build((TOKEN_COOKIE_NAME, "")).path("/");
    cookies.remove(cookie.into());
}

/// Rejects requests without valid token, claim is then available in request extensions
#[derive(Clone)]
pub struct TokenLayer {
    state: AppState,
}

impl TokenLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for TokenLayer {
    type Service = TokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenService<S> {
    inner: S,
    state: AppState,
}

impl<S> Service<Request> for TokenService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // inner service was polled ready, the clone takes its place
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let state = self.state.clone();
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            match ApiClaim::from_request_parts(&mut parts, &state).await {
                Ok(_claim) => inner.call(Request::from_parts(parts, body)).await,
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}
