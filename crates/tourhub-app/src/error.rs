use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Serialize;
use tracing::{debug, error};

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(#[source] tourhub_dal::Error),

    #[error("Token error: {0}")]
    TokenError(#[from] tourhub_auth::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tourhub_dal::Error> for ApiError {
    fn from(e: tourhub_dal::Error) -> Self {
        use tourhub_dal::Error as DalError;
        match e {
            DalError::RecordNotFound(entity) => ApiError::NotFound(format!("{entity} not found")),
            DalError::PageNotFound { page } => {
                ApiError::NotFound(format!("Page {page} does not exist"))
            }
            DalError::InvalidQuery(msg) => ApiError::InvalidQuery(msg),
            DalError::MissingVersion => {
                ApiError::BadRequest("Version is required for update".to_string())
            }
            DalError::FailedUpdate { id, version } => ApiError::Conflict(format!(
                "Record {id} was modified, version {version} is stale"
            )),
            DalError::UniqueViolation(msg) => {
                ApiError::Conflict(format!("Duplicate value: {msg}"))
            }
            DalError::ConstraintViolation(msg) => ApiError::BadRequest(format!("Invalid data: {msg}")),
            DalError::InvalidCredentials => {
                ApiError::Unauthorized("Incorrect email or password".to_string())
            }
            DalError::InvalidResetToken => {
                ApiError::BadRequest("Token is invalid or has expired".to_string())
            }
            e => ApiError::DatabaseError(e),
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::Internal(format!("Invalid URL: {e}"))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidQuery(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::DatabaseError(_) | ApiError::TokenError(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status.is_server_error() {
            error!("Request failed: {self}");
            ErrorBody {
                status: "error",
                message: "Something went wrong".to_string(),
            }
        } else {
            debug!("Request rejected ({status}): {self}");
            ErrorBody {
                status: "fail",
                message: self.to_string(),
            }
        };
        (status, Json(body)).into_response()
    }
}
