use jsonwebtoken::errors::Error as JwtError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),
    #[error("Token expired")]
    TokenExpired,
}

impl Error {
    pub fn is_expired(&self) -> bool {
        match self {
            Error::TokenExpired => true,
            Error::JwtError(e) => matches!(
                e.kind(),
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
            ),
        }
    }
}
