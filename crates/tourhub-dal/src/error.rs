pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("User password error: {0}")]
    UserPasswordError(#[from] argon2::password_hash::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token is invalid or has expired")]
    InvalidResetToken,

    #[error("Missing version")]
    MissingVersion,

    #[error("Failed to update record {id} with version {version}")]
    FailedUpdate { id: i64, version: i64 },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Page {page} does not exist")]
    PageNotFound { page: i64 },

    #[error("Duplicate value: {0}")]
    UniqueViolation(String),

    #[error("Invalid data: {0}")]
    ConstraintViolation(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Error::RecordNotFound("Record".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::Database(ref db)
                if db.is_check_violation() || db.is_foreign_key_violation() =>
            {
                Error::ConstraintViolation(db.message().to_string())
            }
            e => Error::DatabaseError(e),
        }
    }
}

pub(crate) trait NotFoundExt<T> {
    /// Names the missing record instead of generic `RowNotFound`
    fn or_not_found(self, entity: &str) -> Result<T>;
}

impl<T> NotFoundExt<T> for Result<T, sqlx::Error> {
    fn or_not_found(self, entity: &str) -> Result<T> {
        self.map_err(|e| match e {
            sqlx::Error::RowNotFound => Error::RecordNotFound(entity.to_string()),
            e => e.into(),
        })
    }
}
