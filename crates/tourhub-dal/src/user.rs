use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{Result as HashResult, SaltString, rand_core::OsRng},
};

use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool};
use tourhub_types::{claim::Role, general::ValidEmail};
use tracing::debug;

use crate::{
    Batch, ChosenDB, Error, ListingParams,
    error::{NotFoundExt as _, Result},
    query::{EntitySchema, FieldKind, Record, field, list_records},
    rating::recompute_ratings,
};

pub const USER_SCHEMA: EntitySchema = EntitySchema {
    table: "users",
    fields: &[
        field("id", FieldKind::Integer),
        field("name", FieldKind::Text),
        field("email", FieldKind::Text),
        field("photo", FieldKind::Text),
        field("role", FieldKind::Text),
        field("active", FieldKind::Bool),
        field("version", FieldKind::Integer),
        field("created", FieldKind::DateTime),
    ],
    hidden: &["version"],
};

const USER_COLUMNS: &str = "id, name, email, photo, role, active, version, created";

fn hash_password(password: &str) -> HashResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(password_hash)
}

fn verify_password(password: &str, password_hash: &str) -> HashResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)?;
    let res = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    if let Err(e) = res {
        debug!("Invalid password, error {e}");
    }
    Ok(res.is_ok())
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateUser {
    #[garde(length(chars, min = 1, max = 255))]
    pub name: String,
    #[garde(dive)]
    pub email: ValidEmail,
    #[garde(length(min = 1, max = 255))]
    pub photo: Option<String>,
    #[garde(length(min = 8, max = 255))]
    pub password: String,
    #[garde(matches(password))]
    pub password_confirm: String,
}

/// Changes of own profile. Password and role have their own routes.
#[derive(Debug, Serialize, Deserialize, Clone, Validate, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdateMe {
    #[garde(length(chars, min = 1, max = 255))]
    pub name: Option<String>,
    #[garde(dive)]
    pub email: Option<ValidEmail>,
    #[garde(length(min = 1, max = 255))]
    pub photo: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate, Default)]
pub struct UpdateUser {
    #[garde(length(chars, min = 1, max = 255))]
    pub name: Option<String>,
    #[garde(dive)]
    pub email: Option<ValidEmail>,
    #[garde(length(min = 1, max = 255))]
    pub photo: Option<String>,
    #[garde(skip)]
    pub role: Option<Role>,
    #[garde(skip)]
    pub active: Option<bool>,
    #[garde(range(min = 0))]
    pub version: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct UpdatePassword {
    #[garde(length(min = 1, max = 255))]
    pub password_current: String,
    #[garde(length(min = 8, max = 255))]
    pub password: String,
    #[garde(matches(password))]
    pub password_confirm: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct ResetPassword {
    #[garde(length(min = 8, max = 255))]
    pub password: String,
    #[garde(matches(password))]
    pub password_confirm: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserInt {
    id: i64,
    name: String,
    email: String,
    photo: Option<String>,
    role: String,
    active: bool,
    version: i64,
    created: time::PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    pub role: Role,
    pub active: bool,
    pub version: i64,
    pub created: time::PrimitiveDateTime,
}

impl TryFrom<UserInt> for User {
    type Error = Error;

    fn try_from(value: UserInt) -> Result<Self> {
        let role = value
            .role
            .parse::<Role>()
            .map_err(|e| Error::InvalidValue(e.to_string()))?;
        Ok(Self {
            id: value.id,
            name: value.name,
            email: value.email,
            photo: value.photo,
            role,
            active: value.active,
            version: value.version,
            created: value.created,
        })
    }
}

/// What is needed to accept a token of the user
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthInfo {
    pub id: i64,
    pub role: String,
    pub active: bool,
    pub password_changed_at: Option<time::PrimitiveDateTime>,
}

impl AuthInfo {
    /// True if password was changed after token issued at `iat` (unix seconds)
    pub fn changed_password_after(&self, iat: u64) -> bool {
        self.password_changed_at
            .map(|changed| changed.assume_utc().unix_timestamp() > iat as i64)
            .unwrap_or(false)
    }
}

pub type UserRepository = UserRepositoryImpl<Pool<ChosenDB>>;

pub struct UserRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateUser, role: Role) -> Result<User> {
        let password = hash_password(&payload.password)?;
        let result = sqlx::query(
            "INSERT INTO users (name, email, photo, role, password) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&payload.name)
        .bind(payload.email.normalized())
        .bind(&payload.photo)
        .bind(role.as_str())
        .bind(password)
        .execute(&self.executor)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id).await
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<Record>> {
        list_records(&self.executor, &USER_SCHEMA, &params).await
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        sqlx::query_as::<_, UserInt>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_one(&self.executor)
            .await
            .or_not_found("User")?
            .try_into()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<User> {
        sqlx::query_as::<_, UserInt>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? AND active = 1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_one(&self.executor)
        .await
        .or_not_found("User")?
        .try_into()
    }

    pub async fn auth_info(&self, id: i64) -> Result<AuthInfo> {
        sqlx::query_as::<_, AuthInfo>(
            "SELECT id, role, active, password_changed_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.executor)
        .await
        .or_not_found("User")
    }

    /// Only active users can log in
    pub async fn check_password(&self, email: &str, password: &str) -> Result<User> {
        let (id, hashed_password): (i64, String) =
            sqlx::query_as("SELECT id, password FROM users WHERE email = ? AND active = 1")
                .bind(email.trim().to_lowercase())
                .fetch_one(&self.executor)
                .await
                .map_err(|e| {
                    debug!("User check error: {e}");
                    Error::InvalidCredentials
                })?;
        if verify_password(password, &hashed_password).unwrap_or(false) {
            self.get(id).await
        } else {
            Err(Error::InvalidCredentials)
        }
    }

    pub async fn update_password(&self, id: i64, payload: UpdatePassword) -> Result<User> {
        let hashed_password: String =
            sqlx::query_scalar("SELECT password FROM users WHERE id = ? AND active = 1")
                .bind(id)
                .fetch_one(&self.executor)
                .await
                .or_not_found("User")?;
        if !verify_password(&payload.password_current, &hashed_password).unwrap_or(false) {
            return Err(Error::InvalidCredentials);
        }
        self.store_password(id, &payload.password).await?;
        self.get(id).await
    }

    async fn store_password(&self, id: i64, password: &str) -> Result<()> {
        let password = hash_password(password)?;
        // back dated, so token issued right after the change is still accepted
        sqlx::query(
            r#"UPDATE users SET password = ?,
            password_changed_at = datetime('now', '-2 seconds'),
            password_reset_token = NULL,
            password_reset_expires = NULL,
            modified = datetime('now')
            WHERE id = ?"#,
        )
        .bind(password)
        .bind(id)
        .execute(&self.executor)
        .await?;
        Ok(())
    }

    pub async fn update_me(&self, id: i64, payload: UpdateMe) -> Result<User> {
        let res = sqlx::query(
            r#"UPDATE users SET
            name = coalesce(?, name),
            email = coalesce(?, email),
            photo = coalesce(?, photo),
            version = version + 1,
            modified = datetime('now')
            WHERE id = ? AND active = 1"#,
        )
        .bind(&payload.name)
        .bind(payload.email.as_ref().map(|e| e.normalized()))
        .bind(&payload.photo)
        .bind(id)
        .execute(&self.executor)
        .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("User".to_string()));
        }
        self.get(id).await
    }

    pub async fn deactivate(&self, id: i64) -> Result<()> {
        let res = sqlx::query(
            "UPDATE users SET active = 0, version = version + 1, modified = datetime('now') WHERE id = ?",
        )
        .bind(id)
        .execute(&self.executor)
        .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("User".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn update(&self, id: i64, payload: UpdateUser) -> Result<User> {
        let version = payload.version.ok_or_else(|| {
            debug!("No version provided");
            Error::MissingVersion
        })?;
        let res = sqlx::query(
            r#"UPDATE users SET
            name = coalesce(?, name),
            email = coalesce(?, email),
            photo = coalesce(?, photo),
            role = coalesce(?, role),
            active = coalesce(?, active),
            version = ?,
            modified = datetime('now')
            WHERE id = ? AND version = ?"#,
        )
        .bind(&payload.name)
        .bind(payload.email.as_ref().map(|e| e.normalized()))
        .bind(&payload.photo)
        .bind(payload.role.map(|r| r.as_str()))
        .bind(payload.active)
        .bind(version + 1)
        .bind(id)
        .bind(version)
        .execute(&self.executor)
        .await?;

        if res.rows_affected() == 0 {
            self.get(id).await?;
            Err(Error::FailedUpdate { id, version })
        } else {
            self.get(id).await
        }
    }

    /// Deletes user with all the reviews written by them,
    /// rating of every reviewed tour is recomputed.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.executor.begin().await?;
        let tours: Vec<i64> =
            sqlx::query_scalar::<_, i64>("SELECT DISTINCT tour_id FROM review WHERE user_id = ?")
                .bind(id)
                .fetch(&mut *tx)
                .try_collect()
                .await?;

        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("User".to_string()));
        }

        for tour_id in tours {
            recompute_ratings(tour_id, &mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Stores digest of a reset token, valid for `validity` from now
    pub async fn set_reset_token(
        &self,
        id: i64,
        digest: &str,
        validity: std::time::Duration,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE users SET password_reset_token = ?,
            password_reset_expires = datetime('now', ?)
            WHERE id = ?"#,
        )
        .bind(digest)
        .bind(format!("+{} seconds", validity.as_secs()))
        .bind(id)
        .execute(&self.executor)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.executor)
        .await?;
        Ok(())
    }

    /// Sets new password for user holding unexpired reset token with given digest.
    /// Token is consumed.
    pub async fn reset_password(&self, digest: &str, payload: ResetPassword) -> Result<User> {
        let id: i64 = sqlx::query_scalar(
            r#"SELECT id FROM users WHERE password_reset_token = ?
            AND password_reset_expires > datetime('now') AND active = 1"#,
        )
        .bind(digest)
        .fetch_optional(&self.executor)
        .await?
        .ok_or(Error::InvalidResetToken)?;
        self.store_password(id, &payload.password).await?;
        self.get(id).await
    }
}
