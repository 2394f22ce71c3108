use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::verify_password,
        jwt::generate_jwt_session,
    },
    config::Config,
    error::{ApiError, FieldErrors},
    pagination::PageParams,
    schema::{User, UserRow, Uuid},
};

use super::tokens::create_token;

/// Validated registration data; `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn list_users_by_id(pool: &Pool<Postgres>, ids: &[Uuid]) -> Result<Vec<User>, ApiError> {
    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn fetch_users(
    params: PageParams,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), ApiError> {
    let rows: Vec<UserRow> =
        sqlx::query_as("SELECT u.*, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $1 OFFSET $2")
            .bind(params.limit)
            .bind(params.offset())
            .fetch_all(pool)
            .await?;

    let total_count = rows.first().map(|u| u.count).unwrap_or(0);
    Ok((rows.into_iter().map(User::from).collect(), total_count))
}

/// Creates a user. Email and username clashes are reported per field.
pub async fn register_user(user: &NewUser, pool: &Pool<Postgres>) -> Result<User, ApiError> {
    let (email_taken, username_taken): (bool, bool) = sqlx::query_as(
        "
        SELECT
            EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1)),
            EXISTS(SELECT 1 FROM users WHERE username = $2)
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .fetch_one(pool)
    .await?;

    let mut errors = FieldErrors::new();
    if email_taken {
        errors.add("email", "A user with that email already exists.");
    }
    if username_taken {
        errors.add("username", "A user with that username already exists.");
    }
    errors.into_result()?;

    let row: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password)
    .fetch_one(pool)
    .await?;

    log::info!("Registered user {} ({})", row.username, row.id);
    Ok(row)
}

/// Checks the credentials and issues a new token.
pub async fn login_user(
    email: &str,
    password: &str,
    config: &Config,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let invalid = || {
        ApiError::Validation(FieldErrors::single(
            "non_field_errors",
            "Unable to log in with provided credentials.",
        ))
    };

    let user = get_user_by_email(pool, email).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password)? {
        return Err(invalid());
    }

    let token_id = create_token(user.id, pool).await?;
    generate_jwt_session(user.id, token_id, &config.secret_key, config.token_ttl_hours)
}

pub async fn update_password(
    user_id: Uuid,
    password_hash: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Sets or clears the avatar and returns the previous path.
pub async fn update_avatar(
    user_id: Uuid,
    avatar: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Option<String>, ApiError> {
    let previous: (Option<String>,) = sqlx::query_as(
        "
        UPDATE users u SET avatar = $1
        FROM (SELECT id, avatar FROM users WHERE id = $2 FOR UPDATE) old
        WHERE u.id = old.id
        RETURNING old.avatar
    ",
    )
    .bind(avatar)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(previous.0)
}
