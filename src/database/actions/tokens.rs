use sqlx::{Pool, Postgres};

use crate::{
    error::ApiError,
    jwt::SessionData,
    schema::{UserRole, Uuid},
};

pub async fn create_token(user_id: Uuid, pool: &Pool<Postgres>) -> Result<uuid::Uuid, ApiError> {
    let id = uuid::Uuid::new_v4();

    sqlx::query("INSERT INTO auth_tokens (id, user_id) VALUES ($1, $2)")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(id)
}

/// Resolves a token id to its session, or `None` once the token was revoked.
pub async fn find_session(
    token_id: uuid::Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<SessionData>, ApiError> {
    let row: Option<(Uuid, UserRole)> = sqlx::query_as(
        "
        SELECT u.id, u.role
        FROM auth_tokens t
        INNER JOIN users u ON u.id = t.user_id
        WHERE t.id = $1
    ",
    )
    .bind(token_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(user_id, role)| SessionData {
        user_id,
        token_id,
        role,
    }))
}

pub async fn delete_token(token_id: uuid::Uuid, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM auth_tokens WHERE id = $1")
        .bind(token_id)
        .execute(pool)
        .await?;

    Ok(())
}
