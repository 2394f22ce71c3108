use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    error::ApiError,
    pagination::PageParams,
    schema::{Subscription, User, UserRow, Uuid},
};

pub async fn subscribe(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Subscription, ApiError> {
    if user_id == author_id {
        return Err(ApiError::bad_request("You cannot subscribe to yourself."));
    }

    let row: Option<Subscription> = sqlx::query_as(
        "
        INSERT INTO subscriptions (user_id, author_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        RETURNING *
    ",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| ApiError::bad_request("You are already subscribed to this author."))
}

pub async fn unsubscribe(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("You are not subscribed to this author."));
    }
    Ok(())
}

/// Authors the user follows, ordered by username.
pub async fn fetch_subscriptions(
    user_id: Uuid,
    params: PageParams,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), ApiError> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|u| u.count).unwrap_or(0);
    Ok((rows.into_iter().map(User::from).collect(), total_count))
}

/// Which of `author_ids` the user follows.
pub async fn subscribed_authors(
    user_id: Uuid,
    author_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, ApiError> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)",
    )
    .bind(user_id)
    .bind(author_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}
