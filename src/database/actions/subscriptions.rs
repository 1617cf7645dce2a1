use crate::{error::Error, schema::{Id, User}};

use crate::database::error::QueryError;
use sqlx::{Pool, Postgres};

/// Returns `false` when the subscription already existed.
pub async fn subscribe(pool: &Pool<Postgres>, user_id: Id, author_id: Id) -> Result<bool, Error> {
    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn unsubscribe(pool: &Pool<Postgres>, user_id: Id, author_id: Id) -> Result<bool, Error> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn is_subscribed(pool: &Pool<Postgres>, user_id: Id, author_id: Id) -> Result<bool, Error> {
    let row: Option<(Id,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = $2",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.is_some())
}

pub async fn list_subscriptions(
    pool: &Pool<Postgres>,
    user_id: Id,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), Error> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    let rows: Vec<User> = sqlx::query_as(
        "
        SELECT u.*
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok((rows, total.0))
}
