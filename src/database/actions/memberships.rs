use crate::{
    database::error::QueryError,
    error::Error,
    schema::{Id, Membership},
};

use sqlx::{Pool, Postgres};

/// Returns `false` when the row already existed.
///
/// The unique (user_id, recipe_id) constraint makes concurrent duplicate
/// inserts resolve to exactly one success.
pub async fn add_membership(
    pool: &Pool<Postgres>,
    kind: Membership,
    user_id: Id,
    recipe_id: Id,
) -> Result<bool, Error> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_membership(
    pool: &Pool<Postgres>,
    kind: Membership,
    user_id: Id,
    recipe_id: Id,
) -> Result<bool, Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn has_membership(
    pool: &Pool<Postgres>,
    kind: Membership,
    user_id: Id,
    recipe_id: Id,
) -> Result<bool, Error> {
    let row: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = $2",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.is_some())
}
