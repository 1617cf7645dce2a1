use crate::{
    error::{Error, HttpError},
    schema::{Id, NewUser, User},
};

use crate::database::error::QueryError;
use sqlx::{Pool, Postgres};

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_users(
    pool: &Pool<Postgres>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), Error> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY username LIMIT $1 OFFSET $2")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok((rows, total.0))
}

/// Inserts a user whose password is already hashed.
///
/// Email (case-insensitive) and username uniqueness are enforced by the
/// database; a violation is reported against the offending field.
pub async fn register_user(pool: &Pool<Postgres>, user: NewUser) -> Result<User, Error> {
    let result: Result<User, sqlx::Error> = sqlx::query_as(
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
    .await;

    result.map_err(|e| {
        let e = QueryError::from(e);
        match e.unique_violation() {
            Some("users_email_key") => {
                Error::field("email", "A user with that email already exists.")
            }
            Some("users_username_key") => {
                Error::field("username", "A user with that username already exists.")
            }
            _ => e.into(),
        }
    })
}

pub async fn set_password(pool: &Pool<Postgres>, user_id: Id, password: &str) -> Result<(), Error> {
    let result = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HttpError::NotFound.new("No user exists with specified id"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../../../migrations/20241014000000_init.sql");

    #[test]
    fn email_index_matches_login_lookup() {
        assert!(SCHEMA.contains("CREATE UNIQUE INDEX users_email_key ON users (LOWER(email));"));
        assert!(!SCHEMA.contains("UNIQUE (email)"));
    }
}
