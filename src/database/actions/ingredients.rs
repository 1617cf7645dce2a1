use crate::{error::Error, schema::{Id, Ingredient}};

use crate::database::error::QueryError;
use sqlx::{Pool, Postgres};

/// Escapes LIKE wildcards so user input only ever matches literally.
pub fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub async fn list_ingredients(
    pool: &Pool<Postgres>,
    prefix: Option<&str>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match prefix {
        Some(prefix) => {
            sqlx::query_as::<_, Ingredient>("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
                .bind(format!("{}%", escape_like(prefix)))
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query_as::<_, Ingredient>("SELECT * FROM ingredients ORDER BY name")
                .fetch_all(pool)
                .await
        }
    }
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn find_ingredients(pool: &Pool<Postgres>, ids: &[Id]) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE id = ANY($1) ORDER BY name")
            .bind(ids)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(rows)
}

/// Returns `false` if an ingredient with that name already exists.
pub async fn create_ingredient(
    pool: &Pool<Postgres>,
    name: &str,
    measurement_unit: &str,
) -> Result<bool, Error> {
    let result = sqlx::query(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(name)
    .bind(measurement_unit)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("flour"), "flour");
    }
}
