use crate::{
    database::error::QueryError,
    error::Error,
    schema::{Id, ShoppingItem},
};

use sqlx::{Pool, Postgres};

/// Sums ingredient amounts over every recipe in the user's cart.
pub async fn fetch_shopping_list(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Vec<ShoppingItem>, Error> {
    let rows: Vec<ShoppingItem> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount)::int8 AS total_amount
        FROM shopping_carts c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}
