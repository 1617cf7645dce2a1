use crate::{
    database::error::QueryError,
    error::Error,
    schema::{Id, Recipe, RecipeDraft, RecipeFilter, RecipeIngredient},
};

use super::ingredients::escape_like;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    query.push(" WHERE TRUE");

    if let Some(title) = &filter.title {
        query
            .push(" AND r.name ILIKE ")
            .push_bind(format!("%{}%", escape_like(title)));
    }
    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (
                    SELECT 1 FROM recipe_tags rt
                    INNER JOIN tags t ON t.id = rt.tag_id
                    WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(min) = filter.cooking_time_min {
        query.push(" AND r.cooking_time >= ").push_bind(min);
    }
    if let Some(max) = filter.cooking_time_max {
        query.push(" AND r.cooking_time <= ").push_bind(max);
    }
}

pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Recipe>, i64), Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM recipes r");
    push_filter(&mut count, filter);

    let total: (i64,) = count
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    let mut query = QueryBuilder::new("SELECT r.* FROM recipes r");
    push_filter(&mut query, filter);
    query
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<Recipe> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok((rows, total.0))
}

pub async fn fetch_author_recipes(
    pool: &Pool<Postgres>,
    author_id: Id,
    limit: Option<i64>,
) -> Result<(Vec<Recipe>, i64), Error> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    let rows: Vec<Recipe> = sqlx::query_as(
        "SELECT * FROM recipes WHERE author_id = $1 ORDER BY pub_date DESC, id DESC LIMIT $2",
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok((rows, total.0))
}

pub async fn get_recipe(pool: &Pool<Postgres>, id: Id) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_recipe_ingredients(
    pool: &Pool<Postgres>,
    recipe_id: Id,
) -> Result<Vec<RecipeIngredient>, Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Replaces the tag set and ingredient lines of a recipe.
async fn replace_recipe_parts(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    draft: &RecipeDraft,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    sqlx::query(
        "
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, tag_id FROM UNNEST($2::int4[]) AS tag_id
        ON CONFLICT DO NOTHING
    ",
    )
    .bind(recipe_id)
    .bind(&draft.tags)
    .execute(&mut **tx)
    .await
    .map_err(QueryError::from)?;

    let (ingredient_ids, amounts): (Vec<Id>, Vec<i32>) = draft
        .ingredients
        .iter()
        .map(|part| (part.id, part.amount))
        .unzip();

    sqlx::query(
        "
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, parts.ingredient_id, parts.amount
        FROM UNNEST($2::int4[], $3::int4[]) AS parts (ingredient_id, amount)
    ",
    )
    .bind(recipe_id)
    .bind(ingredient_ids)
    .bind(amounts)
    .execute(&mut **tx)
    .await
    .map_err(QueryError::from)?;

    Ok(())
}

pub async fn create_recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    draft: &RecipeDraft,
) -> Result<Id, Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&draft.name)
    .bind(draft.image.as_deref().unwrap_or_default())
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    replace_recipe_parts(&mut tx, id.0, draft).await?;
    tx.commit().await.map_err(QueryError::from)?;

    Ok(id.0)
}

pub async fn update_recipe(pool: &Pool<Postgres>, id: Id, draft: &RecipeDraft) -> Result<(), Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query(
        "
        UPDATE recipes
        SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .bind(&draft.image)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    replace_recipe_parts(&mut tx, id, draft).await?;
    tx.commit().await.map_err(QueryError::from)?;

    Ok(())
}

pub async fn delete_recipe(pool: &Pool<Postgres>, id: Id) -> Result<bool, Error> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}
