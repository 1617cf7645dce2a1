use warp::{http::StatusCode, reply::Response, Rejection};

use crate::{context::Context, error::HttpError, schema::Id};

use super::responses::json;

pub async fn list_tags(context: Context) -> Result<Response, Rejection> {
    let tags = context.store.list_tags().await?;
    Ok(json(&tags, StatusCode::OK))
}

pub async fn get_tag(id: Id, context: Context) -> Result<Response, Rejection> {
    let tag = context
        .store
        .get_tag(id)
        .await?
        .ok_or(HttpError::NotFound.default())?;

    Ok(json(&tag, StatusCode::OK))
}

/// `?name=` is a case-insensitive prefix match.
pub async fn list_ingredients(
    query: Vec<(String, String)>,
    context: Context,
) -> Result<Response, Rejection> {
    let prefix = query
        .iter()
        .find(|(key, value)| key == "name" && !value.is_empty())
        .map(|(_, value)| value.as_str());

    let ingredients = context.store.list_ingredients(prefix).await?;
    Ok(json(&ingredients, StatusCode::OK))
}

pub async fn get_ingredient(id: Id, context: Context) -> Result<Response, Rejection> {
    let ingredient = context
        .store
        .get_ingredient(id)
        .await?
        .ok_or(HttpError::NotFound.default())?;

    Ok(json(&ingredient, StatusCode::OK))
}
