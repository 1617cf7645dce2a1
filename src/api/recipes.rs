use std::collections::HashSet;

use serde::Deserialize;
use warp::{filters::path::FullPath, http::StatusCode, reply::Response, Rejection};

use crate::{
    constants::{
        MAX_AMOUNT, MAX_COOKING_TIME, MAX_LENGTH_RECIPE_NAME, MIN_AMOUNT, MIN_COOKING_TIME,
        RECIPE_COUNT_PER_PAGE, RECIPE_PDF_DIRECTORY, SHOPPING_LIST_DIRECTORY,
    },
    context::Context,
    document::layout::Document,
    error::{Error, FieldErrors, HttpError},
    jwt::SessionData,
    pagination::{PageContext, PageRequest},
    permissions::ActionType,
    schema::{Id, IngredientAmount, Membership, Recipe, RecipeDraft, RecipeFilter},
};

use super::{
    images::{decode_data_uri, remove_image, save_image, DecodedImage},
    responses::{json, no_content, pdf_attachment},
    users::page_url,
    views::{recipe_short, recipe_view},
};

/// Body of create, replace and partial update requests.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePayload {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

fn required<T>(value: Option<T>, field: &str, errors: &mut FieldErrors) -> Option<T> {
    if value.is_none() {
        push(errors, field, "This field is required.");
    }
    value
}

fn check_range(value: i32, min: i32, max: i32, field: &str, errors: &mut FieldErrors) {
    if value < min {
        push(errors, field, format!("Ensure this value is greater than or equal to {min}."));
    } else if value > max {
        push(errors, field, format!("Ensure this value is less than or equal to {max}."));
    }
}

/// Checks the payload shape; ids are looked up separately.
fn check_payload(
    payload: RecipePayload,
    image_required: bool,
    errors: &mut FieldErrors,
) -> Option<(RecipeDraft, Option<DecodedImage>)> {
    let name = required(payload.name, "name", errors).map(|name| name.trim().to_string());
    if let Some(name) = &name {
        if name.is_empty() {
            push(errors, "name", "This field may not be blank.");
        } else if name.chars().count() > MAX_LENGTH_RECIPE_NAME {
            push(
                errors,
                "name",
                format!("Ensure this field has no more than {MAX_LENGTH_RECIPE_NAME} characters."),
            );
        }
    }

    let text = required(payload.text, "text", errors);
    if text.as_ref().is_some_and(|text| text.trim().is_empty()) {
        push(errors, "text", "This field may not be blank.");
    }

    let cooking_time = required(payload.cooking_time, "cooking_time", errors);
    if let Some(cooking_time) = cooking_time {
        check_range(cooking_time, MIN_COOKING_TIME, MAX_COOKING_TIME, "cooking_time", errors);
    }

    let ingredients = required(payload.ingredients, "ingredients", errors);
    if let Some(ingredients) = &ingredients {
        if ingredients.is_empty() {
            push(errors, "ingredients", "At least one ingredient is required.");
        }

        let mut seen = HashSet::new();
        if !ingredients.iter().all(|line| seen.insert(line.id)) {
            push(errors, "ingredients", "Ingredients must be unique.");
        }

        for line in ingredients {
            check_range(line.amount, MIN_AMOUNT, MAX_AMOUNT, "amount", errors);
        }
    }

    let mut tags = required(payload.tags, "tags", errors);
    if let Some(tags) = &mut tags {
        let mut seen = HashSet::new();
        tags.retain(|id| seen.insert(*id));
    }

    let image = match payload.image {
        Some(image) => match decode_data_uri(&image) {
            Ok(image) => Some(image),
            Err(error) => {
                for (field, messages) in error.fields.unwrap_or_default() {
                    errors.entry(field).or_default().extend(messages);
                }
                None
            }
        },
        None => {
            if image_required {
                push(errors, "image", "This field is required.");
            }
            None
        }
    };

    Some((
        RecipeDraft {
            name: name?,
            text: text?,
            cooking_time: cooking_time?,
            image: None,
            tags: tags?,
            ingredients: ingredients?,
        },
        image,
    ))
}

/// Validates a payload into a draft plus the decoded image to store.
async fn validate_payload(
    context: &Context,
    payload: RecipePayload,
    image_required: bool,
) -> Result<(RecipeDraft, Option<DecodedImage>), Error> {
    let mut errors = FieldErrors::new();
    let checked = check_payload(payload, image_required, &mut errors);

    if let Some((draft, _)) = &checked {
        let ids: Vec<Id> = draft.ingredients.iter().map(|line| line.id).collect();
        let known = context.store.find_ingredients(&ids).await?;
        for id in ids.iter().filter(|id| !known.iter().any(|i| i.id == **id)) {
            push(
                &mut errors,
                "ingredients",
                format!("Invalid pk \"{id}\" - object does not exist."),
            );
        }

        let known = context.store.find_tags(&draft.tags).await?;
        for id in draft.tags.iter().filter(|id| !known.iter().any(|t| t.id == **id)) {
            push(
                &mut errors,
                "tags",
                format!("Invalid pk \"{id}\" - object does not exist."),
            );
        }
    }

    match checked {
        Some(checked) if errors.is_empty() => Ok(checked),
        _ => Err(Error::fields(errors)),
    }
}

async fn get_existing(context: &Context, id: Id) -> Result<Recipe, Error> {
    context
        .store
        .get_recipe(id)
        .await?
        .ok_or(HttpError::NotFound.default())
}

fn ensure_can_manage(session: &SessionData, recipe: &Recipe) -> Result<(), Error> {
    if recipe.author_id == session.user_id {
        session.authenticate(ActionType::ManageOwnRecipes)
    } else {
        session.authenticate(ActionType::ManageAllRecipes)
    }
}

pub async fn list_recipes(
    path: FullPath,
    raw_query: String,
    query: Vec<(String, String)>,
    session: Option<SessionData>,
    context: Context,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::try_from(query.as_slice())?;
    let request = PageRequest::parse(&page_url(&context, &path), &raw_query, RECIPE_COUNT_PER_PAGE)?;

    let (recipes, total) = context
        .store
        .list_recipes(&filter, request.limit, request.offset())
        .await?;

    let mut views = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        views.push(recipe_view(&context, recipe, session.as_ref()).await?);
    }

    let page = PageContext::from_rows(views, total, &request)?;
    Ok(json(&page, StatusCode::OK))
}

pub async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    context: Context,
) -> Result<Response, Rejection> {
    let recipe = get_existing(&context, id).await?;
    let view = recipe_view(&context, recipe, session.as_ref()).await?;

    Ok(json(&view, StatusCode::OK))
}

pub async fn create_recipe(
    session: SessionData,
    payload: RecipePayload,
    context: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;

    let (mut draft, image) = validate_payload(&context, payload, true).await?;
    if let Some(image) = &image {
        draft.image = Some(save_image(&context.config.media_root, image).await?);
    }

    let id = match context.store.create_recipe(session.user_id, &draft).await {
        Ok(id) => id,
        Err(e) => {
            if let Some(image) = &draft.image {
                remove_image(&context.config.media_root, image).await;
            }
            return Err(e.into());
        }
    };

    log::info!("> User {} created recipe {id}", session.user_id);
    let recipe = get_existing(&context, id).await?;
    let view = recipe_view(&context, recipe, Some(&session)).await?;

    Ok(json(&view, StatusCode::CREATED))
}

/// PUT and PATCH; a partial update keeps every field it leaves out.
pub async fn update_recipe(
    id: Id,
    partial: bool,
    session: SessionData,
    mut payload: RecipePayload,
    context: Context,
) -> Result<Response, Rejection> {
    let recipe = get_existing(&context, id).await?;
    ensure_can_manage(&session, &recipe)?;

    if partial {
        if payload.tags.is_none() {
            let tags = context.store.recipe_tags(id).await?;
            payload.tags = Some(tags.into_iter().map(|tag| tag.id).collect());
        }
        if payload.ingredients.is_none() {
            let lines = context.store.recipe_ingredients(id).await?;
            payload.ingredients = Some(
                lines
                    .into_iter()
                    .map(|line| IngredientAmount {
                        id: line.id,
                        amount: line.amount,
                    })
                    .collect(),
            );
        }
        payload.name = payload.name.or_else(|| Some(recipe.name.clone()));
        payload.text = payload.text.or_else(|| Some(recipe.text.clone()));
        payload.cooking_time = payload.cooking_time.or(Some(recipe.cooking_time));
    }

    let (mut draft, image) = validate_payload(&context, payload, false).await?;
    if let Some(image) = &image {
        draft.image = Some(save_image(&context.config.media_root, image).await?);
    }

    if let Err(e) = context.store.update_recipe(id, &draft).await {
        if let Some(image) = &draft.image {
            remove_image(&context.config.media_root, image).await;
        }
        return Err(e.into());
    }

    if draft.image.is_some() {
        remove_image(&context.config.media_root, &recipe.image).await;
    }

    log::info!("> User {} updated recipe {id}", session.user_id);
    let recipe = get_existing(&context, id).await?;
    let view = recipe_view(&context, recipe, Some(&session)).await?;

    Ok(json(&view, StatusCode::OK))
}

pub async fn delete_recipe(
    id: Id,
    session: SessionData,
    context: Context,
) -> Result<Response, Rejection> {
    let recipe = get_existing(&context, id).await?;
    ensure_can_manage(&session, &recipe)?;

    if !context.store.delete_recipe(id).await? {
        return Err(HttpError::NotFound.default().into());
    }
    remove_image(&context.config.media_root, &recipe.image).await;

    log::info!("> User {} deleted recipe {id}", session.user_id);
    Ok(no_content())
}

pub async fn add_membership(
    id: Id,
    kind: Membership,
    session: SessionData,
    context: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnMemberships)?;

    let recipe = get_existing(&context, id).await?;
    if !context
        .store
        .add_membership(kind, session.user_id, recipe.id)
        .await?
    {
        return Err(HttpError::InvalidRequest.new(kind.already_present()).into());
    }

    Ok(json(&recipe_short(&context, recipe), StatusCode::CREATED))
}

pub async fn remove_membership(
    id: Id,
    kind: Membership,
    session: SessionData,
    context: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnMemberships)?;

    let recipe = get_existing(&context, id).await?;
    if !context
        .store
        .remove_membership(kind, session.user_id, recipe.id)
        .await?
    {
        return Err(HttpError::InvalidRequest.new(kind.not_present()).into());
    }

    Ok(no_content())
}

pub async fn download_shopping_cart(
    session: SessionData,
    context: Context,
) -> Result<Response, Rejection> {
    let items = context.store.shopping_list(session.user_id).await?;
    let document =
        Document::shopping_list(&session.username, context.renderer.site_name(), &items);

    let filename = format!("{}_shopping_list.pdf", session.username);
    let bytes = context
        .renderer
        .export(&document, &format!("{SHOPPING_LIST_DIRECTORY}/{filename}"))
        .await
        .map_err(Error::from)?;

    log::debug!("> Shopping list of {} has {} rows", session.username, items.len());
    Ok(pdf_attachment(bytes, &filename))
}

pub async fn download_recipe(id: Id, context: Context) -> Result<Response, Rejection> {
    let recipe = get_existing(&context, id).await?;
    let author = context
        .store
        .get_user(recipe.author_id)
        .await?
        .map(|author| author.username)
        .unwrap_or_default();
    let ingredients = context.store.recipe_ingredients(id).await?;

    let document = Document::recipe(&recipe, &author, &ingredients, context.renderer.site_name());
    let filename = format!("{id}_recipe.pdf");
    let bytes = context
        .renderer
        .export(&document, &format!("{RECIPE_PDF_DIRECTORY}/{filename}"))
        .await
        .map_err(Error::from)?;

    Ok(pdf_attachment(bytes, &filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> RecipePayload {
        RecipePayload {
            ingredients: Some(vec![IngredientAmount { id: 1, amount: 200 }]),
            tags: Some(vec![2, 2, 3]),
            image: None,
            name: Some(String::from("  Pancakes ")),
            text: Some(String::from("Mix and fry.")),
            cooking_time: Some(15),
        }
    }

    #[test]
    fn valid_payload_normalizes() {
        let mut errors = FieldErrors::new();
        let (draft, image) = check_payload(payload(), false, &mut errors).unwrap();

        assert!(errors.is_empty());
        assert!(image.is_none());
        assert_eq!(draft.name, "Pancakes");
        assert_eq!(draft.tags, vec![2, 3]);
    }

    #[test]
    fn image_is_required_on_create() {
        let mut errors = FieldErrors::new();
        check_payload(payload(), true, &mut errors);

        assert_eq!(errors["image"], vec!["This field is required."]);
    }

    #[test]
    fn ingredient_rules() {
        let mut errors = FieldErrors::new();
        let mut duplicated = payload();
        duplicated.ingredients = Some(vec![
            IngredientAmount { id: 1, amount: 1 },
            IngredientAmount { id: 1, amount: 0 },
        ]);
        check_payload(duplicated, false, &mut errors);

        assert_eq!(errors["ingredients"], vec!["Ingredients must be unique."]);
        assert_eq!(
            errors["amount"],
            vec!["Ensure this value is greater than or equal to 1."]
        );

        let mut errors = FieldErrors::new();
        let mut empty = payload();
        empty.ingredients = Some(vec![]);
        check_payload(empty, false, &mut errors);
        assert_eq!(errors["ingredients"], vec!["At least one ingredient is required."]);
    }

    #[test]
    fn cooking_time_bounds_and_missing_fields() {
        let mut errors = FieldErrors::new();
        let mut slow = payload();
        slow.cooking_time = Some(MAX_COOKING_TIME + 1);
        slow.text = None;
        assert!(check_payload(slow, false, &mut errors).is_none());

        assert_eq!(
            errors["cooking_time"],
            vec![format!("Ensure this value is less than or equal to {MAX_COOKING_TIME}.")]
        );
        assert_eq!(errors["text"], vec!["This field is required."]);
    }
}
