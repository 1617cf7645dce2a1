use serde::Serialize;

use crate::{
    context::Context,
    error::{Error, HttpError},
    jwt::SessionData,
    schema::{Id, Membership, Recipe, RecipeIngredient, Tag, User},
};

#[derive(Serialize, Debug)]
pub struct UserView {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Serialize, Debug)]
pub struct RecipeShort {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

pub async fn user_view(
    context: &Context,
    user: User,
    viewer: Option<&SessionData>,
) -> Result<UserView, Error> {
    let is_subscribed = match viewer {
        Some(viewer) if viewer.user_id != user.id => {
            context.store.is_subscribed(viewer.user_id, user.id).await?
        }
        _ => false,
    };

    Ok(UserView {
        id: user.id,
        email: user.email,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed,
    })
}

pub fn recipe_short(context: &Context, recipe: Recipe) -> RecipeShort {
    RecipeShort {
        id: recipe.id,
        image: context.config.media_url(&recipe.image),
        name: recipe.name,
        cooking_time: recipe.cooking_time,
    }
}

pub async fn recipe_view(
    context: &Context,
    recipe: Recipe,
    viewer: Option<&SessionData>,
) -> Result<RecipeView, Error> {
    let store = &context.store;

    let author = store.get_user(recipe.author_id).await?.ok_or_else(|| {
        log::error!("> Recipe {} has no author {}", recipe.id, recipe.author_id);
        HttpError::InternalServerError.new("Recipe author is missing")
    })?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            store
                .has_membership(Membership::Favorite, viewer.user_id, recipe.id)
                .await?,
            store
                .has_membership(Membership::ShoppingCart, viewer.user_id, recipe.id)
                .await?,
        ),
        None => (false, false),
    };

    Ok(RecipeView {
        id: recipe.id,
        tags: store.recipe_tags(recipe.id).await?,
        author: user_view(context, author, viewer).await?,
        ingredients: store.recipe_ingredients(recipe.id).await?,
        is_favorited,
        is_in_shopping_cart,
        image: context.config.media_url(&recipe.image),
        name: recipe.name,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn subscription_view(
    context: &Context,
    author: User,
    viewer: &SessionData,
    recipes_limit: Option<i64>,
) -> Result<SubscriptionView, Error> {
    let (recipes, recipes_count) = context
        .store
        .list_author_recipes(author.id, recipes_limit)
        .await?;

    Ok(SubscriptionView {
        author: user_view(context, author, Some(viewer)).await?,
        recipes: recipes
            .into_iter()
            .map(|recipe| recipe_short(context, recipe))
            .collect(),
        recipes_count,
    })
}
