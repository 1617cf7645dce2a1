use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::Error,
    schema::{
        Id, Ingredient, Membership, NewUser, Recipe, RecipeDraft, RecipeFilter, RecipeIngredient,
        ShoppingItem, Tag, User,
    },
};

use super::actions::{ingredients, memberships, recipes, shopping_cart, subscriptions, tags, users};

/// Persistence seen by the request handlers.
///
/// Counts returned next to a page of rows are the totals before
/// `limit`/`offset` were applied.
#[async_trait]
pub trait Store: Send + Sync {
    async fn register_user(&self, user: NewUser) -> Result<User, Error>;
    async fn get_user(&self, id: Id) -> Result<Option<User>, Error>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;
    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), Error>;
    async fn set_password(&self, user_id: Id, password: &str) -> Result<(), Error>;

    async fn subscribe(&self, user_id: Id, author_id: Id) -> Result<bool, Error>;
    async fn unsubscribe(&self, user_id: Id, author_id: Id) -> Result<bool, Error>;
    async fn is_subscribed(&self, user_id: Id, author_id: Id) -> Result<bool, Error>;
    async fn list_subscriptions(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), Error>;

    async fn list_tags(&self) -> Result<Vec<Tag>, Error>;
    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error>;
    async fn find_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, Error>;

    async fn list_ingredients(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>, Error>;
    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error>;
    async fn find_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error>;

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), Error>;
    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<(Vec<Recipe>, i64), Error>;
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error>;
    async fn recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, Error>;
    async fn recipe_ingredients(&self, recipe_id: Id) -> Result<Vec<RecipeIngredient>, Error>;
    async fn create_recipe(&self, author_id: Id, draft: &RecipeDraft) -> Result<Id, Error>;
    async fn update_recipe(&self, id: Id, draft: &RecipeDraft) -> Result<(), Error>;
    async fn delete_recipe(&self, id: Id) -> Result<bool, Error>;

    async fn add_membership(&self, kind: Membership, user_id: Id, recipe_id: Id)
        -> Result<bool, Error>;
    async fn remove_membership(
        &self,
        kind: Membership,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error>;
    async fn has_membership(&self, kind: Membership, user_id: Id, recipe_id: Id)
        -> Result<bool, Error>;

    async fn shopping_list(&self, user_id: Id) -> Result<Vec<ShoppingItem>, Error>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn register_user(&self, user: NewUser) -> Result<User, Error> {
        users::register_user(&self.pool, user).await
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        users::get_user_by_id(&self.pool, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        users::get_user_by_email(&self.pool, email).await
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), Error> {
        users::list_users(&self.pool, limit, offset).await
    }

    async fn set_password(&self, user_id: Id, password: &str) -> Result<(), Error> {
        users::set_password(&self.pool, user_id, password).await
    }

    async fn subscribe(&self, user_id: Id, author_id: Id) -> Result<bool, Error> {
        subscriptions::subscribe(&self.pool, user_id, author_id).await
    }

    async fn unsubscribe(&self, user_id: Id, author_id: Id) -> Result<bool, Error> {
        subscriptions::unsubscribe(&self.pool, user_id, author_id).await
    }

    async fn is_subscribed(&self, user_id: Id, author_id: Id) -> Result<bool, Error> {
        subscriptions::is_subscribed(&self.pool, user_id, author_id).await
    }

    async fn list_subscriptions(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), Error> {
        subscriptions::list_subscriptions(&self.pool, user_id, limit, offset).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        tags::list_tags(&self.pool).await
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error> {
        tags::get_tag(&self.pool, id).await
    }

    async fn find_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, Error> {
        tags::find_tags(&self.pool, ids).await
    }

    async fn list_ingredients(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>, Error> {
        ingredients::list_ingredients(&self.pool, prefix).await
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error> {
        ingredients::get_ingredient(&self.pool, id).await
    }

    async fn find_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error> {
        ingredients::find_ingredients(&self.pool, ids).await
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), Error> {
        recipes::fetch_recipes(&self.pool, filter, limit, offset).await
    }

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<(Vec<Recipe>, i64), Error> {
        recipes::fetch_author_recipes(&self.pool, author_id, limit).await
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error> {
        recipes::get_recipe(&self.pool, id).await
    }

    async fn recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, Error> {
        tags::list_recipe_tags(&self.pool, recipe_id).await
    }

    async fn recipe_ingredients(&self, recipe_id: Id) -> Result<Vec<RecipeIngredient>, Error> {
        recipes::list_recipe_ingredients(&self.pool, recipe_id).await
    }

    async fn create_recipe(&self, author_id: Id, draft: &RecipeDraft) -> Result<Id, Error> {
        recipes::create_recipe(&self.pool, author_id, draft).await
    }

    async fn update_recipe(&self, id: Id, draft: &RecipeDraft) -> Result<(), Error> {
        recipes::update_recipe(&self.pool, id, draft).await
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, Error> {
        recipes::delete_recipe(&self.pool, id).await
    }

    async fn add_membership(
        &self,
        kind: Membership,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error> {
        memberships::add_membership(&self.pool, kind, user_id, recipe_id).await
    }

    async fn remove_membership(
        &self,
        kind: Membership,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error> {
        memberships::remove_membership(&self.pool, kind, user_id, recipe_id).await
    }

    async fn has_membership(
        &self,
        kind: Membership,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error> {
        memberships::has_membership(&self.pool, kind, user_id, recipe_id).await
    }

    async fn shopping_list(&self, user_id: Id) -> Result<Vec<ShoppingItem>, Error> {
        shopping_cart::fetch_shopping_list(&self.pool, user_id).await
    }
}
