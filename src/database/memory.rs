use std::{
    collections::{BTreeSet, HashMap},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::{
    error::{Error, HttpError},
    schema::{
        CartLine, Id, Ingredient, Membership, NewUser, Recipe, RecipeDraft, RecipeFilter,
        RecipeIngredient, ShoppingItem, Tag, User, UserRole,
    },
    shopping_list::aggregate,
};

use super::store::Store;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tags: Vec<Tag>,
    ingredients: Vec<Ingredient>,
    recipes: Vec<Recipe>,
    recipe_tags: HashMap<Id, Vec<Id>>,
    recipe_ingredients: HashMap<Id, Vec<(Id, i32)>>,
    memberships: BTreeSet<(u8, Id, Id)>,
    subscriptions: BTreeSet<(Id, Id)>,
    next_id: Id,
}

impl Tables {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

fn membership_key(kind: Membership) -> u8 {
    match kind {
        Membership::Favorite => 0,
        Membership::ShoppingCart => 1,
    }
}

/// In-process `Store` with the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_tag(&self, name: &str, slug: &str) -> Id {
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.tags.push(Tag {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        });
        id
    }

    pub fn add_ingredient(&self, name: &str, measurement_unit: &str) -> Id {
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.ingredients.push(Ingredient {
            id,
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        });
        id
    }

    pub fn promote(&self, user_id: Id) {
        let mut tables = self.lock();
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.role = UserRole::Admin;
        }
    }

    pub fn image_of(&self, recipe_id: Id) -> Option<String> {
        self.lock()
            .recipes
            .iter()
            .find(|r| r.id == recipe_id)
            .map(|r| r.image.clone())
    }

    fn tags_of(tables: &Tables, recipe_id: Id) -> Vec<Tag> {
        let ids = tables.recipe_tags.get(&recipe_id).cloned().unwrap_or_default();
        let mut tags: Vec<Tag> = tables
            .tags
            .iter()
            .filter(|tag| ids.contains(&tag.id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    fn sorted_users(mut users: Vec<User>) -> Vec<User> {
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> (Vec<T>, i64) {
        let total = rows.len() as i64;
        let rows = rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        (rows, total)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register_user(&self, user: NewUser) -> Result<User, Error> {
        let mut tables = self.lock();
        if tables
            .users
            .iter()
            .any(|u| u.email.to_lowercase() == user.email.to_lowercase())
        {
            return Err(Error::field("email", "A user with that email already exists."));
        }
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(Error::field(
                "username",
                "A user with that username already exists.",
            ));
        }

        let user = User {
            id: tables.next_id(),
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            password: user.password,
            role: UserRole::User,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == email.to_lowercase())
            .cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), Error> {
        let users = Self::sorted_users(self.lock().users.clone());
        Ok(Self::page(users, limit, offset))
    }

    async fn set_password(&self, user_id: Id, password: &str) -> Result<(), Error> {
        let mut tables = self.lock();
        match tables.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.password = password.to_string();
                Ok(())
            }
            None => Err(HttpError::NotFound.new("No user exists with specified id")),
        }
    }

    async fn subscribe(&self, user_id: Id, author_id: Id) -> Result<bool, Error> {
        if user_id == author_id {
            return Err(HttpError::InternalServerError.new("prevent_self_subscription"));
        }
        Ok(self.lock().subscriptions.insert((user_id, author_id)))
    }

    async fn unsubscribe(&self, user_id: Id, author_id: Id) -> Result<bool, Error> {
        Ok(self.lock().subscriptions.remove(&(user_id, author_id)))
    }

    async fn is_subscribed(&self, user_id: Id, author_id: Id) -> Result<bool, Error> {
        Ok(self.lock().subscriptions.contains(&(user_id, author_id)))
    }

    async fn list_subscriptions(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), Error> {
        let tables = self.lock();
        let authors = tables
            .users
            .iter()
            .filter(|u| tables.subscriptions.contains(&(user_id, u.id)))
            .cloned()
            .collect();
        Ok(Self::page(Self::sorted_users(authors), limit, offset))
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let mut tags = self.lock().tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error> {
        Ok(self.lock().tags.iter().find(|t| t.id == id).cloned())
    }

    async fn find_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, Error> {
        Ok(self
            .lock()
            .tags
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn list_ingredients(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>, Error> {
        let prefix = prefix.map(str::to_lowercase);
        let mut rows: Vec<Ingredient> = self
            .lock()
            .ingredients
            .iter()
            .filter(|i| match &prefix {
                Some(prefix) => i.name.to_lowercase().starts_with(prefix),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error> {
        Ok(self.lock().ingredients.iter().find(|i| i.id == id).cloned())
    }

    async fn find_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error> {
        Ok(self
            .lock()
            .ingredients
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect())
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), Error> {
        let tables = self.lock();
        let mut rows: Vec<Recipe> = tables
            .recipes
            .iter()
            .filter(|r| filter.matches(r, &Self::tags_of(&tables, r.id)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(Self::page(rows, limit, offset))
    }

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<(Vec<Recipe>, i64), Error> {
        let filter = RecipeFilter {
            author: Some(author_id),
            ..Default::default()
        };
        self.list_recipes(&filter, limit.unwrap_or(i64::MAX), 0).await
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error> {
        Ok(self.lock().recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, Error> {
        Ok(Self::tags_of(&self.lock(), recipe_id))
    }

    async fn recipe_ingredients(&self, recipe_id: Id) -> Result<Vec<RecipeIngredient>, Error> {
        let tables = self.lock();
        let mut rows: Vec<RecipeIngredient> = tables
            .recipe_ingredients
            .get(&recipe_id)
            .into_iter()
            .flatten()
            .filter_map(|(ingredient_id, amount)| {
                tables
                    .ingredients
                    .iter()
                    .find(|i| i.id == *ingredient_id)
                    .map(|i| RecipeIngredient {
                        id: i.id,
                        name: i.name.clone(),
                        measurement_unit: i.measurement_unit.clone(),
                        amount: *amount,
                    })
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn create_recipe(&self, author_id: Id, draft: &RecipeDraft) -> Result<Id, Error> {
        let mut tables = self.lock();
        let id = tables.next_id();
        // Strictly increasing publish dates keep "newest first" deterministic.
        let pub_date = Utc::now() + Duration::milliseconds(i64::from(id));

        tables.recipes.push(Recipe {
            id,
            author_id,
            name: draft.name.clone(),
            image: draft.image.clone().unwrap_or_default(),
            text: draft.text.clone(),
            cooking_time: draft.cooking_time,
            pub_date,
        });
        tables.recipe_tags.insert(id, draft.tags.clone());
        tables.recipe_ingredients.insert(
            id,
            draft.ingredients.iter().map(|p| (p.id, p.amount)).collect(),
        );
        Ok(id)
    }

    async fn update_recipe(&self, id: Id, draft: &RecipeDraft) -> Result<(), Error> {
        let mut tables = self.lock();
        if let Some(recipe) = tables.recipes.iter_mut().find(|r| r.id == id) {
            recipe.name = draft.name.clone();
            recipe.text = draft.text.clone();
            recipe.cooking_time = draft.cooking_time;
            if let Some(image) = &draft.image {
                recipe.image = image.clone();
            }
        }
        tables.recipe_tags.insert(id, draft.tags.clone());
        tables.recipe_ingredients.insert(
            id,
            draft.ingredients.iter().map(|p| (p.id, p.amount)).collect(),
        );
        Ok(())
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, Error> {
        let mut tables = self.lock();
        let before = tables.recipes.len();
        tables.recipes.retain(|r| r.id != id);
        tables.recipe_tags.remove(&id);
        tables.recipe_ingredients.remove(&id);
        tables.memberships.retain(|(_, _, recipe_id)| *recipe_id != id);
        Ok(tables.recipes.len() < before)
    }

    async fn add_membership(
        &self,
        kind: Membership,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error> {
        Ok(self
            .lock()
            .memberships
            .insert((membership_key(kind), user_id, recipe_id)))
    }

    async fn remove_membership(
        &self,
        kind: Membership,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error> {
        Ok(self
            .lock()
            .memberships
            .remove(&(membership_key(kind), user_id, recipe_id)))
    }

    async fn has_membership(
        &self,
        kind: Membership,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error> {
        Ok(self
            .lock()
            .memberships
            .contains(&(membership_key(kind), user_id, recipe_id)))
    }

    async fn shopping_list(&self, user_id: Id) -> Result<Vec<ShoppingItem>, Error> {
        let tables = self.lock();
        let cart = membership_key(Membership::ShoppingCart);

        let lines: Vec<CartLine> = tables
            .memberships
            .iter()
            .filter(|(kind, user, _)| *kind == cart && *user == user_id)
            .flat_map(|(_, _, recipe_id)| {
                tables
                    .recipe_ingredients
                    .get(recipe_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|(ingredient_id, amount)| {
                        tables
                            .ingredients
                            .iter()
                            .find(|i| i.id == *ingredient_id)
                            .map(|i| CartLine {
                                recipe_id: *recipe_id,
                                name: i.name.clone(),
                                measurement_unit: i.measurement_unit.clone(),
                                amount: *amount,
                            })
                    })
            })
            .collect();

        Ok(aggregate(lines))
    }
}
