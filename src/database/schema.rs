use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, FieldErrors};

pub type Id = i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
}

impl User {
    pub fn is_staff(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// A user about to be inserted; `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    /// Path relative to the media root.
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// An ingredient line of a recipe, joined with the ingredient itself.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeIngredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

/// Validated recipe contents, shared by create and update.
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    /// `None` keeps the stored image on update.
    pub image: Option<String>,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
}

/// One ingredient line of a recipe sitting in somebody's cart.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub recipe_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingItem {
    pub name: String,
    pub total_amount: i64,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    Favorite,
    ShoppingCart,
}

impl Membership {
    pub fn table(&self) -> &'static str {
        match self {
            Membership::Favorite => "favorites",
            Membership::ShoppingCart => "shopping_carts",
        }
    }

    pub fn already_present(&self) -> &'static str {
        match self {
            Membership::Favorite => "Recipe is already in favorites.",
            Membership::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    pub fn not_present(&self) -> &'static str {
        match self {
            Membership::Favorite => "Recipe is not in favorites.",
            Membership::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub title: Option<String>,
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub cooking_time_min: Option<i32>,
    pub cooking_time_max: Option<i32>,
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe, tags: &[Tag]) -> bool {
        if let Some(title) = &self.title {
            if !recipe.name.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if self.author.is_some_and(|author| author != recipe.author_id) {
            return false;
        }
        if !self.tags.is_empty() && !tags.iter().any(|tag| self.tags.contains(&tag.slug)) {
            return false;
        }
        if self.cooking_time_min.is_some_and(|min| recipe.cooking_time < min) {
            return false;
        }
        if self.cooking_time_max.is_some_and(|max| recipe.cooking_time > max) {
            return false;
        }
        true
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &str,
    value: &str,
    errors: &mut FieldErrors,
) -> Option<T> {
    match value.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors
                .entry(key.to_string())
                .or_default()
                .push(String::from("Enter a number."));
            None
        }
    }
}

impl TryFrom<&[(String, String)]> for RecipeFilter {
    type Error = Error;

    fn try_from(pairs: &[(String, String)]) -> Result<Self, Self::Error> {
        let mut filter = Self::default();
        let mut errors = FieldErrors::new();

        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }

            match key.as_str() {
                "title" => filter.title = Some(value.to_owned()),
                "author" => filter.author = parse_number(key, value, &mut errors),
                "tags" => filter.tags.push(value.to_owned()),
                "cooking_time_min" => {
                    filter.cooking_time_min = parse_number(key, value, &mut errors)
                }
                "cooking_time_max" => {
                    filter.cooking_time_max = parse_number(key, value, &mut errors)
                }
                _ => {}
            }
        }

        if !errors.is_empty() {
            return Err(Error::fields(errors));
        }
        Ok(filter)
    }
}
