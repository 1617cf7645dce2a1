pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const SUBSCRIPTION_RECIPES_LIMIT: i64 = 3;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MAX_COOKING_TIME: i32 = 32767;
pub const MIN_AMOUNT: i32 = 1;
pub const MAX_AMOUNT: i32 = 32767;

pub const MAX_LENGTH_RECIPE_NAME: usize = 256;

/// Usernames that would shadow routes or impersonate staff.
pub const BANNED_USERNAMES: &[&str] = &["me", "admin", "administrator", "moderator"];

pub const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

pub const IMAGE_DIRECTORY: &str = "recipes/images";
pub const RECIPE_PDF_DIRECTORY: &str = "recipes";
pub const SHOPPING_LIST_DIRECTORY: &str = "shopping_lists";

pub const MAX_BODY_SIZE: u64 = 1024 * 1024 * 16;
