pub mod database {
    pub mod actions;
    pub mod error;
    #[cfg(test)]
    pub mod memory;
    pub mod pagination;
    pub mod schema;
    pub mod store;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod api {
    pub mod auth;
    pub mod catalog;
    pub mod images;
    pub mod recipes;
    pub mod responses;
    pub mod routes;
    pub mod users;
    pub mod views;

    #[cfg(test)]
    mod tests;
}
pub mod cache {
    pub mod cache;
}
pub mod document {
    pub mod fonts;
    pub mod layout;
    pub mod render;
}
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod shopping_list;

pub use authentication::*;
pub use database::{pagination, schema, store};
