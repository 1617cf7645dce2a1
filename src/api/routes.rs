use serde::de::DeserializeOwned;
use warp::{
    filters::{path::full, BoxedFilter},
    Filter, Rejection, Reply,
};

use crate::{
    constants::MAX_BODY_SIZE,
    context::{with_context, Context},
    middleware::{with_possible_session, with_session},
    schema::{Id, Membership},
};

use super::{auth, catalog, recipes, responses::handle_rejection, users};

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

/// The whole HTTP surface: `/api/...`, `/media/...` and error rendering.
pub fn routes(context: Context) -> BoxedFilter<(impl Reply,)> {
    let media_root = context.config.media_root.clone();

    let ctx = {
        let context = context.clone();
        move || with_context(context.clone())
    };
    let session = {
        let context = context.clone();
        move || with_session(context.clone())
    };
    let maybe_session = {
        let context = context.clone();
        move || with_possible_session(context.clone())
    };
    let raw_query = warp::query::raw()
        .or(warp::any().map(String::new))
        .unify();
    let query = warp::query::<Vec<(String, String)>>();

    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(ctx())
        .and_then(catalog::list_tags)
        .or(warp::path!("api" / "tags" / Id)
            .and(warp::get())
            .and(ctx())
            .and_then(catalog::get_tag))
        .unify();

    let ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(query.clone())
        .and(ctx())
        .and_then(catalog::list_ingredients)
        .or(warp::path!("api" / "ingredients" / Id)
            .and(warp::get())
            .and(ctx())
            .and_then(catalog::get_ingredient))
        .unify();

    let recipe_collection = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(full())
        .and(raw_query.clone())
        .and(query.clone())
        .and(maybe_session())
        .and(ctx())
        .and_then(recipes::list_recipes)
        .or(warp::path!("api" / "recipes")
            .and(warp::post())
            .and(session())
            .and(json_body())
            .and(ctx())
            .and_then(recipes::create_recipe))
        .unify()
        .or(warp::path!("api" / "recipes" / "download_shopping_cart")
            .and(warp::get())
            .and(session())
            .and(ctx())
            .and_then(recipes::download_shopping_cart))
        .unify();

    let recipe_item = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(maybe_session())
        .and(ctx())
        .and_then(recipes::get_recipe)
        .or(warp::path!("api" / "recipes" / Id)
            .and(warp::put())
            .and(warp::any().map(|| false))
            .and(session())
            .and(json_body())
            .and(ctx())
            .and_then(recipes::update_recipe))
        .unify()
        .or(warp::path!("api" / "recipes" / Id)
            .and(warp::patch())
            .and(warp::any().map(|| true))
            .and(session())
            .and(json_body())
            .and(ctx())
            .and_then(recipes::update_recipe))
        .unify()
        .or(warp::path!("api" / "recipes" / Id)
            .and(warp::delete())
            .and(session())
            .and(ctx())
            .and_then(recipes::delete_recipe))
        .unify()
        .or(warp::path!("api" / "recipes" / Id / "download")
            .and(warp::get())
            .and(ctx())
            .and_then(recipes::download_recipe))
        .unify();

    let memberships = warp::path!("api" / "recipes" / Id / "favorite")
        .map(|id: Id| (id, Membership::Favorite))
        .untuple_one()
        .or(warp::path!("api" / "recipes" / Id / "shopping_cart")
            .map(|id: Id| (id, Membership::ShoppingCart))
            .untuple_one())
        .unify();
    let memberships = memberships
        .clone()
        .and(warp::post())
        .and(session())
        .and(ctx())
        .and_then(recipes::add_membership)
        .or(memberships
            .and(warp::delete())
            .and(session())
            .and(ctx())
            .and_then(recipes::remove_membership))
        .unify();

    let user_collection = warp::path!("api" / "users")
        .and(warp::get())
        .and(full())
        .and(raw_query.clone())
        .and(maybe_session())
        .and(ctx())
        .and_then(users::list_users)
        .or(warp::path!("api" / "users")
            .and(warp::post())
            .and(json_body())
            .and(ctx())
            .and_then(users::register_user))
        .unify()
        .or(warp::path!("api" / "users" / "me")
            .and(warp::get())
            .and(session())
            .and(ctx())
            .and_then(users::me))
        .unify()
        .or(warp::path!("api" / "users" / "set_password")
            .and(warp::post())
            .and(session())
            .and(json_body())
            .and(ctx())
            .and_then(users::set_password))
        .unify()
        .or(warp::path!("api" / "users" / "subscriptions")
            .and(warp::get())
            .and(full())
            .and(raw_query)
            .and(query.clone())
            .and(session())
            .and(ctx())
            .and_then(users::subscriptions))
        .unify();

    let user_item = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(maybe_session())
        .and(ctx())
        .and_then(users::get_user)
        .or(warp::path!("api" / "users" / Id / "subscribe")
            .and(warp::post())
            .and(query)
            .and(session())
            .and(ctx())
            .and_then(users::subscribe))
        .unify()
        .or(warp::path!("api" / "users" / Id / "subscribe")
            .and(warp::delete())
            .and(session())
            .and(ctx())
            .and_then(users::unsubscribe))
        .unify();

    let tokens = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body())
        .and(ctx())
        .and_then(auth::login)
        .or(warp::path!("api" / "auth" / "token" / "logout")
            .and(warp::post())
            .and(session())
            .and(ctx())
            .and_then(auth::logout))
        .unify();

    let media = warp::path("media")
        .and(warp::fs::dir(media_root))
        .map(|file: warp::fs::File| file.into_response());

    tags.or(ingredients)
        .unify()
        .or(recipe_collection)
        .unify()
        .or(recipe_item)
        .unify()
        .or(memberships)
        .unify()
        .or(user_collection)
        .unify()
        .or(user_item)
        .unify()
        .or(tokens)
        .unify()
        .or(media)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::log("foodgram"))
        .boxed()
}
