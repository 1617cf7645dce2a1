use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use warp::{filters::path::FullPath, http::StatusCode, reply::Response, Rejection};

use crate::{
    constants::{BANNED_USERNAMES, SUBSCRIPTION_RECIPES_LIMIT, USER_COUNT_PER_PAGE},
    context::Context,
    cryptography::{hash_password, verify_password},
    error::{Error, HttpError},
    jwt::SessionData,
    pagination::{PageContext, PageRequest},
    permissions::ActionType,
    schema::{Id, NewUser, User},
};

use super::{
    responses::{json, no_content},
    views::{subscription_view, user_view},
};

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if BANNED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        return Err(ValidationError::new("banned_username")
            .with_message(Cow::Borrowed("This username is not allowed.")));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "_.@+-".contains(c))
    {
        return Err(ValidationError::new("invalid_username").with_message(Cow::Borrowed(
            "Enter a valid username. Only letters, digits and @/./+/-/_ are allowed.",
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterPayload {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters.")
    )]
    pub email: String,
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."))]
    pub last_name: String,
    #[validate(length(min = 8, message = "Ensure the password has at least 8 characters."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPasswordPayload {
    #[validate(length(min = 8, message = "Ensure the password has at least 8 characters."))]
    pub new_password: String,
    pub current_password: String,
}

#[derive(Serialize)]
struct RegisteredUser {
    id: Id,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
}

pub(super) fn page_url(context: &Context, path: &FullPath) -> String {
    format!("{}{}", context.config.site_url, path.as_str())
}

async fn get_author(context: &Context, id: Id) -> Result<User, Error> {
    context
        .store
        .get_user(id)
        .await?
        .ok_or(HttpError::NotFound.default())
}

pub async fn list_users(
    path: FullPath,
    raw_query: String,
    session: Option<SessionData>,
    context: Context,
) -> Result<Response, Rejection> {
    let request = PageRequest::parse(&page_url(&context, &path), &raw_query, USER_COUNT_PER_PAGE)?;
    let (users, total) = context
        .store
        .list_users(request.limit, request.offset())
        .await?;

    let mut views = Vec::with_capacity(users.len());
    for user in users {
        views.push(user_view(&context, user, session.as_ref()).await?);
    }

    let page = PageContext::from_rows(views, total, &request)?;
    Ok(json(&page, StatusCode::OK))
}

pub async fn register_user(
    payload: RegisterPayload,
    context: Context,
) -> Result<Response, Rejection> {
    payload.validate().map_err(Error::from)?;

    let user = context
        .store
        .register_user(NewUser {
            email: payload.email.trim().to_string(),
            username: payload.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password: hash_password(&payload.password)?,
        })
        .await?;

    log::info!("> Registered user {} ({})", user.username, user.id);
    let body = RegisteredUser {
        id: user.id,
        email: user.email,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
    };
    Ok(json(&body, StatusCode::CREATED))
}

pub async fn get_user(
    id: Id,
    session: Option<SessionData>,
    context: Context,
) -> Result<Response, Rejection> {
    let user = get_author(&context, id).await?;
    let view = user_view(&context, user, session.as_ref()).await?;

    Ok(json(&view, StatusCode::OK))
}

pub async fn me(session: SessionData, context: Context) -> Result<Response, Rejection> {
    let user = context
        .store
        .get_user(session.user_id)
        .await?
        .ok_or(HttpError::InvalidSession.new("Invalid session; User no longer exists"))?;
    let view = user_view(&context, user, Some(&session)).await?;

    Ok(json(&view, StatusCode::OK))
}

pub async fn set_password(
    session: SessionData,
    payload: SetPasswordPayload,
    context: Context,
) -> Result<Response, Rejection> {
    payload.validate().map_err(Error::from)?;

    let user = context
        .store
        .get_user(session.user_id)
        .await?
        .ok_or(HttpError::InvalidSession.new("Invalid session; User no longer exists"))?;

    if !verify_password(&payload.current_password, &user.password)? {
        return Err(Error::field("current_password", "Invalid password.").into());
    }

    let hash = hash_password(&payload.new_password)?;
    context.store.set_password(user.id, &hash).await?;

    log::info!("> User {} changed their password", user.id);
    Ok(no_content())
}

fn recipes_limit(query: &[(String, String)]) -> Result<i64, Error> {
    match query.iter().find(|(key, _)| key == "recipes_limit") {
        None => Ok(SUBSCRIPTION_RECIPES_LIMIT),
        Some((_, value)) => value
            .parse::<i64>()
            .ok()
            .filter(|limit| *limit >= 0)
            .ok_or_else(|| Error::field("recipes_limit", "Enter a non-negative number.")),
    }
}

pub async fn subscriptions(
    path: FullPath,
    raw_query: String,
    query: Vec<(String, String)>,
    session: SessionData,
    context: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let limit = recipes_limit(&query)?;
    let request = PageRequest::parse(&page_url(&context, &path), &raw_query, USER_COUNT_PER_PAGE)?;
    let (authors, total) = context
        .store
        .list_subscriptions(session.user_id, request.limit, request.offset())
        .await?;

    let mut views = Vec::with_capacity(authors.len());
    for author in authors {
        views.push(subscription_view(&context, author, &session, Some(limit)).await?);
    }

    let page = PageContext::from_rows(views, total, &request)?;
    Ok(json(&page, StatusCode::OK))
}

pub async fn subscribe(
    id: Id,
    query: Vec<(String, String)>,
    session: SessionData,
    context: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let author = get_author(&context, id).await?;
    if author.id == session.user_id {
        return Err(HttpError::InvalidRequest
            .new("You cannot subscribe to yourself.")
            .into());
    }

    let limit = recipes_limit(&query)?;
    if !context.store.subscribe(session.user_id, author.id).await? {
        return Err(HttpError::InvalidRequest
            .new("You are already subscribed to this author.")
            .into());
    }

    log::debug!("> User {} subscribed to {}", session.user_id, author.id);
    let view = subscription_view(&context, author, &session, Some(limit)).await?;
    Ok(json(&view, StatusCode::CREATED))
}

pub async fn unsubscribe(
    id: Id,
    session: SessionData,
    context: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let author = get_author(&context, id).await?;
    if !context.store.unsubscribe(session.user_id, author.id).await? {
        return Err(HttpError::InvalidRequest
            .new("You are not subscribed to this author.")
            .into());
    }

    Ok(no_content())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(username: &str, password: &str) -> RegisterPayload {
        RegisterPayload {
            email: String::from("cook@example.com"),
            username: username.to_string(),
            first_name: String::from("Jamie"),
            last_name: String::from("Oliver"),
            password: password.to_string(),
        }
    }

    #[test]
    fn banned_usernames_are_rejected_in_any_case() {
        for username in ["me", "Admin", "MODERATOR"] {
            let error = Error::from(payload(username, "long enough").validate().unwrap_err());
            assert!(error.fields.unwrap().contains_key("username"), "{username}");
        }
        assert!(payload("cook.book+1", "long enough").validate().is_ok());
    }

    #[test]
    fn malformed_registrations_report_each_field() {
        let mut registration = payload("bad name!", "short");
        registration.email = String::from("not-an-email");
        let fields = Error::from(registration.validate().unwrap_err())
            .fields
            .unwrap();

        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn recipes_limit_defaults_and_validates() {
        assert_eq!(recipes_limit(&[]).unwrap(), SUBSCRIPTION_RECIPES_LIMIT);

        let query = vec![(String::from("recipes_limit"), String::from("1"))];
        assert_eq!(recipes_limit(&query).unwrap(), 1);

        let query = vec![(String::from("recipes_limit"), String::from("-1"))];
        assert!(recipes_limit(&query).is_err());
    }
}
