use serde::Deserialize;
use serde_json::json as json_value;
use warp::{http::StatusCode, reply::Response, Rejection};

use crate::{
    context::Context, cryptography::verify_password, error::HttpError, jwt::SessionData,
};

use super::responses::{json, no_content};

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

pub async fn login(payload: LoginPayload, context: Context) -> Result<Response, Rejection> {
    let invalid = || HttpError::InvalidRequest.new("Unable to log in with provided credentials.");

    let user = context
        .store
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password)? {
        log::debug!("> Failed login for user {}", user.id);
        return Err(invalid().into());
    }

    let token = context.signer.generate(&user)?;
    log::info!("> User {} logged in", user.id);

    Ok(json(&json_value!({ "auth_token": token }), StatusCode::OK))
}

pub async fn logout(session: SessionData, context: Context) -> Result<Response, Rejection> {
    context.sessions.revoke(&session).await?;
    log::info!("> User {} logged out", session.user_id);

    Ok(no_content())
}
