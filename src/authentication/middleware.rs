use warp::{reject::Rejection, Filter};

use crate::{
    context::{with_context, Context},
    error::{Error, HttpError},
};

use super::jwt::SessionData;

/// Extracts the token from `Token <jwt>` or `Bearer <jwt>`.
fn token_from_header(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;

    match scheme {
        "Token" | "Bearer" if !token.trim().is_empty() => Some(token.trim()),
        _ => None,
    }
}

async fn resolve_session(context: &Context, header: &str) -> Result<SessionData, Error> {
    let token = token_from_header(header)
        .ok_or(HttpError::InvalidSession.new("Invalid session; Malformed authorization header"))?;
    let session = SessionData::from(context.signer.verify(token)?);

    if context.sessions.is_revoked(&session.token_id).await? {
        return Err(HttpError::InvalidSession.new("Invalid session; Token revoked"));
    }
    Ok(session)
}

pub fn with_session(
    context: Context,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_context(context))
        .and_then(|header: Option<String>, context: Context| async move {
            let header = header.ok_or(HttpError::InvalidSession.default())?;
            resolve_session(&context, &header)
                .await
                .map_err(Rejection::from)
        })
}

/// Anonymous requests pass as `None`; a bad token is still rejected.
pub fn with_possible_session(
    context: Context,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_context(context))
        .and_then(|header: Option<String>, context: Context| async move {
            match header {
                None => Ok(None),
                Some(header) => resolve_session(&context, &header)
                    .await
                    .map(Some)
                    .map_err(Rejection::from),
            }
        })
}
