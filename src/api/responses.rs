use std::convert::Infallible;

use serde::Serialize;
use serde_json::json;
use warp::{
    http::{header, StatusCode},
    reply::{self, Response},
    Rejection, Reply,
};

use crate::error::{Error, HttpError};

pub fn json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn pdf_attachment(bytes: Vec<u8>, filename: &str) -> Response {
    let response = reply::with_header(bytes, header::CONTENT_TYPE, "application/pdf");
    reply::with_header(
        response,
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", header_safe(filename)),
    )
    .into_response()
}

/// Header values only carry visible ASCII.
fn header_safe(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

fn error_reply(error: &Error) -> Response {
    json(&error.body(), error.status())
}

fn detail(info: &str, status: StatusCode) -> Response {
    json(&json!({ "detail": info }), status)
}

pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    if let Some(error) = rejection.find::<Error>() {
        match error.kind {
            HttpError::InternalServerError => log::error!("> {error}"),
            _ => log::debug!("> Rejected: {error}"),
        }
        return Ok(error_reply(error));
    }

    if rejection.is_not_found() {
        return Ok(error_reply(&HttpError::NotFound.default()));
    }

    if let Some(e) = rejection.find::<warp::body::BodyDeserializeError>() {
        log::debug!("> Rejected body: {e}");
        return Ok(detail(&e.to_string(), StatusCode::BAD_REQUEST));
    }

    if let Some(e) = rejection.find::<warp::reject::InvalidQuery>() {
        return Ok(detail(&e.to_string(), StatusCode::BAD_REQUEST));
    }

    if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(detail(
            "Request body is too large.",
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }

    if rejection
        .find::<warp::reject::UnsupportedMediaType>()
        .is_some()
    {
        return Ok(detail(
            "Unsupported media type.",
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ));
    }

    if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(detail("Method not allowed.", StatusCode::METHOD_NOT_ALLOWED));
    }

    log::error!("> Unhandled rejection: {rejection:?}");
    Ok(error_reply(&HttpError::InternalServerError.default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_names_are_ascii() {
        let response = pdf_attachment(Vec::new(), "jürgen\"_shopping_list.pdf");
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();

        assert_eq!(disposition, "attachment; filename=\"j_rgen__shopping_list.pdf\"");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    }
}
