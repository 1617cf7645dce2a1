use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde_json::{json, Value};
use warp::{http::StatusCode, reject::Reject};

/// Field name -> messages, rendered as `{"field": ["message", ...]}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    InvalidRequest,
    InvalidSession,
    Forbidden,
    NotFound,
    InternalServerError,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::InvalidRequest => StatusCode::BAD_REQUEST,
            HttpError::InvalidSession => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden => StatusCode::FORBIDDEN,
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_info(&self) -> &'static str {
        match self {
            HttpError::InvalidRequest => "Invalid request.",
            HttpError::InvalidSession => "Authentication credentials were not provided.",
            HttpError::Forbidden => "You do not have permission to perform this action.",
            HttpError::NotFound => "Not found.",
            HttpError::InternalServerError => "Internal server error.",
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            kind: self,
            info: info.to_string(),
            fields: None,
        }
    }

    pub fn default(self) -> Error {
        self.new(self.default_info())
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: HttpError,
    pub info: String,
    pub fields: Option<FieldErrors>,
}

impl Error {
    pub fn field(field: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        Self::fields(fields)
    }

    pub fn fields(fields: FieldErrors) -> Self {
        Self {
            kind: HttpError::InvalidRequest,
            info: String::from("Validation failed."),
            fields: Some(fields),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn body(&self) -> Value {
        match &self.fields {
            Some(fields) => json!(fields),
            None => json!({ "detail": self.info }),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.info, self.status().as_u16())
    }
}

impl std::error::Error for Error {}

impl Reject for Error {}

impl From<validator::ValidationErrors> for Error {
    fn from(value: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();

        for (field, errors) in value.field_errors() {
            let messages = fields.entry(field.to_string()).or_default();
            for error in errors.iter() {
                messages.push(match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({}).", error.code),
                });
            }
        }
        Self::fields(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_render_per_field() {
        let error = Error::field("cooking_time", "Ensure this value is at least 1.");

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body(),
            json!({ "cooking_time": ["Ensure this value is at least 1."] })
        );
    }

    #[test]
    fn plain_errors_render_detail() {
        let error = HttpError::NotFound.default();

        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.body(), json!({ "detail": "Not found." }));
    }
}
