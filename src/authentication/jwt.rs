use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::{Error, HttpError},
    schema::{Id, User, UserRole},
};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user: &User, lifetime: Duration) -> Self {
        let now = Utc::now();

        Self {
            user_id: user.id,
            username: user.username.to_owned(),
            role: user.role,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub token_id: String,
    pub expires_at: i64,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(HttpError::Forbidden.default());
        }
        Ok(())
    }

    /// Seconds until the token expires, never negative.
    pub fn remaining_seconds(&self) -> u64 {
        (self.expires_at - Utc::now().timestamp()).max(0) as u64
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        Self {
            user_id: value.user_id,
            username: value.username,
            role: value.role,
            token_id: value.jti,
            expires_at: value.exp,
        }
    }
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl TokenSigner {
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            key: Hmac::new_from_slice(secret)?,
            lifetime,
        })
    }

    pub fn generate(&self, user: &User) -> Result<String, Error> {
        JwtSessionData::new(user, self.lifetime)
            .sign_with_key(&self.key)
            .map_err(|e| {
                log::error!("> Failed to sign session: {e}");
                HttpError::InternalServerError.new("Failed to sign session")
            })
    }

    pub fn verify(&self, token: &str) -> Result<JwtSessionData, Error> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| HttpError::InvalidSession.new("Invalid session; Invalid token"))?;

        if session.exp <= Utc::now().timestamp() {
            return Err(HttpError::InvalidSession.new("Invalid session; Token expired"));
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Jamie"),
            last_name: String::from("Oliver"),
            password: String::new(),
            role: UserRole::User,
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let signer = TokenSigner::new(b"secret", Duration::hours(1)).unwrap();
        let token = signer.generate(&user()).unwrap();
        let session: SessionData = signer.verify(&token).unwrap().into();

        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "cook");
        assert!(session.remaining_seconds() > 3500);
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let signer = TokenSigner::new(b"secret", Duration::hours(1)).unwrap();
        let other = TokenSigner::new(b"other", Duration::hours(1)).unwrap();
        let token = other.generate(&user()).unwrap();
        assert_eq!(signer.verify(&token).unwrap_err().kind, HttpError::InvalidSession);

        let expired = TokenSigner::new(b"secret", Duration::hours(-1)).unwrap();
        let token = expired.generate(&user()).unwrap();
        assert_eq!(signer.verify(&token).unwrap_err().kind, HttpError::InvalidSession);
    }
}
