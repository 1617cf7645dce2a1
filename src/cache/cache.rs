use std::fmt::Debug;

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::{database::error::CacheError, error::Error, jwt::SessionData};

// Caching - keys

#[derive(Clone, Debug)]
pub struct CacheKey<T: ToString> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }
}

impl<T: ToString> From<&CacheKey<T>> for String {
    fn from(value: &CacheKey<T>) -> Self {
        match value._type {
            CacheKeyType::RevokedSession => format!("revoked-session-{}", value._value.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum CacheKeyType {
    RevokedSession,
}

impl CacheKeyType {
    pub fn new<T: ToString>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone, Debug)]
pub struct RevokedSession {
    pub user_id: i32,
    pub revoked_at: i64,
}

/// Tokens explicitly logged out before their expiry.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn revoke(&self, session: &SessionData) -> Result<(), Error>;
    async fn is_revoked(&self, token_id: &str) -> Result<bool, Error>;
}

#[derive(Clone)]
pub struct RedisSessionCache {
    connection: MultiplexedConnection,
}

impl RedisSessionCache {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn revoke(&self, session: &SessionData) -> Result<(), Error> {
        let key = CacheKeyType::RevokedSession.new(&session.token_id);
        let value = RevokedSession {
            user_id: session.user_id,
            revoked_at: Utc::now().timestamp(),
        };

        // The entry only has to outlive the token itself.
        let lifetime = session.remaining_seconds().max(1);
        let mut cache = self.connection.clone();
        set_cache_value_ex(String::from(&key), value, lifetime, &mut cache).await?;

        log::debug!("> Revoked session of user {}", session.user_id);
        Ok(())
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool, Error> {
        let key = CacheKeyType::RevokedSession.new(token_id);
        let mut cache = self.connection.clone();
        let value: Option<RevokedSession> = get_cache_value(String::from(&key), &mut cache).await?;

        Ok(value.is_some())
    }
}

// Cache - raw handlers

pub async fn set_cache_value_ex<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    seconds: u64,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .set_ex(key, value, seconds)
        .await
        .map_err(CacheError::from)?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue + Debug>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    let value: Option<V> = cache.get(key).await.map_err(CacheError::from)?;

    Ok(value)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_session_keys_are_namespaced() {
        let key = CacheKeyType::RevokedSession.new("abc");
        assert_eq!(String::from(&key), "revoked-session-abc");
    }
}
