use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::ServiceError,
    schema::{Id, User, UserRole},
};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user_id: Id, username: String, role: UserRole, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            user_id,
            username,
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// The acting user of a request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), ServiceError> {
        if !action.authenticate(self) {
            return Err(ServiceError::Forbidden(String::from(
                "You don't have permission to perform this action",
            )));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(claims: JwtSessionData) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, ServiceError> {
    Hmac::new_from_slice(secret).map_err(|e| {
        log::error!("Invalid session signing key: {e}");
        ServiceError::Unauthorized(String::from("Invalid session"))
    })
}

pub fn generate_jwt_session(
    user: &User,
    secret: &[u8],
    ttl: Duration,
) -> Result<String, ServiceError> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.clone(), ttl);

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session token: {e}");
        ServiceError::Unauthorized(String::from("Invalid session"))
    })
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, ServiceError> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ServiceError::Unauthorized(String::from("Invalid session; Invalid token")))?;

    if session.is_expired() {
        return Err(ServiceError::Unauthorized(String::from(
            "Invalid session; Token expired",
        )));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn user(role: UserRole) -> User {
        User {
            id: 7,
            username: String::from("alice"),
            email: String::from("alice@example.com"),
            first_name: String::from("Alice"),
            last_name: String::from("Cook"),
            role,
        }
    }

    #[test]
    fn token_round_trip() {
        let token = generate_jwt_session(&user(UserRole::Admin), SECRET, Duration::hours(1))
            .expect("token is signed");
        let claims = verify_jwt_session(&token, SECRET).expect("token verifies");

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "alice");

        let session = SessionData::from(claims);
        assert_eq!(session.role, UserRole::Admin);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_jwt_session(&user(UserRole::User), SECRET, Duration::seconds(-10))
            .expect("token is signed");

        assert!(matches!(
            verify_jwt_session(&token, SECRET),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = generate_jwt_session(&user(UserRole::User), b"other", Duration::hours(1))
            .expect("token is signed");

        assert!(matches!(
            verify_jwt_session(&token, SECRET),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_jwt_session("not.a.token", SECRET).is_err());
    }
}
