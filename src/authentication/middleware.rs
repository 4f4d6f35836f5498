use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use crate::error::ServiceError;

use super::jwt::{verify_jwt_session, SessionData};

/// Extracts the token of an `Authorization: Bearer <token>` or
/// `Authorization: Token <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn read_session(header: &str, secret: &[u8]) -> Result<SessionData, Rejection> {
    let token = bearer_token(header).ok_or_else(|| {
        reject::custom(ServiceError::Unauthorized(String::from(
            "Malformed authorization header",
        )))
    })?;

    verify_jwt_session(token, secret)
        .map(SessionData::from)
        .map_err(reject::custom)
}

pub fn with_session(
    secret: Arc<Vec<u8>>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            match header {
                Some(header) => read_session(&header, &secret),
                None => Err(reject::custom(ServiceError::Unauthorized(String::from(
                    "Authentication credentials were not provided",
                )))),
            }
        }
    })
}

/// Anonymous requests pass through as `None`, a present but invalid token
/// is still rejected.
pub fn with_possible_session(
    secret: Arc<Vec<u8>>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            match header {
                Some(header) => read_session(&header, &secret).map(Some),
                None => Ok(None),
            }
        }
    })
}
