use std::{convert::Infallible, sync::Arc};

use serde::Serialize;
use sqlx::{Pool, Postgres};
use warp::{http::StatusCode, reply::Response, Filter, Reply};

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    pub fn secret(&self) -> Arc<Vec<u8>> {
        self.config.session_secret.clone()
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// 201 with the created item, or 204 once a relation is removed.
pub fn toggled_reply<T: Serialize>(created: Option<&T>) -> Response {
    match created {
        Some(value) => json_reply(value, StatusCode::CREATED),
        None => no_content(),
    }
}
