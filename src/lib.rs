mod database {
    pub mod actions;
    pub mod error;
    pub mod pagination;
    pub mod schema;
    pub mod views;
}
mod authentication {
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod recipes;
    pub mod reference;
    pub mod rejection;
    pub mod routes;
    pub mod state;
    pub mod users;
}
pub mod config;
pub mod constants;

pub use api::{rejection::handle_rejection, routes::routes, state::AppState};
pub use authentication::*;
pub use constants::*;
pub use database::*;
