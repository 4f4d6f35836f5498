use warp::{Filter, Reply};

use super::{
    recipes::recipe_routes, reference::reference_routes, rejection::handle_rejection,
    state::AppState, users::user_routes,
};

/// The complete HTTP surface, mounted under `/api`.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone {
    let api = recipe_routes(&state)
        .or(user_routes(&state))
        .unify()
        .or(reference_routes(&state))
        .unify();

    warp::path("api")
        .and(api)
        .recover(handle_rejection)
        .with(warp::log("foodgram_backend::api"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use warp::http::StatusCode;

    use super::*;
    use crate::{
        config::Config,
        jwt::generate_jwt_session,
        schema::{User, UserRole},
    };

    const SECRET: &str = "routes-secret";

    fn state() -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .expect("lazy pool");

        AppState {
            pool,
            config: Arc::new(Config {
                port: 8000,
                database_url: String::from("postgres://localhost/unreachable"),
                database_max_connections: 1,
                session_secret: Arc::new(SECRET.as_bytes().to_vec()),
            }),
        }
    }

    fn bearer(id: i32, role: UserRole) -> String {
        let user = User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            first_name: String::from("Test"),
            last_name: String::from("User"),
            role,
        };
        let token = generate_jwt_session(&user, SECRET.as_bytes(), Duration::hours(1))
            .expect("token is signed");

        format!("Bearer {token}")
    }

    fn detail(body: &[u8]) -> String {
        let value: Value = serde_json::from_slice(body).expect("json error body");
        value["detail"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn favorite_requires_authentication() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes/10/favorite")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn shopping_list_download_requires_authentication() {
        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn self_subscription_is_rejected() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/users/3/subscribe")
            .header("authorization", bearer(3, UserRole::User))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(detail(response.body()), "You cannot subscribe to yourself");
    }

    #[tokio::test]
    async fn self_unsubscription_is_rejected() {
        let response = warp::test::request()
            .method("DELETE")
            .path("/api/users/3/subscribe")
            .header("authorization", bearer(3, UserRole::User))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected_before_storage() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes")
            .header("authorization", bearer(1, UserRole::User))
            .json(&json!({
                "ingredients": [{"id": 5, "amount": 0}],
                "tags": [1],
                "image": "recipes/bread.png",
                "name": "Bread",
                "text": "Bake it.",
                "cooking_time": 40
            }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn recipe_without_ingredients_field_is_rejected() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes")
            .header("authorization", bearer(1, UserRole::User))
            .json(&json!({
                "tags": [1],
                "image": "recipes/bread.png",
                "name": "Bread",
                "text": "Bake it.",
                "cooking_time": 40
            }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tags_are_managed_by_admins_only() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/tags")
            .header("authorization", bearer(1, UserRole::User))
            .json(&json!({"name": "Lunch", "color": "#E26C2D", "slug": "lunch"}))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let response = warp::test::request()
            .path("/api/users/me")
            .header("authorization", "Token garbage")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_filter_is_bad_request() {
        let response = warp::test::request()
            .path("/api/recipes?is_favorited=maybe")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = warp::test::request()
            .path("/api/cocktails")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(detail(response.body()), "Not found");
    }

    #[tokio::test]
    async fn wrong_method_is_not_allowed() {
        let response = warp::test::request()
            .method("PUT")
            .path("/api/tags")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
