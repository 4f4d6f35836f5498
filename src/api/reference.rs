use std::collections::HashMap;

use warp::{filters::BoxedFilter, http::StatusCode, reject, reply::Response, Filter, Rejection};

use crate::{
    actions::{
        ingredients::{create_ingredient, fetch_ingredients, get_ingredient, IngredientInput},
        tags::{create_tag, get_tag, list_tags, TagInput},
    },
    authentication::permissions::ActionType,
    constants::MAX_BODY_SIZE,
    error::ServiceError,
    jwt::SessionData,
    middleware::with_session,
    schema::Id,
};

use super::state::{json_reply, with_state, AppState};

async fn all_tags(state: AppState) -> Result<Response, Rejection> {
    let tags = list_tags(&state.pool).await.map_err(reject::custom)?;
    Ok(json_reply(&tags, StatusCode::OK))
}

async fn retrieve_tag(id: Id, state: AppState) -> Result<Response, Rejection> {
    match get_tag(id, &state.pool).await.map_err(reject::custom)? {
        Some(tag) => Ok(json_reply(&tag, StatusCode::OK)),
        None => Err(reject::custom(ServiceError::not_found(
            "No tag exists with specified id",
        ))),
    }
}

async fn add_tag(session: SessionData, input: TagInput, state: AppState) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageTags)
        .map_err(reject::custom)?;

    let tag = create_tag(input, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&tag, StatusCode::CREATED))
}

async fn search_ingredients(
    query: HashMap<String, String>,
    state: AppState,
) -> Result<Response, Rejection> {
    let search = query.get("name").map(String::as_str);
    let ingredients = fetch_ingredients(search, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&ingredients, StatusCode::OK))
}

async fn retrieve_ingredient(id: Id, state: AppState) -> Result<Response, Rejection> {
    match get_ingredient(id, &state.pool).await.map_err(reject::custom)? {
        Some(ingredient) => Ok(json_reply(&ingredient, StatusCode::OK)),
        None => Err(reject::custom(ServiceError::not_found(
            "No ingredient exists with specified id",
        ))),
    }
}

async fn add_ingredient(
    session: SessionData,
    input: IngredientInput,
    state: AppState,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageIngredients)
        .map_err(reject::custom)?;

    let ingredient = create_ingredient(input, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&ingredient, StatusCode::CREATED))
}

pub fn reference_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let tags = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(all_tags);

    let tag = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(retrieve_tag);

    let new_tag = warp::path!("tags")
        .and(warp::post())
        .and(with_session(state.secret()))
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(add_tag);

    let ingredients = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(search_ingredients);

    let ingredient = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(retrieve_ingredient);

    let new_ingredient = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(state.secret()))
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(add_ingredient);

    tags.or(tag)
        .unify()
        .or(new_tag)
        .unify()
        .or(ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .or(new_ingredient)
        .unify()
        .boxed()
}
