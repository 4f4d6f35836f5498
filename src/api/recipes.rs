use warp::{
    filters::BoxedFilter,
    http::{
        header::{HeaderValue, CONTENT_DISPOSITION},
        StatusCode,
    },
    reject,
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{
    actions::{
        composition::{validate_and_persist, RecipeInput},
        recipes::{
            default_page, delete_recipe, fetch_recipes, get_recipe_mut, get_recipe_view,
            RecipeFilter,
        },
        relations::{
            toggle_relation, Favorite, RelationKind, ShoppingCart, ToggleAction,
        },
        shopping_list::{
            build_shopping_list, render_shopping_list, shopping_list_filename, ShoppingListItem,
        },
    },
    authentication::permissions::ActionType,
    constants::MAX_BODY_SIZE,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    schema::{Id, RecipeSummary},
};

use super::state::{json_reply, no_content, toggled_reply, with_state, AppState};

async fn list_recipes(
    query: Vec<(String, String)>,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_query(&query).map_err(reject::custom)?;
    let page = default_page(&query).map_err(reject::custom)?;
    let viewer = session.map(|session| session.user_id);

    let recipes = fetch_recipes(&filter, page, viewer, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&recipes, StatusCode::OK))
}

async fn retrieve_recipe(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let viewer = session.map(|session| session.user_id);
    let recipe = get_recipe_view(id, viewer, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn create_recipe(
    session: SessionData,
    input: RecipeInput,
    state: AppState,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::CreateRecipes)
        .map_err(reject::custom)?;

    let id = validate_and_persist(input, session.user_id, None, &state.pool)
        .await
        .map_err(reject::custom)?;
    let recipe = get_recipe_view(id, Some(session.user_id), &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::CREATED))
}

async fn update_recipe(
    id: Id,
    session: SessionData,
    input: RecipeInput,
    state: AppState,
) -> Result<Response, Rejection> {
    let existing = get_recipe_mut(id, &session, &state.pool)
        .await
        .map_err(reject::custom)?;

    validate_and_persist(input, session.user_id, Some(&existing), &state.pool)
        .await
        .map_err(reject::custom)?;
    let recipe = get_recipe_view(id, Some(session.user_id), &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn remove_recipe(id: Id, session: SessionData, state: AppState) -> Result<Response, Rejection> {
    delete_recipe(id, &session, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(no_content())
}

async fn toggle_recipe_relation<K>(
    action: ToggleAction,
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection>
where
    K: RelationKind<Summary = RecipeSummary>,
{
    session
        .authenticate(ActionType::ManageOwnRelations)
        .map_err(reject::custom)?;

    let outcome = toggle_relation::<K>(action, session.user_id, id, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(toggled_reply(outcome.into_summary().as_ref()))
}

async fn download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let items = build_shopping_list(session.user_id, &state.pool)
        .await
        .map_err(reject::custom)?;

    log::info!(
        "Rendered shopping list of {} items for user {}",
        items.len(),
        session.user_id
    );

    Ok(shopping_list_reply(&items, &session.username))
}

/// The list as a `text/plain; charset=utf-8` attachment named after `username`.
pub fn shopping_list_reply(items: &[ShoppingListItem], username: &str) -> Response {
    let filename = shopping_list_filename(username);
    // UTF-8 is sent as raw header bytes, only control characters are refused.
    let disposition = HeaderValue::from_bytes(format!("attachment; filename={filename}").as_bytes())
        .unwrap_or_else(|_| {
            log::warn!("Username {username:?} cannot be sent as a filename header");
            HeaderValue::from_static("attachment; filename=shopping_list.txt")
        });

    warp::reply::with_header(render_shopping_list(items), CONTENT_DISPOSITION, disposition)
        .into_response()
}

fn relation_routes<K>(segment: &'static str, state: &AppState) -> BoxedFilter<(Response,)>
where
    K: RelationKind<Summary = RecipeSummary> + Send + Sync + 'static,
{
    let path = warp::path("recipes")
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());

    let create = path
        .clone()
        .and(warp::post())
        .and(with_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(|id: Id, session: SessionData, state: AppState| {
            toggle_recipe_relation::<K>(ToggleAction::Create, id, session, state)
        });

    let remove = path
        .and(warp::delete())
        .and(with_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(|id: Id, session: SessionData, state: AppState| {
            toggle_recipe_relation::<K>(ToggleAction::Remove, id, session, state)
        });

    create.or(remove).unify().boxed()
}

pub fn recipe_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_possible_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(state.secret()))
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let retrieve = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(retrieve_recipe);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.secret()))
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(update_recipe);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(remove_recipe);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(relation_routes::<Favorite>("favorite", state))
        .unify()
        .or(relation_routes::<ShoppingCart>("shopping_cart", state))
        .unify()
        .boxed()
}

#[cfg(test)]
mod tests {
    use warp::http::header::CONTENT_TYPE;

    use super::*;

    fn flour() -> Vec<ShoppingListItem> {
        vec![ShoppingListItem {
            name: String::from("flour"),
            measurement_unit: String::from("g"),
            total: 200,
        }]
    }

    #[tokio::test]
    async fn shopping_list_is_a_text_attachment() {
        let response = shopping_list_reply(&flour(), "alice");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=alice_shopping_list.txt"
        );

        let body = warp::hyper::body::to_bytes(response.into_body())
            .await
            .expect("body is read");
        assert_eq!(&body[..], "Список покупок:\n1. flour (g) — 200\n".as_bytes());
    }

    #[test]
    fn cyrillic_username_is_kept_in_filename() {
        let response = shopping_list_reply(&flour(), "Иван");

        assert_eq!(
            response.headers()[CONTENT_DISPOSITION].as_bytes(),
            "attachment; filename=Иван_shopping_list.txt".as_bytes()
        );
    }

    #[test]
    fn control_characters_fall_back_to_plain_filename() {
        let response = shopping_list_reply(&[], "bad\nname");

        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=shopping_list.txt"
        );
    }
}
