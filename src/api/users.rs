use warp::{filters::BoxedFilter, http::StatusCode, reject, reply::Response, Filter, Rejection};

use crate::{
    actions::{
        relations::{toggle_relation, Subscription, ToggleAction},
        users::{
            default_page, fetch_subscriptions, fetch_users, get_user_profile, parse_recipes_limit,
            subscription_view,
        },
    },
    authentication::permissions::ActionType,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    schema::Id,
};

use super::state::{json_reply, toggled_reply, with_state, AppState};

async fn list_users(
    query: Vec<(String, String)>,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let page = default_page(&query).map_err(reject::custom)?;
    let viewer = session.map(|session| session.user_id);

    let users = fetch_users(page, viewer, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&users, StatusCode::OK))
}

async fn retrieve_user(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let viewer = session.map(|session| session.user_id);
    let user = get_user_profile(id, viewer, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&user, StatusCode::OK))
}

async fn current_user(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    let user = get_user_profile(session.user_id, Some(session.user_id), &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&user, StatusCode::OK))
}

async fn list_subscriptions(
    query: Vec<(String, String)>,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let page = default_page(&query).map_err(reject::custom)?;
    let recipes_limit = parse_recipes_limit(&query).map_err(reject::custom)?;

    let subscriptions = fetch_subscriptions(session.user_id, page, recipes_limit, &state.pool)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&subscriptions, StatusCode::OK))
}

async fn toggle_subscription(
    action: ToggleAction,
    author: Id,
    query: Vec<(String, String)>,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageOwnRelations)
        .map_err(reject::custom)?;
    let recipes_limit = parse_recipes_limit(&query).map_err(reject::custom)?;

    let outcome = toggle_relation::<Subscription>(action, session.user_id, author, &state.pool)
        .await
        .map_err(reject::custom)?;

    let view = match outcome.into_summary() {
        Some(author) => Some(
            subscription_view(author, recipes_limit, &state.pool)
                .await
                .map_err(reject::custom)?,
        ),
        None => None,
    };

    Ok(toggled_reply(view.as_ref()))
}

pub fn user_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_possible_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(list_users);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(current_user);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let retrieve = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(retrieve_user);

    let subscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(
            |id: Id, query: Vec<(String, String)>, session: SessionData, state: AppState| {
                toggle_subscription(ToggleAction::Create, id, query, session, state)
            },
        );

    let unsubscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_session(state.secret()))
        .and(with_state(state.clone()))
        .and_then(
            |id: Id, query: Vec<(String, String)>, session: SessionData, state: AppState| {
                toggle_subscription(ToggleAction::Remove, id, query, session, state)
            },
        );

    list.or(me)
        .unify()
        .or(subscriptions)
        .unify()
        .or(retrieve)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}
