use warp::{http::StatusCode, reject::Rejection, reply::Response, Filter, Reply};

use super::{paging, query_form, render::render_subscriptions};
use crate::{
    actions::{fetch_subscriptions, get_user_by_id, subscribe, unsubscribe},
    error::ApiError,
    form::QueryForm,
    jwt::SessionData,
    middleware::with_session,
    pagination::{Page, PageLink, PageParams},
    permissions::ActionType,
    schema::{User, Uuid},
    state::{with_state, AppState},
};

/// `recipes_limit` caps the recipes embedded per author; junk values are ignored.
fn recipes_limit(form: &QueryForm) -> Option<i64> {
    form.get_str("recipes_limit")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|limit| *limit >= 0)
}

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(paging(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let add = warp::path!("users" / Uuid / "subscribe")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(query_form())
        .and(with_state(state.clone()))
        .and_then(add_subscription);

    let remove = warp::path!("users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(remove_subscription);

    list.or(add).unify().or(remove).unify()
}

async fn find_author(id: Uuid, state: &AppState) -> Result<User, ApiError> {
    get_user_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))
}

async fn list_subscriptions(
    session: SessionData,
    params: PageParams,
    link: PageLink,
    form: QueryForm,
    state: AppState,
) -> Result<Response, Rejection> {
    let (authors, total) = fetch_subscriptions(session.user_id, params, &state.pool).await?;
    let rendered = render_subscriptions(&authors, recipes_limit(&form), &session, &state).await?;
    let page = Page::from_rows(rendered, total, params, &link)?;

    Ok(warp::reply::json(&page).into_response())
}

async fn add_subscription(
    author_id: Uuid,
    session: SessionData,
    form: QueryForm,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageSubscriptions)?;
    let author = find_author(author_id, &state).await?;

    subscribe(session.user_id, author.id, &state.pool).await?;
    log::info!("User {} subscribed to {}", session.user_id, author.id);

    let mut rendered =
        render_subscriptions(std::slice::from_ref(&author), recipes_limit(&form), &session, &state)
            .await?;
    let body = rendered
        .pop()
        .ok_or_else(|| ApiError::Internal(String::from("author vanished while rendering")))?;

    Ok(warp::reply::with_status(warp::reply::json(&body), StatusCode::CREATED).into_response())
}

async fn remove_subscription(
    author_id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageSubscriptions)?;
    let author = find_author(author_id, &state).await?;

    unsubscribe(session.user_id, author.id, &state.pool).await?;
    log::info!("User {} unsubscribed from {}", session.user_id, author.id);

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipes_limit_ignores_junk() {
        assert_eq!(recipes_limit(&QueryForm::parse("recipes_limit=3")), Some(3));
        assert_eq!(recipes_limit(&QueryForm::parse("recipes_limit=abc")), None);
        assert_eq!(recipes_limit(&QueryForm::parse("recipes_limit=-1")), None);
        assert_eq!(recipes_limit(&QueryForm::parse("")), None);
    }
}
