use warp::{reject::Rejection, reply::Response, Filter, Reply};

use crate::{
    actions::{get_tag, list_tags},
    error::ApiError,
    schema::Uuid,
    state::{with_state, AppState},
};

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(all_tags);

    let detail = warp::path!("tags" / Uuid)
        .and(warp::get())
        .and(with_state(state))
        .and_then(tag_detail);

    list.or(detail).unify()
}

async fn all_tags(state: AppState) -> Result<Response, Rejection> {
    let tags = list_tags(&state.pool).await?;
    Ok(warp::reply::json(&tags).into_response())
}

async fn tag_detail(id: Uuid, state: AppState) -> Result<Response, Rejection> {
    let tag = get_tag(id, &state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    Ok(warp::reply::json(&tag).into_response())
}
