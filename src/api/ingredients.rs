use warp::{reject::Rejection, reply::Response, Filter, Reply};

use super::query_form;
use crate::{
    actions::{get_ingredient, search_ingredients},
    error::ApiError,
    form::QueryForm,
    schema::Uuid,
    state::{with_state, AppState},
};

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(query_form())
        .and(with_state(state.clone()))
        .and_then(find_ingredients);

    let detail = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_state(state))
        .and_then(ingredient_detail);

    list.or(detail).unify()
}

/// `?name=` narrows the list to names starting with the given prefix.
async fn find_ingredients(form: QueryForm, state: AppState) -> Result<Response, Rejection> {
    let name = form.get_str("name").map(str::trim);
    let ingredients = search_ingredients(name, &state.pool).await?;

    Ok(warp::reply::json(&ingredients).into_response())
}

async fn ingredient_detail(id: Uuid, state: AppState) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(id, &state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    Ok(warp::reply::json(&ingredient).into_response())
}
