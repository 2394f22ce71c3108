use warp::{http::Uri, reject::Rejection, reply::Response, Filter, Reply};

use crate::{
    actions::find_recipe_by_slug,
    error::ApiError,
    schema::Uuid,
    state::{with_state, AppState},
};

/// Frontend page a short link points at.
pub fn recipe_page(id: Uuid) -> String {
    format!("/recipes/{id}/")
}

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("s" / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(follow_short_link)
}

async fn follow_short_link(slug: String, state: AppState) -> Result<Response, Rejection> {
    let recipe = find_recipe_by_slug(&slug, &state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    let target: Uri = recipe_page(recipe.id)
        .parse()
        .map_err(|e| ApiError::Internal(format!("bad redirect target: {e}")))?;

    Ok(warp::redirect::found(target).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_links_point_at_the_recipe_page() {
        assert_eq!(recipe_page(12), "/recipes/12/");
        assert!(recipe_page(12).parse::<Uri>().is_ok());
    }
}
