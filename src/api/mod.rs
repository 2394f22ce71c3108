//! HTTP surface under `/api`, the short-link redirect and the media files.

use std::convert::Infallible;

use serde::de::DeserializeOwned;
use warp::{filters::path::FullPath, reject::Rejection, Filter, Reply};

use crate::{
    form::QueryForm,
    pagination::{PageLink, PageParams},
    state::AppState,
};

pub mod auth;
pub mod ingredients;
pub mod links;
pub mod recipes;
pub mod rejection;
pub mod render;
pub mod subscriptions;
pub mod tags;
pub mod users;

const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path("api").and(
        auth::routes(state.clone())
            .or(subscriptions::routes(state.clone()))
            .or(users::routes(state.clone()))
            .or(tags::routes(state.clone()))
            .or(ingredients::routes(state.clone()))
            .or(recipes::routes(state.clone())),
    );
    let media = warp::path("media").and(warp::fs::dir(state.config.media_root.clone()));

    api.or(links::routes(state))
        .or(media)
        .recover(rejection::handle_rejection)
        .with(warp::log("foodgram::api"))
}

/// Decoded query string; repeated keys are kept.
pub(crate) fn query_form() -> impl Filter<Extract = (QueryForm,), Error = Rejection> + Clone {
    warp::query::<Vec<(String, String)>>().map(QueryForm::from_pairs)
}

/// Paging parameters together with the link builder for `next`/`previous`.
pub(crate) fn paging(
    state: AppState,
) -> impl Filter<Extract = (PageParams, PageLink, QueryForm), Error = Rejection> + Clone {
    warp::path::full()
        .and(query_form())
        .and_then(move |path: FullPath, form: QueryForm| {
            let base_url = state.config.base_url.clone();
            async move {
                let params = PageParams::from_form(&form)?;
                let link = PageLink::new(&base_url, path.as_str(), form.clone());
                Ok::<_, Rejection>((params, link, form))
            }
        })
        .untuple_one()
}

pub(crate) fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}
