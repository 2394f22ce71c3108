use warp::{reject::Rejection, Filter};

use super::jwt::{parse_token_header, verify_jwt_session, SessionData};
use crate::{actions::tokens::find_session, error::ApiError, state::AppState};

async fn authenticate(state: &AppState, header: &str) -> Result<SessionData, ApiError> {
    let token = parse_token_header(header)?;
    let claims = verify_jwt_session(token, &state.config.secret_key)?;

    match find_session(claims.jti, &state.pool).await? {
        Some(session) if session.user_id == claims.user_id => Ok(session),
        _ => Err(ApiError::InvalidToken),
    }
}

/// Requires a valid `Authorization: Token ..` header.
pub fn with_session(
    state: AppState,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let state = state.clone();
        async move {
            let header = header.ok_or_else(|| warp::reject::custom(ApiError::Unauthorized))?;
            authenticate(&state, &header)
                .await
                .map_err(warp::reject::custom)
        }
    })
}

/// Anonymous requests pass as `None`; a header that is present must still be valid.
pub fn with_possible_session(
    state: AppState,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let state = state.clone();
        async move {
            match header {
                Some(header) => authenticate(&state, &header)
                    .await
                    .map(Some)
                    .map_err(warp::reject::custom),
                None => Ok(None),
            }
        }
    })
}
