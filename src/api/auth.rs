use serde::Deserialize;
use warp::{http::StatusCode, reject::Rejection, reply::Response, Filter, Reply};

use super::json_body;
use crate::{
    actions::{delete_token, login_user},
    error::{ApiError, FieldErrors},
    jwt::SessionData,
    middleware::with_session,
    state::{with_state, AppState},
};

#[derive(Deserialize, Debug, Default)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginPayload {
    fn validate(self) -> Result<(String, String), ApiError> {
        let mut errors = FieldErrors::new();
        let email = self.email.filter(|v| !v.trim().is_empty());
        let password = self.password.filter(|v| !v.is_empty());

        if email.is_none() {
            errors.add("email", "This field is required.");
        }
        if password.is_none() {
            errors.add("password", "This field is required.");
        }
        errors.into_result()?;

        Ok((
            email.unwrap_or_default().trim().to_string(),
            password.unwrap_or_default(),
        ))
    }
}

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let login_route = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(login);

    let logout_route = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(logout);

    login_route.or(logout_route).unify()
}

async fn login(state: AppState, payload: LoginPayload) -> Result<Response, Rejection> {
    let (email, password) = payload.validate()?;
    let token = login_user(&email, &password, &state.config, &state.pool).await?;

    Ok(warp::reply::json(&serde_json::json!({ "auth_token": token })).into_response())
}

async fn logout(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    delete_token(session.token_id, &state.pool).await?;
    log::debug!("User {} logged out", session.user_id);

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_both_fields() {
        match LoginPayload::default().validate() {
            Err(ApiError::Validation(errors)) => {
                assert!(errors.contains("email"));
                assert!(errors.contains("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn login_email_is_trimmed() {
        let payload = LoginPayload {
            email: Some(String::from("  cook@example.com ")),
            password: Some(String::from("secret-pass")),
        };
        assert_eq!(
            payload.validate().unwrap(),
            (String::from("cook@example.com"), String::from("secret-pass"))
        );
    }
}
