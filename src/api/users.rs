use serde::Deserialize;
use warp::{http::StatusCode, reject::Rejection, reply::Response, Filter, Reply};

use super::{
    json_body, paging,
    render::{render_user, render_users, CreatedUserResponse},
};
use crate::{
    actions::{fetch_users, get_user_by_id, register_user, update_avatar, update_password, NewUser},
    constants::{
        AVATAR_DIR, EMAIL_LENGTH, PASSWORD_MIN_LENGTH, RESERVED_USERNAMES, USER_FIELD_LENGTH,
    },
    cryptography::{hash_password, verify_password},
    error::{ApiError, FieldErrors},
    form::QueryForm,
    jwt::SessionData,
    media::{decode_data_uri, remove_image, save_image},
    middleware::{with_possible_session, with_session},
    pagination::{Page, PageLink, PageParams},
    schema::Uuid,
    state::{with_state, AppState},
};

const REQUIRED: &str = "This field is required.";

#[derive(Deserialize, Debug, Default)]
pub struct RegisterPayload {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Registration fields after validation; the password is still plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

fn valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

/// Required, trimmed, length-checked text field.
fn text_field(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_length: usize,
) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    } else if value.chars().count() > max_length {
        errors.add(
            field,
            &format!("Ensure this field has no more than {max_length} characters."),
        );
    }
    value
}

fn check_password(errors: &mut FieldErrors, field: &str, password: &str) {
    if password.is_empty() {
        errors.add(field, REQUIRED);
    } else if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.add(
            field,
            &format!("This password is too short. It must contain at least {PASSWORD_MIN_LENGTH} characters."),
        );
    }
}

impl RegisterPayload {
    pub fn validate(self) -> Result<Registration, ApiError> {
        let mut errors = FieldErrors::new();

        let email = text_field(&mut errors, "email", self.email, EMAIL_LENGTH);
        if !errors.contains("email") && !valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        let username = text_field(&mut errors, "username", self.username, USER_FIELD_LENGTH);
        if !errors.contains("username") {
            if !valid_username(&username) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
                errors.add("username", &format!("Username \"{username}\" is not allowed."));
            }
        }

        let first_name = text_field(&mut errors, "first_name", self.first_name, USER_FIELD_LENGTH);
        let last_name = text_field(&mut errors, "last_name", self.last_name, USER_FIELD_LENGTH);

        let password = self.password.unwrap_or_default();
        check_password(&mut errors, "password", &password);

        errors.into_result()?;
        Ok(Registration {
            email,
            username,
            first_name,
            last_name,
            password,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct SetPasswordPayload {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

impl SetPasswordPayload {
    fn validate(self) -> Result<(String, String), ApiError> {
        let mut errors = FieldErrors::new();
        let current = self.current_password.unwrap_or_default();
        if current.is_empty() {
            errors.add("current_password", REQUIRED);
        }
        let new = self.new_password.unwrap_or_default();
        check_password(&mut errors, "new_password", &new);

        errors.into_result()?;
        Ok((current, new))
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct AvatarPayload {
    pub avatar: Option<String>,
}

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("users")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(paging(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_users);

    let register = warp::path!("users")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(register);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(me);

    let detail = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(user_detail);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(set_password);

    let put_avatar = warp::path!("users" / "me" / "avatar")
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(put_avatar);

    let delete_avatar = warp::path!("users" / "me" / "avatar")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(delete_avatar);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(detail)
        .unify()
        .or(set_password)
        .unify()
        .or(put_avatar)
        .unify()
        .or(delete_avatar)
        .unify()
}

async fn list_users(
    session: Option<SessionData>,
    params: PageParams,
    link: PageLink,
    _form: QueryForm,
    state: AppState,
) -> Result<Response, Rejection> {
    let (users, total) = fetch_users(params, &state.pool).await?;
    let rendered = render_users(&users, session.as_ref(), &state).await?;
    let page = Page::from_rows(rendered, total, params, &link)?;

    Ok(warp::reply::json(&page).into_response())
}

async fn register(state: AppState, payload: RegisterPayload) -> Result<Response, Rejection> {
    let registration = payload.validate()?;
    let password = hash_password(&registration.password).map_err(ApiError::from)?;

    let user = register_user(
        &NewUser {
            email: registration.email,
            username: registration.username,
            first_name: registration.first_name,
            last_name: registration.last_name,
            password,
        },
        &state.pool,
    )
    .await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&CreatedUserResponse::from(user)),
        StatusCode::CREATED,
    )
    .into_response())
}

async fn me(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    let user = get_user_by_id(&state.pool, session.user_id)
        .await?
        .ok_or(ApiError::InvalidToken)?;
    let rendered = render_user(&user, Some(&session), &state).await?;

    Ok(warp::reply::json(&rendered).into_response())
}

async fn user_detail(
    id: Uuid,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let user = get_user_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;
    let rendered = render_user(&user, session.as_ref(), &state).await?;

    Ok(warp::reply::json(&rendered).into_response())
}

async fn set_password(
    session: SessionData,
    state: AppState,
    payload: SetPasswordPayload,
) -> Result<Response, Rejection> {
    let (current, new) = payload.validate()?;
    let user = get_user_by_id(&state.pool, session.user_id)
        .await?
        .ok_or(ApiError::InvalidToken)?;

    if !verify_password(&current, &user.password).map_err(ApiError::from)? {
        return Err(ApiError::Validation(FieldErrors::single(
            "current_password",
            "Invalid password.",
        ))
        .into());
    }

    let hash = hash_password(&new).map_err(ApiError::from)?;
    update_password(user.id, &hash, &state.pool).await?;
    log::info!("User {} changed their password", user.id);

    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn put_avatar(
    session: SessionData,
    state: AppState,
    payload: AvatarPayload,
) -> Result<Response, Rejection> {
    let encoded = payload
        .avatar
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(FieldErrors::single("avatar", REQUIRED)))?;
    let image = decode_data_uri("avatar", &encoded)?;

    let path = save_image(&state.config.media_root, AVATAR_DIR, &image).await?;
    let previous = match update_avatar(session.user_id, Some(&path), &state.pool).await {
        Ok(previous) => previous,
        Err(e) => {
            remove_image(&state.config.media_root, &path).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous {
        remove_image(&state.config.media_root, &previous).await;
    }

    Ok(warp::reply::json(&serde_json::json!({ "avatar": state.config.media_url(&path) }))
        .into_response())
}

async fn delete_avatar(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    let user = get_user_by_id(&state.pool, session.user_id)
        .await?
        .ok_or(ApiError::InvalidToken)?;
    if user.avatar.is_none() {
        return Err(ApiError::not_found("No avatar to delete.").into());
    }

    if let Some(previous) = update_avatar(user.id, None, &state.pool).await? {
        remove_image(&state.config.media_root, &previous).await;
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
