use std::collections::HashSet;

use serde::Deserialize;
use warp::{http::StatusCode, reject::Rejection, reply::Response, Filter, Reply};

use super::{
    json_body, paging,
    render::{render_recipe, render_recipes, RecipeShortResponse},
};
use crate::{
    actions::{
        add_to_list, create_recipe, delete_recipe, existing_ingredient_ids, existing_tag_ids,
        fetch_recipes, fetch_shopping_list, get_recipe, remove_from_list, render_shopping_list,
        update_recipe, RecipeData, RecipeFilter, RecipeList,
    },
    constants::{
        RECIPE_IMAGE_DIR, RECIPE_NAME_LENGTH, RECIPE_TEXT_LENGTH, SHOPPING_LIST_FILENAME,
    },
    error::{ApiError, FieldErrors},
    form::QueryForm,
    jwt::SessionData,
    media::{decode_data_uri, remove_image, save_image, DecodedImage},
    middleware::{with_possible_session, with_session},
    pagination::{Page, PageLink, PageParams},
    permissions::ActionType,
    schema::{Recipe, Uuid},
    state::{with_state, AppState},
};

const REQUIRED: &str = "This field is required.";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientPayload {
    pub id: Uuid,
    pub amount: i32,
}

/// Body of recipe create and update requests.
#[derive(Deserialize, Debug, Default)]
pub struct RecipePayload {
    pub ingredients: Option<Vec<IngredientPayload>>,
    pub tags: Option<Vec<Uuid>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

fn has_duplicates<I>(ids: I) -> bool
where
    I: IntoIterator<Item = Uuid>,
{
    let mut seen = HashSet::new();
    ids.into_iter().any(|id| !seen.insert(id))
}

impl RecipePayload {
    /// Shape checks that need no database. `require_image` is set on create.
    pub fn validate(
        self,
        require_image: bool,
    ) -> Result<(RecipeData, Option<DecodedImage>), ApiError> {
        let mut errors = FieldErrors::new();

        let ingredients = self.ingredients.unwrap_or_default();
        if ingredients.is_empty() {
            errors.add("ingredients", "Add at least one ingredient.");
        } else {
            if has_duplicates(ingredients.iter().map(|i| i.id)) {
                errors.add("ingredients", "Ingredients must not repeat.");
            }
            if ingredients.iter().any(|i| i.amount < 1) {
                errors.add("ingredients", "Amount must be at least 1.");
            }
        }

        let tags = self.tags.unwrap_or_default();
        if tags.is_empty() {
            errors.add("tags", "Add at least one tag.");
        } else if has_duplicates(tags.iter().copied()) {
            errors.add("tags", "Tags must not repeat.");
        }

        let image = match self.image.filter(|v| !v.is_empty()) {
            Some(encoded) => match decode_data_uri("image", &encoded) {
                Ok(image) => Some(image),
                Err(ApiError::Validation(e)) => {
                    errors.extend(e);
                    None
                }
                Err(e) => return Err(e),
            },
            None => {
                if require_image {
                    errors.add("image", REQUIRED);
                }
                None
            }
        };

        let name = self.name.map(|v| v.trim().to_string()).unwrap_or_default();
        if name.is_empty() {
            errors.add("name", REQUIRED);
        } else if name.chars().count() > RECIPE_NAME_LENGTH {
            errors.add(
                "name",
                &format!("Ensure this field has no more than {RECIPE_NAME_LENGTH} characters."),
            );
        }

        let text = self.text.map(|v| v.trim().to_string()).unwrap_or_default();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        } else if text.chars().count() > RECIPE_TEXT_LENGTH {
            errors.add(
                "text",
                &format!("Ensure this field has no more than {RECIPE_TEXT_LENGTH} characters."),
            );
        }

        let cooking_time = match self.cooking_time {
            Some(minutes) if minutes >= 1 => minutes,
            Some(_) => {
                errors.add("cooking_time", "Ensure this value is greater than or equal to 1.");
                0
            }
            None => {
                errors.add("cooking_time", REQUIRED);
                0
            }
        };

        errors.into_result()?;
        Ok((
            RecipeData {
                name,
                text,
                cooking_time,
                tags,
                ingredients: ingredients.into_iter().map(|i| (i.id, i.amount)).collect(),
            },
            image,
        ))
    }
}

/// Every referenced tag and ingredient must exist.
async fn check_references(data: &RecipeData, state: &AppState) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();

    let ingredient_ids: Vec<Uuid> = data.ingredients.iter().map(|(id, _)| *id).collect();
    let known: HashSet<Uuid> = existing_ingredient_ids(&ingredient_ids, &state.pool)
        .await?
        .into_iter()
        .collect();
    for id in ingredient_ids.iter().filter(|id| !known.contains(id)) {
        errors.add("ingredients", &format!("Ingredient {id} does not exist."));
    }

    let known: HashSet<Uuid> = existing_tag_ids(&data.tags, &state.pool)
        .await?
        .into_iter()
        .collect();
    for id in data.tags.iter().filter(|id| !known.contains(id)) {
        errors.add("tags", &format!("Tag {id} does not exist."));
    }

    errors.into_result()
}

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(paging(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(post_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let detail = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipe_detail);

    let update = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(patch_recipe);

    let remove = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(remove_recipe);

    let link = warp::path!("recipes" / Uuid / "get-link")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(short_link);

    let favorite = list_toggle(
        warp::path!("recipes" / Uuid / "favorite"),
        RecipeList::Favorites,
        state.clone(),
    );
    let cart = list_toggle(
        warp::path!("recipes" / Uuid / "shopping_cart"),
        RecipeList::ShoppingCart,
        state,
    );

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(remove)
        .unify()
        .or(link)
        .unify()
        .or(favorite)
        .unify()
        .or(cart)
        .unify()
}

/// POST adds the recipe to `list`, DELETE takes it out again.
fn list_toggle<F>(
    path: F,
    list: RecipeList,
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone
where
    F: Filter<Extract = (Uuid,), Error = Rejection> + Clone + Send + Sync + 'static,
{
    let with_list = warp::any().map(move || list);

    let add = path
        .clone()
        .and(warp::post())
        .and(with_list.clone())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(add_to_recipe_list);

    let remove = path
        .and(warp::delete())
        .and(with_list)
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(remove_from_recipe_list);

    add.or(remove).unify()
}

async fn find_recipe(id: Uuid, state: &AppState) -> Result<Recipe, ApiError> {
    get_recipe(id, &state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))
}

async fn list_recipes(
    session: Option<SessionData>,
    params: PageParams,
    link: PageLink,
    form: QueryForm,
    state: AppState,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_form(&form)?;
    let viewer = session.as_ref().map(|s| s.user_id);

    let (recipes, total) = fetch_recipes(&filter, viewer, params, &state.pool).await?;
    let rendered = render_recipes(recipes, session.as_ref(), &state).await?;
    let page = Page::from_rows(rendered, total, params, &link)?;

    Ok(warp::reply::json(&page).into_response())
}

async fn post_recipe(
    session: SessionData,
    state: AppState,
    payload: RecipePayload,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    let (data, image) = payload.validate(true)?;
    let image =
        image.ok_or_else(|| ApiError::Validation(FieldErrors::single("image", REQUIRED)))?;
    check_references(&data, &state).await?;

    let path = save_image(&state.config.media_root, RECIPE_IMAGE_DIR, &image).await?;
    let id = match create_recipe(session.user_id, &data, &path, &state.pool).await {
        Ok(id) => id,
        Err(e) => {
            remove_image(&state.config.media_root, &path).await;
            return Err(e.into());
        }
    };

    let recipe = find_recipe(id, &state).await?;
    let rendered = render_recipe(recipe, Some(&session), &state).await?;

    Ok(warp::reply::with_status(warp::reply::json(&rendered), StatusCode::CREATED).into_response())
}

async fn recipe_detail(
    id: Uuid,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    let rendered = render_recipe(recipe, session.as_ref(), &state).await?;

    Ok(warp::reply::json(&rendered).into_response())
}

async fn patch_recipe(
    id: Uuid,
    session: SessionData,
    state: AppState,
    payload: RecipePayload,
) -> Result<Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    session.ensure_author(recipe.author_id)?;

    let (data, image) = payload.validate(false)?;
    check_references(&data, &state).await?;

    let new_path = match image {
        Some(image) => Some(save_image(&state.config.media_root, RECIPE_IMAGE_DIR, &image).await?),
        None => None,
    };
    let replaced = match update_recipe(id, &data, new_path.as_deref(), &state.pool).await {
        Ok(replaced) => replaced,
        Err(e) => {
            if let Some(path) = &new_path {
                remove_image(&state.config.media_root, path).await;
            }
            return Err(e.into());
        }
    };
    if let Some(old) = replaced {
        remove_image(&state.config.media_root, &old).await;
    }
    log::info!("Recipe {id} updated by user {}", session.user_id);

    let recipe = find_recipe(id, &state).await?;
    let rendered = render_recipe(recipe, Some(&session), &state).await?;

    Ok(warp::reply::json(&rendered).into_response())
}

async fn remove_recipe(
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    session.ensure_author(recipe.author_id)?;

    if let Some(image) = delete_recipe(id, &state.pool).await? {
        remove_image(&state.config.media_root, &image).await;
    }
    log::info!("Recipe {id} deleted by user {}", session.user_id);

    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn short_link(id: Uuid, state: AppState) -> Result<Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    let link = format!("{}/s/{}", state.config.base_url, recipe.slug);

    Ok(warp::reply::json(&serde_json::json!({ "short-link": link })).into_response())
}

async fn add_to_recipe_list(
    id: Uuid,
    list: RecipeList,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    let recipe = find_recipe(id, &state).await?;

    add_to_list(list, session.user_id, recipe.id, &recipe.name, &state.pool).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&RecipeShortResponse::new(&recipe, &state.config)),
        StatusCode::CREATED,
    )
    .into_response())
}

async fn remove_from_recipe_list(
    id: Uuid,
    list: RecipeList,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    let recipe = find_recipe(id, &state).await?;

    remove_from_list(list, session.user_id, recipe.id, &recipe.name, &state.pool).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let items = fetch_shopping_list(session.user_id, &state.pool).await?;
    let body = render_shopping_list(&items);

    Ok(warp::reply::with_header(
        body,
        "Content-Disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn payload() -> RecipePayload {
        RecipePayload {
            ingredients: Some(vec![
                IngredientPayload { id: 1, amount: 200 },
                IngredientPayload { id: 2, amount: 1 },
            ]),
            tags: Some(vec![1, 3]),
            image: Some(String::from(PIXEL)),
            name: Some(String::from(" Pancakes ")),
            text: Some(String::from("Mix and fry.")),
            cooking_time: Some(20),
        }
    }

    fn errors_of(payload: RecipePayload, require_image: bool) -> FieldErrors {
        match payload.validate(require_image) {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_payload_becomes_recipe_data() {
        let (data, image) = payload().validate(true).unwrap();

        assert_eq!(data.name, "Pancakes");
        assert_eq!(data.tags, vec![1, 3]);
        assert_eq!(data.ingredients, vec![(1, 200), (2, 1)]);
        assert_eq!(image.map(|i| i.extension), Some(String::from("png")));
    }

    #[test]
    fn empty_collections_are_rejected() {
        let mut bad = payload();
        bad.ingredients = Some(vec![]);
        bad.tags = None;

        let errors = errors_of(bad, true);
        assert!(errors.contains("ingredients"));
        assert!(errors.contains("tags"));
    }

    #[test]
    fn duplicates_and_small_amounts_are_rejected() {
        let mut bad = payload();
        bad.ingredients = Some(vec![
            IngredientPayload { id: 1, amount: 2 },
            IngredientPayload { id: 1, amount: 0 },
        ]);
        bad.tags = Some(vec![2, 2]);

        let errors = errors_of(bad, true);
        assert!(errors.contains("ingredients"));
        assert!(errors.contains("tags"));
        assert!(!errors.contains("name"));
    }

    #[test]
    fn image_is_required_only_on_create() {
        let mut without_image = payload();
        without_image.image = None;
        assert!(errors_of(without_image, true).contains("image"));

        let mut without_image = payload();
        without_image.image = None;
        let (_, image) = without_image.validate(false).unwrap();
        assert!(image.is_none());
    }

    #[test]
    fn scalar_fields_are_checked() {
        let mut bad = payload();
        bad.name = Some("x".repeat(RECIPE_NAME_LENGTH + 1));
        bad.text = Some(String::from("   "));
        bad.cooking_time = Some(0);
        bad.image = Some(String::from("not a data uri"));

        let errors = errors_of(bad, false);
        for field in ["name", "text", "cooking_time", "image"] {
            assert!(errors.contains(field), "{field} should be reported");
        }
    }

    #[test]
    fn long_text_is_rejected() {
        let mut bad = payload();
        bad.text = Some("a".repeat(RECIPE_TEXT_LENGTH + 1));
        assert!(errors_of(bad, true).contains("text"));

        let mut fits = payload();
        fits.text = Some("a".repeat(RECIPE_TEXT_LENGTH));
        assert!(fits.validate(true).is_ok());
    }

    #[test]
    fn duplicate_detection() {
        assert!(has_duplicates([1, 2, 1]));
        assert!(!has_duplicates([1, 2, 3]));
    }
}
