//! Response bodies and the batched lookups that fill them.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
    actions::{
        count_author_recipes, list_author_recipes, list_membership, list_recipe_parts,
        list_recipe_tags, list_users_by_id, subscribed_authors, RecipeList,
    },
    config::Config,
    error::ApiError,
    jwt::SessionData,
    schema::{Recipe, Tag, User, Uuid},
    state::AppState,
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

impl UserResponse {
    pub fn new(user: &User, is_subscribed: bool, config: &Config) -> Self {
        Self {
            id: user.id,
            email: user.email.to_owned(),
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed,
            avatar: user.avatar.as_deref().map(|path| config.media_url(path)),
        }
    }
}

/// Returned by registration; no subscription state or avatar yet.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreatedUserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeResponse {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<IngredientAmount>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeShortResponse {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeShortResponse {
    pub fn new(recipe: &Recipe, config: &Config) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: config.media_url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub author: UserResponse,
    pub recipes: Vec<RecipeShortResponse>,
    pub recipes_count: i64,
}

async fn subscription_set(
    viewer: Option<&SessionData>,
    author_ids: &[Uuid],
    state: &AppState,
) -> Result<HashSet<Uuid>, ApiError> {
    match viewer {
        Some(session) => subscribed_authors(session.user_id, author_ids, &state.pool).await,
        None => Ok(HashSet::new()),
    }
}

pub async fn render_users(
    users: &[User],
    viewer: Option<&SessionData>,
    state: &AppState,
) -> Result<Vec<UserResponse>, ApiError> {
    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let subscribed = subscription_set(viewer, &ids, state).await?;

    Ok(users
        .iter()
        .map(|user| UserResponse::new(user, subscribed.contains(&user.id), &state.config))
        .collect())
}

pub async fn render_user(
    user: &User,
    viewer: Option<&SessionData>,
    state: &AppState,
) -> Result<UserResponse, ApiError> {
    let mut rendered = render_users(std::slice::from_ref(user), viewer, state).await?;
    rendered
        .pop()
        .ok_or_else(|| ApiError::Internal(String::from("user vanished while rendering")))
}

/// Full recipe bodies with author, tags, ingredients and the viewer's flags.
pub async fn render_recipes(
    recipes: Vec<Recipe>,
    viewer: Option<&SessionData>,
    state: &AppState,
) -> Result<Vec<RecipeResponse>, ApiError> {
    let pool = &state.pool;
    let recipe_ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<Uuid> = recipes.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: HashMap<Uuid, UserResponse> = {
        let users = list_users_by_id(pool, &author_ids).await?;
        render_users(&users, viewer, state)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect()
    };

    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    list_recipe_tags(&recipe_ids, pool)
        .await?
        .into_iter()
        .for_each(|tag| {
            tags.entry(tag.recipe_id).or_default().push(Tag {
                id: tag.id,
                name: tag.name,
                color: None,
                slug: tag.slug,
            })
        });

    let mut parts: HashMap<Uuid, Vec<IngredientAmount>> = HashMap::new();
    list_recipe_parts(&recipe_ids, pool)
        .await?
        .into_iter()
        .for_each(|part| {
            parts.entry(part.recipe_id).or_default().push(IngredientAmount {
                id: part.ingredient_id,
                name: part.name,
                measurement_unit: part.measurement_unit,
                amount: part.amount,
            })
        });

    let (favorites, cart) = match viewer {
        Some(session) => (
            list_membership(RecipeList::Favorites, session.user_id, &recipe_ids, pool).await?,
            list_membership(RecipeList::ShoppingCart, session.user_id, &recipe_ids, pool).await?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    recipes
        .into_iter()
        .map(|recipe| -> Result<RecipeResponse, ApiError> {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                ApiError::Internal(format!("missing author for recipe {}", recipe.id))
            })?;

            Ok(RecipeResponse {
                id: recipe.id,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                author,
                ingredients: parts.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorites.contains(&recipe.id),
                is_in_shopping_cart: cart.contains(&recipe.id),
                image: state.config.media_url(&recipe.image),
                name: recipe.name,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
            })
        })
        .collect()
}

pub async fn render_recipe(
    recipe: Recipe,
    viewer: Option<&SessionData>,
    state: &AppState,
) -> Result<RecipeResponse, ApiError> {
    let mut rendered = render_recipes(vec![recipe], viewer, state).await?;
    rendered
        .pop()
        .ok_or_else(|| ApiError::Internal(String::from("recipe vanished while rendering")))
}

/// Followed authors with their newest recipes, capped by `recipes_limit`.
pub async fn render_subscriptions(
    authors: &[User],
    recipes_limit: Option<i64>,
    viewer: &SessionData,
    state: &AppState,
) -> Result<Vec<SubscriptionResponse>, ApiError> {
    let author_ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();
    let users = render_users(authors, Some(viewer), state).await?;
    let mut recipes = list_author_recipes(&author_ids, recipes_limit, &state.pool).await?;
    let counts = count_author_recipes(&author_ids, &state.pool).await?;

    Ok(users
        .into_iter()
        .map(|author| SubscriptionResponse {
            recipes: recipes
                .remove(&author.id)
                .unwrap_or_default()
                .iter()
                .map(|recipe| RecipeShortResponse::new(recipe, &state.config))
                .collect(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
            author,
        })
        .collect())
}
