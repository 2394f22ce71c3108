use std::collections::HashMap;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::cryptography::generate_slug,
    error::ApiError,
    form::QueryForm,
    pagination::PageParams,
    schema::{Recipe, RecipeRow, Uuid},
};

const SLUG_ATTEMPTS: usize = 10;

/// Query-string filters of the recipe listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_form(form: &QueryForm) -> Result<Self, ApiError> {
        Ok(Self {
            author: form.get_number("author")?,
            tags: form.get_list("tags"),
            is_favorited: form.get_flag("is_favorited"),
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart"),
        })
    }

    fn needs_viewer(&self) -> bool {
        self.is_favorited || self.is_in_shopping_cart
    }
}

/// Validated recipe write payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeData {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Uuid>,
    /// (ingredient id, amount)
    pub ingredients: Vec<(Uuid, i32)>,
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    params: PageParams,
    pool: &Pool<Postgres>,
) -> Result<(Vec<Recipe>, i64), ApiError> {
    if viewer.is_none() && filter.needs_viewer() {
        return Ok((vec![], 0));
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(user_id) = viewer {
        if filter.is_favorited {
            query
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(params.limit)
        .push(" OFFSET ")
        .push_bind(params.offset());

    let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(pool).await?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok((rows.into_iter().map(Recipe::from).collect(), total_count))
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn find_recipe_by_slug(
    slug: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

async fn unique_slug(tr: &mut Transaction<'_, Postgres>) -> Result<String, ApiError> {
    for _ in 0..SLUG_ATTEMPTS {
        let slug = generate_slug();
        let (taken,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM recipes WHERE slug = $1)")
                .bind(&slug)
                .fetch_one(&mut **tr)
                .await?;

        if !taken {
            return Ok(slug);
        }
    }

    Err(ApiError::Internal(String::from(
        "Could not generate a unique recipe slug",
    )))
}

/// Replaces the tag and ingredient sets of a recipe.
async fn replace_recipe_parts(
    recipe_id: Uuid,
    data: &RecipeData,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await?;

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::int4[])")
        .bind(recipe_id)
        .bind(&data.tags)
        .execute(&mut **tr)
        .await?;

    let (ingredient_ids, amounts): (Vec<Uuid>, Vec<i32>) = data.ingredients.iter().copied().unzip();

    sqlx::query(
        "
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, parts.ingredient_id, parts.amount
        FROM UNNEST($2::int4[], $3::int4[]) AS parts (ingredient_id, amount)
    ",
    )
    .bind(recipe_id)
    .bind(ingredient_ids)
    .bind(amounts)
    .execute(&mut **tr)
    .await?;

    Ok(())
}

pub async fn create_recipe(
    author_id: Uuid,
    data: &RecipeData,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, ApiError> {
    let mut tr = pool.begin().await?;
    let slug = unique_slug(&mut tr).await?;

    let (id,): (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time, slug)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&data.name)
    .bind(&data.text)
    .bind(image)
    .bind(data.cooking_time)
    .bind(&slug)
    .fetch_one(&mut *tr)
    .await?;

    replace_recipe_parts(id, data, &mut tr).await?;
    tr.commit().await?;

    log::info!("Recipe {id} created by user {author_id}");
    Ok(id)
}

/// Updates a recipe; `image` of `None` keeps the current one. Returns the replaced image path.
pub async fn update_recipe(
    id: Uuid,
    data: &RecipeData,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Option<String>, ApiError> {
    let mut tr = pool.begin().await?;

    let (previous_image,): (String,) =
        sqlx::query_as("SELECT image FROM recipes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tr)
            .await?;

    sqlx::query(
        "
        UPDATE recipes SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&data.name)
    .bind(&data.text)
    .bind(data.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tr)
    .await?;

    replace_recipe_parts(id, data, &mut tr).await?;
    tr.commit().await?;

    Ok(image.map(|_| previous_image))
}

/// Deletes a recipe and returns its image path.
pub async fn delete_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<String>, ApiError> {
    let row: Option<(String,)> = sqlx::query_as("DELETE FROM recipes WHERE id = $1 RETURNING image")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.0))
}

/// Newest recipes of each author, at most `limit` per author when given.
pub async fn list_author_recipes(
    author_ids: &[Uuid],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<Recipe>>, ApiError> {
    let rows: Vec<Recipe> = sqlx::query_as(
        "
        SELECT id, author_id, name, text, image, cooking_time, pub_date, slug
        FROM (
            SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS rank_in_author
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR rank_in_author <= $2
        ORDER BY author_id, rank_in_author
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut hashmap: HashMap<Uuid, Vec<Recipe>> = HashMap::new();
    rows.into_iter()
        .for_each(|recipe| hashmap.entry(recipe.author_id).or_default().push(recipe));

    Ok(hashmap)
}

pub async fn count_author_recipes(
    author_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, i64>, ApiError> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
