use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    error::ApiError,
    schema::{ShoppingListItem, Uuid},
};

/// Per-user recipe membership sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }

    fn already_added(&self, recipe_name: &str) -> String {
        match self {
            RecipeList::Favorites => format!("Recipe \"{recipe_name}\" is already in favorites."),
            RecipeList::ShoppingCart => {
                format!("Recipe \"{recipe_name}\" is already in the shopping cart.")
            }
        }
    }

    fn not_present(&self, recipe_name: &str) -> String {
        match self {
            RecipeList::Favorites => format!("Recipe \"{recipe_name}\" is not in favorites."),
            RecipeList::ShoppingCart => {
                format!("Recipe \"{recipe_name}\" is not in the shopping cart.")
            }
        }
    }
}

/// Adds a recipe to the list; a second add is a 400.
pub async fn add_to_list(
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
    recipe_name: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::BadRequest(list.already_added(recipe_name)));
    }
    Ok(())
}

/// Removes a recipe from the list; removing an absent recipe is a 400.
pub async fn remove_from_list(
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
    recipe_name: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::BadRequest(list.not_present(recipe_name)));
    }
    Ok(())
}

/// Which of `recipe_ids` are in the user's list.
pub async fn list_membership(
    list: RecipeList,
    user_id: Uuid,
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, ApiError> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Ingredient totals across every recipe in the user's cart.
pub async fn fetch_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, ApiError> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount)::BIGINT AS total
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Plain-text shopping list; an empty cart renders as an empty string.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut s = String::from("Shopping list:\n\n");
    items.iter().for_each(|item| {
        s += &format!(
            "{} ({}) - {}\n",
            item.name, item.measurement_unit, item.total
        );
    });

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit: &str, total: i64) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            total,
        }
    }

    #[test]
    fn empty_cart_renders_nothing() {
        assert_eq!(render_shopping_list(&[]), "");
    }

    #[test]
    fn one_line_per_ingredient_and_unit() {
        let text = render_shopping_list(&[
            item("flour", "g", 450),
            item("milk", "ml", 200),
            item("milk", "cup", 1),
        ]);

        assert_eq!(
            text,
            "Shopping list:\n\nflour (g) - 450\nmilk (ml) - 200\nmilk (cup) - 1\n"
        );
    }

    #[test]
    fn messages_name_the_recipe() {
        assert!(RecipeList::Favorites
            .already_added("Pancakes")
            .contains("\"Pancakes\""));
        assert!(RecipeList::ShoppingCart
            .not_present("Soup")
            .contains("shopping cart"));
    }
}
