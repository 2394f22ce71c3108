// Runs against DATABASE_URL; each case gets a fresh database with ./migrations applied.

use foodgram::{
    actions::*,
    error::ApiError,
    schema::{User, Uuid},
};
use sqlx::PgPool;

async fn user(name: &str, pool: &PgPool) -> User {
    register_user(
        &NewUser {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            first_name: String::from("Ann"),
            last_name: String::from("Cook"),
            password: String::from("not-a-real-hash"),
        },
        pool,
    )
    .await
    .unwrap()
}

async fn ingredient(name: &str, unit: &str, pool: &PgPool) -> Uuid {
    assert!(create_ingredient(name, unit, pool).await.unwrap());
    search_ingredients(Some(name), pool)
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.name == name && i.measurement_unit == unit)
        .unwrap()
        .id
}

async fn breakfast_tag(pool: &PgPool) -> Uuid {
    create_tag("Breakfast", "breakfast", Some("#E26C2D"), pool)
        .await
        .unwrap();
    list_tags(pool).await.unwrap()[0].id
}

async fn recipe(author: Uuid, name: &str, parts: Vec<(Uuid, i32)>, pool: &PgPool) -> Uuid {
    let tag = breakfast_tag(pool).await;
    let data = RecipeData {
        name: name.to_string(),
        text: String::from("Mix and bake."),
        cooking_time: 20,
        tags: vec![tag],
        ingredients: parts,
    };
    create_recipe(author, &data, "recipes/images/test.png", pool)
        .await
        .unwrap()
}

#[sqlx::test]
async fn favoriting_twice_is_rejected(pool: PgPool) {
    let cook = user("cook", &pool).await;
    let flour = ingredient("flour", "g", &pool).await;
    let pie = recipe(cook.id, "Pie", vec![(flour, 200)], &pool).await;

    add_to_list(RecipeList::Favorites, cook.id, pie, "Pie", &pool)
        .await
        .unwrap();
    let err = add_to_list(RecipeList::Favorites, cook.id, pie, "Pie", &pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");

    let favorites = list_membership(RecipeList::Favorites, cook.id, &[pie], &pool)
        .await
        .unwrap();
    assert_eq!(favorites.len(), 1);

    // the cart is a separate list
    add_to_list(RecipeList::ShoppingCart, cook.id, pie, "Pie", &pool)
        .await
        .unwrap();
}

#[sqlx::test]
async fn removing_an_absent_entry_is_rejected(pool: PgPool) {
    let cook = user("cook", &pool).await;
    let flour = ingredient("flour", "g", &pool).await;
    let pie = recipe(cook.id, "Pie", vec![(flour, 200)], &pool).await;

    let err = remove_from_list(RecipeList::ShoppingCart, cook.id, pie, "Pie", &pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");

    add_to_list(RecipeList::ShoppingCart, cook.id, pie, "Pie", &pool)
        .await
        .unwrap();
    remove_from_list(RecipeList::ShoppingCart, cook.id, pie, "Pie", &pool)
        .await
        .unwrap();
    let err = remove_from_list(RecipeList::ShoppingCart, cook.id, pie, "Pie", &pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");
}

#[sqlx::test]
async fn subscription_rules(pool: PgPool) {
    let reader = user("reader", &pool).await;
    let author = user("author", &pool).await;

    let err = subscribe(reader.id, reader.id, &pool).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");

    let err = unsubscribe(reader.id, author.id, &pool).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");

    let sub = subscribe(reader.id, author.id, &pool).await.unwrap();
    assert_eq!((sub.user_id, sub.author_id), (reader.id, author.id));

    let err = subscribe(reader.id, author.id, &pool).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");

    let followed = subscribed_authors(reader.id, &[author.id, reader.id], &pool)
        .await
        .unwrap();
    assert!(followed.contains(&author.id));
    assert!(!followed.contains(&reader.id));

    unsubscribe(reader.id, author.id, &pool).await.unwrap();
    let err = unsubscribe(reader.id, author.id, &pool).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");
}

#[sqlx::test]
async fn shopping_list_sums_shared_ingredients(pool: PgPool) {
    let cook = user("cook", &pool).await;
    let flour = ingredient("flour", "g", &pool).await;
    let eggs = ingredient("eggs", "pcs", &pool).await;
    let salt = ingredient("salt", "g", &pool).await;

    let pie = recipe(cook.id, "Pie", vec![(flour, 200), (eggs, 2)], &pool).await;
    let bread = recipe(cook.id, "Bread", vec![(flour, 100)], &pool).await;
    // not in the cart
    recipe(cook.id, "Soup", vec![(salt, 5)], &pool).await;

    assert!(fetch_shopping_list(cook.id, &pool).await.unwrap().is_empty());

    for (id, name) in [(pie, "Pie"), (bread, "Bread")] {
        add_to_list(RecipeList::ShoppingCart, cook.id, id, name, &pool)
            .await
            .unwrap();
    }

    let items = fetch_shopping_list(cook.id, &pool).await.unwrap();
    let lines: Vec<(&str, &str, i64)> = items
        .iter()
        .map(|i| (i.name.as_str(), i.measurement_unit.as_str(), i.total))
        .collect();
    assert_eq!(lines, vec![("eggs", "pcs", 2), ("flour", "g", 300)]);

    // another user's cart does not leak in
    let other = user("other", &pool).await;
    assert!(fetch_shopping_list(other.id, &pool).await.unwrap().is_empty());
}

#[sqlx::test]
async fn constraint_violations_become_bad_requests(pool: PgPool) {
    let cook = user("cook", &pool).await;
    let reader = user("reader", &pool).await;
    let flour = ingredient("flour", "g", &pool).await;
    let pie = recipe(cook.id, "Pie", vec![(flour, 200)], &pool).await;

    let favorite = "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2)";
    sqlx::query(favorite)
        .bind(reader.id)
        .bind(pie)
        .execute(&pool)
        .await
        .unwrap();
    let err = sqlx::query(favorite)
        .bind(reader.id)
        .bind(pie)
        .execute(&pool)
        .await
        .map_err(ApiError::from)
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");

    let err = sqlx::query("INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $1)")
        .bind(reader.id)
        .execute(&pool)
        .await
        .map_err(ApiError::from)
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");

    let err = sqlx::query("INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2)")
        .bind(reader.id)
        .bind(Uuid::MAX)
        .execute(&pool)
        .await
        .map_err(ApiError::from)
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)), "{err:?}");

    // an existing ingredient pair is skipped rather than failing
    assert!(!create_ingredient("flour", "g", &pool).await.unwrap());
}

#[sqlx::test]
async fn duplicate_registration_reports_each_field(pool: PgPool) {
    user("cook", &pool).await;

    let err = register_user(
        &NewUser {
            email: String::from("COOK@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ann"),
            last_name: String::from("Cook"),
            password: String::from("not-a-real-hash"),
        },
        &pool,
    )
    .await
    .unwrap_err();

    match err {
        ApiError::Validation(fields) => {
            let body = serde_json::to_value(&fields).unwrap();
            assert!(body.get("email").is_some(), "{body}");
            assert!(body.get("username").is_some(), "{body}");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}
