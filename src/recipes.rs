//! Recipe storage, filtering and presentation

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::{debug, info};

use crate::aggregator::{IngredientLineSource, RecipeIngredientLine};
use crate::database::{
    all_json, get_json, next_id, TABLE_INGREDIENTS, TABLE_RECIPES, TABLE_TAGS, TABLE_TAG_SLUGS,
    TABLE_USERS,
};
use crate::error::{AppError, Result};
use crate::model::{
    Ingredient, IngredientAmount, Recipe, RecipeIngredientView, RecipeListParams, RecipeRequest,
    RecipeView, RelationKind, Tag, User, UserView,
};
use crate::relations::{self, remove_recipe_relations};

pub const MAX_RECIPE_NAME_LEN: usize = 256;

/// Checks a create/update payload against the stored tags and ingredients.
fn validate(txn: &WriteTransaction, request: &RecipeRequest) -> Result<()> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name may not be blank"));
    }
    if name.chars().count() > MAX_RECIPE_NAME_LEN {
        return Err(AppError::validation(format!(
            "name must be at most {} characters",
            MAX_RECIPE_NAME_LEN
        )));
    }
    if request.text.trim().is_empty() {
        return Err(AppError::validation("text may not be blank"));
    }
    if request.cooking_time < 1 {
        return Err(AppError::validation("cooking_time must be at least 1 minute"));
    }

    if request.tags.is_empty() {
        return Err(AppError::validation("tags may not be empty"));
    }
    let unique_tags: HashSet<u64> = request.tags.iter().copied().collect();
    if unique_tags.len() != request.tags.len() {
        return Err(AppError::validation("tags must be unique"));
    }
    let tags = txn.open_table(TABLE_TAGS)?;
    for id in &request.tags {
        if tags.get(*id)?.is_none() {
            return Err(AppError::validation(format!("tag {} does not exist", id)));
        }
    }

    if request.ingredients.is_empty() {
        return Err(AppError::validation("ingredients may not be empty"));
    }
    let unique_ingredients: HashSet<u64> = request.ingredients.iter().map(|i| i.id).collect();
    if unique_ingredients.len() != request.ingredients.len() {
        return Err(AppError::validation("ingredients must be unique"));
    }
    let ingredients = txn.open_table(TABLE_INGREDIENTS)?;
    for item in &request.ingredients {
        if item.amount < 1 {
            return Err(AppError::validation("ingredient amount must be at least 1"));
        }
        if ingredients.get(item.id)?.is_none() {
            return Err(AppError::validation(format!(
                "ingredient {} does not exist",
                item.id
            )));
        }
    }

    Ok(())
}

fn apply(recipe: &mut Recipe, request: RecipeRequest) {
    recipe.name = request.name.trim().to_owned();
    recipe.text = request.text;
    recipe.image = request.image;
    recipe.cooking_time = request.cooking_time;
    recipe.tag_ids = request.tags;
    recipe.ingredients = request
        .ingredients
        .into_iter()
        .map(|item| IngredientAmount {
            ingredient_id: item.id,
            amount: item.amount,
        })
        .collect();
}

pub fn create_recipe(db: &Database, author_id: u64, request: RecipeRequest) -> Result<Recipe> {
    let write_txn = db.begin_write()?;
    validate(&write_txn, &request)?;

    let mut recipe = Recipe {
        id: next_id(&write_txn, "recipes")?,
        author_id,
        name: String::new(),
        text: String::new(),
        image: None,
        cooking_time: 1,
        tag_ids: Vec::new(),
        ingredients: Vec::new(),
        created_at: Utc::now(),
    };
    apply(&mut recipe, request);

    {
        let mut table = write_txn.open_table(TABLE_RECIPES)?;
        table.insert(recipe.id, serde_json::to_string(&recipe)?.as_str())?;
    }
    write_txn.commit()?;

    info!(recipe_id = recipe.id, author_id, name = %recipe.name, "recipe created");
    Ok(recipe)
}

/// Replaces a recipe's content. Only its author may do this.
pub fn update_recipe(db: &Database, id: u64, actor_id: u64, request: RecipeRequest) -> Result<Recipe> {
    let write_txn = db.begin_write()?;
    let mut recipe = {
        let table = write_txn.open_table(TABLE_RECIPES)?;
        get_json::<Recipe, _>(&table, id)?
            .ok_or_else(|| AppError::not_found(format!("recipe {} not found", id)))?
    };
    if recipe.author_id != actor_id {
        return Err(AppError::Forbidden(
            "only the author may change this recipe".to_string(),
        ));
    }

    validate(&write_txn, &request)?;
    apply(&mut recipe, request);
    {
        let mut table = write_txn.open_table(TABLE_RECIPES)?;
        table.insert(recipe.id, serde_json::to_string(&recipe)?.as_str())?;
    }
    write_txn.commit()?;

    info!(recipe_id = id, "recipe updated");
    Ok(recipe)
}

/// Deletes a recipe together with every favorite and cart row pointing at it.
pub fn delete_recipe(db: &Database, id: u64, actor_id: u64) -> Result<()> {
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(TABLE_RECIPES)?;
        let recipe: Recipe = get_json(&table, id)?
            .ok_or_else(|| AppError::not_found(format!("recipe {} not found", id)))?;
        if recipe.author_id != actor_id {
            return Err(AppError::Forbidden(
                "only the author may delete this recipe".to_string(),
            ));
        }
        table.remove(id)?;
    }
    let dropped = remove_recipe_relations(&write_txn, id)?;
    write_txn.commit()?;

    info!(recipe_id = id, dropped_relations = dropped, "recipe deleted");
    Ok(())
}

pub fn get_recipe(db: &Database, id: u64) -> Result<Option<Recipe>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_RECIPES)?;
    get_json(&table, id)
}

/// Every recipe of `author_id`, newest first.
pub fn recipes_by_author(db: &Database, author_id: u64) -> Result<Vec<Recipe>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_RECIPES)?;
    let mut recipes: Vec<Recipe> = all_json(&table)?;
    recipes.retain(|recipe| recipe.author_id == author_id);
    recipes.reverse();
    Ok(recipes)
}

/// Filters recipes newest first and returns the total match count with one page.
///
/// `is_favorited` / `is_in_shopping_cart` are evaluated for `viewer`; an
/// anonymous viewer has no favorites and an empty cart.
pub fn list_recipes(
    db: &Database,
    params: &RecipeListParams,
    viewer: Option<u64>,
    offset: usize,
    limit: usize,
) -> Result<(usize, Vec<Recipe>)> {
    let related = |kind: RelationKind| -> Result<BTreeSet<u64>> {
        match viewer {
            Some(user_id) => relations::recipe_ids(db, kind, user_id),
            None => Ok(BTreeSet::new()),
        }
    };
    let favorites = match params.is_favorited {
        Some(_) => Some(related(RelationKind::Favorite)?),
        None => None,
    };
    let cart = match params.is_in_shopping_cart {
        Some(_) => Some(related(RelationKind::Cart)?),
        None => None,
    };

    let read_txn = db.begin_read()?;
    let slugs = params.tag_slugs();
    let tag_ids: HashSet<u64> = {
        let table = read_txn.open_table(TABLE_TAG_SLUGS)?;
        let mut ids = HashSet::new();
        for slug in &slugs {
            if let Some(guard) = table.get(slug.as_str())? {
                ids.insert(guard.value());
            }
        }
        ids
    };

    let table = read_txn.open_table(TABLE_RECIPES)?;
    let mut matches = Vec::new();
    for entry in table.iter()?.rev() {
        let (_, value) = entry?;
        let recipe: Recipe = serde_json::from_str(value.value())?;

        if params.author.is_some_and(|author| recipe.author_id != author) {
            continue;
        }
        if !slugs.is_empty() && !recipe.tag_ids.iter().any(|id| tag_ids.contains(id)) {
            continue;
        }
        if let (Some(wanted), Some(ids)) = (params.is_favorited, &favorites) {
            if ids.contains(&recipe.id) != wanted {
                continue;
            }
        }
        if let (Some(wanted), Some(ids)) = (params.is_in_shopping_cart, &cart) {
            if ids.contains(&recipe.id) != wanted {
                continue;
            }
        }
        matches.push(recipe);
    }

    let count = matches.len();
    debug!(count, offset, limit, "recipes filtered");
    Ok((count, matches.into_iter().skip(offset).take(limit).collect()))
}

/// Builds the public view of `user` for `viewer` inside an open read transaction.
pub fn user_view_in(txn: &ReadTransaction, user: User, viewer: Option<u64>) -> Result<UserView> {
    let is_subscribed = match viewer {
        Some(viewer_id) if viewer_id != user.id => relations::is_following(txn, viewer_id, user.id)?,
        _ => false,
    };
    Ok(UserView::new(user, is_subscribed))
}

fn recipe_view_in(txn: &ReadTransaction, recipe: Recipe, viewer: Option<u64>) -> Result<RecipeView> {
    let tags_table = txn.open_table(TABLE_TAGS)?;
    let mut tags = Vec::with_capacity(recipe.tag_ids.len());
    for id in &recipe.tag_ids {
        if let Some(tag) = get_json::<Tag, _>(&tags_table, *id)? {
            tags.push(tag);
        }
    }

    let ingredients_table = txn.open_table(TABLE_INGREDIENTS)?;
    let mut ingredients = Vec::with_capacity(recipe.ingredients.len());
    for item in &recipe.ingredients {
        if let Some(ingredient) = get_json::<Ingredient, _>(&ingredients_table, item.ingredient_id)? {
            ingredients.push(RecipeIngredientView {
                id: ingredient.id,
                name: ingredient.name,
                measurement_unit: ingredient.measurement_unit,
                amount: item.amount,
            });
        }
    }

    let users = txn.open_table(TABLE_USERS)?;
    let author: User = get_json(&users, recipe.author_id)?
        .ok_or_else(|| AppError::not_found(format!("author {} not found", recipe.author_id)))?;
    let author = user_view_in(txn, author, viewer)?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(user_id) => (
            relations::has_relation(txn, RelationKind::Favorite, user_id, recipe.id)?,
            relations::has_relation(txn, RelationKind::Cart, user_id, recipe.id)?,
        ),
        None => (false, false),
    };

    Ok(RecipeView {
        id: recipe.id,
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub fn recipe_view(db: &Database, recipe: Recipe, viewer: Option<u64>) -> Result<RecipeView> {
    let read_txn = db.begin_read()?;
    recipe_view_in(&read_txn, recipe, viewer)
}

pub fn recipe_views(db: &Database, recipes: Vec<Recipe>, viewer: Option<u64>) -> Result<Vec<RecipeView>> {
    let read_txn = db.begin_read()?;
    recipes
        .into_iter()
        .map(|recipe| recipe_view_in(&read_txn, recipe, viewer))
        .collect()
}

pub fn user_view(db: &Database, user: User, viewer: Option<u64>) -> Result<UserView> {
    let read_txn = db.begin_read()?;
    user_view_in(&read_txn, user, viewer)
}

/// The stored recipes are the source of shopping list rows.
impl IngredientLineSource for Database {
    fn lines_for(&self, recipe_ids: &BTreeSet<u64>) -> Result<Vec<RecipeIngredientLine>> {
        let read_txn = self.begin_read()?;
        let recipes = read_txn.open_table(TABLE_RECIPES)?;
        let ingredients = read_txn.open_table(TABLE_INGREDIENTS)?;

        let mut lines = Vec::new();
        for id in recipe_ids {
            let Some(recipe) = get_json::<Recipe, _>(&recipes, *id)? else {
                continue;
            };
            for item in recipe.ingredients {
                if let Some(ingredient) =
                    get_json::<Ingredient, _>(&ingredients, item.ingredient_id)?
                {
                    lines.push(RecipeIngredientLine::new(
                        ingredient.name,
                        ingredient.measurement_unit,
                        item.amount,
                    ));
                }
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ShoppingList;
    use crate::catalog::{create_ingredient, create_tag, create_user};
    use crate::database::init_db;
    use crate::model::{
        CreateIngredientRequest, CreateTagRequest, CreateUserRequest, IngredientAmountRequest,
    };
    use tempfile::NamedTempFile;

    struct Fixture {
        db: Database,
        _temp_db: NamedTempFile,
        author: User,
        other: User,
        breakfast: Tag,
        dinner: Tag,
        flour: Ingredient,
        sugar: Ingredient,
    }

    fn fixture() -> Fixture {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();
        let user = |name: &str| {
            create_user(
                &db,
                CreateUserRequest {
                    email: format!("{}@example.com", name),
                    username: name.into(),
                    first_name: String::new(),
                    last_name: String::new(),
                },
            )
            .unwrap()
        };
        let author = user("author");
        let other = user("other");
        let tag = |name: &str| {
            create_tag(
                &db,
                CreateTagRequest {
                    name: name.into(),
                    slug: name.to_lowercase(),
                },
            )
            .unwrap()
        };
        let breakfast = tag("Breakfast");
        let dinner = tag("Dinner");
        let ingredient = |name: &str| {
            create_ingredient(
                &db,
                CreateIngredientRequest {
                    name: name.into(),
                    measurement_unit: "g".into(),
                },
            )
            .unwrap()
        };
        let flour = ingredient("Flour");
        let sugar = ingredient("Sugar");

        Fixture {
            db,
            _temp_db: temp_db,
            author,
            other,
            breakfast,
            dinner,
            flour,
            sugar,
        }
    }

    fn request(name: &str, tags: Vec<u64>, ingredients: Vec<(u64, u32)>) -> RecipeRequest {
        RecipeRequest {
            name: name.into(),
            text: "Mix everything.".into(),
            image: None,
            cooking_time: 15,
            tags,
            ingredients: ingredients
                .into_iter()
                .map(|(id, amount)| IngredientAmountRequest { id, amount })
                .collect(),
        }
    }

    #[test]
    fn create_validates_payload() {
        let f = fixture();
        let ok = request("Cake", vec![f.breakfast.id], vec![(f.flour.id, 200)]);

        let mut bad = ok.clone();
        bad.tags.clear();
        assert!(create_recipe(&f.db, f.author.id, bad).is_err());

        let mut bad = ok.clone();
        bad.tags = vec![f.breakfast.id, f.breakfast.id];
        assert!(create_recipe(&f.db, f.author.id, bad).is_err());

        let mut bad = ok.clone();
        bad.ingredients[0].amount = 0;
        assert!(create_recipe(&f.db, f.author.id, bad).is_err());

        let mut bad = ok.clone();
        bad.ingredients.push(IngredientAmountRequest {
            id: f.flour.id,
            amount: 5,
        });
        assert!(create_recipe(&f.db, f.author.id, bad).is_err());

        let mut bad = ok.clone();
        bad.ingredients[0].id = 999;
        assert!(create_recipe(&f.db, f.author.id, bad).is_err());

        let mut bad = ok.clone();
        bad.cooking_time = 0;
        assert!(create_recipe(&f.db, f.author.id, bad).is_err());

        let mut bad = ok.clone();
        bad.name = "x".repeat(MAX_RECIPE_NAME_LEN + 1);
        assert!(create_recipe(&f.db, f.author.id, bad).is_err());

        let recipe = create_recipe(&f.db, f.author.id, ok).unwrap();
        assert_eq!(recipe.id, 1);
        assert_eq!(get_recipe(&f.db, 1).unwrap(), Some(recipe));
    }

    #[test]
    fn only_author_may_update_or_delete() {
        let f = fixture();
        let recipe = create_recipe(
            &f.db,
            f.author.id,
            request("Cake", vec![f.breakfast.id], vec![(f.flour.id, 200)]),
        )
        .unwrap();

        let change = request("Pie", vec![f.dinner.id], vec![(f.sugar.id, 50)]);
        assert!(matches!(
            update_recipe(&f.db, recipe.id, f.other.id, change.clone()),
            Err(AppError::Forbidden(_))
        ));
        let updated = update_recipe(&f.db, recipe.id, f.author.id, change).unwrap();
        assert_eq!(updated.name, "Pie");
        assert_eq!(updated.tag_ids, [f.dinner.id]);

        assert!(matches!(
            delete_recipe(&f.db, recipe.id, f.other.id),
            Err(AppError::Forbidden(_))
        ));
        delete_recipe(&f.db, recipe.id, f.author.id).unwrap();
        assert!(get_recipe(&f.db, recipe.id).unwrap().is_none());
        assert!(matches!(
            delete_recipe(&f.db, recipe.id, f.author.id),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let f = fixture();
        let cake = create_recipe(
            &f.db,
            f.author.id,
            request("Cake", vec![f.breakfast.id], vec![(f.flour.id, 200)]),
        )
        .unwrap();
        let stew = create_recipe(
            &f.db,
            f.other.id,
            request("Stew", vec![f.dinner.id], vec![(f.sugar.id, 10)]),
        )
        .unwrap();
        relations::add_relation(&f.db, RelationKind::Favorite, f.other.id, cake.id).unwrap();

        let ids = |params: RecipeListParams, viewer: Option<u64>| -> Vec<u64> {
            list_recipes(&f.db, &params, viewer, 0, 10)
                .unwrap()
                .1
                .into_iter()
                .map(|r| r.id)
                .collect()
        };

        assert_eq!(ids(RecipeListParams::default(), None), [stew.id, cake.id]);
        assert_eq!(
            ids(
                RecipeListParams {
                    author: Some(f.author.id),
                    ..Default::default()
                },
                None
            ),
            [cake.id]
        );
        assert_eq!(
            ids(
                RecipeListParams {
                    tags: vec!["dinner,unknown".into()],
                    ..Default::default()
                },
                None
            ),
            [stew.id]
        );
        assert_eq!(
            ids(
                RecipeListParams {
                    is_favorited: Some(true),
                    ..Default::default()
                },
                Some(f.other.id)
            ),
            [cake.id]
        );
        assert_eq!(
            ids(
                RecipeListParams {
                    is_favorited: Some(false),
                    ..Default::default()
                },
                Some(f.other.id)
            ),
            [stew.id]
        );
        assert!(ids(
            RecipeListParams {
                is_favorited: Some(true),
                ..Default::default()
            },
            None
        )
        .is_empty());

        let (count, page) =
            list_recipes(&f.db, &RecipeListParams::default(), None, 1, 1).unwrap();
        assert_eq!(count, 2);
        assert_eq!(page[0].id, cake.id);
    }

    #[test]
    fn view_reflects_viewer_relations() {
        let f = fixture();
        let cake = create_recipe(
            &f.db,
            f.author.id,
            request("Cake", vec![f.breakfast.id], vec![(f.flour.id, 200)]),
        )
        .unwrap();
        relations::add_relation(&f.db, RelationKind::Cart, f.other.id, cake.id).unwrap();
        relations::follow(&f.db, f.other.id, f.author.id).unwrap();

        let view = recipe_view(&f.db, cake.clone(), Some(f.other.id)).unwrap();
        assert!(view.is_in_shopping_cart);
        assert!(!view.is_favorited);
        assert!(view.author.is_subscribed);
        assert_eq!(view.tags, [f.breakfast.clone()]);
        assert_eq!(view.ingredients[0].name, "Flour");
        assert_eq!(view.ingredients[0].amount, 200);

        let anonymous = recipe_view(&f.db, cake, None).unwrap();
        assert!(!anonymous.is_in_shopping_cart);
        assert!(!anonymous.author.is_subscribed);
    }

    #[test]
    fn shopping_list_from_stored_recipes() {
        let f = fixture();
        let a = create_recipe(
            &f.db,
            f.author.id,
            request(
                "A",
                vec![f.breakfast.id],
                vec![(f.flour.id, 200), (f.sugar.id, 100)],
            ),
        )
        .unwrap();
        let b = create_recipe(
            &f.db,
            f.author.id,
            request("B", vec![f.breakfast.id], vec![(f.flour.id, 300)]),
        )
        .unwrap();

        let ids: BTreeSet<u64> = [a.id, b.id, 404].into_iter().collect();
        let list = ShoppingList::for_recipes(&f.db, &ids).unwrap();
        assert_eq!(list.to_string(), "Flour (g) — 500\nSugar (g) — 100");
    }
}
