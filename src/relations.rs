//! User to recipe relations (favorites, shopping cart) and the follow graph

use std::collections::BTreeSet;

use chrono::Utc;
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::info;

use crate::database::{
    follow_key, get_json, relation_key, trailing_id, TABLE_FOLLOWS, TABLE_RECIPES,
    TABLE_RELATIONS, TABLE_USERS,
};
use crate::error::{AppError, Result};
use crate::model::{Recipe, RelationKind, User};

/// `start..end` bounds covering every key that begins with `prefix`.
///
/// `{` sorts right after `:` so it closes the range.
fn prefix_range(prefix: &str) -> (String, String) {
    (format!("{}:", prefix), format!("{}:{{", prefix))
}

fn user_prefix(kind: RelationKind, user_id: u64) -> String {
    format!("{}:{:020}", kind.prefix(), user_id)
}

/// Adds `recipe_id` to the user's favorites or cart and returns the recipe.
pub fn add_relation(db: &Database, kind: RelationKind, user_id: u64, recipe_id: u64) -> Result<Recipe> {
    let write_txn = db.begin_write()?;
    let recipe = {
        let recipes = write_txn.open_table(TABLE_RECIPES)?;
        let recipe: Recipe = get_json(&recipes, recipe_id)?
            .ok_or_else(|| AppError::not_found(format!("recipe {} not found", recipe_id)))?;

        let key = relation_key(kind.prefix(), user_id, recipe_id);
        let mut relations = write_txn.open_table(TABLE_RELATIONS)?;
        if relations.get(key.as_str())?.is_some() {
            return Err(AppError::validation(format!(
                "recipe is already in your {}",
                kind.label()
            )));
        }
        relations.insert(key.as_str(), Utc::now().timestamp_micros())?;
        recipe
    };
    write_txn.commit()?;

    info!(user_id, recipe_id, kind = kind.prefix(), "recipe relation added");
    Ok(recipe)
}

pub fn remove_relation(db: &Database, kind: RelationKind, user_id: u64, recipe_id: u64) -> Result<()> {
    let write_txn = db.begin_write()?;
    {
        let recipes = write_txn.open_table(TABLE_RECIPES)?;
        if recipes.get(recipe_id)?.is_none() {
            return Err(AppError::not_found(format!("recipe {} not found", recipe_id)));
        }

        let key = relation_key(kind.prefix(), user_id, recipe_id);
        let mut relations = write_txn.open_table(TABLE_RELATIONS)?;
        if relations.remove(key.as_str())?.is_none() {
            return Err(AppError::validation(format!(
                "recipe is not in your {}",
                kind.label()
            )));
        }
    }
    write_txn.commit()?;

    info!(user_id, recipe_id, kind = kind.prefix(), "recipe relation removed");
    Ok(())
}

/// Whether `user_id` holds `recipe_id` under `kind`, read inside `txn`.
pub fn has_relation(
    txn: &ReadTransaction,
    kind: RelationKind,
    user_id: u64,
    recipe_id: u64,
) -> Result<bool> {
    let table = txn.open_table(TABLE_RELATIONS)?;
    let key = relation_key(kind.prefix(), user_id, recipe_id);
    let found = table.get(key.as_str())?.is_some();
    Ok(found)
}

/// Ids of every recipe the user holds under `kind`.
pub fn recipe_ids(db: &Database, kind: RelationKind, user_id: u64) -> Result<BTreeSet<u64>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_RELATIONS)?;
    let (start, end) = prefix_range(&user_prefix(kind, user_id));

    let mut ids = BTreeSet::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let (key, _) = entry?;
        if let Some(id) = trailing_id(key.value()) {
            ids.insert(id);
        }
    }
    Ok(ids)
}

/// Drops every favorite and cart row pointing at `recipe_id`.
pub fn remove_recipe_relations(txn: &WriteTransaction, recipe_id: u64) -> Result<usize> {
    let mut table = txn.open_table(TABLE_RELATIONS)?;

    let mut stale = Vec::new();
    for entry in table.iter()? {
        let (key, _) = entry?;
        if trailing_id(key.value()) == Some(recipe_id) {
            stale.push(key.value().to_owned());
        }
    }
    for key in &stale {
        table.remove(key.as_str())?;
    }
    Ok(stale.len())
}

/// Subscribes `follower_id` to `author_id` and returns the author.
pub fn follow(db: &Database, follower_id: u64, author_id: u64) -> Result<User> {
    if follower_id == author_id {
        return Err(AppError::validation("you cannot subscribe to yourself"));
    }

    let write_txn = db.begin_write()?;
    let author = {
        let users = write_txn.open_table(TABLE_USERS)?;
        let author: User = get_json(&users, author_id)?
            .ok_or_else(|| AppError::not_found(format!("user {} not found", author_id)))?;

        let key = follow_key(follower_id, author_id);
        let mut follows = write_txn.open_table(TABLE_FOLLOWS)?;
        if follows.get(key.as_str())?.is_some() {
            return Err(AppError::validation("you are already subscribed to this user"));
        }
        follows.insert(key.as_str(), Utc::now().timestamp_micros())?;
        author
    };
    write_txn.commit()?;

    info!(follower_id, author_id, "subscription created");
    Ok(author)
}

pub fn unfollow(db: &Database, follower_id: u64, author_id: u64) -> Result<()> {
    let write_txn = db.begin_write()?;
    {
        let users = write_txn.open_table(TABLE_USERS)?;
        if users.get(author_id)?.is_none() {
            return Err(AppError::not_found(format!("user {} not found", author_id)));
        }

        let key = follow_key(follower_id, author_id);
        let mut follows = write_txn.open_table(TABLE_FOLLOWS)?;
        if follows.remove(key.as_str())?.is_none() {
            return Err(AppError::validation("you are not subscribed to this user"));
        }
    }
    write_txn.commit()?;

    info!(follower_id, author_id, "subscription removed");
    Ok(())
}

pub fn is_following(txn: &ReadTransaction, follower_id: u64, author_id: u64) -> Result<bool> {
    let table = txn.open_table(TABLE_FOLLOWS)?;
    let found = table.get(follow_key(follower_id, author_id).as_str())?.is_some();
    Ok(found)
}

/// Ids of the authors `follower_id` is subscribed to, ascending.
pub fn following_ids(db: &Database, follower_id: u64) -> Result<Vec<u64>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_FOLLOWS)?;
    let (start, end) = prefix_range(&format!("{:020}", follower_id));

    let mut ids = Vec::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let (key, _) = entry?;
        if let Some(id) = trailing_id(key.value()) {
            ids.push(id);
        }
    }
    Ok(ids)
}
