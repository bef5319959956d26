//! Users, tags and ingredients
//!
//! Reference data that recipes point at. Uniqueness (email, username, tag
//! slug) is enforced through lookup tables written in the same transaction
//! as the record itself.

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::info;

use crate::database::{
    all_json, get_json, next_id, TABLE_INGREDIENTS, TABLE_TAGS, TABLE_TAG_SLUGS, TABLE_USERS,
    TABLE_USER_LOOKUP,
};
use crate::error::{AppError, Result};
use crate::model::{CreateIngredientRequest, CreateTagRequest, CreateUserRequest, Ingredient, Tag, User};

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_TAG_NAME_LEN: usize = 24;
pub const MAX_SLUG_LEN: usize = 50;
pub const MAX_INGREDIENT_NAME_LEN: usize = 128;
pub const MAX_UNIT_LEN: usize = 64;

fn require_text(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} may not be blank", field)));
    }
    if value.chars().count() > max {
        return Err(AppError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_owned())
}

fn email_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

fn username_key(username: &str) -> String {
    format!("username:{}", username)
}

pub fn create_user(db: &Database, request: CreateUserRequest) -> Result<User> {
    let email = require_text("email", &request.email, MAX_EMAIL_LEN)?;
    if !email.contains('@') {
        return Err(AppError::validation("enter a valid email address"));
    }
    let username = require_text("username", &request.username, MAX_USERNAME_LEN)?;
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
    {
        return Err(AppError::validation(
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }

    let write_txn = db.begin_write()?;
    let user = {
        let mut lookup = write_txn.open_table(TABLE_USER_LOOKUP)?;
        if lookup.get(email_key(&email).as_str())?.is_some() {
            return Err(AppError::validation("a user with that email already exists"));
        }
        if lookup.get(username_key(&username).as_str())?.is_some() {
            return Err(AppError::validation("a user with that username already exists"));
        }

        let user = User {
            id: next_id(&write_txn, "users")?,
            email,
            username,
            first_name: request.first_name.trim().to_owned(),
            last_name: request.last_name.trim().to_owned(),
            avatar: None,
            created_at: Utc::now(),
        };

        lookup.insert(email_key(&user.email).as_str(), user.id)?;
        lookup.insert(username_key(&user.username).as_str(), user.id)?;

        let mut users = write_txn.open_table(TABLE_USERS)?;
        users.insert(user.id, serde_json::to_string(&user)?.as_str())?;
        user
    };
    write_txn.commit()?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

pub fn get_user(db: &Database, id: u64) -> Result<Option<User>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_USERS)?;
    get_json(&table, id)
}

/// Replaces the user's avatar, or removes it when `avatar` is `None`.
///
/// A blank payload is rejected; removing an absent avatar is not an error.
pub fn set_avatar(db: &Database, user_id: u64, avatar: Option<String>) -> Result<User> {
    let avatar = match avatar {
        Some(raw) if raw.trim().is_empty() => {
            return Err(AppError::validation("avatar may not be blank"));
        }
        other => other,
    };

    let write_txn = db.begin_write()?;
    let user = {
        let mut users = write_txn.open_table(TABLE_USERS)?;
        let mut user: User = get_json(&users, user_id)?
            .ok_or_else(|| AppError::not_found(format!("user {} not found", user_id)))?;
        user.avatar = avatar;
        users.insert(user.id, serde_json::to_string(&user)?.as_str())?;
        user
    };
    write_txn.commit()?;

    info!(user_id, has_avatar = user.avatar.is_some(), "avatar updated");
    Ok(user)
}

/// Returns the total number of users and one page of them in id order.
pub fn list_users(db: &Database, offset: usize, limit: usize) -> Result<(usize, Vec<User>)> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_USERS)?;
    let users: Vec<User> = all_json(&table)?;
    let count = users.len();
    Ok((count, users.into_iter().skip(offset).take(limit).collect()))
}

pub fn create_tag(db: &Database, request: CreateTagRequest) -> Result<Tag> {
    let name = require_text("name", &request.name, MAX_TAG_NAME_LEN)?;
    let slug = require_text("slug", &request.slug, MAX_SLUG_LEN)?;
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::validation(
            "slug may contain only latin letters, digits, hyphens and underscores",
        ));
    }

    let write_txn = db.begin_write()?;
    let tag = {
        let mut slugs = write_txn.open_table(TABLE_TAG_SLUGS)?;
        if slugs.get(slug.as_str())?.is_some() {
            return Err(AppError::validation(format!("tag with slug '{}' already exists", slug)));
        }

        let tag = Tag {
            id: next_id(&write_txn, "tags")?,
            name,
            slug,
        };
        slugs.insert(tag.slug.as_str(), tag.id)?;

        let mut tags = write_txn.open_table(TABLE_TAGS)?;
        tags.insert(tag.id, serde_json::to_string(&tag)?.as_str())?;
        tag
    };
    write_txn.commit()?;

    info!(tag_id = tag.id, slug = %tag.slug, "tag created");
    Ok(tag)
}

pub fn get_tag(db: &Database, id: u64) -> Result<Option<Tag>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_TAGS)?;
    get_json(&table, id)
}

/// All tags ordered by name.
pub fn list_tags(db: &Database) -> Result<Vec<Tag>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_TAGS)?;
    let mut tags: Vec<Tag> = all_json(&table)?;
    tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Ok(tags)
}

pub fn create_ingredient(db: &Database, request: CreateIngredientRequest) -> Result<Ingredient> {
    let name = require_text("name", &request.name, MAX_INGREDIENT_NAME_LEN)?;
    let measurement_unit = require_text("measurement_unit", &request.measurement_unit, MAX_UNIT_LEN)?;

    let write_txn = db.begin_write()?;
    let ingredient = {
        let ingredient = Ingredient {
            id: next_id(&write_txn, "ingredients")?,
            name,
            measurement_unit,
        };
        let mut table = write_txn.open_table(TABLE_INGREDIENTS)?;
        table.insert(ingredient.id, serde_json::to_string(&ingredient)?.as_str())?;
        ingredient
    };
    write_txn.commit()?;

    info!(ingredient_id = ingredient.id, name = %ingredient.name, "ingredient created");
    Ok(ingredient)
}

pub fn get_ingredient(db: &Database, id: u64) -> Result<Option<Ingredient>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_INGREDIENTS)?;
    get_json(&table, id)
}

/// Case-insensitive name search.
///
/// Names starting with `query` come first, then names merely containing it;
/// both groups are alphabetical. A blank query returns everything.
pub fn search_ingredients(db: &Database, query: Option<&str>) -> Result<Vec<Ingredient>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_INGREDIENTS)?;
    let ingredients: Vec<Ingredient> = all_json(&table)?;

    let needle = query.map(str::trim).unwrap_or_default().to_lowercase();
    let mut ranked: Vec<(bool, String, Ingredient)> = ingredients
        .into_iter()
        .filter_map(|ingredient| {
            let lowered = ingredient.name.to_lowercase();
            if needle.is_empty() || lowered.contains(&needle) {
                let prefix = lowered.starts_with(&needle);
                Some((!prefix, lowered, ingredient))
            } else {
                None
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.cmp(&b.1))
            .then(a.2.id.cmp(&b.2.id))
    });
    Ok(ranked.into_iter().map(|(_, _, ingredient)| ingredient).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use tempfile::NamedTempFile;

    fn db() -> (Database, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();
        (db, temp_db)
    }

    fn user_request(email: &str, username: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.into(),
            username: username.into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        }
    }

    fn ingredient(db: &Database, name: &str) -> Ingredient {
        create_ingredient(
            db,
            CreateIngredientRequest {
                name: name.into(),
                measurement_unit: "g".into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn users_get_sequential_ids() {
        let (db, _temp_db) = db();
        let a = create_user(&db, user_request("a@example.com", "a")).unwrap();
        let b = create_user(&db, user_request("b@example.com", "b")).unwrap();

        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(get_user(&db, 2).unwrap().unwrap().username, "b");
        assert!(get_user(&db, 3).unwrap().is_none());
    }

    #[test]
    fn duplicate_email_or_username_is_rejected() {
        let (db, _temp_db) = db();
        create_user(&db, user_request("a@example.com", "a")).unwrap();

        let err = create_user(&db, user_request("A@Example.com", "other")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create_user(&db, user_request("new@example.com", "a")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (count, _) = list_users(&db, 0, 10).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn invalid_email_is_rejected() {
        let (db, _temp_db) = db();
        assert!(create_user(&db, user_request("not-an-email", "x")).is_err());
        assert!(create_user(&db, user_request("x@example.com", "has space")).is_err());
    }

    #[test]
    fn avatar_set_and_cleared() {
        let (db, _temp_db) = db();
        let user = create_user(&db, user_request("a@example.com", "a")).unwrap();
        assert!(user.avatar.is_none());

        let updated = set_avatar(&db, user.id, Some("data:image/png;base64,AAAA".into())).unwrap();
        assert_eq!(updated.avatar.as_deref(), Some("data:image/png;base64,AAAA"));
        assert_eq!(get_user(&db, user.id).unwrap().unwrap().avatar, updated.avatar);

        assert!(matches!(
            set_avatar(&db, user.id, Some("  ".into())),
            Err(AppError::Validation(_))
        ));

        set_avatar(&db, user.id, None).unwrap();
        set_avatar(&db, user.id, None).unwrap();
        assert!(get_user(&db, user.id).unwrap().unwrap().avatar.is_none());

        assert!(matches!(set_avatar(&db, 99, None), Err(AppError::NotFound(_))));
    }

    #[test]
    fn tag_slug_is_unique() {
        let (db, _temp_db) = db();
        let request = CreateTagRequest {
            name: "Breakfast".into(),
            slug: "breakfast".into(),
        };
        create_tag(&db, request.clone()).unwrap();
        assert!(create_tag(&db, request).is_err());

        let bad = CreateTagRequest {
            name: "Bad".into(),
            slug: "no spaces".into(),
        };
        assert!(create_tag(&db, bad).is_err());
    }

    #[test]
    fn tags_are_listed_by_name() {
        let (db, _temp_db) = db();
        for (name, slug) in [("Lunch", "lunch"), ("Breakfast", "breakfast")] {
            create_tag(
                &db,
                CreateTagRequest {
                    name: name.into(),
                    slug: slug.into(),
                },
            )
            .unwrap();
        }

        let names: Vec<_> = list_tags(&db).unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["Breakfast", "Lunch"]);
    }

    #[test]
    fn ingredient_search_ranks_prefix_matches_first() {
        let (db, _temp_db) = db();
        ingredient(&db, "Brown sugar");
        ingredient(&db, "Sugar");
        ingredient(&db, "Salt");
        ingredient(&db, "Sugar syrup");

        let names: Vec<_> = search_ingredients(&db, Some("SUG"))
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, ["Sugar", "Sugar syrup", "Brown sugar"]);

        assert_eq!(search_ingredients(&db, None).unwrap().len(), 4);
        assert!(search_ingredients(&db, Some("pepper")).unwrap().is_empty());
    }
}
