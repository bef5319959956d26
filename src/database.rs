//! Database initialization and table definitions
//!
//! Every entity is a JSON document in an embedded redb table. Relations use
//! composite string keys with zero-padded ids so a prefix range scan returns
//! one user's rows in id order.

use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::Result;
use crate::link_store::RedbLinkStore;
use crate::shortener::LinkShortener;

/// Users by id. Value: JSON-serialized `User`
pub const TABLE_USERS: TableDefinition<u64, &str> = TableDefinition::new("users_v1");

/// Unique lookup for registration.
///
/// Key: "email:{lowercased email}" or "username:{username}"
/// Value: user id
pub const TABLE_USER_LOOKUP: TableDefinition<&str, u64> = TableDefinition::new("user_lookup_v1");

/// Tags by id. Value: JSON-serialized `Tag`
pub const TABLE_TAGS: TableDefinition<u64, &str> = TableDefinition::new("tags_v1");

/// Tag slug to tag id
pub const TABLE_TAG_SLUGS: TableDefinition<&str, u64> = TableDefinition::new("tag_slugs_v1");

/// Ingredients by id. Value: JSON-serialized `Ingredient`
pub const TABLE_INGREDIENTS: TableDefinition<u64, &str> = TableDefinition::new("ingredients_v1");

/// Recipes by id. Value: JSON-serialized `Recipe` including its ingredient amounts
pub const TABLE_RECIPES: TableDefinition<u64, &str> = TableDefinition::new("recipes_v1");

/// Favorite and cart rows.
///
/// Key: "{kind prefix}:{user_id:020}:{recipe_id:020}", e.g. "cart:00000000000000000003:00000000000000000042"
/// Value: creation time in microseconds
///
/// The key itself is the uniqueness constraint on (kind, user, recipe).
pub const TABLE_RELATIONS: TableDefinition<&str, i64> = TableDefinition::new("relations_v1");

/// Follow graph.
///
/// Key: "{follower_id:020}:{author_id:020}"
/// Value: creation time in microseconds
pub const TABLE_FOLLOWS: TableDefinition<&str, i64> = TableDefinition::new("follows_v1");

/// Short key to full path
pub const TABLE_SHORT_LINKS: TableDefinition<&str, &str> = TableDefinition::new("short_links_v1");

/// Full path to short key, so a path keeps the key it was first given
pub const TABLE_SHORT_LINK_TARGETS: TableDefinition<&str, &str> =
    TableDefinition::new("short_link_targets_v1");

/// Last id handed out per entity name
pub const TABLE_SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences_v1");

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub links: Arc<LinkShortener<RedbLinkStore>>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let db = Arc::new(db);
        Self {
            links: Arc::new(LinkShortener::new(RedbLinkStore::new(Arc::clone(&db)))),
            db,
            config: Arc::new(config),
        }
    }
}

/// Creates or opens the database at `db_path` and makes sure every table exists.
///
/// This function:
/// 1. Creates the file if it doesn't exist, or opens it
/// 2. Begins one write transaction
/// 3. Opens every table, which creates the missing ones
/// 4. Commits, so later read transactions can open any table
///
/// # Errors
///
/// Returns the `redb::Error` of whichever step failed (file locked by
/// another process, corrupted file, disk full).
///
/// # Example
///
/// ```no_run
/// # use foodgram::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> std::result::Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    // Opening a table inside a write transaction creates it
    let write_txn = db.begin_write()?;
    {
        // Users and their email/username index
        write_txn.open_table(TABLE_USERS)?;
        write_txn.open_table(TABLE_USER_LOOKUP)?;
        // Reference data
        write_txn.open_table(TABLE_TAGS)?;
        write_txn.open_table(TABLE_TAG_SLUGS)?;
        write_txn.open_table(TABLE_INGREDIENTS)?;
        // Recipes and who favorited, carted or follows what
        write_txn.open_table(TABLE_RECIPES)?;
        write_txn.open_table(TABLE_RELATIONS)?;
        write_txn.open_table(TABLE_FOLLOWS)?;
        // Short links, both directions
        write_txn.open_table(TABLE_SHORT_LINKS)?;
        write_txn.open_table(TABLE_SHORT_LINK_TARGETS)?;
        write_txn.open_table(TABLE_SEQUENCES)?;
    }
    // Persist table creation
    write_txn.commit()?;

    Ok(db)
}

/// Allocates the next id for `sequence` inside an open write transaction.
///
/// Must not be called while `TABLE_SEQUENCES` is already open in `txn`.
pub fn next_id(txn: &WriteTransaction, sequence: &str) -> Result<u64> {
    let mut table = txn.open_table(TABLE_SEQUENCES)?;
    let next = table.get(sequence)?.map(|guard| guard.value()).unwrap_or(0) + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

/// Reads and decodes the JSON document stored under `id`.
pub fn get_json<T, Tbl>(table: &Tbl, id: u64) -> Result<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static str>,
{
    match table.get(id)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

/// Decodes every document of an id-keyed table, in ascending id order.
pub fn all_json<T, Tbl>(table: &Tbl) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static str>,
{
    let mut items = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        items.push(decode(value.value())?);
    }
    Ok(items)
}

/// Key of one row in `TABLE_RELATIONS`
pub fn relation_key(prefix: &str, user_id: u64, recipe_id: u64) -> String {
    format!("{}:{:020}:{:020}", prefix, user_id, recipe_id)
}

/// Key of one row in `TABLE_FOLLOWS`
pub fn follow_key(follower_id: u64, author_id: u64) -> String {
    format!("{:020}:{:020}", follower_id, author_id)
}

/// Splits the trailing id off a composite key.
pub fn trailing_id(key: &str) -> Option<u64> {
    key.rsplit(':').next()?.parse().ok()
}
