//! Data models for the recipe service
//!
//! Stored records are serialized to JSON and kept in redb tables; request and
//! response types mirror the public JSON API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A registered user
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Opaque image payload, same format as recipe images
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A recipe label such as "breakfast"
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub id: u64,
    pub name: String,
    pub measurement_unit: String,
}

/// Quantity of one ingredient inside a recipe
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: u64,
    pub amount: u32,
}

/// A recipe as stored in the database
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: u64,
    pub author_id: u64,
    pub name: String,
    pub text: String,
    /// Opaque image payload (usually a base64 data URL)
    #[serde(default)]
    pub image: Option<String>,
    /// Minutes, at least 1
    pub cooking_time: u32,
    pub tag_ids: Vec<u64>,
    pub ingredients: Vec<IngredientAmount>,
    pub created_at: DateTime<Utc>,
}

/// Kind of user to recipe relation
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Favorite,
    Cart,
}

impl RelationKind {
    /// Prefix of this kind's keys in the relations table
    pub fn prefix(self) -> &'static str {
        match self {
            RelationKind::Favorite => "fav",
            RelationKind::Cart => "cart",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::Cart => "shopping cart",
        }
    }
}

/// Request payload for registering a user
///
/// # Example
/// ```json
/// {
///   "email": "cook@example.com",
///   "username": "cook",
///   "first_name": "Julia",
///   "last_name": "Child"
/// }
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Request payload for `PUT /api/users/me/avatar`
///
/// # Example
/// ```json
/// { "avatar": "data:image/png;base64,iVBORw0KGgo..." }
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct AvatarRequest {
    pub avatar: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateTagRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct IngredientAmountRequest {
    pub id: u64,
    pub amount: u32,
}

/// Request payload for creating or replacing a recipe
///
/// # Example
/// ```json
/// {
///   "name": "Pancakes",
///   "text": "Mix and fry.",
///   "cooking_time": 20,
///   "tags": [1],
///   "ingredients": [{"id": 3, "amount": 200}]
/// }
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct RecipeRequest {
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    pub cooking_time: u32,
    pub tags: Vec<u64>,
    pub ingredients: Vec<IngredientAmountRequest>,
}

/// A user as seen by the acting user
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: u64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

impl UserView {
    pub fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
            avatar: user.avatar,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeIngredientView {
    pub id: u64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

/// Full recipe representation
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeView {
    pub id: u64,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: u32,
}

/// Short recipe card used by favorites, cart and subscriptions
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeSummary {
    pub id: u64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: u32,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}

/// A followed author with a preview of their recipes
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: usize,
}

/// Envelope for paginated list responses
#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub page: usize,
    pub limit: usize,
    /// Total number of matching items across all pages
    pub count: usize,
    pub results: Vec<T>,
}

/// Query parameters shared by simple paginated lists
///
/// # Example
/// Query string: `?page=2&limit=20`
#[derive(Deserialize, Debug, Default)]
pub struct PageParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// Query parameters for listing recipes
///
/// Read with `axum_extra::extract::Query`, so `tags` may repeat.
///
/// # Example
/// Query string: `?tags=breakfast&tags=lunch&author=3&is_favorited=1&page=1&limit=6`
/// (`?tags=breakfast,lunch` is accepted as well)
#[derive(Deserialize, Debug, Default)]
pub struct RecipeListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub author: Option<u64>,
    /// Tag slugs; a recipe matches if it has any of them
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_favorited: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeListParams {
    pub fn tag_slugs(&self) -> Vec<String> {
        self.tags
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct IngredientSearchParams {
    pub name: Option<String>,
}

/// Query parameters for the subscription endpoints
#[derive(Deserialize, Debug, Default)]
pub struct SubscriptionParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub recipes_limit: Option<usize>,
}

/// Accepts `1`/`0`/`true`/`false` for boolean query filters.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("1") | Some("true") | Some("True") => Ok(Some(true)),
        Some("0") | Some("false") | Some("False") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected 1, 0, true or false, got '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_slugs_split_and_trim() {
        let params = RecipeListParams {
            tags: vec!["breakfast, lunch,,".into(), "dinner".into()],
            ..Default::default()
        };
        assert_eq!(params.tag_slugs(), ["breakfast", "lunch", "dinner"]);
        assert!(RecipeListParams::default().tag_slugs().is_empty());
    }

    #[test]
    fn relation_prefixes_are_distinct() {
        assert_ne!(RelationKind::Favorite.prefix(), RelationKind::Cart.prefix());
    }
}
