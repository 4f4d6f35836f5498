//! Wire representations handed to HTTP clients.
//!
//! Rows coming out of storage are never serialized directly for recipes and
//! profiles; they are mapped into these views first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::schema::{
    AuthorRow, AuthorSummary, Id, LinkedRecipeTag, Recipe, RecipePart, RecipeSummary, Tag,
    UserProfileRow,
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AuthorView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl From<AuthorRow> for AuthorView {
    fn from(row: AuthorRow) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

impl From<UserProfileRow> for AuthorView {
    fn from(row: UserProfileRow) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct IngredientAmountView {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for IngredientAmountView {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

impl From<LinkedRecipeTag> for Tag {
    fn from(tag: LinkedRecipeTag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: AuthorView,
    pub ingredients: Vec<IngredientAmountView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// Relation flags of one recipe for the requesting viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerFlags {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeView {
    pub fn from_parts(
        recipe: Recipe,
        author: AuthorView,
        tags: Vec<Tag>,
        ingredients: Vec<IngredientAmountView>,
        flags: ViewerFlags,
    ) -> Self {
        Self {
            id: recipe.id,
            tags,
            author,
            ingredients,
            is_favorited: flags.is_favorited,
            is_in_shopping_cart: flags.is_in_shopping_cart,
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            pub_date: recipe.pub_date,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: AuthorSummary,
    pub recipes: Vec<RecipeSummary>,
}

impl SubscriptionView {
    pub fn new(author: AuthorSummary, recipes: Vec<RecipeSummary>) -> Self {
        Self { author, recipes }
    }
}
