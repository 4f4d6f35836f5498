pub mod composition;
pub mod ingredients;
pub mod recipes;
pub mod relations;
pub mod shopping_list;
pub mod tags;
pub mod users;

pub use composition::{validate_and_persist, IngredientAmountInput, RecipeInput};
pub use ingredients::{create_ingredient, fetch_ingredients, get_ingredient, IngredientInput};
pub use recipes::{
    delete_recipe, fetch_recipes, get_recipe, get_recipe_mut, get_recipe_view, RecipeFilter,
};
pub use relations::{
    relation_exists, toggle_relation, Favorite, RelationKind, RelationOutcome, ShoppingCart,
    Subscription, ToggleAction,
};
pub use shopping_list::{build_shopping_list, render_shopping_list, shopping_list_filename};
pub use tags::{create_tag, get_tag, list_tags, TagInput};
pub use users::{
    fetch_subscriptions, fetch_users, get_user_by_id, get_user_profile, parse_recipes_limit,
    subscription_view,
};

/// `%text%` for `ILIKE`, with the wildcard and escape characters of `text` taken literally.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
