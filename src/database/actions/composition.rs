use std::collections::HashSet;

use serde::Deserialize;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    constants::{MAX_NAME_LENGTH, MAX_UNIT_AMOUNT, MIN_UNIT_AMOUNT},
    error::ServiceError,
    schema::{Id, Recipe},
};

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientAmountInput {
    pub id: Id,
    pub amount: i32,
}

/// Write representation of a recipe. `ingredients` and `tags` are always
/// required, an update replaces both collections entirely.
#[derive(Deserialize, Debug, Clone)]
pub struct RecipeInput {
    pub ingredients: Vec<IngredientAmountInput>,
    pub tags: Vec<Id>,
    #[serde(default)]
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmountDraft {
    pub ingredient_id: Id,
    pub amount: i32,
}

/// A recipe input that passed every rule not requiring storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub ingredients: Vec<IngredientAmountDraft>,
    pub tags: Vec<Id>,
}

fn check_bounds(value: i32, what: &str) -> Result<(), ServiceError> {
    if !(MIN_UNIT_AMOUNT..=MAX_UNIT_AMOUNT).contains(&value) {
        return Err(ServiceError::Validation(format!(
            "{what} must be between {MIN_UNIT_AMOUNT} and {MAX_UNIT_AMOUNT}"
        )));
    }
    Ok(())
}

impl RecipeInput {
    pub fn into_draft(self) -> Result<RecipeDraft, ServiceError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::validation("Recipe name must not be empty"));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ServiceError::Validation(format!(
                "Recipe name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }
        if self.text.trim().is_empty() {
            return Err(ServiceError::validation("Recipe text must not be empty"));
        }
        check_bounds(self.cooking_time, "Cooking time")?;

        if self.ingredients.is_empty() {
            return Err(ServiceError::validation(
                "Recipe must contain at least one ingredient",
            ));
        }
        let mut seen = HashSet::new();
        let mut ingredients = Vec::with_capacity(self.ingredients.len());
        for ingredient in self.ingredients {
            if !seen.insert(ingredient.id) {
                return Err(ServiceError::validation(
                    "Recipe cannot contain the same ingredient twice",
                ));
            }
            check_bounds(ingredient.amount, "Ingredient amount")?;
            ingredients.push(IngredientAmountDraft {
                ingredient_id: ingredient.id,
                amount: ingredient.amount,
            });
        }

        if self.tags.is_empty() {
            return Err(ServiceError::validation("Recipe needs at least one tag"));
        }
        let mut seen_tags = HashSet::new();
        let tags = self
            .tags
            .into_iter()
            .filter(|tag| seen_tags.insert(*tag))
            .collect();

        let image = self.image.filter(|image| !image.trim().is_empty());

        Ok(RecipeDraft {
            name,
            text: self.text,
            image,
            cooking_time: self.cooking_time,
            ingredients,
            tags,
        })
    }
}

async fn ensure_ingredients_exist(
    draft: &RecipeDraft,
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    let ids: Vec<Id> = draft
        .ingredients
        .iter()
        .map(|part| part.ingredient_id)
        .collect();

    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;
    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();

    match ids.into_iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(ServiceError::NotFound(format!(
            "No ingredient exists with id {missing}"
        ))),
        None => Ok(()),
    }
}

async fn ensure_tags_exist(draft: &RecipeDraft, conn: &mut PgConnection) -> Result<(), ServiceError> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(&draft.tags)
        .fetch_all(&mut *conn)
        .await?;
    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();

    match draft.tags.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(ServiceError::NotFound(format!(
            "No tag exists with id {missing}"
        ))),
        None => Ok(()),
    }
}

const DUPLICATE_NAME: &str = "You already have a recipe with this name";

async fn ensure_unique_name(
    author_id: Id,
    name: &str,
    existing: Option<Id>,
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    let row: Option<(Id,)> = sqlx::query_as(
        "SELECT id FROM recipes WHERE author_id = $1 AND name = $2 AND ($3::INTEGER IS NULL OR id <> $3)",
    )
    .bind(author_id)
    .bind(name)
    .bind(existing)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(_) => Err(ServiceError::validation(DUPLICATE_NAME)),
        None => Ok(()),
    }
}

fn duplicate_name(error: sqlx::Error) -> ServiceError {
    match ServiceError::from(error) {
        ServiceError::Conflict(_) => ServiceError::validation(DUPLICATE_NAME),
        other => other,
    }
}

async fn insert_recipe(
    author_id: Id,
    draft: &RecipeDraft,
    conn: &mut PgConnection,
) -> Result<Id, ServiceError> {
    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(&draft.image)
    .bind(draft.cooking_time)
    .fetch_one(&mut *conn)
    .await
    .map_err(duplicate_name)?;

    Ok(id.0)
}

async fn update_recipe_info(
    recipe_id: Id,
    draft: &RecipeDraft,
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image) WHERE id = $5",
    )
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .bind(&draft.image)
    .bind(recipe_id)
    .execute(&mut *conn)
    .await
    .map_err(duplicate_name)?;

    Ok(())
}

async fn clear_associations(recipe_id: Id, conn: &mut PgConnection) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM ingredient_amounts WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn insert_associations(
    recipe_id: Id,
    draft: &RecipeDraft,
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    let mut tags = QueryBuilder::<Postgres>::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    tags.push_values(&draft.tags, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    tags.build().execute(&mut *conn).await?;

    let mut parts = QueryBuilder::<Postgres>::new(
        "INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) ",
    );
    parts.push_values(&draft.ingredients, |mut row, part| {
        row.push_bind(recipe_id)
            .push_bind(part.ingredient_id)
            .push_bind(part.amount);
    });
    parts.build().execute(&mut *conn).await?;

    Ok(())
}

/// Validates `input` and writes the recipe with its tags and ingredient
/// amounts in one transaction. With `existing` set, the recipe is updated and
/// its previous associations are replaced by the new ones.
pub async fn validate_and_persist(
    input: RecipeInput,
    author_id: Id,
    existing: Option<&Recipe>,
    pool: &Pool<Postgres>,
) -> Result<Id, ServiceError> {
    let draft = input.into_draft()?;

    if existing.is_none() && draft.image.is_none() {
        return Err(ServiceError::validation("Recipe image is required"));
    }

    let mut tx = pool.begin().await?;

    ensure_ingredients_exist(&draft, &mut tx).await?;
    ensure_tags_exist(&draft, &mut tx).await?;
    ensure_unique_name(author_id, &draft.name, existing.map(|recipe| recipe.id), &mut tx).await?;

    let recipe_id = match existing {
        Some(recipe) => {
            update_recipe_info(recipe.id, &draft, &mut tx).await?;
            clear_associations(recipe.id, &mut tx).await?;
            recipe.id
        }
        None => insert_recipe(author_id, &draft, &mut tx).await?,
    };

    insert_associations(recipe_id, &draft, &mut tx).await?;

    tx.commit().await?;
    log::info!(
        "Saved recipe {recipe_id} for author {author_id} ({} ingredients, {} tags)",
        draft.ingredients.len(),
        draft.tags.len()
    );

    Ok(recipe_id)
}
