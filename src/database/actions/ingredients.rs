use serde::Deserialize;
use sqlx::{Pool, Postgres};

use crate::{
    actions::contains_pattern,
    constants::MAX_NAME_LENGTH,
    error::ServiceError,
    schema::{Id, Ingredient},
};

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientInput {
    pub name: String,
    pub measurement_unit: String,
}

pub async fn create_ingredient(
    input: IngredientInput,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ServiceError> {
    let name = input.name.trim();
    let unit = input.measurement_unit.trim();
    if name.is_empty() || unit.is_empty() {
        return Err(ServiceError::validation(
            "Ingredient name and measurement unit are required",
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH || unit.chars().count() > MAX_NAME_LENGTH {
        return Err(ServiceError::validation(
            "Ingredient name and measurement unit must be at most 200 characters",
        ));
    }

    let row: Option<Ingredient> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT (name, measurement_unit) DO NOTHING
        RETURNING *
    ",
    )
    .bind(name)
    .bind(unit)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(ingredient) => {
            log::info!("Created ingredient {} ({})", ingredient.id, ingredient.name);
            Ok(ingredient)
        }
        None => Err(ServiceError::Conflict(String::from(
            "Ingredient with this measurement unit already exists",
        ))),
    }
}

pub async fn get_ingredient(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, ServiceError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Case-insensitive substring search over ingredient names.
pub async fn fetch_ingredients(
    search: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ServiceError> {
    let pattern = contains_pattern(search.unwrap_or("").trim());

    let rows: Vec<Ingredient> = sqlx::query_as(
        "SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name, measurement_unit",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
