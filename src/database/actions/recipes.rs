use std::collections::{HashMap, HashSet};

use crate::{
    actions::contains_pattern,
    authentication::permissions::ActionType,
    constants::RECIPE_COUNT_PER_PAGE,
    error::ServiceError,
    jwt::SessionData,
    pagination::{PageContext, PageRequest},
    schema::{AuthorRow, Id, LinkedRecipeTag, Recipe, RecipePart, RecipeRow, Tag},
    views::{AuthorView, IngredientAmountView, RecipeView, ViewerFlags},
};

use sqlx::{Pool, Postgres, QueryBuilder};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub name: Option<String>,
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ServiceError> {
    match value {
        "1" | "true" | "True" => Ok(true),
        "0" | "false" | "False" => Ok(false),
        _ => Err(ServiceError::Validation(format!(
            "Query parameter '{key}' must be 1 or 0"
        ))),
    }
}

impl RecipeFilter {
    pub fn from_query(pairs: &[(String, String)]) -> Result<Self, ServiceError> {
        let mut filter = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "name" => {
                    let name = value.trim();
                    filter.name = (!name.is_empty()).then(|| name.to_owned());
                }
                "author" => {
                    filter.author = Some(value.parse().map_err(|_| {
                        ServiceError::validation("Query parameter 'author' must be a user id")
                    })?)
                }
                "tags" => filter.tags.push(value.to_owned()),
                "is_favorited" => filter.is_favorited = Some(parse_flag(key, value)?),
                "is_in_shopping_cart" => {
                    filter.is_in_shopping_cart = Some(parse_flag(key, value)?)
                }
                _ => {}
            }
        }

        Ok(filter)
    }

    /// Relation filters that apply for `viewer`, as `(table, wanted)`.
    /// Anonymous viewers get none.
    pub fn relation_filters(&self, viewer: Option<Id>) -> Vec<(&'static str, bool)> {
        if viewer.is_none() {
            return vec![];
        }

        [
            ("favorites", self.is_favorited),
            ("shopping_cart", self.is_in_shopping_cart),
        ]
        .into_iter()
        .filter_map(|(table, flag)| flag.map(|wanted| (table, wanted)))
        .collect()
    }
}

fn push_conditions(
    query: &mut QueryBuilder<'_, Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Id>,
) {
    if let Some(name) = &filter.name {
        query.push(" AND r.name ILIKE ").push_bind(contains_pattern(name));
    }

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query
            .push(" AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(filter.tags.clone())
            .push("))");
    }

    if let Some(viewer) = viewer {
        for (table, wanted) in filter.relation_filters(Some(viewer)) {
            query
                .push(if wanted { " AND " } else { " AND NOT " })
                .push(format!(
                    "EXISTS (SELECT 1 FROM {table} x WHERE x.recipe_id = r.id AND x.user_id = "
                ))
                .push_bind(viewer)
                .push(")");
        }
    }
}

async fn count_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<i64, ServiceError> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
    push_conditions(&mut query, filter, viewer);

    let count = query.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    page: PageRequest,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeView>, ServiceError> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE",
    );
    push_conditions(&mut query, filter, viewer);

    query
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(pool).await?;

    // A page past the end has no rows to carry the window count.
    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.page > 1 => count_recipes(filter, viewer, pool).await?,
        None => 0,
    };
    let recipes = rows.into_iter().map(Recipe::from).collect();
    let views = load_recipe_views(recipes, viewer, pool).await?;

    Ok(PageContext::from_rows(views, total_count, page))
}

pub fn default_page(pairs: &[(String, String)]) -> Result<PageRequest, ServiceError> {
    PageRequest::from_query(pairs, RECIPE_COUNT_PER_PAGE)
}

pub async fn list_recipe_parts(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<Vec<RecipePart>, ServiceError> {
    let rows: Vec<RecipePart> = sqlx::query_as("
        SELECT ia.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name, i.measurement_unit AS measurement_unit, ia.amount AS amount
        FROM ingredient_amounts ia
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE ia.recipe_id = ANY($1)
        ORDER BY ia.id
    ")
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<Vec<LinkedRecipeTag>, ServiceError> {
    let rows: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn list_authors(
    pool: &Pool<Postgres>,
    author_ids: &[Id],
    viewer: Option<Id>,
) -> Result<Vec<AuthorRow>, ServiceError> {
    let rows: Vec<AuthorRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.user_id = $2 AND s.author_id = u.id) AS is_subscribed
        FROM users u
        WHERE u.id = ANY($1)
    ",
    )
    .bind(author_ids)
    .bind(viewer)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn list_related_recipes(
    pool: &Pool<Postgres>,
    table: &str,
    recipe_ids: &[Id],
    viewer: Option<Id>,
) -> Result<HashSet<Id>, ServiceError> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };

    let rows: Vec<(Id,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {table} WHERE user_id = $1 AND recipe_id = ANY($2)"
    ))
    .bind(viewer)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Assembles read views for `recipes` with a fixed number of queries,
/// keeping the order of `recipes`.
pub async fn load_recipe_views(
    recipes: Vec<Recipe>,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, ServiceError> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let author_ids: Vec<Id> = recipes
        .iter()
        .map(|recipe| recipe.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<Id, AuthorView> = list_authors(pool, &author_ids, viewer)
        .await?
        .into_iter()
        .map(|row| (row.id, AuthorView::from(row)))
        .collect();

    let mut tags: HashMap<Id, Vec<Tag>> = HashMap::new();
    list_recipe_tags(pool, &recipe_ids)
        .await?
        .into_iter()
        .for_each(|tag| tags.entry(tag.recipe_id).or_default().push(tag.into()));

    let mut parts: HashMap<Id, Vec<IngredientAmountView>> = HashMap::new();
    list_recipe_parts(pool, &recipe_ids)
        .await?
        .into_iter()
        .for_each(|part| parts.entry(part.recipe_id).or_default().push(part.into()));

    let favorited = list_related_recipes(pool, "favorites", &recipe_ids, viewer).await?;
    let in_cart = list_related_recipes(pool, "shopping_cart", &recipe_ids, viewer).await?;

    let mut views = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
            ServiceError::NotFound(format!("Author of recipe {} does not exist", recipe.id))
        })?;
        let flags = ViewerFlags {
            is_favorited: favorited.contains(&recipe.id),
            is_in_shopping_cart: in_cart.contains(&recipe.id),
        };
        let id = recipe.id;

        views.push(RecipeView::from_parts(
            recipe,
            author,
            tags.remove(&id).unwrap_or_default(),
            parts.remove(&id).unwrap_or_default(),
            flags,
        ));
    }

    Ok(views)
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ServiceError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_recipe_view(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, ServiceError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("No recipe exists with specified id"))?;

    let mut views = load_recipe_views(vec![recipe], viewer, pool).await?;
    views
        .pop()
        .ok_or_else(|| ServiceError::not_found("No recipe exists with specified id"))
}

/// Checks that the recipe exists and that `session` owns it.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ServiceError> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match get_recipe(id, pool).await? {
        Some(recipe) => {
            if recipe.author_id != session.user_id {
                Err(ServiceError::Forbidden(String::from(
                    "Only the author can modify this recipe",
                )))
            } else {
                Ok(recipe)
            }
        }
        None => Err(ServiceError::not_found("No recipe exists with specified id")),
    }
}

pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ServiceError> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await?;

    log::info!("Deleted recipe {} of author {}", recipe.id, recipe.author_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn tags_are_multi_valued() {
        let filter = RecipeFilter::from_query(&pairs(&[
            ("tags", "breakfast"),
            ("author", "3"),
            ("tags", "lunch"),
            ("page", "2"),
        ]))
        .expect("valid filter");

        assert_eq!(filter.author, Some(3));
        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);
        assert_eq!(filter.is_favorited, None);
    }

    #[test]
    fn name_filter_is_trimmed() {
        let filter = RecipeFilter::from_query(&pairs(&[("name", "  pie ")])).expect("valid filter");
        assert_eq!(filter.name.as_deref(), Some("pie"));

        let blank = RecipeFilter::from_query(&pairs(&[("name", " ")])).expect("valid filter");
        assert_eq!(blank.name, None);
    }

    #[test]
    fn relation_flags_parse() {
        let filter = RecipeFilter::from_query(&pairs(&[
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "false"),
        ]))
        .expect("valid filter");

        assert_eq!(filter.is_favorited, Some(true));
        assert_eq!(filter.is_in_shopping_cart, Some(false));
        assert_eq!(
            filter.relation_filters(Some(1)),
            vec![("favorites", true), ("shopping_cart", false)]
        );
    }

    #[test]
    fn relation_filters_are_noops_for_anonymous() {
        let filter = RecipeFilter {
            is_favorited: Some(true),
            is_in_shopping_cart: Some(true),
            ..RecipeFilter::default()
        };

        assert!(filter.relation_filters(None).is_empty());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(RecipeFilter::from_query(&pairs(&[("author", "me")])).is_err());
        assert!(RecipeFilter::from_query(&pairs(&[("is_favorited", "yes")])).is_err());
    }
}
