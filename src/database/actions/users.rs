use std::collections::HashMap;

use crate::{
    constants::USER_COUNT_PER_PAGE,
    error::ServiceError,
    pagination::{PageContext, PageRequest},
    schema::{AuthorSummary, Id, RecipeSummary, SubscriptionRow, User, UserProfileRow},
    views::{AuthorView, SubscriptionView},
};

use sqlx::{Pool, Postgres};

pub async fn get_user_by_id(user_id: Id, pool: &Pool<Postgres>) -> Result<Option<User>, ServiceError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_profile(
    user_id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<AuthorView, ServiceError> {
    let row: Option<UserProfileRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.user_id = $2 AND s.author_id = u.id) AS is_subscribed,
            1::BIGINT AS count
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(user_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await?;

    row.map(AuthorView::from)
        .ok_or_else(|| ServiceError::not_found("No user exists with specified id"))
}

pub async fn fetch_users(
    page: PageRequest,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<AuthorView>, ServiceError> {
    let rows: Vec<UserProfileRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.user_id = $1 AND s.author_id = u.id) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.username, u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.page > 1 => count_rows("SELECT COUNT(*) FROM users", None, pool).await?,
        None => 0,
    };
    let views = rows.into_iter().map(AuthorView::from).collect();

    Ok(PageContext::from_rows(views, total_count, page))
}

/// Total for a page past the end, where no row carries `COUNT(*) OVER()`.
async fn count_rows(
    statement: &'static str,
    user_id: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<i64, ServiceError> {
    let mut query = sqlx::query_scalar::<Postgres, i64>(statement);
    if let Some(user_id) = user_id {
        query = query.bind(user_id);
    }

    Ok(query.fetch_one(pool).await?)
}

pub fn default_page(pairs: &[(String, String)]) -> Result<PageRequest, ServiceError> {
    PageRequest::from_query(pairs, USER_COUNT_PER_PAGE)
}

/// Reads the optional `recipes_limit` query parameter.
pub fn parse_recipes_limit(pairs: &[(String, String)]) -> Result<Option<i64>, ServiceError> {
    let Some((_, value)) = pairs.iter().find(|(key, _)| key == "recipes_limit") else {
        return Ok(None);
    };

    match value.parse::<i64>() {
        Ok(limit) if limit >= 0 => Ok(Some(limit)),
        _ => Err(ServiceError::validation(
            "Query parameter 'recipes_limit' must be a non-negative integer",
        )),
    }
}

/// Newest recipes of `author`, at most `limit` of them when given.
pub async fn list_author_recipes(
    author: Id,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeSummary>, ServiceError> {
    let rows: Vec<RecipeSummary> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time
        FROM recipes
        WHERE author_id = $1
        ORDER BY pub_date DESC, id DESC
        LIMIT $2
    ",
    )
    .bind(author)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn list_authors_recipes(
    authors: &[Id],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipeSummary>>, ServiceError> {
    let rows: Vec<(Id, Id, String, String, i32)> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM (
            SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS recipe_rank
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR recipe_rank <= $2
        ORDER BY author_id, recipe_rank
    ",
    )
    .bind(authors)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut recipes: HashMap<Id, Vec<RecipeSummary>> = HashMap::new();
    for (author_id, id, name, image, cooking_time) in rows {
        recipes.entry(author_id).or_default().push(RecipeSummary {
            id,
            name,
            image,
            cooking_time,
        });
    }

    Ok(recipes)
}

pub async fn subscription_view(
    author: AuthorSummary,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, ServiceError> {
    let recipes = list_author_recipes(author.id, recipes_limit, pool).await?;
    Ok(SubscriptionView::new(author, recipes))
}

/// Authors `user_id` is subscribed to, each with their newest recipes.
pub async fn fetch_subscriptions(
    user_id: Id,
    page: PageRequest,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionView>, ServiceError> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            TRUE AS is_subscribed,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.page > 1 => {
            count_rows(
                "SELECT COUNT(*) FROM subscriptions WHERE user_id = $1",
                Some(user_id),
                pool,
            )
            .await?
        }
        None => 0,
    };
    let author_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut recipes = list_authors_recipes(&author_ids, recipes_limit, pool).await?;

    let views = rows
        .into_iter()
        .map(|row| {
            let author_recipes = recipes.remove(&row.id).unwrap_or_default();
            SubscriptionView::new(AuthorSummary::from(row), author_recipes)
        })
        .collect();

    Ok(PageContext::from_rows(views, total_count, page))
}
