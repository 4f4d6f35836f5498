use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Pool, Postgres};

use crate::{
    error::ServiceError,
    schema::{AuthorSummary, Id, RecipeSummary},
};

/// A unique (owner, subject) association stored in its own table.
///
/// The unique constraint on `(OWNER_COLUMN, SUBJECT_COLUMN)` is what keeps
/// concurrent creates from producing duplicates; the toggle relies on it
/// through `ON CONFLICT DO NOTHING` instead of checking first.
pub trait RelationKind {
    const TABLE: &'static str;
    const OWNER_COLUMN: &'static str;
    const SUBJECT_COLUMN: &'static str;

    /// Loads the summary of the subject, `$1` is the subject id.
    const SUBJECT_QUERY: &'static str;

    const SUBJECT_MISSING: &'static str;
    const ALREADY_EXISTS: &'static str;
    const NOT_PRESENT: &'static str;

    type Summary: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    fn check(_owner: Id, _subject: Id) -> Result<(), ServiceError> {
        Ok(())
    }

    fn insert_statement() -> String {
        format!(
            "INSERT INTO {table} ({owner}, {subject}) VALUES ($1, $2) ON CONFLICT ({owner}, {subject}) DO NOTHING",
            table = Self::TABLE,
            owner = Self::OWNER_COLUMN,
            subject = Self::SUBJECT_COLUMN,
        )
    }

    fn delete_statement() -> String {
        format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            Self::TABLE,
            Self::OWNER_COLUMN,
            Self::SUBJECT_COLUMN,
        )
    }

    fn exists_statement() -> String {
        format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1 AND {} = $2)",
            Self::TABLE,
            Self::OWNER_COLUMN,
            Self::SUBJECT_COLUMN,
        )
    }
}

const RECIPE_SUMMARY_QUERY: &str =
    "SELECT id, name, image, cooking_time FROM recipes WHERE id = $1";

pub struct Favorite;

impl RelationKind for Favorite {
    const TABLE: &'static str = "favorites";
    const OWNER_COLUMN: &'static str = "user_id";
    const SUBJECT_COLUMN: &'static str = "recipe_id";
    const SUBJECT_QUERY: &'static str = RECIPE_SUMMARY_QUERY;
    const SUBJECT_MISSING: &'static str = "No recipe exists with specified id";
    const ALREADY_EXISTS: &'static str = "Recipe is already in favorites";
    const NOT_PRESENT: &'static str = "Recipe is not in favorites";

    type Summary = RecipeSummary;
}

pub struct ShoppingCart;

impl RelationKind for ShoppingCart {
    const TABLE: &'static str = "shopping_cart";
    const OWNER_COLUMN: &'static str = "user_id";
    const SUBJECT_COLUMN: &'static str = "recipe_id";
    const SUBJECT_QUERY: &'static str = RECIPE_SUMMARY_QUERY;
    const SUBJECT_MISSING: &'static str = "No recipe exists with specified id";
    const ALREADY_EXISTS: &'static str = "Recipe is already in the shopping cart";
    const NOT_PRESENT: &'static str = "Recipe is not in the shopping cart";

    type Summary = RecipeSummary;
}

pub struct Subscription;

impl RelationKind for Subscription {
    const TABLE: &'static str = "subscriptions";
    const OWNER_COLUMN: &'static str = "user_id";
    const SUBJECT_COLUMN: &'static str = "author_id";
    const SUBJECT_QUERY: &'static str = "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            TRUE AS is_subscribed,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count
        FROM users u
        WHERE u.id = $1
    ";
    const SUBJECT_MISSING: &'static str = "No user exists with specified id";
    const ALREADY_EXISTS: &'static str = "You are already subscribed to this user";
    const NOT_PRESENT: &'static str = "You are not subscribed to this user";

    type Summary = AuthorSummary;

    fn check(owner: Id, subject: Id) -> Result<(), ServiceError> {
        if owner == subject {
            return Err(ServiceError::validation("You cannot subscribe to yourself"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Create,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelationKey {
    pub owner: Id,
    pub subject: Id,
}

#[derive(Debug)]
pub enum RelationOutcome<S> {
    Created { relation: RelationKey, summary: S },
    Removed,
}

impl<S> RelationOutcome<S> {
    pub fn into_summary(self) -> Option<S> {
        match self {
            Self::Created { summary, .. } => Some(summary),
            Self::Removed => None,
        }
    }
}

pub async fn toggle_relation<K: RelationKind>(
    action: ToggleAction,
    owner: Id,
    subject: Id,
    pool: &Pool<Postgres>,
) -> Result<RelationOutcome<K::Summary>, ServiceError> {
    K::check(owner, subject)?;

    match action {
        ToggleAction::Create => {
            let summary = create_relation::<K>(owner, subject, pool).await?;
            Ok(RelationOutcome::Created {
                relation: RelationKey { owner, subject },
                summary,
            })
        }
        ToggleAction::Remove => {
            remove_relation::<K>(owner, subject, pool).await?;
            Ok(RelationOutcome::Removed)
        }
    }
}

async fn create_relation<K: RelationKind>(
    owner: Id,
    subject: Id,
    pool: &Pool<Postgres>,
) -> Result<K::Summary, ServiceError> {
    let mut tx = pool.begin().await?;

    let summary: Option<K::Summary> = sqlx::query_as::<Postgres, K::Summary>(K::SUBJECT_QUERY)
        .bind(subject)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(summary) = summary else {
        return Err(ServiceError::not_found(K::SUBJECT_MISSING));
    };

    let statement = K::insert_statement();
    let result = sqlx::query(&statement)
        .bind(owner)
        .bind(subject)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        log::debug!("{} ({owner}, {subject}) already exists", K::TABLE);
        return Err(ServiceError::Conflict(K::ALREADY_EXISTS.to_string()));
    }

    tx.commit().await?;
    log::info!("Created {} ({owner}, {subject})", K::TABLE);

    Ok(summary)
}

async fn remove_relation<K: RelationKind>(
    owner: Id,
    subject: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ServiceError> {
    let mut tx = pool.begin().await?;

    let summary: Option<K::Summary> = sqlx::query_as::<Postgres, K::Summary>(K::SUBJECT_QUERY)
        .bind(subject)
        .fetch_optional(&mut *tx)
        .await?;

    if summary.is_none() {
        return Err(ServiceError::not_found(K::SUBJECT_MISSING));
    }

    let statement = K::delete_statement();
    let result = sqlx::query(&statement)
        .bind(owner)
        .bind(subject)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        log::debug!("{} ({owner}, {subject}) does not exist", K::TABLE);
        return Err(ServiceError::not_found(K::NOT_PRESENT));
    }

    tx.commit().await?;
    log::info!("Removed {} ({owner}, {subject})", K::TABLE);

    Ok(())
}

pub async fn relation_exists<K: RelationKind>(
    owner: Id,
    subject: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ServiceError> {
    let statement = K::exists_statement();
    let row: (bool,) = sqlx::query_as(&statement)
        .bind(owner)
        .bind(subject)
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_target_the_unique_pair() {
        assert_eq!(
            Favorite::insert_statement(),
            "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT (user_id, recipe_id) DO NOTHING"
        );
        assert_eq!(
            ShoppingCart::delete_statement(),
            "DELETE FROM shopping_cart WHERE user_id = $1 AND recipe_id = $2"
        );
        assert_eq!(
            Subscription::exists_statement(),
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1 AND author_id = $2)"
        );
    }

    #[test]
    fn self_subscription_is_rejected() {
        let result = Subscription::check(7, 7);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(Subscription::check(7, 8).is_ok());
    }

    #[test]
    fn recipe_relations_allow_own_recipes() {
        assert!(Favorite::check(1, 1).is_ok());
        assert!(ShoppingCart::check(1, 1).is_ok());
    }

    #[tokio::test]
    async fn self_subscription_fails_before_storage() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .expect("lazy pool");

        for action in [ToggleAction::Create, ToggleAction::Remove] {
            let result = toggle_relation::<Subscription>(action, 3, 3, &pool).await;
            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }
    }
}
