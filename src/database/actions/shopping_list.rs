use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::{Pool, Postgres};

use crate::{
    constants::SHOPPING_LIST_HEADER,
    error::ServiceError,
    schema::{CartIngredientRow, Id},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

pub async fn fetch_cart_ingredients(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredientRow>, ServiceError> {
    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ia.amount AS amount
        FROM shopping_cart c
        INNER JOIN ingredient_amounts ia ON ia.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sums amounts per (name, unit), ordered by name and then unit.
pub fn aggregate_shopping_list(rows: Vec<CartIngredientRow>) -> Vec<ShoppingListItem> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for row in rows {
        *totals.entry((row.name, row.measurement_unit)).or_insert(0) += i64::from(row.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total)| ShoppingListItem {
            name,
            measurement_unit,
            total,
        })
        .collect()
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut text = format!("{SHOPPING_LIST_HEADER}\n");

    for (index, item) in items.iter().enumerate() {
        text.push_str(&format!(
            "{}. {} ({}) — {}\n",
            index + 1,
            item.name,
            item.measurement_unit,
            item.total
        ));
    }

    text
}

pub async fn build_shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, ServiceError> {
    let rows = fetch_cart_ingredients(user_id, pool).await?;
    Ok(aggregate_shopping_list(rows))
}

pub fn shopping_list_filename(username: &str) -> String {
    format!("{username}_shopping_list.txt")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> CartIngredientRow {
        CartIngredientRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn single_recipe_cart() {
        let items = aggregate_shopping_list(vec![row("flour", "g", 200)]);

        assert_eq!(
            render_shopping_list(&items),
            "Список покупок:\n1. flour (g) — 200\n"
        );
    }

    #[test]
    fn same_ingredient_from_two_recipes_is_summed() {
        let items = aggregate_shopping_list(vec![
            row("sugar", "g", 50),
            row("flour", "g", 200),
            row("flour", "g", 300),
        ]);

        assert_eq!(
            items,
            vec![
                ShoppingListItem {
                    name: String::from("flour"),
                    measurement_unit: String::from("g"),
                    total: 500,
                },
                ShoppingListItem {
                    name: String::from("sugar"),
                    measurement_unit: String::from("g"),
                    total: 50,
                },
            ]
        );
    }

    #[test]
    fn aggregation_ignores_row_order() {
        let rows = vec![
            row("milk", "ml", 250),
            row("eggs", "pcs", 2),
            row("milk", "ml", 100),
            row("butter", "g", 30),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        assert_eq!(
            render_shopping_list(&aggregate_shopping_list(rows)),
            render_shopping_list(&aggregate_shopping_list(reversed))
        );
    }

    #[test]
    fn different_units_stay_separate() {
        let items = aggregate_shopping_list(vec![row("salt", "g", 5), row("salt", "pinch", 1)]);

        assert_eq!(
            render_shopping_list(&items),
            "Список покупок:\n1. salt (g) — 5\n2. salt (pinch) — 1\n"
        );
    }

    #[test]
    fn totals_do_not_overflow_small_amounts() {
        let rows = (0..10).map(|_| row("water", "ml", 32000)).collect();
        let items = aggregate_shopping_list(rows);

        assert_eq!(items[0].total, 320_000);
    }

    #[test]
    fn empty_cart_renders_header_only() {
        let items = aggregate_shopping_list(vec![]);
        assert_eq!(render_shopping_list(&items), "Список покупок:\n");
    }

    #[test]
    fn filename_uses_username() {
        assert_eq!(shopping_list_filename("alice"), "alice_shopping_list.txt");
    }
}
