use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::AppResult;

/// One (ingredient, amount) requirement taken from a single recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Aggregated total for one ingredient identity across the whole cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Read access to a user's cart, injected by the caller.
///
/// Handlers pass the application store; tests pass a mock. The aggregator
/// never reaches into ambient state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartSource: Send + Sync {
    /// Recipe ids currently in the user's cart. A recipe appears at most
    /// once per cart.
    async fn cart_recipe_ids(&self, user_id: i64) -> AppResult<Vec<i64>>;

    /// Ingredient requirements of one recipe, joined with the catalog.
    async fn ingredient_lines(&self, recipe_id: i64) -> AppResult<Vec<IngredientLine>>;
}

/// Sums ingredient amounts across every recipe in the user's cart.
///
/// Lines are grouped by (name, measurement_unit); the same name under two
/// different units stays two separate items. Totals are widened to i64 so
/// pathological carts cannot wrap the stored i32 amounts. The BTreeMap key
/// gives the deterministic ordering: ascending code-point order on name,
/// ties broken by unit.
pub async fn build_shopping_list<S>(source: &S, user_id: i64) -> AppResult<Vec<ShoppingListItem>>
where
    S: CartSource + ?Sized,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for recipe_id in source.cart_recipe_ids(user_id).await? {
        for line in source.ingredient_lines(recipe_id).await? {
            *totals
                .entry((line.name, line.measurement_unit))
                .or_insert(0) += i64::from(line.amount);
        }
    }

    Ok(totals
        .into_iter()
        .map(|((name, measurement_unit), total)| ShoppingListItem {
            name,
            measurement_unit,
            total,
        })
        .collect())
}

/// Renders the aggregated list as the downloadable plain-text body,
/// one `name (unit) — total` line per item, no trailing newline.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} ({}) — {}", item.name, item.measurement_unit, item.total))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn line(name: &str, unit: &str, amount: i32) -> IngredientLine {
        IngredientLine {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn empty_cart_produces_empty_list() {
        let mut source = MockCartSource::new();
        source
            .expect_cart_recipe_ids()
            .with(eq(7))
            .returning(|_| Ok(Vec::new()));

        let items = build_shopping_list(&source, 7).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(render_shopping_list(&items), "");
    }

    #[tokio::test]
    async fn recipe_without_lines_contributes_nothing() {
        let mut source = MockCartSource::new();
        source
            .expect_cart_recipe_ids()
            .returning(|_| Ok(vec![1]));
        source
            .expect_ingredient_lines()
            .with(eq(1))
            .returning(|_| Ok(Vec::new()));

        let items = build_shopping_list(&source, 7).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(render_shopping_list(&items), "");
    }

    #[tokio::test]
    async fn shared_ingredients_merge_into_one_line() {
        let mut source = MockCartSource::new();
        source
            .expect_cart_recipe_ids()
            .returning(|_| Ok(vec![1, 2]));
        source
            .expect_ingredient_lines()
            .with(eq(1))
            .returning(|_| Ok(vec![line("flour", "g", 200)]));
        source
            .expect_ingredient_lines()
            .with(eq(2))
            .returning(|_| Ok(vec![line("flour", "g", 150), line("sugar", "g", 50)]));

        let items = build_shopping_list(&source, 7).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "flour");
        assert_eq!(items[0].total, 350);
        assert_eq!(items[1].name, "sugar");
        assert_eq!(items[1].total, 50);

        assert_eq!(
            render_shopping_list(&items),
            "flour (g) — 350\nsugar (g) — 50"
        );
    }

    #[tokio::test]
    async fn same_name_different_unit_stays_separate() {
        let mut source = MockCartSource::new();
        source
            .expect_cart_recipe_ids()
            .returning(|_| Ok(vec![1]));
        source
            .expect_ingredient_lines()
            .with(eq(1))
            .returning(|_| Ok(vec![line("milk", "ml", 500), line("milk", "tbsp", 2)]));

        let items = build_shopping_list(&source, 7).await.unwrap();
        assert_eq!(items.len(), 2);
        // Same name sorts by unit
        assert_eq!(items[0].measurement_unit, "ml");
        assert_eq!(items[1].measurement_unit, "tbsp");
    }

    #[tokio::test]
    async fn output_is_sorted_by_name() {
        let mut source = MockCartSource::new();
        source
            .expect_cart_recipe_ids()
            .returning(|_| Ok(vec![1]));
        source.expect_ingredient_lines().with(eq(1)).returning(|_| {
            Ok(vec![
                line("zucchini", "pcs", 2),
                line("apple", "pcs", 3),
                line("flour", "g", 100),
            ])
        });

        let items = build_shopping_list(&source, 7).await.unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "flour", "zucchini"]);
    }

    #[tokio::test]
    async fn totals_do_not_wrap_at_i32() {
        let mut source = MockCartSource::new();
        source
            .expect_cart_recipe_ids()
            .returning(|_| Ok((1..=200_000).collect()));
        source
            .expect_ingredient_lines()
            .returning(|_| Ok(vec![line("salt", "g", 32000)]));

        let items = build_shopping_list(&source, 7).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total, 200_000 * 32_000i64);
    }

    #[test]
    fn render_uses_em_dash_separator() {
        let items = vec![ShoppingListItem {
            name: "flour".to_string(),
            measurement_unit: "g".to_string(),
            total: 350,
        }];
        assert_eq!(render_shopping_list(&items), "flour (g) — 350");
    }
}
