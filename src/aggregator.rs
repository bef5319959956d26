//! Shopping list aggregation
//!
//! Folds the ingredient lines of a set of recipes into one consolidated
//! shopping list with exactly one entry per ingredient name.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::AppError;

/// One ingredient row of one recipe, as supplied by recipe storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredientLine {
    pub name: String,
    pub unit: String,
    pub amount: u32,
}

impl RecipeIngredientLine {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, amount: u32) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            amount,
        }
    }
}

/// A consolidated shopping list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedIngredient {
    pub name: String,
    pub unit: String,
    pub total_amount: u64,
}

/// Anything that can hand out the ingredient rows of a set of recipes.
///
/// Ids with no stored recipe contribute no rows.
pub trait IngredientLineSource {
    fn lines_for(&self, recipe_ids: &BTreeSet<u64>) -> Result<Vec<RecipeIngredientLine>, AppError>;
}

/// Ordered, deduplicated list of ingredients to buy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShoppingList {
    items: Vec<AggregatedIngredient>,
}

impl ShoppingList {
    /// Fetches the lines of `recipe_ids` from `source` and aggregates them.
    pub fn for_recipes<S>(source: &S, recipe_ids: &BTreeSet<u64>) -> Result<Self, AppError>
    where
        S: IngredientLineSource + ?Sized,
    {
        if recipe_ids.is_empty() {
            return Ok(Self::default());
        }
        Ok(aggregate(source.lines_for(recipe_ids)?))
    }

    pub fn items(&self) -> &[AggregatedIngredient] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Merges lines by ingredient name, summing amounts.
///
/// Each name appears once in the output, sorted by name. The unit is the
/// first one seen for that name; a later line with a different unit is still
/// added to the total and logged as a unit conflict.
pub fn aggregate<I>(lines: I) -> ShoppingList
where
    I: IntoIterator<Item = RecipeIngredientLine>,
{
    let mut totals: BTreeMap<String, (String, u64)> = BTreeMap::new();
    for line in lines {
        match totals.get_mut(&line.name) {
            Some((unit, total)) => {
                if *unit != line.unit {
                    warn!(
                        ingredient = %line.name,
                        kept_unit = %unit,
                        conflicting_unit = %line.unit,
                        "ingredient listed with different units, amounts summed under the first"
                    );
                }
                *total += u64::from(line.amount);
            }
            None => {
                totals.insert(line.name, (line.unit, u64::from(line.amount)));
            }
        }
    }

    let items = totals
        .into_iter()
        .map(|(name, (unit, total_amount))| AggregatedIngredient {
            name,
            unit,
            total_amount,
        })
        .collect();

    ShoppingList { items }
}

impl fmt::Display for ShoppingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{} ({}) — {}", item.name, item.unit, item.total_amount)?;
        }
        Ok(())
    }
}
