//! Recipe crafting against an inventory ledger.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use wavefall_common::{CoreError, ItemId, RecipeId};

use crate::catalog::{GameCatalog, RecipeDef};
use crate::inventory::{Inventory, InventoryError};

/// Crafting error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CraftingError {
    /// Recipe not found
    #[error("Recipe not found: {0}")]
    RecipeNotFound(RecipeId),
    /// Missing specific ingredient
    #[error("Missing ingredient: {item}, need {needed}, have {have}")]
    MissingIngredient {
        /// Item that's missing
        item: ItemId,
        /// Amount needed
        needed: u32,
        /// Amount available
        have: u32,
    },
    /// Level too low
    #[error("Level too low: need {required}, have {current}")]
    LevelTooLow {
        /// Required player level
        required: u32,
        /// Current player level
        current: u32,
    },
    /// Inventory error
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),
}

impl From<CraftingError> for CoreError {
    fn from(err: CraftingError) -> Self {
        match err {
            CraftingError::RecipeNotFound(_) => Self::ContentDataMissing(err.to_string()),
            CraftingError::LevelTooLow { .. } => Self::InvalidAction(err.to_string()),
            CraftingError::MissingIngredient { .. } | CraftingError::Inventory(_) => {
                Self::InsufficientResource(err.to_string())
            },
        }
    }
}

/// Result type for crafting operations.
pub type CraftingResult<T> = Result<T, CraftingError>;

/// Validates and executes catalog recipes.
#[derive(Debug, Clone)]
pub struct CraftingEngine {
    catalog: Arc<GameCatalog>,
}

impl CraftingEngine {
    /// Creates a crafting engine over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<GameCatalog>) -> Self {
        Self { catalog }
    }

    /// Gets a recipe by ID.
    #[must_use]
    pub fn recipe(&self, id: &str) -> Option<&RecipeDef> {
        self.catalog.recipe(id)
    }

    /// Checks whether a recipe can be crafted.
    ///
    /// Returns `Ok(())` if all requirements are met, or the first failing
    /// requirement in check order: recipe, level, then ingredients.
    pub fn can_craft(&self, recipe_id: &str, inventory: &Inventory, level: u32) -> CraftingResult<()> {
        let recipe = self
            .recipe(recipe_id)
            .ok_or_else(|| CraftingError::RecipeNotFound(RecipeId::new(recipe_id)))?;

        if level < recipe.required_level {
            return Err(CraftingError::LevelTooLow {
                required: recipe.required_level,
                current: level,
            });
        }

        // An item listed more than once is checked against its total
        for (index, ingredient) in recipe.ingredients.iter().enumerate() {
            let item = &ingredient.item_id;
            if recipe.ingredients[..index].iter().any(|earlier| earlier.item_id == *item) {
                continue;
            }
            let needed = recipe
                .ingredients
                .iter()
                .filter(|other| other.item_id == *item)
                .fold(0_u32, |total, other| total.saturating_add(other.quantity));
            let have = inventory.count(item.as_str());
            if have < needed {
                return Err(CraftingError::MissingIngredient {
                    item: item.clone(),
                    needed,
                    have,
                });
            }
        }

        Ok(())
    }

    /// Executes a craft operation.
    ///
    /// Either every ingredient is consumed and the result added, or the
    /// inventory is left untouched.
    pub fn craft_item(&self, recipe_id: &str, inventory: &mut Inventory, level: u32) -> CraftingResult<ItemId> {
        self.can_craft(recipe_id, inventory, level)?;

        let recipe = self
            .recipe(recipe_id)
            .ok_or_else(|| CraftingError::RecipeNotFound(RecipeId::new(recipe_id)))?;

        // Stage on a copy so a recipe listing the same item twice cannot
        // leave a half-consumed ledger behind.
        let mut staged = inventory.clone();
        for ingredient in &recipe.ingredients {
            staged.remove(ingredient.item_id.as_str(), ingredient.quantity)?;
        }
        staged.add(recipe.result.clone(), recipe.result_quantity);
        *inventory = staged;

        debug!(
            "Crafted {} x{} from recipe {}",
            recipe.result, recipe.result_quantity, recipe.id
        );
        Ok(recipe.result.clone())
    }

    /// Recipes craftable right now.
    pub fn available_recipes<'a>(
        &'a self,
        inventory: &'a Inventory,
        level: u32,
    ) -> impl Iterator<Item = &'a RecipeDef> {
        self.catalog
            .recipes()
            .iter()
            .filter(move |r| self.can_craft(r.id.as_str(), inventory, level).is_ok())
    }
}
