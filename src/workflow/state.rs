//! Workflow state and the typed state-patch merge.
//!
//! One `WorkflowState` exists per conversation thread. Stages are pure
//! functions from state to a `StatePatch`; patches merge additively with a
//! documented per-field strategy: `messages` appends, every other field is
//! replaced wholesale when the patch sets it.

use crate::ports::{FulfillmentMethod, RecipeDetail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One chat turn. The workflow appends assistant turns; the caller appends
/// user turns via `invoke`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeSource {
    RecipeStore,
    Web,
}

/// A candidate recipe offered to the user after the search stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeOption {
    pub name: String,
    pub source: RecipeSource,
    pub url: String,
    pub slug: Option<String>,
    pub description: String,
    pub image_url: Option<String>,
}

/// One ingredient line, flattened out of a fetched recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIngredient {
    pub original_text: String,
    pub recipe_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Committed to the retailer cart.
    Added,
    /// The add-to-cart call itself failed.
    Failed,
    /// Product search returned no candidates.
    NotFound,
    /// Candidates existed but none was eligible and in stock.
    Unavailable,
    /// Product search could not be performed.
    SearchFailed,
    /// The retailer reported an error for this item.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item: String,
    pub quantity: u32,
    pub product: Option<String>,
    pub status: ItemStatus,
    pub error: Option<String>,
}

/// Terminal artifact of the execute stage: one entry per submitted product,
/// in no guaranteed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OrderResult {
    pub items: Vec<OrderItem>,
}

/// The full per-thread workflow state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowState {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub target_recipe_names: Vec<String>,
    #[serde(default)]
    pub recipe_options: Vec<RecipeOption>,
    #[serde(default)]
    pub selected_recipe_options: Vec<RecipeOption>,
    #[serde(default)]
    pub fetched_recipes: Vec<RecipeDetail>,
    #[serde(default)]
    pub raw_ingredients: Vec<RawIngredient>,
    #[serde(default)]
    pub pantry_items: Vec<RawIngredient>,
    #[serde(default)]
    pub pending_cart: Vec<RawIngredient>,
    #[serde(default)]
    pub approved_cart: Vec<RawIngredient>,
    #[serde(default)]
    pub fulfillment_method: FulfillmentMethod,
    #[serde(default)]
    pub preferred_store_id: Option<String>,
    #[serde(default)]
    pub order_result: Option<OrderResult>,
}

impl WorkflowState {
    /// Apply a stage or caller patch: append messages, replace everything
    /// else the patch sets.
    pub fn apply(&mut self, patch: StatePatch) {
        self.messages.extend(patch.messages);
        if let Some(v) = patch.target_recipe_names {
            self.target_recipe_names = v;
        }
        if let Some(v) = patch.recipe_options {
            self.recipe_options = v;
        }
        if let Some(v) = patch.selected_recipe_options {
            self.selected_recipe_options = v;
        }
        if let Some(v) = patch.fetched_recipes {
            self.fetched_recipes = v;
        }
        if let Some(v) = patch.raw_ingredients {
            self.raw_ingredients = v;
        }
        if let Some(v) = patch.pantry_items {
            self.pantry_items = v;
        }
        if let Some(v) = patch.pending_cart {
            self.pending_cart = v;
        }
        if let Some(v) = patch.approved_cart {
            self.approved_cart = v;
        }
        if let Some(v) = patch.fulfillment_method {
            self.fulfillment_method = v;
        }
        if let Some(v) = patch.preferred_store_id {
            self.preferred_store_id = Some(v);
        }
        if let Some(v) = patch.order_result {
            self.order_result = Some(v);
        }
    }

    /// Start a new planning cycle: clear cycle-scoped fields, keep the chat
    /// history and long-lived settings.
    pub fn reset_cycle(&mut self) {
        self.target_recipe_names.clear();
        self.recipe_options.clear();
        self.selected_recipe_options.clear();
        self.fetched_recipes.clear();
        self.raw_ingredients.clear();
        self.pantry_items.clear();
        self.pending_cart.clear();
        self.approved_cart.clear();
        self.order_result = None;
    }

    /// Most recent user turn, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text.as_str())
    }
}

/// A typed partial update to `WorkflowState`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatePatch {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub target_recipe_names: Option<Vec<String>>,
    #[serde(default)]
    pub recipe_options: Option<Vec<RecipeOption>>,
    #[serde(default)]
    pub selected_recipe_options: Option<Vec<RecipeOption>>,
    #[serde(default)]
    pub fetched_recipes: Option<Vec<RecipeDetail>>,
    #[serde(default)]
    pub raw_ingredients: Option<Vec<RawIngredient>>,
    #[serde(default)]
    pub pantry_items: Option<Vec<RawIngredient>>,
    #[serde(default)]
    pub pending_cart: Option<Vec<RawIngredient>>,
    #[serde(default)]
    pub approved_cart: Option<Vec<RawIngredient>>,
    #[serde(default)]
    pub fulfillment_method: Option<FulfillmentMethod>,
    #[serde(default)]
    pub preferred_store_id: Option<String>,
    #[serde(default)]
    pub order_result: Option<OrderResult>,
}

impl StatePatch {
    /// A patch carrying only chat messages.
    pub fn with_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(text: &str) -> RawIngredient {
        RawIngredient {
            original_text: text.to_string(),
            recipe_name: "Test Recipe".to_string(),
        }
    }

    #[test]
    fn messages_append_while_other_fields_replace() {
        let mut state = WorkflowState::default();
        state.messages.push(ChatMessage::user("make pizza"));
        state.pending_cart = vec![ingredient("1 lb flour")];

        state.apply(StatePatch {
            messages: vec![ChatMessage::assistant("found recipes")],
            pending_cart: Some(vec![ingredient("2 cups sauce")]),
            ..Default::default()
        });

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.pending_cart.len(), 1);
        assert_eq!(state.pending_cart[0].original_text, "2 cups sauce");
    }

    #[test]
    fn empty_patch_changes_nothing_but_messages() {
        let mut state = WorkflowState {
            target_recipe_names: vec!["Pizza".to_string()],
            ..Default::default()
        };
        state.apply(StatePatch::default());
        assert_eq!(state.target_recipe_names, vec!["Pizza"]);
        assert!(state.messages.is_empty());
    }

    #[test]
    fn cycle_reset_keeps_chat_and_settings() {
        let mut state = WorkflowState {
            messages: vec![ChatMessage::user("make soup")],
            target_recipe_names: vec!["Soup".to_string()],
            raw_ingredients: vec![ingredient("1 onion")],
            pantry_items: vec![ingredient("salt")],
            order_result: Some(OrderResult::default()),
            preferred_store_id: Some("store-1".to_string()),
            fulfillment_method: FulfillmentMethod::Delivery,
            ..Default::default()
        };

        state.reset_cycle();

        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.preferred_store_id.as_deref(), Some("store-1"));
        assert_eq!(state.fulfillment_method, FulfillmentMethod::Delivery);
        assert!(state.target_recipe_names.is_empty());
        assert!(state.raw_ingredients.is_empty());
        assert!(state.pantry_items.is_empty());
        assert!(state.order_result.is_none());
    }

    #[test]
    fn last_user_message_skips_assistant_turns() {
        let state = WorkflowState {
            messages: vec![
                ChatMessage::user("make pizza"),
                ChatMessage::assistant("found options"),
            ],
            ..Default::default()
        };
        assert_eq!(state.last_user_message(), Some("make pizza"));
    }
}
