//! Filter stage: partition ingredients into pantry staples and the pending
//! cart.
//!
//! Staple matching is a case-insensitive word-boundary search so that "ice"
//! never matches "sliced". The partition is exact: every raw ingredient
//! lands in exactly one of the two lists.

use crate::config::PantryConfig;
use crate::error::Result;
use crate::workflow::state::{ChatMessage, RawIngredient, StatePatch, WorkflowState};
use regex::Regex;
use tracing::warn;

const PREVIEW_LIMIT: usize = 5;

pub(crate) fn run(pantry: &PantryConfig, state: &WorkflowState) -> Result<StatePatch> {
    let (pantry_items, pending_cart) =
        partition_ingredients(&state.raw_ingredients, &pantry.bypass_staples);

    let mut messages = Vec::new();
    if !pending_cart.is_empty() {
        let mut preview = pending_cart
            .iter()
            .take(PREVIEW_LIMIT)
            .map(|i| i.original_text.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if pending_cart.len() > PREVIEW_LIMIT {
            preview.push_str("...");
        }
        messages.push(ChatMessage::assistant(format!(
            "I've prepared a list of ingredients for your approval, including: {preview}"
        )));
    }

    Ok(StatePatch {
        pantry_items: Some(pantry_items),
        pending_cart: Some(pending_cart),
        messages,
        ..Default::default()
    })
}

/// Split ingredients by the staple predicate. Returns (pantry, cart).
pub fn partition_ingredients(
    ingredients: &[RawIngredient],
    staples: &[String],
) -> (Vec<RawIngredient>, Vec<RawIngredient>) {
    let matchers: Vec<Regex> = staples
        .iter()
        .filter_map(|staple| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(staple));
            match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("skipping unusable staple pattern '{staple}': {e}");
                    None
                }
            }
        })
        .collect();

    let mut pantry_items = Vec::new();
    let mut pending_cart = Vec::new();
    for item in ingredients {
        if matchers.iter().any(|re| re.is_match(&item.original_text)) {
            pantry_items.push(item.clone());
        } else {
            pending_cart.push(item.clone());
        }
    }
    (pantry_items, pending_cart)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredients(texts: &[&str]) -> Vec<RawIngredient> {
        texts
            .iter()
            .map(|t| RawIngredient {
                original_text: t.to_string(),
                recipe_name: "Test".to_string(),
            })
            .collect()
    }

    fn staples(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn staples_go_to_pantry_everything_else_to_cart() {
        let (pantry, cart) = partition_ingredients(
            &ingredients(&["1/4 tsp salt", "1 lb shrimp"]),
            &staples(&["salt", "pepper"]),
        );
        assert_eq!(pantry.len(), 1);
        assert_eq!(pantry[0].original_text, "1/4 tsp salt");
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].original_text, "1 lb shrimp");
    }

    #[test]
    fn word_boundary_prevents_substring_false_positives() {
        // "ice" must not match inside "sliced".
        let (pantry, cart) = partition_ingredients(
            &ingredients(&["2 sliced onions", "crushed ice"]),
            &staples(&["ice"]),
        );
        assert_eq!(pantry.len(), 1);
        assert_eq!(pantry[0].original_text, "crushed ice");
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let (pantry, cart) = partition_ingredients(
            &ingredients(&["Olive Oil, extra virgin"]),
            &staples(&["olive oil"]),
        );
        assert_eq!(pantry.len(), 1);
        assert!(cart.is_empty());
    }

    #[test]
    fn partition_covers_all_inputs_exactly_once() {
        let input = ingredients(&["salt", "pepper", "shrimp", "linguine", "lemon"]);
        let (pantry, cart) = partition_ingredients(&input, &staples(&["salt", "pepper"]));
        assert_eq!(pantry.len() + cart.len(), input.len());
        for item in &input {
            let in_pantry = pantry.contains(item);
            let in_cart = cart.contains(item);
            assert!(in_pantry ^ in_cart, "{} must be in exactly one list", item.original_text);
        }
    }

    #[test]
    fn empty_input_yields_empty_partition() {
        let (pantry, cart) = partition_ingredients(&[], &staples(&["salt"]));
        assert!(pantry.is_empty());
        assert!(cart.is_empty());
    }

    #[test]
    fn no_staples_sends_everything_to_cart() {
        let (pantry, cart) = partition_ingredients(&ingredients(&["salt", "shrimp"]), &[]);
        assert!(pantry.is_empty());
        assert_eq!(cart.len(), 2);
    }
}
