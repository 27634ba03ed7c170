//! Fetch stage: pull full recipe payloads for the user's selections.
//!
//! Library recipes are fetched by slug. Web recipes go through the store's
//! URL importer first, then are fetched by the slug the import returns, so
//! every selection ends up in the user's library.

use crate::error::Result;
use crate::ports::{Ports, RecipeDetail};
use crate::workflow::state::{
    ChatMessage, RawIngredient, RecipeOption, RecipeSource, StatePatch, WorkflowState,
};
use tracing::warn;

pub(crate) async fn run(ports: &Ports, state: &WorkflowState) -> Result<StatePatch> {
    let selected = &state.selected_recipe_options;
    if selected.is_empty() {
        return Ok(StatePatch::with_messages(vec![ChatMessage::assistant(
            "No recipes were selected. Please select at least one recipe.",
        )]));
    }

    let mut fetched_recipes = Vec::new();
    let mut raw_ingredients = Vec::new();
    let mut messages = Vec::new();

    for option in selected {
        let recipe = match option.source {
            RecipeSource::RecipeStore => fetch_library_recipe(ports, option).await,
            RecipeSource::Web => {
                let recipe = import_web_recipe(ports, option).await;
                if let Some(recipe) = &recipe {
                    messages.push(ChatMessage::assistant(format!(
                        "Imported '{}' from the web and saved it to your recipe library!",
                        recipe.name
                    )));
                }
                recipe
            }
        };

        if let Some(recipe) = recipe {
            raw_ingredients.extend(flatten_ingredients(&recipe));
            fetched_recipes.push(recipe);
        }
    }

    if fetched_recipes.is_empty() {
        return Ok(StatePatch::with_messages(vec![ChatMessage::assistant(
            "Couldn't fetch any of the selected recipes. Please try again.",
        )]));
    }

    Ok(StatePatch {
        fetched_recipes: Some(fetched_recipes),
        raw_ingredients: Some(raw_ingredients),
        messages,
        ..Default::default()
    })
}

async fn fetch_library_recipe(ports: &Ports, option: &RecipeOption) -> Option<RecipeDetail> {
    let slug = option.slug.as_deref()?;
    match ports.recipe_store.get_detail(slug).await {
        Ok(recipe) => Some(recipe),
        Err(e) => {
            warn!("failed to fetch recipe {slug}: {e}");
            None
        }
    }
}

async fn import_web_recipe(ports: &Ports, option: &RecipeOption) -> Option<RecipeDetail> {
    let slug = match ports.recipe_store.create_from_url(&option.url, true).await {
        Ok(slug) => slug,
        Err(e) => {
            warn!("could not import recipe from {}: {e}", option.url);
            return None;
        }
    };
    match ports.recipe_store.get_detail(&slug).await {
        Ok(recipe) => Some(recipe),
        Err(e) => {
            warn!("failed to fetch imported recipe {slug}: {e}");
            None
        }
    }
}

fn flatten_ingredients(recipe: &RecipeDetail) -> Vec<RawIngredient> {
    recipe
        .ingredients
        .iter()
        .filter_map(|i| i.purchase_text())
        .map(|original_text| RawIngredient {
            original_text,
            recipe_name: recipe.name.clone(),
        })
        .collect()
}
