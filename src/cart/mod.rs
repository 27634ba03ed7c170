//! Cart execution engine: fan the approved ingredient list out to the
//! resolver concurrently and aggregate the results.
//!
//! Product extraction is pre-batched into one text-generation call covering
//! every approved line; lines the batch output misses fall back to per-line
//! extraction inside their own resolver task. A failure in one item never
//! aborts or delays its siblings.

pub mod resolver;

use crate::error::Result;
use crate::llmtext;
use crate::ports::{Ports, TextGeneration};
use crate::workflow::state::{
    ChatMessage, ItemStatus, OrderResult, RawIngredient, StatePatch, WorkflowState,
};
use futures::future::join_all;
use resolver::{ExtractedProduct, ResolveContext};
use std::collections::HashMap;
use tracing::{debug, warn};

pub(crate) async fn run(ports: &Ports, state: &WorkflowState) -> Result<StatePatch> {
    let approved = &state.approved_cart;
    let ctx = ResolveContext {
        fulfillment: state.fulfillment_method,
        store_location_id: state.preferred_store_id.clone(),
    };
    debug!(
        "executing order: {} items, fulfillment {:?}, store {:?}",
        approved.len(),
        ctx.fulfillment,
        ctx.store_location_id
    );

    let batch = batch_extract(ports.text_gen.as_ref(), approved).await;

    let tasks = approved.iter().map(|item| {
        let pre_extracted = batch.get(&item.original_text).cloned();
        resolver::resolve_ingredient(ports, &ctx, item, pre_extracted)
    });
    let nested = join_all(tasks).await;

    let items: Vec<_> = nested.into_iter().flatten().collect();

    let mut messages = vec![ChatMessage::assistant(
        "I've processed your order request with the retailer. Check the summary for details!",
    )];
    let all_unreachable = !items.is_empty()
        && items
            .iter()
            .all(|i| matches!(i.status, ItemStatus::SearchFailed | ItemStatus::Error));
    if all_unreachable {
        messages.push(ChatMessage::assistant(
            "I couldn't reach the retailer for any of your items. \
             Please check your retailer credentials and try again.",
        ));
    }

    Ok(StatePatch {
        order_result: Some(OrderResult { items }),
        messages,
        ..Default::default()
    })
}

/// Extract (product, quantity) pairs for every ingredient line in a single
/// text-generation call. Returns an empty map on any failure; callers fall
/// back to per-line extraction.
async fn batch_extract(
    text_gen: &dyn TextGeneration,
    items: &[RawIngredient],
) -> HashMap<String, Vec<ExtractedProduct>> {
    if items.is_empty() {
        return HashMap::new();
    }

    let lines: Vec<&str> = items.iter().map(|i| i.original_text.as_str()).collect();
    let prompt = format!(
        "Extract product names and quantities for these recipe ingredients.\n\n\
         For EACH ingredient, return the grocery store search term and quantity to buy.\n\n\
         RULES:\n\
         - Use American grocery store product names\n\
         - For produce, prefix with \"fresh\" (e.g., \"fresh cilantro\", \"fresh green onions\")\n\
         - BEANS: Default to CANNED unless it says \"dry/dried\" (e.g., \"black beans\" -> \"canned black beans\")\n\
         - Quantity = number of PACKAGES to buy, not recipe amount:\n\
           - \"6 scallions\" -> quantity 1 (one bunch)\n\
           - \"3 cloves garlic\" -> quantity 1 (one head)\n\
           - \"2 cans tomatoes\" -> quantity 2\n\
           - \"1 cup beans\" -> quantity 1 (one can)\n\n\
         Ingredients:\n{}\n\n\
         Return a JSON object where keys are the original ingredient strings and values are \
         arrays of {{\"product\": str, \"quantity\": int}}.\n\
         Example: {{\"1 onion, diced\": [{{\"product\": \"yellow onion\", \"quantity\": 1}}], \
         \"salt and pepper\": [{{\"product\": \"salt\", \"quantity\": 1}}, \
         {{\"product\": \"black pepper\", \"quantity\": 1}}]}}\n\n\
         Return ONLY the JSON object.",
        serde_json::to_string_pretty(&lines).unwrap_or_default()
    );

    let completion = match text_gen.complete(&prompt).await {
        Ok(completion) => completion,
        Err(e) => {
            warn!("batch extraction failed, falling back to per-line extraction: {e}");
            return HashMap::new();
        }
    };

    match llmtext::parse_json::<HashMap<String, resolver::OneOrMany>>(&completion) {
        Some(parsed) => parsed
            .into_iter()
            .map(|(line, products)| (line, products.into_vec()))
            .collect(),
        None => {
            warn!("batch extraction output was unparsable, falling back to per-line extraction");
            HashMap::new()
        }
    }
}
