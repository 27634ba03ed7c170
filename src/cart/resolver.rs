//! Ingredient resolver: one ingredient line in, zero or more cart entries
//! out.
//!
//! Per line: extract purchasable (search term, quantity) pairs, search the
//! retailer catalog, rank the candidates, pick the first eligible one with
//! an explicit stock level (falling back to a candidate with no stock
//! listing as a substitution), and commit it to the cart. Every failure is
//! captured as the entry's status; nothing here aborts a sibling entry.

use crate::error::CapabilityError;
use crate::llmtext;
use crate::ports::{FulfillmentMethod, Ports, Product, StockReport, TextGeneration};
use crate::workflow::state::{ItemStatus, OrderItem, RawIngredient};
use serde::Deserialize;
use tracing::{debug, warn};

/// Bounded product search result count.
const SEARCH_LIMIT: usize = 10;
/// How many ranked candidates the availability scan considers.
const MAX_CANDIDATES: usize = 8;

/// Per-order context threaded through every resolution.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub fulfillment: FulfillmentMethod,
    pub store_location_id: Option<String>,
}

/// One purchasable product extracted from an ingredient line.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedProduct {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

impl ExtractedProduct {
    fn into_order(self, fallback_term: &str) -> (String, u32) {
        let term = self
            .product
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| fallback_term.to_string());
        let quantity = self.quantity.unwrap_or(1).max(1) as u32;
        (term, quantity)
    }
}

/// Extraction output is a single object for simple lines and an array for
/// lines naming several products ("salt and pepper").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(ExtractedProduct),
    Many(Vec<ExtractedProduct>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<ExtractedProduct> {
        match self {
            OneOrMany::One(p) => vec![p],
            OneOrMany::Many(ps) => ps,
        }
    }
}

/// Resolve one ingredient line into cart entries, committing each to the
/// retailer cart. One line can yield multiple entries.
pub async fn resolve_ingredient(
    ports: &Ports,
    ctx: &ResolveContext,
    item: &RawIngredient,
    pre_extracted: Option<Vec<ExtractedProduct>>,
) -> Vec<OrderItem> {
    let line = &item.original_text;
    debug!("resolving ingredient: {line}");

    let products_to_order: Vec<(String, u32)> = match pre_extracted {
        Some(extracted) if !extracted.is_empty() => extracted
            .into_iter()
            .map(|p| p.into_order(line))
            .collect(),
        _ => extract_products(ports.text_gen.as_ref(), line).await,
    };

    let mut results = Vec::new();
    for (term, quantity) in products_to_order {
        results.push(resolve_product(ports, ctx, &term, quantity).await);
    }
    results
}

/// Extract (search term, quantity) pairs from a single ingredient line.
/// Never fails: unparsable output degrades to the raw line with quantity 1.
async fn extract_products(text_gen: &dyn TextGeneration, line: &str) -> Vec<(String, u32)> {
    let prompt = format!(
        "Extract the product name(s) and quantity to BUY from this ingredient line: \"{line}\".\n\n\
         IMPORTANT: If the ingredient lists multiple items (with \"and\", \"or\", commas, or \
         \"mixture\"), return an array of products. For \"or\" choices, include all options.\n\n\
         Return JSON - either a single object OR an array of objects, each with \"product\" \
         and \"quantity\" fields.\n\
         - \"product\": the GROCERY STORE search term (use common American supermarket names, \
         not culinary terms)\n\
         - \"quantity\": the number of PACKAGES/ITEMS to buy from the store (not the recipe amount)\n\n\
         CRITICAL - Use grocery store product names. For PRODUCE items, prefix with \"fresh\" \
         to avoid packaged/processed products:\n\
         - scallions / spring onions -> \"fresh green onions\"\n\
         - cilantro / coriander (leaves) -> \"fresh cilantro\"\n\
         - courgette -> \"fresh zucchini\"\n\
         - aubergine -> \"fresh eggplant\"\n\
         - capsicum -> \"fresh bell pepper\"\n\
         - garlic -> \"fresh garlic\"\n\
         - onion -> \"yellow onion\" or \"white onion\" or \"red onion\"\n\
         - mince/minced meat -> \"ground beef\" or \"ground turkey\" etc.\n\
         - double cream -> \"heavy cream\"\n\
         - caster sugar -> \"granulated sugar\"\n\
         - plain flour -> \"all purpose flour\"\n\
         - prawns -> \"shrimp\"\n\n\
         BEANS: Default to CANNED unless the recipe says \"dry\", \"dried\", or \"soaked\":\n\
         - \"black beans\" -> \"canned black beans\"\n\
         - \"chickpeas\" -> \"canned chickpeas\"\n\
         - \"dried black beans\" -> \"dried black beans\"\n\n\
         Think about how the product is sold at a grocery store:\n\
         - Green onions/scallions: sold in bunches, so \"6 scallions\" = quantity 1 (one bunch)\n\
         - Dairy: sold in containers, so \"0.5 cups heavy cream\" = quantity 1\n\
         - Canned goods: sold per can, so \"2 cans tomatoes\" = quantity 2\n\
         - Garlic: sold by head, so \"3 cloves garlic\" = quantity 1\n\
         - Eggs: sold by dozen, so \"2 eggs\" = quantity 1 (one carton)\n\n\
         Examples:\n\
         \"6 scallions, sliced\" -> {{\"product\": \"fresh green onions\", \"quantity\": 1}}\n\
         \"2 limes\" -> {{\"product\": \"fresh limes\", \"quantity\": 2}}\n\
         \"salt and pepper to taste\" -> [{{\"product\": \"salt\", \"quantity\": 1}}, \
         {{\"product\": \"black pepper\", \"quantity\": 1}}]\n\
         \"2 cans (14oz) diced tomatoes\" -> {{\"product\": \"canned diced tomatoes\", \"quantity\": 2}}\n\n\
         Return ONLY the JSON, no other text."
    );

    let fallback = vec![(line.to_string(), 1)];
    let completion = match text_gen.complete(&prompt).await {
        Ok(completion) => completion,
        Err(e) => {
            warn!("extraction failed for '{line}', using raw line: {e}");
            return fallback;
        }
    };

    match llmtext::parse_json::<OneOrMany>(&completion) {
        Some(parsed) => {
            let products = parsed.into_vec();
            if products.is_empty() {
                fallback
            } else {
                products.into_iter().map(|p| p.into_order(line)).collect()
            }
        }
        None => {
            warn!("unparsable extraction output for '{line}', using raw line");
            fallback
        }
    }
}

/// Search, rank, select, and commit one product term.
async fn resolve_product(
    ports: &Ports,
    ctx: &ResolveContext,
    term: &str,
    quantity: u32,
) -> OrderItem {
    let products = match ports
        .retail
        .search_products(term, SEARCH_LIMIT, ctx.store_location_id.as_deref())
        .await
    {
        Ok(products) => products,
        Err(CapabilityError::Upstream(msg)) => {
            return order_item(term, quantity, None, ItemStatus::Error, Some(msg));
        }
        Err(e) => {
            warn!("product search for '{term}' failed: {e}");
            return order_item(term, quantity, None, ItemStatus::SearchFailed, None);
        }
    };

    if products.is_empty() {
        return order_item(
            term,
            quantity,
            None,
            ItemStatus::NotFound,
            Some(format!("No products found for '{term}'")),
        );
    }

    let preferred_order = rank_products(ports.text_gen.as_ref(), term, quantity, &products).await;

    // Scan ranked candidates for the first eligible one with an explicit
    // purchasable stock level; remember the first eligible candidate whose
    // stock the catalog never listed as a last resort. Any other explicit
    // stock value (e.g. temporarily out of stock) is skipped entirely.
    let top_choice = preferred_order[0];
    let mut selected: Option<usize> = None;
    let mut fallback: Option<usize> = None;
    let mut is_substitute = false;

    for &idx in preferred_order.iter().take(MAX_CANDIDATES) {
        let product = &products[idx];
        if !product.fulfillment.allows(ctx.fulfillment) {
            continue;
        }
        match &product.stock {
            StockReport::Level(_) => {
                selected = Some(idx);
                is_substitute = idx != top_choice;
                break;
            }
            StockReport::Unlisted => {
                if fallback.is_none() {
                    fallback = Some(idx);
                }
            }
            StockReport::Other(value) => {
                debug!("skipping '{}': stock is {value}", product.description);
            }
        }
    }

    if selected.is_none() {
        if let Some(idx) = fallback {
            // Unlisted stock only; treat as a substitution.
            selected = Some(idx);
            is_substitute = true;
        }
    }

    let product = match selected {
        Some(idx) => &products[idx],
        None => {
            return order_item(
                term,
                quantity,
                None,
                ItemStatus::Unavailable,
                Some("All matching products are out of stock".to_string()),
            );
        }
    };

    debug!(
        "selected '{}' ({}) for '{term}', substitute: {is_substitute}",
        product.description, product.catalog_id
    );

    match ports
        .retail
        .add_to_cart(&product.catalog_id, quantity, ctx.fulfillment)
        .await
    {
        Ok(()) => order_item(
            term,
            quantity,
            Some(product.description.clone()),
            ItemStatus::Added,
            is_substitute.then(|| "substituted (first choice unavailable)".to_string()),
        ),
        Err(e) => order_item(
            term,
            quantity,
            Some(product.description.clone()),
            ItemStatus::Failed,
            Some(e.to_string()),
        ),
    }
}

/// Rank search results by asking the text-generation capability for the
/// best match, with a strong preference for single units over multi-packs
/// unless the needed quantity is large. Falls back to natural result order.
async fn rank_products(
    text_gen: &dyn TextGeneration,
    term: &str,
    quantity: u32,
    products: &[Product],
) -> Vec<usize> {
    let natural: Vec<usize> = (0..products.len()).collect();
    let shown = products.len().min(MAX_CANDIDATES);

    let listing = products[..shown]
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "{}. {} - {}",
                i + 1,
                p.description,
                p.size.as_deref().unwrap_or("unknown size")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "I'm looking for: \"{term}\" (quantity needed: {quantity})\n\n\
         Here are the search results from the grocery store:\n{listing}\n\n\
         Which number is the BEST match for what I'm looking for? Consider:\n\
         - I want the actual ingredient, not a prepared food or seasoning containing it\n\
         - For produce, prefer fresh/raw items over processed\n\
         - IMPORTANT: Prefer SINGLE items over multi-packs unless I need a large quantity\n\
           - \"1 can black beans\" -> pick a single can, NOT a 4-pack\n\
           - Only pick multi-packs if quantity needed is 4+\n\
         - Avoid \"BIG DEAL\", \"Value Pack\", \"Family Size\" unless quantity justifies it\n\
         - \"green onions\" = scallions (fresh produce), NOT noodles or dips\n\
         - \"fresh mint\" = mint leaves (herb), NOT gum or candy\n\n\
         Reply with ONLY the number (1-{shown}) of the best match, nothing else."
    );

    let completion = match text_gen.complete(&prompt).await {
        Ok(completion) => completion,
        Err(e) => {
            warn!("ranking failed for '{term}', keeping natural order: {e}");
            return natural;
        }
    };

    match llmtext::parse_choice(&completion, shown) {
        Some(pick) => {
            let mut order = vec![pick];
            order.extend(natural.into_iter().filter(|&i| i != pick));
            order
        }
        None => (0..products.len()).collect(),
    }
}

fn order_item(
    term: &str,
    quantity: u32,
    product: Option<String>,
    status: ItemStatus,
    error: Option<String>,
) -> OrderItem {
    OrderItem {
        item: term.to_string(),
        quantity,
        product,
        status,
        error,
    }
}
