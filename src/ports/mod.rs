//! Capability port traits for the external services the workflow calls.
//!
//! Each port is a trait-based abstraction in the style of a testable seam:
//! the workflow and the cart engine only ever see
//! `Result<Payload, CapabilityError>`, never a raw transport error. Timeouts
//! are the adapter's job and surface as `CapabilityError::Unreachable`.

pub mod http;

use crate::error::CapabilityResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A recipe summary as returned by the recipe store's search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub name: String,
    pub slug: String,
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Fully-resolved image URL, if the store has one for this recipe.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    /// Free-text ingredient line as written in the recipe.
    #[serde(default)]
    pub note: String,
    /// Structured food name when the store has parsed the line.
    #[serde(default)]
    pub food_name: Option<String>,
}

impl RecipeIngredient {
    /// The purchasable text for this line: the note, falling back to the
    /// parsed food name.
    pub fn purchase_text(&self) -> Option<String> {
        if !self.note.trim().is_empty() {
            return Some(self.note.clone());
        }
        self.food_name
            .as_ref()
            .filter(|n| !n.trim().is_empty())
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDetail {
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub instructions: Vec<String>,
}

/// Recipe-store capability: search, fetch, and URL import.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn search(&self, query: &str, page_size: usize) -> CapabilityResult<Vec<RecipeSummary>>;

    async fn get_detail(&self, slug: &str) -> CapabilityResult<RecipeDetail>;

    /// Import a recipe from a web URL, returning the created recipe's slug.
    async fn create_from_url(&self, url: &str, include_tags: bool) -> CapabilityResult<String>;
}

/// Text-generation capability: prompt in, completion out. There is no
/// structural contract on the output; callers parse defensively and fall
/// back to defaults on malformed text.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    async fn complete(&self, prompt: &str) -> CapabilityResult<String>;
}

/// Explicit purchasable retailer stock levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockLevel {
    High,
    Medium,
    Low,
}

impl StockLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

/// What the retailer said about a product's stock. `Unlisted` (no stock
/// field at all) is distinct from `Other`, an explicit value outside
/// HIGH/MEDIUM/LOW such as "TEMPORARILY_OUT_OF_STOCK": only unlisted stock
/// may be used as a last-resort substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockReport {
    Level(StockLevel),
    #[default]
    Unlisted,
    Other(String),
}

impl StockReport {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Unlisted,
            Some(value) => match StockLevel::parse(value) {
                Some(level) => Self::Level(level),
                None => Self::Other(value.to_string()),
            },
        }
    }
}

/// Retailer-side delivery mode constraining which products are eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentMethod {
    Pickup,
    Delivery,
}

impl Default for FulfillmentMethod {
    fn default() -> Self {
        Self::Pickup
    }
}

/// Per-channel eligibility flags. An absent flag counts as eligible; only an
/// explicit `false` rules a product out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FulfillmentEligibility {
    #[serde(default)]
    pub pickup: Option<bool>,
    #[serde(default)]
    pub delivery: Option<bool>,
}

impl FulfillmentEligibility {
    pub fn allows(&self, method: FulfillmentMethod) -> bool {
        match method {
            FulfillmentMethod::Pickup => self.pickup != Some(false),
            FulfillmentMethod::Delivery => self.delivery != Some(false),
        }
    }
}

/// A purchasable product from the retailer catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub catalog_id: String,
    pub description: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub stock: StockReport,
    #[serde(default)]
    pub fulfillment: FulfillmentEligibility,
}

/// Retail capability: product search and cart mutation.
#[async_trait]
pub trait Retail: Send + Sync {
    async fn search_products(
        &self,
        term: &str,
        limit: usize,
        store_location: Option<&str>,
    ) -> CapabilityResult<Vec<Product>>;

    async fn add_to_cart(
        &self,
        catalog_id: &str,
        quantity: u32,
        method: FulfillmentMethod,
    ) -> CapabilityResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// General web lookup capability: query search plus a bounded page peek for
/// `og:image` thumbnails.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> CapabilityResult<Vec<SearchHit>>;

    /// Fetch a page and extract its `og:image` URL, if any. Fetch failures
    /// surface as errors; a page without the tag is `Ok(None)`.
    async fn fetch_og_image(&self, url: &str) -> CapabilityResult<Option<String>>;
}

/// The full set of capability ports a workflow instance runs against.
///
/// Passed explicitly down the call chain; there are no process-wide client
/// caches.
#[derive(Clone)]
pub struct Ports {
    pub text_gen: Arc<dyn TextGeneration>,
    pub recipe_store: Arc<dyn RecipeStore>,
    pub retail: Arc<dyn Retail>,
    pub web_search: Arc<dyn WebSearch>,
}
