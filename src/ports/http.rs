//! HTTP adapters for the capability ports.
//!
//! Each adapter owns its reqwest client and timeout budget and maps every
//! transport or payload failure into the `CapabilityError` taxonomy. Nothing
//! else crosses the port boundary.

use crate::error::{CapabilityError, CapabilityResult};
use crate::ports::{
    FulfillmentEligibility, FulfillmentMethod, Product, RecipeDetail, RecipeIngredient,
    RecipeStore, RecipeSummary, Retail, SearchHit, StockReport, TextGeneration, WebSearch,
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Timeout for API calls.
const API_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for fetching arbitrary web pages (thumbnails).
const PAGE_TIMEOUT: Duration = Duration::from_secs(5);
/// Cap on how much of a page body to read when looking for og:image.
const PAGE_READ_LIMIT: usize = 200_000;

fn transport_error(e: reqwest::Error) -> CapabilityError {
    if e.is_timeout() || e.is_connect() {
        CapabilityError::Unreachable(e.to_string())
    } else if e.is_decode() || e.is_body() {
        CapabilityError::Protocol(e.to_string())
    } else {
        CapabilityError::Unreachable(e.to_string())
    }
}

async fn upstream_error(status: StatusCode, response: reqwest::Response) -> CapabilityError {
    let body = response.text().await.unwrap_or_default();
    CapabilityError::Upstream(format!("{status}: {body}"))
}

fn build_client(timeout: Duration) -> CapabilityResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CapabilityError::Protocol(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

/// Chat-completions adapter for the text-generation port, with retry on
/// transient failures.
pub struct TextGenClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    retry_delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionChoiceMessage {
    content: String,
}

impl TextGenClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> CapabilityResult<Self> {
        Ok(Self {
            client: build_client(API_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
        })
    }

    async fn make_request(&self, prompt: &str) -> CapabilityResult<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![CompletionMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => {
                let body: CompletionResponse =
                    response.json().await.map_err(transport_error)?;
                body.choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| {
                        CapabilityError::Protocol("completion response had no choices".to_string())
                    })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                Err(CapabilityError::Upstream("rate limit exceeded".to_string()))
            }
            status => Err(upstream_error(status, response).await),
        }
    }

    fn is_retryable(error: &CapabilityError) -> bool {
        matches!(error, CapabilityError::Unreachable(_))
            || matches!(error, CapabilityError::Upstream(msg) if msg.contains("rate limit"))
    }
}

#[async_trait]
impl TextGeneration for TextGenClient {
    async fn complete(&self, prompt: &str) -> CapabilityResult<String> {
        let mut retry_count = 0;
        loop {
            match self.make_request(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if retry_count >= self.max_retries || !Self::is_retryable(&e) {
                        return Err(e);
                    }
                    retry_count += 1;
                    let delay = self.retry_delay_ms * 2u64.pow(retry_count - 1);
                    debug!("text-generation retry {retry_count} after {delay}ms: {e}");
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Recipe store
// ---------------------------------------------------------------------------

/// REST adapter for a Mealie-style recipe store.
pub struct RecipeStoreClient {
    client: Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct StoreSearchResponse {
    #[serde(default)]
    items: Vec<StoreRecipe>,
}

#[derive(Debug, Deserialize)]
struct StoreRecipe {
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoreRecipeDetail {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "recipeIngredient")]
    recipe_ingredient: Vec<StoreIngredient>,
    #[serde(default, rename = "recipeInstructions")]
    recipe_instructions: Vec<StoreInstruction>,
}

#[derive(Debug, Deserialize)]
struct StoreIngredient {
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    food: Option<StoreFood>,
}

#[derive(Debug, Deserialize)]
struct StoreFood {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoreInstruction {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct StoreCreated {
    slug: String,
}

impl RecipeStoreClient {
    pub fn new(base_url: &str, api_token: &str) -> CapabilityResult<Self> {
        Ok(Self {
            client: build_client(API_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// Media URL for a recipe image, matching the store's media layout.
    fn media_url(&self, recipe_id: &str) -> String {
        format!(
            "{}/api/media/recipes/{recipe_id}/images/min-original.webp",
            self.base_url
        )
    }
}

#[async_trait]
impl RecipeStore for RecipeStoreClient {
    async fn search(&self, query: &str, page_size: usize) -> CapabilityResult<Vec<RecipeSummary>> {
        let response = self
            .client
            .get(format!("{}/api/recipes", self.base_url))
            .bearer_auth(&self.api_token)
            .query(&[("search", query), ("perPage", &page_size.to_string())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(status, response).await);
        }

        let body: StoreSearchResponse = response.json().await.map_err(transport_error)?;
        Ok(body
            .items
            .into_iter()
            .map(|r| {
                let image = r
                    .image
                    .filter(|_| !r.id.is_empty())
                    .map(|_| self.media_url(&r.id));
                RecipeSummary {
                    name: r.name,
                    slug: r.slug,
                    id: r.id,
                    description: r.description.unwrap_or_default(),
                    image,
                }
            })
            .collect())
    }

    async fn get_detail(&self, slug: &str) -> CapabilityResult<RecipeDetail> {
        let response = self
            .client
            .get(format!("{}/api/recipes/{slug}", self.base_url))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(status, response).await);
        }

        let body: StoreRecipeDetail = response.json().await.map_err(transport_error)?;
        Ok(RecipeDetail {
            name: body.name,
            ingredients: body
                .recipe_ingredient
                .into_iter()
                .map(|i| RecipeIngredient {
                    note: i.note.unwrap_or_default(),
                    food_name: i.food.and_then(|f| f.name),
                })
                .collect(),
            instructions: body
                .recipe_instructions
                .into_iter()
                .map(|i| i.text)
                .collect(),
        })
    }

    async fn create_from_url(&self, url: &str, include_tags: bool) -> CapabilityResult<String> {
        let response = self
            .client
            .post(format!("{}/api/recipes/create-url", self.base_url))
            .bearer_auth(&self.api_token)
            .json(&json!({ "url": url, "includeTags": include_tags }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(status, response).await);
        }

        let body: StoreCreated = response.json().await.map_err(transport_error)?;
        Ok(body.slug)
    }
}

// ---------------------------------------------------------------------------
// Retail
// ---------------------------------------------------------------------------

/// REST adapter for a Kroger-style retail product/cart API.
pub struct RetailClient {
    client: Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct RetailSearchResponse {
    #[serde(default)]
    data: Vec<RetailProduct>,
}

#[derive(Debug, Deserialize)]
struct RetailProduct {
    #[serde(rename = "productId")]
    product_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    items: Vec<RetailItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RetailItem {
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    inventory: Option<RetailInventory>,
    #[serde(default)]
    fulfillment: Option<RetailFulfillment>,
}

#[derive(Debug, Deserialize)]
struct RetailInventory {
    #[serde(default, rename = "stockLevel")]
    stock_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetailFulfillment {
    #[serde(default)]
    curbside: Option<bool>,
    #[serde(default)]
    delivery: Option<bool>,
}

impl RetailClient {
    pub fn new(base_url: &str, access_token: &str) -> CapabilityResult<Self> {
        Ok(Self {
            client: build_client(API_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }
}

#[async_trait]
impl Retail for RetailClient {
    async fn search_products(
        &self,
        term: &str,
        limit: usize,
        store_location: Option<&str>,
    ) -> CapabilityResult<Vec<Product>> {
        let mut query = vec![
            ("filter.term".to_string(), term.to_string()),
            ("filter.limit".to_string(), limit.to_string()),
        ];
        if let Some(location) = store_location {
            query.push(("filter.locationId".to_string(), location.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/v1/products", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(status, response).await);
        }

        let body: RetailSearchResponse = response.json().await.map_err(transport_error)?;
        Ok(body
            .data
            .into_iter()
            .map(|p| {
                let item = p.items.into_iter().next().unwrap_or_default();
                Product {
                    catalog_id: p.product_id,
                    description: p.description,
                    size: item.size,
                    stock: StockReport::parse(
                        item.inventory.and_then(|i| i.stock_level).as_deref(),
                    ),
                    fulfillment: item
                        .fulfillment
                        .map(|f| FulfillmentEligibility {
                            pickup: f.curbside,
                            delivery: f.delivery,
                        })
                        .unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn add_to_cart(
        &self,
        catalog_id: &str,
        quantity: u32,
        method: FulfillmentMethod,
    ) -> CapabilityResult<()> {
        let modality = match method {
            FulfillmentMethod::Pickup => "PICKUP",
            FulfillmentMethod::Delivery => "DELIVERY",
        };
        let response = self
            .client
            .put(format!("{}/v1/cart/add", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "items": [{ "upc": catalog_id, "quantity": quantity, "modality": modality }]
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(status, response).await);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Web search
// ---------------------------------------------------------------------------

/// JSON search-endpoint adapter (SearxNG-style) plus a bounded page fetch
/// for og:image thumbnails.
pub struct WebSearchClient {
    client: Client,
    page_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WebSearchResponse {
    #[serde(default)]
    results: Vec<WebSearchResult>,
}

#[derive(Debug, Deserialize)]
struct WebSearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl WebSearchClient {
    pub fn new(base_url: &str) -> CapabilityResult<Self> {
        Ok(Self {
            client: build_client(API_TIMEOUT)?,
            page_client: Client::builder()
                .timeout(PAGE_TIMEOUT)
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .map_err(|e| {
                    CapabilityError::Protocol(format!("failed to build HTTP client: {e}"))
                })?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn extract_og_image(html: &str) -> Option<String> {
        // Both attribute orders appear in the wild.
        let patterns = [
            r#"(?i)<meta[^>]+property=["']og:image["'][^>]+content=["']([^"']+)["']"#,
            r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]+property=["']og:image["']"#,
        ];
        for pattern in patterns {
            let re = Regex::new(pattern).ok()?;
            if let Some(captures) = re.captures(html) {
                return Some(captures[1].to_string());
            }
        }
        None
    }
}

#[async_trait]
impl WebSearch for WebSearchClient {
    async fn search(&self, query: &str, limit: usize) -> CapabilityResult<Vec<SearchHit>> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(status, response).await);
        }

        let body: WebSearchResponse = response.json().await.map_err(transport_error)?;
        Ok(body
            .results
            .into_iter()
            .take(limit)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }

    async fn fetch_og_image(&self, url: &str) -> CapabilityResult<Option<String>> {
        let mut response = self
            .page_client
            .get(url)
            .header(
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            )
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            warn!("og:image fetch for {url} returned {}", response.status());
            return Ok(None);
        }

        // Some sites put og:image late in the head; read a bounded amount.
        let mut content = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            content.extend_from_slice(&chunk);
            if content.len() > PAGE_READ_LIMIT {
                break;
            }
        }

        let html = String::from_utf8_lossy(&content);
        Ok(Self::extract_og_image(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_og_image_in_either_attribute_order() {
        let property_first = r#"<meta property="og:image" content="https://x.test/a.jpg">"#;
        let content_first = r#"<meta content="https://x.test/b.jpg" property="og:image">"#;
        assert_eq!(
            WebSearchClient::extract_og_image(property_first),
            Some("https://x.test/a.jpg".to_string())
        );
        assert_eq!(
            WebSearchClient::extract_og_image(content_first),
            Some("https://x.test/b.jpg".to_string())
        );
        assert_eq!(WebSearchClient::extract_og_image("<html></html>"), None);
    }

    #[test]
    fn stock_report_separates_missing_from_other_explicit_values() {
        use crate::ports::StockLevel;
        assert_eq!(
            StockReport::parse(Some("high")),
            StockReport::Level(StockLevel::High)
        );
        assert_eq!(
            StockReport::parse(Some("MEDIUM")),
            StockReport::Level(StockLevel::Medium)
        );
        assert_eq!(StockReport::parse(None), StockReport::Unlisted);
        assert_eq!(StockReport::parse(Some("")), StockReport::Unlisted);
        assert_eq!(
            StockReport::parse(Some("TEMPORARILY_OUT_OF_STOCK")),
            StockReport::Other("TEMPORARILY_OUT_OF_STOCK".to_string())
        );
    }
}
