//! Mock capability ports.
//!
//! Each mock records the calls it receives and answers from scripted
//! fixtures, so tests can assert both behavior and call counts without any
//! live service.

use crate::error::{CapabilityError, CapabilityResult};
use crate::ports::{
    FulfillmentMethod, Ports, Product, RecipeDetail, RecipeStore, RecipeSummary, Retail,
    SearchHit, TextGeneration, WebSearch,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Text-generation mock: answers with the first rule whose substring
/// matches the prompt, else the default response.
#[derive(Default)]
pub struct MockTextGen {
    rules: Mutex<Vec<(String, String)>>,
    default_response: Mutex<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGen {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            default_response: Mutex::new("[]".to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Respond with `response` whenever the prompt contains `marker`.
    pub fn respond_when(&self, marker: &str, response: &str) {
        self.rules
            .lock()
            .unwrap()
            .push((marker.to_string(), response.to_string()));
    }

    pub fn set_default_response(&self, response: &str) {
        *self.default_response.lock().unwrap() = response.to_string();
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGeneration for MockTextGen {
    async fn complete(&self, prompt: &str) -> CapabilityResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let rules = self.rules.lock().unwrap();
        for (marker, response) in rules.iter() {
            if prompt.contains(marker.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.default_response.lock().unwrap().clone())
    }
}

/// Recipe-store mock backed by in-memory fixtures.
#[derive(Default)]
pub struct MockRecipeStore {
    pub summaries: Mutex<Vec<RecipeSummary>>,
    pub details: Mutex<HashMap<String, RecipeDetail>>,
    /// Slug returned by `create_from_url`; `None` makes the import fail.
    pub import_slug: Mutex<Option<String>>,
    search_calls: Mutex<Vec<String>>,
    detail_calls: Mutex<Vec<String>>,
    import_calls: Mutex<Vec<String>>,
}

impl MockRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_summary(&self, summary: RecipeSummary) {
        self.summaries.lock().unwrap().push(summary);
    }

    pub fn add_detail(&self, slug: &str, detail: RecipeDetail) {
        self.details.lock().unwrap().insert(slug.to_string(), detail);
    }

    pub fn set_import_slug(&self, slug: &str) {
        *self.import_slug.lock().unwrap() = Some(slug.to_string());
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }

    pub fn import_calls(&self) -> Vec<String> {
        self.import_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecipeStore for MockRecipeStore {
    async fn search(&self, query: &str, _page_size: usize) -> CapabilityResult<Vec<RecipeSummary>> {
        self.search_calls.lock().unwrap().push(query.to_string());
        Ok(self.summaries.lock().unwrap().clone())
    }

    async fn get_detail(&self, slug: &str) -> CapabilityResult<RecipeDetail> {
        self.detail_calls.lock().unwrap().push(slug.to_string());
        self.details
            .lock()
            .unwrap()
            .get(slug)
            .cloned()
            .ok_or_else(|| CapabilityError::Upstream(format!("recipe {slug} not found")))
    }

    async fn create_from_url(&self, url: &str, _include_tags: bool) -> CapabilityResult<String> {
        self.import_calls.lock().unwrap().push(url.to_string());
        self.import_slug
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CapabilityError::Upstream("import failed".to_string()))
    }
}

/// Retail mock: products keyed by search term, recorded cart adds.
#[derive(Default)]
pub struct MockRetail {
    products: Mutex<HashMap<String, Vec<Product>>>,
    fail_add: Mutex<bool>,
    search_calls: Mutex<Vec<String>>,
    cart_adds: Mutex<Vec<(String, u32, FulfillmentMethod)>>,
}

impl MockRetail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stock_products(&self, term: &str, products: Vec<Product>) {
        self.products
            .lock()
            .unwrap()
            .insert(term.to_string(), products);
    }

    pub fn fail_cart_adds(&self) {
        *self.fail_add.lock().unwrap() = true;
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn cart_adds(&self) -> Vec<(String, u32, FulfillmentMethod)> {
        self.cart_adds.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retail for MockRetail {
    async fn search_products(
        &self,
        term: &str,
        _limit: usize,
        _store_location: Option<&str>,
    ) -> CapabilityResult<Vec<Product>> {
        self.search_calls.lock().unwrap().push(term.to_string());
        Ok(self
            .products
            .lock()
            .unwrap()
            .get(term)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_to_cart(
        &self,
        catalog_id: &str,
        quantity: u32,
        method: FulfillmentMethod,
    ) -> CapabilityResult<()> {
        if *self.fail_add.lock().unwrap() {
            return Err(CapabilityError::Upstream("cart add rejected".to_string()));
        }
        self.cart_adds
            .lock()
            .unwrap()
            .push((catalog_id.to_string(), quantity, method));
        Ok(())
    }
}

/// Web-search mock with fixed hits and optional og:image fixtures.
#[derive(Default)]
pub struct MockWebSearch {
    hits: Mutex<Vec<SearchHit>>,
    og_images: Mutex<HashMap<String, String>>,
    search_calls: Mutex<Vec<String>>,
}

impl MockWebSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hit(&self, hit: SearchHit) {
        self.hits.lock().unwrap().push(hit);
    }

    pub fn set_og_image(&self, url: &str, image: &str) {
        self.og_images
            .lock()
            .unwrap()
            .insert(url.to_string(), image.to_string());
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str, limit: usize) -> CapabilityResult<Vec<SearchHit>> {
        self.search_calls.lock().unwrap().push(query.to_string());
        Ok(self
            .hits
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_og_image(&self, url: &str) -> CapabilityResult<Option<String>> {
        Ok(self.og_images.lock().unwrap().get(url).cloned())
    }
}

/// Bundle of mocks plus the `Ports` view over them.
pub struct MockPorts {
    pub text_gen: Arc<MockTextGen>,
    pub recipe_store: Arc<MockRecipeStore>,
    pub retail: Arc<MockRetail>,
    pub web_search: Arc<MockWebSearch>,
}

impl MockPorts {
    pub fn new() -> Self {
        Self {
            text_gen: Arc::new(MockTextGen::new()),
            recipe_store: Arc::new(MockRecipeStore::new()),
            retail: Arc::new(MockRetail::new()),
            web_search: Arc::new(MockWebSearch::new()),
        }
    }

    pub fn ports(&self) -> Ports {
        Ports {
            text_gen: self.text_gen.clone(),
            recipe_store: self.recipe_store.clone(),
            retail: self.retail.clone(),
            web_search: self.web_search.clone(),
        }
    }
}

impl Default for MockPorts {
    fn default() -> Self {
        Self::new()
    }
}
