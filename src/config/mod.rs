//! Configuration management: pantry staples, favorite recipe sources, user
//! settings, and capability endpoints.
//!
//! Each piece is a small YAML file resolved through a fixed search order
//! (explicit path, current directory, user config directory), with
//! environment variables overriding endpoint settings.

use crate::error::{Error, Result};
use crate::ports::FulfillmentMethod;
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory for larder's own data (checkpoints, saved settings).
pub fn get_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "larder", "larder")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| Error::Config("could not determine home directory".to_string()))
}

fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "larder", "larder").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Load a YAML config file, trying the given name in the current directory
/// and then the user config directory. Missing files yield the default.
fn load_yaml<T: DeserializeOwned + Default>(file_name: &str) -> Result<T> {
    let mut candidates = vec![PathBuf::from(file_name)];
    if let Some(dir) = get_config_dir() {
        candidates.push(dir.join(file_name));
    }

    for path in candidates {
        if path.exists() {
            debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            return Ok(serde_yaml::from_str(&content)?);
        }
    }
    Ok(T::default())
}

/// Pantry staples the user always has on hand; matching ingredient lines
/// bypass the cart.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PantryConfig {
    #[serde(default)]
    pub bypass_staples: Vec<String>,
}

impl PantryConfig {
    pub fn load() -> Result<Self> {
        load_yaml("pantry.yaml")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteSource {
    pub domain: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl FavoriteSource {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.domain)
    }
}

/// Favorite recipe sites searched ahead of the general web.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecipeSources {
    #[serde(default)]
    pub favorite_sources: Vec<FavoriteSource>,
}

impl RecipeSources {
    pub fn load() -> Result<Self> {
        load_yaml("recipe_sources.yaml")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreSettings {
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
}

/// Long-lived per-user settings: preferred store and fulfillment method.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserSettings {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub fulfillment: FulfillmentMethod,
}

impl UserSettings {
    pub fn load() -> Result<Self> {
        load_yaml("user_settings.yaml")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

/// Endpoints and credentials for the capability adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub recipe_store_url: String,
    /// Browser-facing base URL for recipe links shown to the user; the
    /// internal URL may only resolve inside the deployment network.
    pub recipe_store_external_url: String,
    #[serde(default)]
    pub recipe_store_token: String,
    pub retail_url: String,
    #[serde(default)]
    pub retail_token: String,
    pub text_gen_url: String,
    #[serde(default)]
    pub text_gen_key: String,
    pub text_gen_model: String,
    pub web_search_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            recipe_store_url: "http://localhost:9925".to_string(),
            recipe_store_external_url: "http://localhost:9925".to_string(),
            recipe_store_token: String::new(),
            retail_url: "https://api.kroger.com".to_string(),
            retail_token: String::new(),
            text_gen_url: "https://api.openai.com/v1".to_string(),
            text_gen_key: String::new(),
            text_gen_model: "gpt-4o".to_string(),
            web_search_url: "http://localhost:8080".to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn merge_env_vars(&mut self) {
        if let Ok(v) = std::env::var("LARDER_RECIPE_STORE_URL") {
            self.recipe_store_url = v;
        }
        if let Ok(v) = std::env::var("LARDER_RECIPE_STORE_EXTERNAL_URL") {
            self.recipe_store_external_url = v;
        }
        if let Ok(v) = std::env::var("LARDER_RECIPE_STORE_TOKEN") {
            self.recipe_store_token = v;
        }
        if let Ok(v) = std::env::var("LARDER_RETAIL_URL") {
            self.retail_url = v;
        }
        if let Ok(v) = std::env::var("LARDER_RETAIL_TOKEN") {
            self.retail_token = v;
        }
        if let Ok(v) = std::env::var("LARDER_TEXT_GEN_URL") {
            self.text_gen_url = v;
        }
        if let Ok(v) = std::env::var("LARDER_TEXT_GEN_KEY") {
            self.text_gen_key = v;
        }
        if let Ok(v) = std::env::var("LARDER_TEXT_GEN_MODEL") {
            self.text_gen_model = v;
        }
        if let Ok(v) = std::env::var("LARDER_WEB_SEARCH_URL") {
            self.web_search_url = v;
        }
    }
}

/// Everything the workflow needs to run, loaded once and passed down the
/// call chain.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub pantry: PantryConfig,
    pub recipe_sources: RecipeSources,
    pub settings: UserSettings,
    pub endpoints: EndpointConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut endpoints: EndpointConfig = load_yaml("endpoints.yaml")?;
        endpoints.merge_env_vars();
        Ok(Self {
            pantry: PantryConfig::load()?,
            recipe_sources: RecipeSources::load()?,
            settings: UserSettings::load()?,
            endpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_cover_all_adapters() {
        let endpoints = EndpointConfig::default();
        assert!(!endpoints.recipe_store_url.is_empty());
        assert!(!endpoints.retail_url.is_empty());
        assert!(!endpoints.text_gen_model.is_empty());
        assert!(!endpoints.web_search_url.is_empty());
    }

    #[test]
    fn user_settings_default_to_pickup() {
        let settings = UserSettings::default();
        assert_eq!(settings.fulfillment, FulfillmentMethod::Pickup);
        assert!(settings.store.location_id.is_none());
    }

    #[test]
    fn pantry_yaml_round_trips() {
        let yaml = "bypass_staples:\n  - salt\n  - pepper\n";
        let pantry: PantryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(pantry.bypass_staples, vec!["salt", "pepper"]);
    }
}
