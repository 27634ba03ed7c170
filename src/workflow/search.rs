//! Search stage: turn the latest user message into a list of candidate
//! recipes from the recipe store, the user's favorite sites, and the
//! general web.
//!
//! The three lookups per recipe name run concurrently and are joined before
//! the stage completes. Every capability failure inside this stage degrades
//! to an empty contribution; the stage itself never fails on a lookup.

use crate::config::AppConfig;
use crate::error::Result;
use crate::llmtext;
use crate::ports::{Ports, SearchHit, TextGeneration, WebSearch};
use crate::workflow::state::{
    ChatMessage, RecipeOption, RecipeSource, StatePatch, WorkflowState,
};
use futures::future::join_all;
use regex::Regex;
use tracing::{debug, warn};

const STORE_SEARCH_PAGE_SIZE: usize = 15;
const WEB_RESULT_LIMIT: usize = 5;
const FAVORITE_SITE_RESULT_LIMIT: usize = 2;
const SNIPPET_LIMIT: usize = 200;

pub(crate) async fn run(
    ports: &Ports,
    config: &AppConfig,
    state: &WorkflowState,
) -> Result<StatePatch> {
    let last_message = match state.last_user_message() {
        Some(text) => text.to_string(),
        None => {
            return Ok(StatePatch::with_messages(vec![ChatMessage::assistant(
                "What would you like to make?",
            )]))
        }
    };

    // URL fast path: offer pasted links as direct imports.
    let urls = extract_urls(&last_message);
    if !urls.is_empty() {
        let recipe_options: Vec<RecipeOption> = urls.iter().map(|u| option_from_url(u)).collect();
        return Ok(StatePatch {
            target_recipe_names: Some(vec!["Recipe from URL".to_string()]),
            recipe_options: Some(recipe_options.clone()),
            messages: vec![ChatMessage::assistant(format!(
                "I found {} recipe URL(s). Select the one you'd like to import:",
                urls.len()
            ))],
            ..Default::default()
        });
    }

    let target_names = if state.target_recipe_names.is_empty() {
        extract_recipe_names(ports.text_gen.as_ref(), &last_message).await
    } else {
        state.target_recipe_names.clone()
    };

    if target_names.is_empty() {
        return Ok(StatePatch::with_messages(vec![ChatMessage::assistant(
            "I couldn't find any recipe names in your request. What would you like to make?",
        )]));
    }

    let mut recipe_options = Vec::new();
    for name in &target_names {
        let (store_results, favorite_results, web_results) = tokio::join!(
            search_store(ports, config, name),
            search_favorite_sites(ports, config, name),
            search_web(ports, name),
        );
        recipe_options.extend(store_results);
        recipe_options.extend(favorite_results);
        recipe_options.extend(web_results);
    }

    if recipe_options.is_empty() {
        return Ok(StatePatch {
            target_recipe_names: Some(target_names.clone()),
            recipe_options: Some(Vec::new()),
            messages: vec![ChatMessage::assistant(format!(
                "I couldn't find any recipes for: {}. Try different recipe names.",
                target_names.join(", ")
            ))],
            ..Default::default()
        });
    }

    let store_count = recipe_options
        .iter()
        .filter(|r| r.source == RecipeSource::RecipeStore)
        .count();
    let web_count = recipe_options.len() - store_count;
    let mut msg = format!("I found {} recipe options", recipe_options.len());
    if store_count > 0 && web_count > 0 {
        msg.push_str(&format!(
            " ({store_count} from your recipe library, {web_count} from the web)"
        ));
    } else if store_count > 0 {
        msg.push_str(" from your recipe library");
    } else {
        msg.push_str(" from the web");
    }
    msg.push_str(". Please select which recipes you'd like to use.");

    Ok(StatePatch {
        target_recipe_names: Some(target_names),
        recipe_options: Some(recipe_options),
        messages: vec![ChatMessage::assistant(msg)],
        ..Default::default()
    })
}

fn extract_urls(text: &str) -> Vec<String> {
    let re = Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("valid URL pattern");
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

fn option_from_url(raw_url: &str) -> RecipeOption {
    let (domain, name) = match url::Url::parse(raw_url) {
        Ok(parsed) => {
            let domain = parsed
                .host_str()
                .unwrap_or("the web")
                .trim_start_matches("www.")
                .to_string();
            let last_segment = parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .unwrap_or("");
            let name = title_from_slug(last_segment);
            let name = if name.is_empty() {
                format!("Recipe from {domain}")
            } else {
                name
            };
            (domain, name)
        }
        Err(_) => ("the web".to_string(), format!("Recipe from {raw_url}")),
    };

    RecipeOption {
        name,
        source: RecipeSource::Web,
        url: raw_url.to_string(),
        slug: None,
        description: format!("Import recipe from {domain}"),
        image_url: None,
    }
}

fn title_from_slug(segment: &str) -> String {
    segment
        .replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn extract_recipe_names(text_gen: &dyn TextGeneration, message: &str) -> Vec<String> {
    let prompt = format!(
        "Extract the recipe names the user wants to cook from the following text.\n\
         Return ONLY a JSON list of strings, e.g. [\"Shrimp Scampi\", \"Chicken Tikka\"].\n\
         If no recipe is specified, return [].\n\n\
         Text: {message}"
    );

    match text_gen.complete(&prompt).await {
        Ok(completion) => llmtext::parse_string_array(&completion).unwrap_or_else(|| {
            warn!("failed to parse recipe names from completion");
            Vec::new()
        }),
        Err(e) => {
            warn!("recipe name extraction failed: {e}");
            Vec::new()
        }
    }
}

/// Search the recipe store, then keep only results the text-generation
/// capability judges relevant. Parse failure keeps the top three.
async fn search_store(ports: &Ports, config: &AppConfig, recipe_name: &str) -> Vec<RecipeOption> {
    let summaries = match ports
        .recipe_store
        .search(recipe_name, STORE_SEARCH_PAGE_SIZE)
        .await
    {
        Ok(summaries) => summaries,
        Err(e) => {
            warn!("recipe store search for '{recipe_name}' failed: {e}");
            return Vec::new();
        }
    };
    if summaries.is_empty() {
        return Vec::new();
    }

    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    let prompt = format!(
        "I'm looking for recipes matching: \"{recipe_name}\"\n\n\
         Here are the search results from my recipe database:\n{}\n\n\
         Return a JSON array of the recipe names that are ACTUALLY relevant matches \
         for what I'm looking for. Only include recipes that are the same dish or very \
         similar. Be strict - partial word matches don't count.\n\n\
         Return ONLY the JSON array of matching recipe names, or [] if none match. No explanation.",
        serde_json::to_string_pretty(&names).unwrap_or_default()
    );

    let relevant: Vec<String> = match ports.text_gen.complete(&prompt).await {
        Ok(completion) => llmtext::parse_string_array(&completion).unwrap_or_else(|| {
            // Fall back to the top results when the filter output is unusable.
            summaries.iter().take(3).map(|s| s.name.clone()).collect()
        }),
        Err(e) => {
            warn!("relevance filter failed: {e}");
            summaries.iter().take(3).map(|s| s.name.clone()).collect()
        }
    };
    let relevant_lower: Vec<String> = relevant.iter().map(|n| n.to_lowercase()).collect();

    let external = config.endpoints.recipe_store_external_url.trim_end_matches('/');
    summaries
        .into_iter()
        .filter(|s| relevant_lower.contains(&s.name.to_lowercase()))
        .map(|s| RecipeOption {
            url: format!("{external}/g/home/r/{}", s.slug),
            name: s.name,
            source: RecipeSource::RecipeStore,
            slug: Some(s.slug),
            description: if s.description.is_empty() {
                "Recipe from your library".to_string()
            } else {
                s.description
            },
            image_url: s.image,
        })
        .collect()
}

async fn search_favorite_sites(
    ports: &Ports,
    config: &AppConfig,
    recipe_name: &str,
) -> Vec<RecipeOption> {
    let mut options = Vec::new();
    for source in &config.recipe_sources.favorite_sources {
        if source.domain.is_empty() {
            continue;
        }
        let query = format!("site:{} {recipe_name} recipe", source.domain);
        debug!("searching favorite site {}: {query}", source.display_name());

        match ports.web_search.search(&query, FAVORITE_SITE_RESULT_LIMIT).await {
            Ok(hits) => options.extend(hits.into_iter().map(|h| option_from_hit(h, recipe_name))),
            Err(e) => warn!("favorite site search for {} failed: {e}", source.display_name()),
        }
    }

    if options.is_empty() {
        return options;
    }
    let options = filter_web_options(ports.text_gen.as_ref(), recipe_name, options).await;
    fetch_thumbnails(ports.web_search.as_ref(), options).await
}

async fn search_web(ports: &Ports, recipe_name: &str) -> Vec<RecipeOption> {
    let query = format!("{recipe_name} recipe");
    let hits = match ports.web_search.search(&query, WEB_RESULT_LIMIT).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!("web search for '{recipe_name}' failed: {e}");
            return Vec::new();
        }
    };
    if hits.is_empty() {
        return Vec::new();
    }

    let options: Vec<RecipeOption> = hits
        .into_iter()
        .map(|h| option_from_hit(h, recipe_name))
        .collect();
    let options = filter_web_options(ports.text_gen.as_ref(), recipe_name, options).await;
    fetch_thumbnails(ports.web_search.as_ref(), options).await
}

fn option_from_hit(hit: SearchHit, recipe_name: &str) -> RecipeOption {
    let snippet: String = hit.snippet.trim().chars().take(SNIPPET_LIMIT).collect();
    let snippet = snippet.trim().to_string();
    RecipeOption {
        name: if hit.title.trim().is_empty() {
            recipe_name.to_string()
        } else {
            hit.title.trim().to_string()
        },
        source: RecipeSource::Web,
        url: hit.url,
        slug: None,
        description: if snippet.is_empty() {
            "Recipe from the web".to_string()
        } else {
            snippet
        },
        image_url: None,
    }
}

/// Drop roundups, listicles, and non-recipe pages. Any filter failure keeps
/// the full list.
async fn filter_web_options(
    text_gen: &dyn TextGeneration,
    recipe_name: &str,
    options: Vec<RecipeOption>,
) -> Vec<RecipeOption> {
    let titles: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
    let prompt = format!(
        "I searched for \"{recipe_name}\" and got these results:\n{}\n\n\
         Return a JSON array of titles that are ACTUAL SINGLE RECIPES (not roundups or collections).\n\n\
         EXCLUDE:\n\
         - Recipe roundups (\"15 Best...\", \"20 Easy...\", \"10 Delicious...\")\n\
         - Listicles (\"X Recipes to Try\", \"X Ways to Cook...\")\n\
         - Category/collection pages\n\
         - Non-recipe content (reviews, articles about food)\n\n\
         INCLUDE:\n\
         - Single recipe pages (\"Pesto Pasta Recipe\", \"Easy Chicken Tikka Masala\")\n\
         - Recipe titles without numbers at the start\n\n\
         Return ONLY the JSON array of titles to keep. No explanation.",
        serde_json::to_string_pretty(&titles).unwrap_or_default()
    );

    let keep = match text_gen.complete(&prompt).await {
        Ok(completion) => match llmtext::parse_string_array(&completion) {
            Some(titles) => titles,
            None => return options,
        },
        Err(e) => {
            warn!("roundup filter failed: {e}");
            return options;
        }
    };
    let keep_lower: Vec<String> = keep.iter().map(|t| t.to_lowercase()).collect();

    let kept: Vec<RecipeOption> = options
        .iter()
        .filter(|o| keep_lower.contains(&o.name.to_lowercase()))
        .cloned()
        .collect();
    debug!(
        "kept {}/{} web results after filtering roundups",
        kept.len(),
        options.len()
    );
    kept
}

/// Fetch og:image thumbnails for all options concurrently; failures leave
/// the option without an image.
async fn fetch_thumbnails(
    web_search: &dyn WebSearch,
    mut options: Vec<RecipeOption>,
) -> Vec<RecipeOption> {
    let fetches = options
        .iter()
        .map(|o| web_search.fetch_og_image(&o.url));
    let thumbnails = join_all(fetches).await;

    for (option, thumbnail) in options.iter_mut().zip(thumbnails) {
        match thumbnail {
            Ok(Some(image_url)) => option.image_url = Some(image_url),
            Ok(None) => {}
            Err(e) => debug!("thumbnail fetch for {} failed: {e}", option.url),
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_urls_from_chat_text() {
        let urls = extract_urls("try https://example.com/recipes/pesto-pasta and tell me");
        assert_eq!(urls, vec!["https://example.com/recipes/pesto-pasta"]);
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn builds_option_from_pasted_url() {
        let option = option_from_url("https://www.example.com/recipes/shrimp-scampi");
        assert_eq!(option.name, "Shrimp Scampi");
        assert_eq!(option.source, RecipeSource::Web);
        assert_eq!(option.description, "Import recipe from example.com");
        assert!(option.slug.is_none());
    }

    #[test]
    fn falls_back_to_domain_name_for_bare_urls() {
        let option = option_from_url("https://example.com/");
        assert_eq!(option.name, "Recipe from example.com");
    }
}
