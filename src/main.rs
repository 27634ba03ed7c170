use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use larder::config::{get_data_dir, AppConfig};
use larder::ports::http::{RecipeStoreClient, RetailClient, TextGenClient, WebSearchClient};
use larder::ports::Ports;
use larder::workflow::{
    CheckpointStore, ItemStatus, StatePatch, WorkflowInput, WorkflowMachine,
};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Plan meals and stage retailer carts from the command line
#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "Meal-planning grocery agent with human approval checkpoints", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Workflow thread id (defaults to "default")
    #[arg(short, long, global = true, default_value = "default")]
    thread: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a planning cycle from a chat message
    Plan {
        /// What you'd like to cook, e.g. "shrimp scampi and a salad"
        message: String,
    },
    /// Select recipe options by number and continue to ingredient review
    Select {
        /// 1-based indices into the offered recipe options
        indices: Vec<usize>,
    },
    /// Approve pending cart items (all by default) and place the order
    Approve {
        /// 1-based indices into the pending cart; empty approves everything
        indices: Vec<usize>,
    },
    /// Show the thread's checkpointed state
    State,
    /// List known workflow threads
    Threads,
    /// Drop the thread's checkpoint
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(AppConfig::load().context("failed to load configuration")?);
    let machine = build_machine(config.clone())?;
    let thread_id = cli.thread;

    match cli.command {
        Commands::Plan { message } => {
            let state = machine
                .invoke(&thread_id, WorkflowInput::Message(message))
                .await?;
            print_assistant_messages(&state.messages);
            for (i, option) in state.recipe_options.iter().enumerate() {
                println!("  {}. {} — {}", i + 1, option.name, option.url);
            }
        }
        Commands::Select { indices } => {
            let state = machine.get_state(&thread_id).await?;
            let selected = pick_by_index(&state.recipe_options, &indices)
                .context("invalid recipe selection")?;
            machine
                .update_state(
                    &thread_id,
                    StatePatch {
                        selected_recipe_options: Some(selected),
                        ..Default::default()
                    },
                )
                .await?;
            let state = machine.invoke(&thread_id, WorkflowInput::Resume).await?;
            print_assistant_messages(&state.messages);
            if !state.pantry_items.is_empty() {
                println!("Already in your pantry:");
                for item in &state.pantry_items {
                    println!("  - {}", item.original_text);
                }
            }
            for (i, item) in state.pending_cart.iter().enumerate() {
                println!("  {}. {}", i + 1, item.original_text);
            }
        }
        Commands::Approve { indices } => {
            let state = machine.get_state(&thread_id).await?;
            let approved = if indices.is_empty() {
                state.pending_cart.clone()
            } else {
                pick_by_index(&state.pending_cart, &indices).context("invalid cart selection")?
            };
            machine
                .update_state(
                    &thread_id,
                    StatePatch {
                        approved_cart: Some(approved),
                        ..Default::default()
                    },
                )
                .await?;
            let state = machine.invoke(&thread_id, WorkflowInput::Resume).await?;
            print_assistant_messages(&state.messages);
            if let Some(order) = &state.order_result {
                println!("Order summary:");
                for item in &order.items {
                    let marker = if item.status == ItemStatus::Added {
                        "ok"
                    } else {
                        "!!"
                    };
                    let detail = item
                        .product
                        .clone()
                        .or_else(|| item.error.clone())
                        .unwrap_or_else(|| format!("{:?}", item.status));
                    println!("  [{marker}] {} x{} — {detail}", item.item, item.quantity);
                }
            }
        }
        Commands::State => {
            let state = machine.get_state(&thread_id).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Threads => {
            let store = checkpoint_store()?;
            for id in store.list().await? {
                println!("{id}");
            }
        }
        Commands::Reset => {
            machine.reset(&thread_id).await?;
            println!("checkpoint for thread '{thread_id}' removed");
        }
    }

    Ok(())
}

fn checkpoint_store() -> Result<CheckpointStore> {
    let dir = get_data_dir()?.join("checkpoints");
    debug!("checkpoint storage at {}", dir.display());
    Ok(CheckpointStore::new(dir))
}

fn build_machine(config: Arc<AppConfig>) -> Result<WorkflowMachine> {
    let endpoints = &config.endpoints;
    let ports = Ports {
        text_gen: Arc::new(
            TextGenClient::new(
                &endpoints.text_gen_url,
                &endpoints.text_gen_key,
                &endpoints.text_gen_model,
            )
            .map_err(|e| anyhow!("text-generation adapter: {e}"))?,
        ),
        recipe_store: Arc::new(
            RecipeStoreClient::new(&endpoints.recipe_store_url, &endpoints.recipe_store_token)
                .map_err(|e| anyhow!("recipe store adapter: {e}"))?,
        ),
        retail: Arc::new(
            RetailClient::new(&endpoints.retail_url, &endpoints.retail_token)
                .map_err(|e| anyhow!("retail adapter: {e}"))?,
        ),
        web_search: Arc::new(
            WebSearchClient::new(&endpoints.web_search_url)
                .map_err(|e| anyhow!("web search adapter: {e}"))?,
        ),
    };
    Ok(WorkflowMachine::new(ports, config, checkpoint_store()?))
}

fn pick_by_index<T: Clone>(items: &[T], indices: &[usize]) -> Result<Vec<T>> {
    indices
        .iter()
        .map(|&i| {
            items
                .get(i.checked_sub(1).ok_or_else(|| anyhow!("indices are 1-based"))?)
                .cloned()
                .ok_or_else(|| anyhow!("index {i} is out of range (1-{})", items.len()))
        })
        .collect()
}

/// The run of assistant messages at the end of the history, oldest first.
fn trailing_assistant_messages(
    messages: &[larder::workflow::ChatMessage],
) -> &[larder::workflow::ChatMessage] {
    use larder::workflow::Role;
    let run = messages
        .iter()
        .rev()
        .take_while(|m| m.role == Role::Assistant)
        .count();
    &messages[messages.len() - run..]
}

fn print_assistant_messages(messages: &[larder::workflow::ChatMessage]) {
    for message in trailing_assistant_messages(messages) {
        println!("{}", message.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder::workflow::ChatMessage;

    #[test]
    fn trailing_assistant_run_is_chronological() {
        let messages = vec![
            ChatMessage::assistant("old"),
            ChatMessage::user("make pizza"),
            ChatMessage::assistant("first"),
            ChatMessage::assistant("second"),
        ];
        let run: Vec<&str> = trailing_assistant_messages(&messages)
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(run, vec!["first", "second"]);
    }

    #[test]
    fn trailing_assistant_run_handles_edges() {
        assert!(trailing_assistant_messages(&[]).is_empty());
        let only_user = vec![ChatMessage::user("hi")];
        assert!(trailing_assistant_messages(&only_user).is_empty());
    }
}
