//! The workflow state machine.
//!
//! Four linear stages with two interrupt points:
//!
//! ```text
//! search_recipes → [pause] → fetch_selected_recipes → filter_ingredients
//!                → [pause] → execute_order → done
//! ```
//!
//! `invoke` runs stages until the next interrupt or the terminal stage,
//! checkpointing after every completed stage. Resuming a paused thread runs
//! the paused stage next; completed stages are never re-run.

use crate::cart;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::ports::Ports;
use crate::workflow::checkpoint::{Checkpoint, CheckpointStore};
use crate::workflow::state::{ChatMessage, StatePatch, WorkflowState};
use crate::workflow::{fetch, filter, search};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SearchRecipes,
    FetchSelectedRecipes,
    FilterIngredients,
    ExecuteOrder,
    Done,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::SearchRecipes => Stage::FetchSelectedRecipes,
            Stage::FetchSelectedRecipes => Stage::FilterIngredients,
            Stage::FilterIngredients => Stage::ExecuteOrder,
            Stage::ExecuteOrder => Stage::Done,
            Stage::Done => Stage::Done,
        }
    }

    /// Stages the machine pauses before, waiting for a human decision.
    pub fn is_interrupt(self) -> bool {
        matches!(self, Stage::FetchSelectedRecipes | Stage::ExecuteOrder)
    }
}

/// Input to `invoke`: a new user message starts a planning cycle, a patch
/// delivers a human decision, `Resume` just continues from the pause.
#[derive(Debug, Clone)]
pub enum WorkflowInput {
    Message(String),
    Patch(StatePatch),
    Resume,
}

/// Drives one workflow per thread id over the capability ports, persisting
/// state through the checkpoint store after every stage.
pub struct WorkflowMachine {
    ports: Ports,
    config: Arc<AppConfig>,
    store: CheckpointStore,
}

impl WorkflowMachine {
    pub fn new(ports: Ports, config: Arc<AppConfig>, store: CheckpointStore) -> Self {
        Self {
            ports,
            config,
            store,
        }
    }

    /// Run the thread until the next interrupt point or the terminal stage,
    /// returning the state as checkpointed.
    pub async fn invoke(&self, thread_id: &str, input: WorkflowInput) -> Result<WorkflowState> {
        let (mut state, mut stage) = match self.store.load(thread_id).await {
            Ok(checkpoint) => (checkpoint.state, checkpoint.resume_stage),
            Err(Error::CheckpointNotFound(_)) => (self.fresh_state(), Stage::SearchRecipes),
            Err(e) => return Err(e),
        };

        match input {
            WorkflowInput::Message(text) => {
                // A new user message starts a new planning cycle.
                state.reset_cycle();
                state.messages.push(ChatMessage::user(text));
                stage = Stage::SearchRecipes;
            }
            WorkflowInput::Patch(patch) => state.apply(patch),
            WorkflowInput::Resume => {}
        }

        loop {
            if stage == Stage::Done {
                break;
            }

            info!("thread {thread_id}: running stage {stage:?}");
            let patch = self.run_stage(stage, &state).await?;
            state.apply(patch);
            stage = stage.next();

            self.store
                .save(&Checkpoint::new(thread_id, state.clone(), stage))
                .await?;

            if stage.is_interrupt() {
                debug!("thread {thread_id}: paused before {stage:?}");
                break;
            }
        }

        Ok(state)
    }

    /// Return the last checkpointed state without executing anything.
    pub async fn get_state(&self, thread_id: &str) -> Result<WorkflowState> {
        Ok(self.store.load(thread_id).await?.state)
    }

    /// Merge a patch into the last checkpointed state without executing a
    /// stage; used to deliver human decisions between stages.
    pub async fn update_state(&self, thread_id: &str, patch: StatePatch) -> Result<WorkflowState> {
        let mut checkpoint = self.store.load(thread_id).await?;
        checkpoint.state.apply(patch);
        let updated = Checkpoint::new(
            thread_id,
            checkpoint.state.clone(),
            checkpoint.resume_stage,
        );
        self.store.save(&updated).await?;
        Ok(updated.state)
    }

    /// Drop a thread's checkpoint entirely.
    pub async fn reset(&self, thread_id: &str) -> Result<()> {
        self.store.delete(thread_id).await
    }

    fn fresh_state(&self) -> WorkflowState {
        WorkflowState {
            fulfillment_method: self.config.settings.fulfillment,
            preferred_store_id: self.config.settings.store.location_id.clone(),
            ..Default::default()
        }
    }

    async fn run_stage(&self, stage: Stage, state: &WorkflowState) -> Result<StatePatch> {
        match stage {
            Stage::SearchRecipes => search::run(&self.ports, &self.config, state).await,
            Stage::FetchSelectedRecipes => fetch::run(&self.ports, state).await,
            Stage::FilterIngredients => filter::run(&self.config.pantry, state),
            Stage::ExecuteOrder => cart::run(&self.ports, state).await,
            Stage::Done => Ok(StatePatch::default()),
        }
    }
}
