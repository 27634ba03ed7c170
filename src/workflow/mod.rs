//! The stateful ordering workflow: a resumable, checkpointed pipeline of
//! four stages separated by human-in-the-loop interrupt points.

pub mod checkpoint;
pub mod fetch;
pub mod filter;
pub mod machine;
pub mod search;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointStore, CHECKPOINT_VERSION};
pub use machine::{Stage, WorkflowInput, WorkflowMachine};
pub use state::{
    ChatMessage, ItemStatus, OrderItem, OrderResult, RawIngredient, RecipeOption, RecipeSource,
    Role, StatePatch, WorkflowState,
};
