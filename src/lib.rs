//! # Larder
//!
//! A meal-planning grocery agent: search for recipes, fetch the ones the
//! user picks, split their ingredients against a pantry-staple list, and
//! place the approved remainder in a retailer cart — pausing for human
//! approval before the fetch and before the order.
//!
//! ## Modules
//!
//! - `cart` - Cart execution engine and the per-ingredient resolver
//! - `config` - YAML configuration (pantry, recipe sources, settings, endpoints)
//! - `error` - Crate-wide error types and the capability failure taxonomy
//! - `llmtext` - Tolerant parsing of text-generation output
//! - `ports` - Capability port traits and their HTTP adapters
//! - `workflow` - The checkpointed four-stage state machine
//! - `testing` - Mock ports with call recording for tests
pub mod cart;
pub mod config;
pub mod error;
pub mod llmtext;
pub mod ports;
pub mod workflow;

pub mod testing;
